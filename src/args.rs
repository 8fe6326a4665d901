// 该文件是 Qianliyan （千里眼） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;

/// Qianliyan 批处理检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 图像文件或图像目录
  #[arg(long, short = 's', value_name = "SOURCE")]
  pub source: PathBuf,

  /// ONNX 权重文件路径
  #[arg(long, short = 'w', default_value = "yolov8n.onnx", value_name = "FILE")]
  pub weights: PathBuf,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, short = 'c', default_value = "0.25", value_name = "THRESHOLD")]
  pub conf: f32,

  /// 推理图像尺寸
  #[arg(long, default_value = "640", value_name = "SIZE")]
  pub imgsz: u32,

  /// 标注图像输出目录
  #[arg(long, default_value = "outputs", value_name = "DIR")]
  pub save_dir: PathBuf,

  /// 同时在输出目录写出同名 .txt 检测记录
  #[arg(long)]
  pub save_txt: bool,
}
