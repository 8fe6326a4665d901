// 该文件是 Qianliyan （千里眼） 项目的一部分。
// src/bin/server.rs - HTTP 检测服务主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use qianliyan::service::{self, ServiceState};

/// Qianliyan 检测服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, default_value = "0.0.0.0:8000", value_name = "ADDR")]
  pub bind: String,

  /// ONNX 权重文件路径
  #[arg(long, short = 'w', default_value = "yolov8n.onnx", value_name = "FILE")]
  pub weights: PathBuf,

  /// 上传文件保存目录
  #[arg(long, default_value = "uploads", value_name = "DIR")]
  pub upload_dir: PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("监听地址: {}", args.bind);
  info!("模型文件路径: {}", args.weights.display());
  info!("上传目录: {}", args.upload_dir.display());

  let state = ServiceState::new(args.weights, args.upload_dir);
  service::run(state, &args.bind).await
}
