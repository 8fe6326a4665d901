// 该文件是 Qianliyan （千里眼） 项目的一部分。
// src/main.rs - 批处理检测主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use qianliyan::detector::{Engine, YoloEngine, normalize};
use qianliyan::input;
use qianliyan::output::{self, TextRecord, Visualizer};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  println!("Qianliyan 图像检测");
  println!("==================");
  println!("模型文件路径: {}", args.weights.display());
  println!("输入来源: {}", args.source.display());
  println!("置信度阈值: {}", args.conf);
  println!("推理尺寸: {}", args.imgsz);
  println!("输出目录: {}", args.save_dir.display());
  println!();

  let images = input::find_images(&args.source)?;
  if images.is_empty() {
    println!("No images found");
    return Ok(());
  }
  println!("找到 {} 张图像", images.len());

  println!("正在加载模型...");
  let mut engine = YoloEngine::load(&args.weights)?;
  println!("模型加载完成");
  println!();

  // Ctrl-C 请求在两张图像之间停止
  let (tx, rx) = mpsc::channel();
  ctrlc::set_handler(move || {
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      eprintln!("强制退出程序");
      std::process::exit(1);
    });
  })
  .expect("Error setting Ctrl-C handler");

  let visualizer = Visualizer::new();
  let record = TextRecord {
    label_with_name: true,
  };

  println!("开始处理...");
  let mut processed = 0usize;
  let mut total_detections = 0usize;

  for image_path in &images {
    if rx.try_recv().is_ok() {
      println!("收到中断信号，退出处理循环");
      break;
    }

    println!("图像: {}", image_path.display());
    let image = input::load_image(image_path)?;

    let now = std::time::Instant::now();
    let result = engine.detect(&image, args.conf, args.imgsz)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let detections = normalize(&result);
    total_detections += detections.len();
    output::print_summary(&detections);

    let file_name = image_path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| "image.png".to_string());
    let saved = output::save_annotated(&visualizer, &image, &detections, &args.save_dir, &file_name)?;
    if args.save_txt {
      record.record(&detections, &saved)?;
    }
    println!("Saved: {}", saved.display());

    processed += 1;
  }

  println!();
  println!("处理完成!");
  println!("总图像数: {}", processed);
  println!("总检测数: {}", total_detections);

  Ok(())
}
