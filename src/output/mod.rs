// 该文件是 Qianliyan （千里眼） 项目的一部分。
// src/output/mod.rs - 输出模块
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod visualizer;

pub use visualizer::Visualizer;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;

use crate::detector::Detection;

/// 打印一张图像的检测摘要
///
/// 每个检测一行：序号、标签、置信度（2 位小数）、边界框（1 位小数）；
/// 没有检测时打印提示行。仅用于显示，不改变记录中的数值。
pub fn print_summary(detections: &[Detection]) {
  if detections.is_empty() {
    println!(" No detections");
    return;
  }

  for (index, detection) in detections.iter().enumerate() {
    println!(
      " [{}] {} conf={:.2} box=({:.1}, {:.1}, {:.1}, {:.1})",
      index,
      detection.label,
      detection.confidence,
      detection.bbox[0],
      detection.bbox[1],
      detection.bbox[2],
      detection.bbox[3],
    );
  }
}

/// 绘制检测结果并保存到输出目录
///
/// 输出文件名沿用原文件名，已存在的文件会被直接覆盖。
pub fn save_annotated(
  visualizer: &Visualizer,
  image: &RgbImage,
  detections: &[Detection],
  save_dir: &Path,
  file_name: &str,
) -> Result<PathBuf> {
  std::fs::create_dir_all(save_dir)
    .with_context(|| format!("无法创建输出目录: {}", save_dir.display()))?;

  let mut annotated = image.clone();
  visualizer.draw_detections(&mut annotated, detections);

  let output_path = save_dir.join(file_name);
  annotated
    .save(&output_path)
    .with_context(|| format!("无法保存图片: {}", output_path.display()))?;

  Ok(output_path)
}

/// 纯文本检测记录
pub struct TextRecord {
  /// 以标签名记录；为 false 时记录类别索引
  pub label_with_name: bool,
}

impl TextRecord {
  /// 在图像文件旁写出同名 .txt 记录
  ///
  /// 每个检测一行：`标签, 置信度, x1, y1, x2, y2`，保留 4 位小数。
  pub fn record(&self, detections: &[Detection], image_path: &Path) -> std::io::Result<()> {
    let mut records = Vec::new();
    for detection in detections {
      let name = if self.label_with_name {
        detection.label.clone()
      } else {
        format!("{}", detection.class_id)
      };
      records.push(format!(
        "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
        name,
        detection.confidence,
        detection.bbox[0],
        detection.bbox[1],
        detection.bbox[2],
        detection.bbox[3]
      ));
    }
    std::fs::write(image_path.with_extension("txt"), records.join("\n"))?;
    Ok(())
  }
}
