// 该文件是 Qianliyan （千里眼） 项目的一部分。
// src/input/mod.rs - 图像发现与读取
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{ImageReader, RgbImage};

/// 可识别的图像文件扩展名（区分大小写）
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// 判断路径的扩展名是否属于可识别图像
fn has_image_extension(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.contains(&ext))
    .unwrap_or(false)
}

/// 收集一个路径下的全部图像文件
///
/// - 单个文件直接返回（不检查扩展名）
/// - 目录则递归收集扩展名匹配的文件，按路径字典序排序
/// - 没有匹配时返回空列表，由调用方决定如何报告
pub fn find_images(source: &Path) -> Result<Vec<PathBuf>> {
  if source.is_file() {
    return Ok(vec![source.to_path_buf()]);
  }

  let mut images = Vec::new();
  collect_images(source, &mut images)
    .with_context(|| format!("无法遍历目录: {}", source.display()))?;
  images.sort();

  Ok(images)
}

fn collect_images(directory: &Path, images: &mut Vec<PathBuf>) -> std::io::Result<()> {
  for entry in fs::read_dir(directory)? {
    let path = entry?.path();
    if path.is_dir() {
      collect_images(&path, images)?;
    } else if has_image_extension(&path) {
      images.push(path);
    }
  }
  Ok(())
}

/// 读取一张图像并解码为 RGB8
pub fn load_image(path: &Path) -> Result<RgbImage> {
  let image = ImageReader::open(path)
    .with_context(|| format!("无法打开图片文件: {}", path.display()))?
    .decode()
    .with_context(|| format!("无法解码图片文件: {}", path.display()))?
    .to_rgb8();

  Ok(image)
}
