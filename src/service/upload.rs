// 该文件是 Qianliyan （千里眼） 项目的一部分。
// src/service/upload.rs - 上传文件保存
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::Path;

use actix_multipart::Field;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// 将 multipart 字段逐块写入目标文件
///
/// 上传目录不存在时创建；同名文件被直接覆盖。
pub async fn save_field_to_file(field: &mut Field, path: &Path) -> std::io::Result<()> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent).await?;
  }

  let mut file = File::create(path).await?;
  while let Some(chunk) = field.next().await {
    let data = chunk.map_err(|err| std::io::Error::other(err.to_string()))?;
    file.write_all(&data).await?;
  }
  file.flush().await?;

  Ok(())
}

/// 读取一个文本表单字段的完整内容
pub async fn read_text_field(field: &mut Field) -> Option<String> {
  let mut data = Vec::new();
  while let Some(chunk) = field.next().await {
    data.extend_from_slice(&chunk.ok()?);
  }
  Some(String::from_utf8_lossy(&data).to_string())
}
