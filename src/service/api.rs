// 该文件是 Qianliyan （千里眼） 项目的一部分。
// src/service/api.rs - HTTP 接口
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

use std::path::PathBuf;

use actix_multipart::Multipart;
use actix_web::{HttpResponse, Responder, get, post, web};
use futures::{StreamExt, TryStreamExt};
use sanitize_filename::sanitize;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::detector::{DEFAULT_CONFIDENCE, DEFAULT_IMAGE_SIZE, Detection};

use super::state::{ServiceState, run_detection};
use super::upload;

#[derive(Serialize)]
struct DetectResponse {
  detections: Vec<Detection>,
}

#[get("/health")]
pub async fn health() -> impl Responder {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[post("/detect")]
pub async fn detect(state: web::Data<ServiceState>, mut payload: Multipart) -> impl Responder {
  let mut confidence = DEFAULT_CONFIDENCE;
  let mut saved_path: Option<PathBuf> = None;

  while let Ok(Some(mut field)) = payload.try_next().await {
    let (field_name, file_name) = {
      let content_disposition = match field.content_disposition() {
        Some(content_disposition) => content_disposition,
        None => return HttpResponse::BadRequest().body("Invalid payload."),
      };
      (
        content_disposition.get_name().map(str::to_string),
        content_disposition.get_filename().map(str::to_string),
      )
    };
    let Some(field_name) = field_name else {
      return HttpResponse::BadRequest().body("Invalid payload.");
    };

    match field_name.as_str() {
      "conf" => {
        if let Some(text) = upload::read_text_field(&mut field).await
          && let Ok(value) = text.trim().parse::<f32>()
        {
          confidence = value;
        }
      }
      "file" => {
        // 在写盘之前校验声明的内容类型
        let is_image = field
          .content_type()
          .map(|mime| mime.essence_str().starts_with("image"))
          .unwrap_or(false);
        if !is_image {
          return HttpResponse::BadRequest()
            .json(serde_json::json!({ "Error": "Only image uploads allowed" }));
        }

        let Some(file_name) = file_name else {
          return HttpResponse::BadRequest().body("Invalid payload.");
        };
        let sanitized_file_name = sanitize(file_name);
        if sanitized_file_name.is_empty() {
          return HttpResponse::BadRequest().body("Invalid filename.");
        }

        let destination = state.upload_dir().join(sanitized_file_name);
        if upload::save_field_to_file(&mut field, &destination)
          .await
          .is_err()
        {
          return HttpResponse::InternalServerError().finish();
        }
        info!("已保存上传文件: {}", destination.display());
        saved_path = Some(destination);
      }
      _ => {
        // 丢弃未知字段，继续解析后续字段
        while field.next().await.is_some() {}
      }
    }
  }

  let Some(image_path) = saved_path else {
    return HttpResponse::BadRequest().finish();
  };

  let engine = match state.engine().await {
    Ok(engine) => engine,
    Err(err) => {
      error!("检测引擎不可用: {}", err);
      return HttpResponse::InternalServerError()
        .json(serde_json::json!({ "Error": "Detection engine unavailable" }));
    }
  };

  let detections = match run_detection(engine, image_path, confidence, DEFAULT_IMAGE_SIZE).await {
    Ok(detections) => detections,
    Err(err) => {
      // 单次推理失败不影响服务，降级为空结果
      warn!("推理失败，返回空结果: {}", err);
      Vec::new()
    }
  };

  let detections = detections
    .into_iter()
    .map(|detection| detection.with_rounded_confidence(4))
    .collect();

  HttpResponse::Ok().json(DetectResponse { detections })
}
