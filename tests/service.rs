// 该文件是 Qianliyan （千里眼） 项目的一部分。
// tests/service.rs - HTTP 检测服务集成测试
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use image::RgbImage;

use qianliyan::detector::{Engine, EngineError, EngineOutput, RawBox};
use qianliyan::service::{self, ServiceState};

const BOUNDARY: &str = "qianliyan-test-boundary";

/// 可计数、可观察的假引擎
struct FakeEngine {
  box_count: usize,
  seen_confidence: Arc<Mutex<Vec<f32>>>,
}

impl Engine for FakeEngine {
  fn detect(
    &mut self,
    _image: &RgbImage,
    confidence: f32,
    _image_size: u32,
  ) -> Result<EngineOutput, EngineError> {
    self.seen_confidence.lock().unwrap().push(confidence);

    let boxes = (0..self.box_count)
      .map(|i| RawBox {
        xyxy: [i as f32 * 20.0, 0.0, i as f32 * 20.0 + 10.0, 10.0],
        class_id: Some(0),
        confidence: Some(0.123_456),
      })
      .collect();
    let mut names = HashMap::new();
    names.insert(0, "person".to_string());

    Ok(EngineOutput { boxes, names })
  }
}

struct Harness {
  state: ServiceState,
  constructions: Arc<AtomicUsize>,
  seen_confidence: Arc<Mutex<Vec<f32>>>,
}

fn harness(upload_dir: PathBuf, box_count: usize) -> Harness {
  let constructions = Arc::new(AtomicUsize::new(0));
  let seen_confidence = Arc::new(Mutex::new(Vec::new()));

  let counter = constructions.clone();
  let seen = seen_confidence.clone();
  let state = ServiceState::with_factory(
    upload_dir,
    Arc::new(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok(Box::new(FakeEngine {
        box_count,
        seen_confidence: seen.clone(),
      }) as Box<dyn Engine>)
    }),
  );

  Harness {
    state,
    constructions,
    seen_confidence,
  }
}

fn png_bytes() -> Vec<u8> {
  let image = RgbImage::new(8, 8);
  let mut buffer = std::io::Cursor::new(Vec::new());
  image::DynamicImage::ImageRgb8(image)
    .write_to(&mut buffer, image::ImageFormat::Png)
    .unwrap();
  buffer.into_inner()
}

fn multipart_body(file: Option<(&str, &str, &[u8])>, conf: Option<&str>) -> Vec<u8> {
  let mut body = Vec::new();
  if let Some((filename, content_type, bytes)) = file {
    body.extend_from_slice(
      format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
         filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
      )
      .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
  }
  if let Some(conf) = conf {
    body.extend_from_slice(
      format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"conf\"\r\n\r\n{conf}\r\n")
        .as_bytes(),
    );
  }
  body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
  body
}

fn detect_request(body: Vec<u8>) -> test::TestRequest {
  test::TestRequest::post()
    .uri("/detect")
    .insert_header((
      "content-type",
      format!("multipart/form-data; boundary={BOUNDARY}"),
    ))
    .set_payload(body)
}

macro_rules! init_app {
  ($state:expr) => {
    test::init_service(
      App::new()
        .app_data(web::Data::new($state))
        .service(service::health)
        .service(service::detect),
    )
    .await
  };
}

#[actix_web::test]
async fn health_always_reports_ok() {
  let dir = tempfile::tempdir().unwrap();
  let harness = harness(dir.path().to_path_buf(), 0);
  let app = init_app!(harness.state);

  let response =
    test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
  assert_eq!(response.status(), StatusCode::OK);

  let body: serde_json::Value = test::read_body_json(response).await;
  assert_eq!(body, serde_json::json!({ "status": "ok" }));
}

#[actix_web::test]
async fn non_image_upload_is_rejected_without_touching_disk() {
  let dir = tempfile::tempdir().unwrap();
  let harness = harness(dir.path().to_path_buf(), 3);
  let app = init_app!(harness.state);

  let body = multipart_body(Some(("notes.txt", "text/plain", b"hello")), None);
  let response = test::call_service(&app, detect_request(body).to_request()).await;

  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  let body: serde_json::Value = test::read_body_json(response).await;
  assert_eq!(
    body,
    serde_json::json!({ "Error": "Only image uploads allowed" })
  );

  // 未写入任何文件，也未触发引擎构建
  assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
  assert_eq!(harness.constructions.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn detect_returns_engine_box_count() {
  let dir = tempfile::tempdir().unwrap();
  let harness = harness(dir.path().to_path_buf(), 3);
  let app = init_app!(harness.state);

  let body = multipart_body(Some(("photo.png", "image/png", &png_bytes())), None);
  let response = test::call_service(&app, detect_request(body).to_request()).await;
  assert_eq!(response.status(), StatusCode::OK);

  let body: serde_json::Value = test::read_body_json(response).await;
  let detections = body["detections"].as_array().unwrap();
  assert_eq!(detections.len(), 3);

  // 置信度在响应里取整到 4 位小数
  assert_eq!(detections[0]["class_id"], 0);
  assert_eq!(detections[0]["label"], "person");
  let confidence = detections[0]["confidence"].as_f64().unwrap();
  assert!((confidence - 0.1235).abs() < 1e-6);
  assert_eq!(detections[0]["box"].as_array().unwrap().len(), 4);

  // 上传文件按原名保存
  assert!(dir.path().join("photo.png").exists());

  // 缺省置信度透传给引擎
  assert_eq!(*harness.seen_confidence.lock().unwrap(), vec![0.25]);
}

#[actix_web::test]
async fn engine_is_constructed_once_across_requests() {
  let dir = tempfile::tempdir().unwrap();
  let harness = harness(dir.path().to_path_buf(), 1);
  let app = init_app!(harness.state);

  for _ in 0..2 {
    let body = multipart_body(Some(("photo.png", "image/png", &png_bytes())), None);
    let response = test::call_service(&app, detect_request(body).to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);
  }

  assert_eq!(harness.constructions.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn conf_form_field_is_forwarded_to_the_engine() {
  let dir = tempfile::tempdir().unwrap();
  let harness = harness(dir.path().to_path_buf(), 0);
  let app = init_app!(harness.state);

  let body = multipart_body(Some(("photo.png", "image/png", &png_bytes())), Some("0.5"));
  let response = test::call_service(&app, detect_request(body).to_request()).await;
  assert_eq!(response.status(), StatusCode::OK);

  let body: serde_json::Value = test::read_body_json(response).await;
  assert_eq!(body["detections"].as_array().unwrap().len(), 0);
  assert_eq!(*harness.seen_confidence.lock().unwrap(), vec![0.5]);
}

#[actix_web::test]
async fn request_without_file_field_is_a_bad_request() {
  let dir = tempfile::tempdir().unwrap();
  let harness = harness(dir.path().to_path_buf(), 0);
  let app = init_app!(harness.state);

  let body = multipart_body(None, Some("0.5"));
  let response = test::call_service(&app, detect_request(body).to_request()).await;
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn engine_construction_failure_is_a_server_error() {
  let dir = tempfile::tempdir().unwrap();
  let state = ServiceState::with_factory(
    dir.path().to_path_buf(),
    Arc::new(|| Err(EngineError::ModelLoad("权重文件不存在".to_string()))),
  );
  let app = init_app!(state);

  let body = multipart_body(Some(("photo.png", "image/png", &png_bytes())), None);
  let response = test::call_service(&app, detect_request(body).to_request()).await;
  assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

  let body: serde_json::Value = test::read_body_json(response).await;
  assert!(body["Error"].is_string());
}

#[actix_web::test]
async fn inference_failure_degrades_to_empty_result() {
  struct FailingEngine;
  impl Engine for FailingEngine {
    fn detect(
      &mut self,
      _image: &RgbImage,
      _confidence: f32,
      _image_size: u32,
    ) -> Result<EngineOutput, EngineError> {
      Err(EngineError::Inference("推理超时".to_string()))
    }
  }

  let dir = tempfile::tempdir().unwrap();
  let state = ServiceState::with_factory(
    dir.path().to_path_buf(),
    Arc::new(|| Ok(Box::new(FailingEngine) as Box<dyn Engine>)),
  );
  let app = init_app!(state);

  let body = multipart_body(Some(("photo.png", "image/png", &png_bytes())), None);
  let response = test::call_service(&app, detect_request(body).to_request()).await;
  assert_eq!(response.status(), StatusCode::OK);

  let body: serde_json::Value = test::read_body_json(response).await;
  assert_eq!(body["detections"].as_array().unwrap().len(), 0);
}
