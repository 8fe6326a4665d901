// 该文件是 Qianliyan （千里眼） 项目的一部分。
// src/detector/yolo.rs - YOLO 目标检测引擎
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;
use std::path::Path;

use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use super::{Engine, EngineError, EngineOutput, RawBox};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// NMS IOU 阈值
const NMS_IOU_THRESHOLD: f32 = 0.45;

/// 解码阶段的候选框（推理尺寸坐标系）
#[derive(Debug, Clone, Copy)]
struct Candidate {
  xyxy: [f32; 4],
  class_id: i64,
  confidence: f32,
}

/// 基于 ONNX Runtime 的 YOLO 检测引擎
pub struct YoloEngine {
  /// ONNX Runtime 会话
  session: Session,
  /// 类别标签表，加载模型时确定
  names: HashMap<i64, String>,
}

impl YoloEngine {
  /// 从权重文件加载检测引擎
  ///
  /// 标签表优先取模型内嵌的 `names` 元数据，缺失时回退到 COCO 80 类。
  pub fn load<P: AsRef<Path>>(weights: P) -> Result<Self, EngineError> {
    let weights = weights.as_ref();
    info!("加载模型文件: {}", weights.display());

    let session = Session::builder()
      .map_err(|e| EngineError::ModelLoad(e.to_string()))?
      .commit_from_file(weights)
      .map_err(|e| EngineError::ModelLoad(format!("{}: {}", weights.display(), e)))?;

    let names = session
      .metadata()
      .ok()
      .and_then(|metadata| metadata.custom("names").ok().flatten())
      .and_then(|raw| parse_names_metadata(&raw))
      .unwrap_or_else(|| {
        debug!("模型没有可用的 names 元数据，使用内置 COCO 标签表");
        coco_names()
      });

    info!("模型加载完成，共 {} 个类别", names.len());

    Ok(Self { session, names })
  }
}

impl Engine for YoloEngine {
  fn detect(
    &mut self,
    image: &RgbImage,
    confidence: f32,
    image_size: u32,
  ) -> Result<EngineOutput, EngineError> {
    let tensor = preprocess(image, image_size)?;

    let input_name = self
      .session
      .inputs
      .first()
      .map(|input| input.name.clone())
      .unwrap_or_else(|| "images".to_string());

    debug!("执行模型推理");
    let outputs = self
      .session
      .run(ort::inputs![input_name.as_str() => tensor])
      .map_err(|e| EngineError::Inference(e.to_string()))?;

    let value = outputs
      .iter()
      .next()
      .ok_or_else(|| EngineError::InvalidOutput("模型没有产生输出".to_string()))?
      .1;
    let (shape, data) = value
      .try_extract_tensor::<f32>()
      .map_err(|e| EngineError::InvalidOutput(e.to_string()))?;

    let dims: Vec<usize> = shape.iter().map(|d| *d as usize).collect();
    if dims.len() != 3 || dims[0] != 1 {
      return Err(EngineError::InvalidOutput(format!(
        "预期输出形状为 [1, 属性, 候选] 或 [1, 候选, 属性]，实际为 {:?}",
        dims
      )));
    }

    // 输出布局可能是 [1, 4+C, N] 或其转置，按维度大小判断
    let attribute_major = dims[1] <= dims[2];
    let (attributes, anchors) = if attribute_major {
      (dims[1], dims[2])
    } else {
      (dims[2], dims[1])
    };

    if data.len() < attributes * anchors {
      return Err(EngineError::InvalidOutput(format!(
        "输出数据长度 {} 小于 {}x{}",
        data.len(),
        attributes,
        anchors
      )));
    }

    let candidates = decode_predictions(data, attributes, anchors, attribute_major, confidence);
    let kept = nms(candidates, NMS_IOU_THRESHOLD);

    // 缩放回原图坐标
    let scale_x = image.width() as f32 / image_size as f32;
    let scale_y = image.height() as f32 / image_size as f32;
    let boxes = kept
      .into_iter()
      .map(|candidate| RawBox {
        xyxy: [
          (candidate.xyxy[0] * scale_x).clamp(0.0, image.width() as f32),
          (candidate.xyxy[1] * scale_y).clamp(0.0, image.height() as f32),
          (candidate.xyxy[2] * scale_x).clamp(0.0, image.width() as f32),
          (candidate.xyxy[3] * scale_y).clamp(0.0, image.height() as f32),
        ],
        class_id: Some(candidate.class_id),
        confidence: Some(candidate.confidence),
      })
      .collect::<Vec<_>>();

    debug!("检测到 {} 个目标", boxes.len());

    Ok(EngineOutput {
      boxes,
      names: self.names.clone(),
    })
  }
}

/// 预处理图像：缩放到推理尺寸，归一化为 NCHW f32 张量
fn preprocess(image: &RgbImage, image_size: u32) -> Result<ort::value::DynValue, EngineError> {
  let resized = image::imageops::resize(
    image,
    image_size,
    image_size,
    image::imageops::FilterType::Triangle,
  );

  let size = (image_size * image_size) as usize;
  let raw = resized.as_raw();
  let mut tensor_data = vec![0f32; 3 * size];

  for idx in 0..size {
    tensor_data[idx] = raw[idx * 3] as f32 / 255.0;
    tensor_data[size + idx] = raw[idx * 3 + 1] as f32 / 255.0;
    tensor_data[2 * size + idx] = raw[idx * 3 + 2] as f32 / 255.0;
  }

  let shape = [1usize, 3, image_size as usize, image_size as usize];
  Tensor::from_array((shape, tensor_data.into_boxed_slice()))
    .map(|tensor| tensor.into_dyn())
    .map_err(|e| EngineError::Inference(format!("无法构建输入张量: {}", e)))
}

/// 解码预测张量
///
/// 每个候选由 4 个框参数（cx, cy, w, h）与 C 个类别得分组成，
/// 取得分最高的类别，低于阈值的候选被丢弃。坐标仍在推理尺寸坐标系。
fn decode_predictions(
  data: &[f32],
  attributes: usize,
  anchors: usize,
  attribute_major: bool,
  confidence_threshold: f32,
) -> Vec<Candidate> {
  let mut candidates = Vec::new();
  if attributes < 5 {
    return candidates;
  }
  let num_classes = attributes - 4;

  let at = |attribute: usize, anchor: usize| -> f32 {
    if attribute_major {
      data[attribute * anchors + anchor]
    } else {
      data[anchor * attributes + attribute]
    }
  };

  for anchor in 0..anchors {
    let mut best_score = 0f32;
    let mut best_class = 0usize;
    for class in 0..num_classes {
      let score = at(4 + class, anchor);
      if score > best_score {
        best_score = score;
        best_class = class;
      }
    }

    if best_score < confidence_threshold {
      continue;
    }

    let cx = at(0, anchor);
    let cy = at(1, anchor);
    let w = at(2, anchor);
    let h = at(3, anchor);

    candidates.push(Candidate {
      xyxy: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
      class_id: best_class as i64,
      confidence: best_score,
    });
  }

  candidates
}

/// 非极大值抑制（同类别之间按 IoU 抑制）
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
  candidates.sort_by(|a, b| {
    b.confidence
      .partial_cmp(&a.confidence)
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  let mut kept: Vec<Candidate> = Vec::new();

  for candidate in candidates {
    let suppressed = kept.iter().any(|existing| {
      existing.class_id == candidate.class_id
        && iou(&existing.xyxy, &candidate.xyxy) > iou_threshold
    });
    if !suppressed {
      kept.push(candidate);
    }
  }

  kept
}

/// 计算两个边界框的 IoU
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

/// 解析模型元数据里的标签表
///
/// Ultralytics 导出的 ONNX 模型带有形如 `{0: 'person', 1: 'bicycle'}`
/// 的 `names` 元数据。解析失败时返回 None，由调用方回退。
fn parse_names_metadata(raw: &str) -> Option<HashMap<i64, String>> {
  let trimmed = raw.trim();
  let inner = trimmed.strip_prefix('{')?.strip_suffix('}')?;

  let mut names = HashMap::new();
  for piece in inner.split(',') {
    let Some((key, value)) = piece.split_once(':') else {
      continue;
    };
    let Ok(class_id) = key.trim().parse::<i64>() else {
      continue;
    };
    let label = value
      .trim()
      .trim_matches(|c| c == '\'' || c == '"')
      .to_string();
    if !label.is_empty() {
      names.insert(class_id, label);
    }
  }

  if names.is_empty() { None } else { Some(names) }
}

/// 内置的 COCO 标签表
fn coco_names() -> HashMap<i64, String> {
  COCO_CLASSES
    .iter()
    .enumerate()
    .map(|(id, name)| (id as i64, name.to_string()))
    .collect()
}
