// 该文件是 Qianliyan （千里眼） 项目的一部分。
// src/detector/mod.rs - 检测引擎接口与结果归一化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

mod yolo;
pub use yolo::{COCO_CLASSES, YoloEngine};

/// 默认置信度阈值
pub const DEFAULT_CONFIDENCE: f32 = 0.25;
/// 默认推理图像尺寸
pub const DEFAULT_IMAGE_SIZE: u32 = 640;

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("模型加载失败: {0}")]
  ModelLoad(String),
  #[error("推理失败: {0}")]
  Inference(String),
  #[error("模型输出无效: {0}")]
  InvalidOutput(String),
  #[error("推理工作线程错误: {0}")]
  Worker(String),
}

/// 引擎原生的单个检测框
///
/// 类别与置信度为可选，缺失时由归一化阶段填补默认值。
#[derive(Debug, Clone)]
pub struct RawBox {
  /// 边界框 [x1, y1, x2, y2]，原图像素坐标
  pub xyxy: [f32; 4],
  /// 类别索引
  pub class_id: Option<i64>,
  /// 置信度
  pub confidence: Option<f32>,
}

/// 引擎原生的单次推理结果
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
  /// 检测框，保持引擎给出的顺序
  pub boxes: Vec<RawBox>,
  /// 类别标签表（类别索引 -> 显示名称）
  pub names: HashMap<i64, String>,
}

/// 检测引擎
///
/// 引擎被视为不透明能力：给定图像与阈值，返回原生结果对象。
/// 推理调用需要独占访问（`&mut self`）。
pub trait Engine: Send {
  fn detect(
    &mut self,
    image: &RgbImage,
    confidence: f32,
    image_size: u32,
  ) -> Result<EngineOutput, EngineError>;
}

/// 归一化后的检测记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub class_id: i64,
  pub label: String,
  pub confidence: f32,
  #[serde(rename = "box")]
  pub bbox: [f32; 4],
}

impl Detection {
  /// 置信度按给定小数位数取整后的副本（服务端响应用）
  pub fn with_rounded_confidence(mut self, decimals: u32) -> Self {
    let factor = 10f32.powi(decimals as i32);
    self.confidence = (self.confidence * factor).round() / factor;
    self
  }
}

/// 将引擎原生结果归一化为检测记录序列
///
/// 两个入口（批处理与服务）共用这一处逻辑：
/// - 类别缺失时记为 -1，置信度缺失时记为 0.0
/// - 标签查表失败时退化为类别索引的字符串形式
/// - 坐标非有限值的条目被跳过并记录原因，不影响其余条目
/// - 置信度与坐标原样透传，不做取整或裁剪
pub fn normalize(output: &EngineOutput) -> Vec<Detection> {
  let mut detections = Vec::with_capacity(output.boxes.len());

  for raw in &output.boxes {
    if !raw.xyxy.iter().all(|v| v.is_finite()) {
      warn!("跳过坐标无效的检测框: {:?}", raw.xyxy);
      continue;
    }

    let class_id = raw.class_id.unwrap_or(-1);
    let confidence = raw.confidence.unwrap_or(0.0);
    let label = output
      .names
      .get(&class_id)
      .cloned()
      .unwrap_or_else(|| class_id.to_string());

    detections.push(Detection {
      class_id,
      label,
      confidence,
      bbox: raw.xyxy,
    });
  }

  detections
}
