// 该文件是 Qianliyan （千里眼） 项目的一部分。
// src/service/state.rs - 服务共享状态与引擎句柄
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

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::info;

use crate::detector::{Detection, Engine, EngineError, EngineOutput, YoloEngine, normalize};
use crate::input;

/// 引擎构造器
pub type EngineFactory = dyn Fn() -> Result<Box<dyn Engine>, EngineError> + Send + Sync;

/// 服务共享状态
///
/// 引擎句柄在首个请求时构建，此后整个进程生命周期内复用；
/// OnceCell 保证并发的首批请求也只构建一次。
pub struct ServiceState {
  upload_dir: PathBuf,
  factory: Arc<EngineFactory>,
  engine: OnceCell<Arc<Mutex<Box<dyn Engine>>>>,
}

impl ServiceState {
  /// 以权重文件路径创建服务状态
  ///
  /// 权重在进程启动时固定，置信度阈值逐请求传入。
  pub fn new(weights: PathBuf, upload_dir: PathBuf) -> Self {
    let factory = move || -> Result<Box<dyn Engine>, EngineError> {
      Ok(Box::new(YoloEngine::load(&weights)?) as Box<dyn Engine>)
    };
    Self::with_factory(upload_dir, Arc::new(factory))
  }

  /// 以自定义引擎构造器创建服务状态（测试注入口）
  pub fn with_factory(upload_dir: PathBuf, factory: Arc<EngineFactory>) -> Self {
    Self {
      upload_dir,
      factory,
      engine: OnceCell::new(),
    }
  }

  pub fn upload_dir(&self) -> &Path {
    &self.upload_dir
  }

  /// 获取引擎句柄，必要时在工作线程上构建
  pub async fn engine(&self) -> Result<Arc<Mutex<Box<dyn Engine>>>, EngineError> {
    let engine = self
      .engine
      .get_or_try_init(|| async {
        info!("首次请求，构建检测引擎");
        let factory = self.factory.clone();
        let engine = tokio::task::spawn_blocking(move || factory())
          .await
          .map_err(|err| EngineError::Worker(err.to_string()))??;
        Ok::<_, EngineError>(Arc::new(Mutex::new(engine)))
      })
      .await?;

    Ok(engine.clone())
  }
}

/// 在工作线程上执行一次推理并归一化结果
///
/// 图像读取与推理都不在事件循环线程上进行；
/// 任何一步失败都以 EngineError 返回，由调用方决定降级策略。
pub async fn run_detection(
  engine: Arc<Mutex<Box<dyn Engine>>>,
  image_path: PathBuf,
  confidence: f32,
  image_size: u32,
) -> Result<Vec<Detection>, EngineError> {
  let output = tokio::task::spawn_blocking(move || -> Result<EngineOutput, EngineError> {
    let image =
      input::load_image(&image_path).map_err(|err| EngineError::Inference(err.to_string()))?;
    let mut engine = engine
      .lock()
      .map_err(|err| EngineError::Worker(err.to_string()))?;
    engine.detect(&image, confidence, image_size)
  })
  .await
  .map_err(|err| EngineError::Worker(err.to_string()))??;

  Ok(normalize(&output))
}
