// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 检测任务流水线
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

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  frame::RgbFrame,
  input::{DecodeError, FetchError, ImageFetcher, decode_image},
  model::{DetectResult, Model},
  output::{DetectionReport, Draw, EncodeError, encode_png},
};

pub const DEFAULT_CONFIDENCE: f32 = 0.8;

fn default_confidence() -> f32 {
  DEFAULT_CONFIDENCE
}

/// 检测请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectRequest {
  pub image: String,
  #[serde(default = "default_confidence")]
  pub conf: f32,
}

impl DetectRequest {
  pub fn new(image: impl Into<String>) -> Self {
    Self {
      image: image.into(),
      conf: DEFAULT_CONFIDENCE,
    }
  }

  pub fn with_confidence(mut self, conf: f32) -> Self {
    self.conf = conf;
    self
  }

  pub fn validate(&self) -> Result<(), DetectError> {
    if self.conf.is_finite() && self.conf > 0.0 && self.conf <= 1.0 {
      Ok(())
    } else {
      Err(DetectError::InvalidConfidence(self.conf))
    }
  }
}

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("conf must be a number in (0, 1], got {0}")]
  InvalidConfidence(f32),
  #[error("{source}")]
  Fetch {
    url: String,
    #[source]
    source: FetchError,
  },
  #[error("Could not decode image: {0}")]
  Decode(#[from] DecodeError),
  #[error("Inference failed: {0}")]
  Inference(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("Could not encode image: {0}")]
  Encode(#[from] EncodeError),
  #[error("Worker task failed: {0}")]
  Worker(#[from] tokio::task::JoinError),
}

impl DetectError {
  fn inference(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    DetectError::Inference(Box::new(err))
  }
}

/// 调用一次模型，计时只覆盖模型调用本身，单位毫秒
pub fn infer_timed<M: Model + ?Sized>(
  model: &M,
  frame: &RgbFrame,
  confidence: f32,
) -> Result<(DetectResult, f64), M::Error> {
  let now = Instant::now();
  let result = model.infer(frame, confidence)?;
  let elapsed = now.elapsed();
  info!("推理完成，耗时: {:.2?}，检测到 {} 个目标", elapsed, result.len());
  Ok((result, elapsed.as_secs_f64() * 1000.0))
}

/// 单次检测任务：在已解码的图像上执行推理并产生结果
pub trait Task<M: Model>: Sized {
  type Output;
  fn run_task(self, frame: RgbFrame, model: &M, request: &DetectRequest)
  -> Result<Self::Output, DetectError>;
}

/// 生成结构化检测报告
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportTask;

impl<M: Model> Task<M> for ReportTask {
  type Output = DetectionReport;

  fn run_task(
    self,
    frame: RgbFrame,
    model: &M,
    request: &DetectRequest,
  ) -> Result<Self::Output, DetectError> {
    let (result, elapsed_ms) =
      infer_timed(model, &frame, request.conf).map_err(DetectError::inference)?;
    Ok(DetectionReport::new(
      request.image.as_str(),
      model.name(),
      elapsed_ms,
      &result,
    ))
  }
}

/// 标注后的 PNG 图像
#[derive(Debug, Clone)]
pub struct AnnotatedImage {
  pub png: Vec<u8>,
  pub inference_time_ms: f64,
  pub detections: usize,
}

/// 在推理所用的同一帧上绘制检测框并编码为 PNG
#[derive(Clone)]
pub struct AnnotateTask {
  draw: Arc<Draw>,
}

impl AnnotateTask {
  pub fn new(draw: Arc<Draw>) -> Self {
    Self { draw }
  }
}

impl<M: Model> Task<M> for AnnotateTask {
  type Output = AnnotatedImage;

  fn run_task(
    self,
    frame: RgbFrame,
    model: &M,
    request: &DetectRequest,
  ) -> Result<Self::Output, DetectError> {
    let (result, elapsed_ms) =
      infer_timed(model, &frame, request.conf).map_err(DetectError::inference)?;

    let mut canvas = frame.to_bgr();
    self.draw.annotate(&mut canvas, &result);
    let png = encode_png(canvas)?;

    Ok(AnnotatedImage {
      png,
      inference_time_ms: elapsed_ms,
      detections: result.len(),
    })
  }
}

/// 检测服务：获取远程图像，在阻塞线程上完成解码、推理与输出
pub struct DetectService<M> {
  fetcher: ImageFetcher,
  model: Arc<M>,
  draw: Arc<Draw>,
}

impl<M: Model + 'static> DetectService<M> {
  pub fn new(fetcher: ImageFetcher, model: Arc<M>, draw: Draw) -> Self {
    Self {
      fetcher,
      model,
      draw: Arc::new(draw),
    }
  }

  pub fn model_name(&self) -> &str {
    self.model.name()
  }

  pub async fn report(&self, request: &DetectRequest) -> Result<DetectionReport, DetectError> {
    self.run(request, ReportTask).await
  }

  pub async fn annotate(&self, request: &DetectRequest) -> Result<AnnotatedImage, DetectError> {
    self
      .run(request, AnnotateTask::new(Arc::clone(&self.draw)))
      .await
  }

  pub async fn run<T>(&self, request: &DetectRequest, task: T) -> Result<T::Output, DetectError>
  where
    T: Task<M> + Send + 'static,
    T::Output: Send + 'static,
  {
    request.validate()?;

    info!("开始任务: {}", request.image);
    let bytes = self.fetcher.fetch(&request.image).await.map_err(|source| {
      warn!("图像获取失败: {}: {}", request.image, source);
      DetectError::Fetch {
        url: request.image.clone(),
        source,
      }
    })?;

    let model = Arc::clone(&self.model);
    let request = request.clone();
    tokio::task::spawn_blocking(move || -> Result<T::Output, DetectError> {
      let frame = decode_image(&bytes)?;
      task.run_task(frame, model.as_ref(), &request)
    })
    .await?
  }
}
