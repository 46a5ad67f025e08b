// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 ONNX 模型
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
use std::sync::{Mutex, MutexGuard, PoisonError};

use image::imageops::FilterType;
use ndarray::{Array, ArrayViewD, Ix3, IxDyn};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::TensorRef;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{ClassNames, DetectItem, DetectResult, LabelError, Model},
};

const YOLOV8_DEFAULT_NAME: &str = "yolov8";
const YOLOV8_INPUT_SIZE: u32 = 640;
const YOLOV8_NMS_THRESH: f32 = 0.7;
const YOLOV8_MAX_DETECTIONS: usize = 300;
const YOLOV8_INTRA_THREADS: usize = 4;
const YOLOV8_BOX_CHANNELS: usize = 4;
const LETTERBOX_FILL: f32 = 114.0 / 255.0;

#[derive(Error, Debug)]
pub enum Yolov8Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("ONNX Runtime 会话创建失败: {0}")]
  SessionError(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("标签错误: {0}")]
  LabelError(#[from] LabelError),
  #[error("推理失败: {0}")]
  InferenceError(String),
  #[error("模型输出形状无效: {0:?}")]
  OutputShape(Vec<usize>),
  #[error("模型输出 {classes} 个类别，但标签表只有 {labels} 个")]
  LabelMismatch { classes: usize, labels: usize },
}

impl From<std::io::Error> for Yolov8Error {
  fn from(err: std::io::Error) -> Self {
    Yolov8Error::ModelLoadError(err)
  }
}

impl Yolov8Error {
  fn session(e: impl std::fmt::Display) -> Self {
    Yolov8Error::SessionError(e.to_string())
  }

  fn inference(e: impl std::fmt::Display) -> Self {
    Yolov8Error::InferenceError(e.to_string())
  }
}

/// YOLOv8 检测模型
///
/// ONNX Runtime 的 `Session::run` 需要可变借用，因此会话放在互斥锁后面，
/// 并发请求在推理调用处串行执行。
pub struct Yolov8 {
  session: Mutex<Session>,
  names: ClassNames,
  model_name: String,
  input_size: u32,
  nms_threshold: f32,
}

impl std::fmt::Debug for Yolov8 {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Yolov8")
      .field("model_name", &self.model_name)
      .field("classes", &self.names.len())
      .field("input_size", &self.input_size)
      .field("nms_threshold", &self.nms_threshold)
      .finish_non_exhaustive()
  }
}

pub struct Yolov8Builder {
  model_path: PathBuf,
  names: Option<ClassNames>,
  model_name: Option<String>,
  input_size: u32,
  nms_threshold: f32,
  intra_threads: usize,
}

impl FromUrlWithScheme for Yolov8Builder {
  const SCHEME: &'static str = "yolov8";
}

impl FromUrl for Yolov8Builder {
  type Error = Yolov8Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolov8Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }
    if url.path().is_empty() {
      return Err(Yolov8Error::ModelPathError("模型路径为空".to_string()));
    }

    Ok(Self::new(url.path()))
  }
}

impl Yolov8Builder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      names: None,
      model_name: None,
      input_size: YOLOV8_INPUT_SIZE,
      nms_threshold: YOLOV8_NMS_THRESH,
      intra_threads: YOLOV8_INTRA_THREADS,
    }
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn names(mut self, names: ClassNames) -> Self {
    self.names = Some(names);
    self
  }

  pub fn model_name(mut self, name: impl Into<String>) -> Self {
    self.model_name = Some(name.into());
    self
  }

  pub fn input_size(mut self, size: u32) -> Self {
    self.input_size = size;
    self
  }

  pub fn nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = threshold;
    self
  }

  pub fn intra_threads(mut self, threads: usize) -> Self {
    self.intra_threads = threads;
    self
  }

  /// 报告中使用的模型名称，默认取模型文件名
  fn resolved_name(&self) -> String {
    self.model_name.clone().unwrap_or_else(|| {
      self
        .model_path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(YOLOV8_DEFAULT_NAME)
        .to_string()
    })
  }

  pub fn build(self) -> Result<Yolov8, Yolov8Error> {
    info!("加载模型文件: {}", self.model_path.display());
    let metadata = std::fs::metadata(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    if self.input_size == 0 || self.input_size % 32 != 0 {
      return Err(Yolov8Error::ModelPathError(format!(
        "输入尺寸必须是 32 的正整数倍, 实际为 {}",
        self.input_size
      )));
    }

    let names = match self.names.clone() {
      Some(names) => names,
      None => ClassNames::coco()?,
    };
    let model_name = self.resolved_name();

    info!("创建 ONNX Runtime 推理会话");
    let session = Session::builder()
      .map_err(Yolov8Error::session)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(Yolov8Error::session)?
      .with_intra_threads(self.intra_threads)
      .map_err(Yolov8Error::session)?
      .commit_from_file(&self.model_path)
      .map_err(|e| {
        error!("模型加载失败: {}", e);
        Yolov8Error::session(e)
      })?;

    debug!(
      "模型输入: {:?}, 输出: {:?}",
      session.inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
      session.outputs.iter().map(|o| o.name.as_str()).collect::<Vec<_>>()
    );
    info!(
      "模型加载完成: {} ({} 个类别, 输入 {}x{})",
      model_name,
      names.len(),
      self.input_size,
      self.input_size
    );

    Ok(Yolov8 {
      session: Mutex::new(session),
      names,
      model_name,
      input_size: self.input_size,
      nms_threshold: self.nms_threshold,
    })
  }
}

impl Model for Yolov8 {
  type Error = Yolov8Error;

  fn name(&self) -> &str {
    &self.model_name
  }

  fn infer(&self, input: &RgbFrame, confidence: f32) -> Result<DetectResult, Self::Error> {
    debug!("预处理输入图像 {}x{}", input.width(), input.height());
    let (tensor, letterbox) = preprocess(input, self.input_size);

    let tensor = TensorRef::from_array_view(&tensor).map_err(Yolov8Error::inference)?;

    let mut session = lock_session(&self.session);

    debug!("执行模型推理");
    let outputs = session
      .run(ort::inputs![tensor])
      .map_err(Yolov8Error::inference)?;

    let output = outputs[0]
      .try_extract_array::<f32>()
      .map_err(Yolov8Error::inference)?;

    let items = postprocess(
      output,
      &letterbox,
      confidence,
      self.nms_threshold,
      &self.names,
    )?;
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult::from(items))
  }
}

/// 会话不持有跨调用的状态，某次推理 panic 后仍可继续使用
fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
  session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 等比缩放并居中填充时的几何参数
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
  scale: f32,
  pad_x: u32,
  pad_y: u32,
  width: u32,
  height: u32,
}

impl Letterbox {
  fn new(width: u32, height: u32, size: u32) -> Self {
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);

    Self {
      scale,
      pad_x: (size - new_w) / 2,
      pad_y: (size - new_h) / 2,
      width,
      height,
    }
  }

  fn resized(&self) -> (u32, u32) {
    let new_w = ((self.width as f32 * self.scale).round() as u32).max(1);
    let new_h = ((self.height as f32 * self.scale).round() as u32).max(1);
    (new_w, new_h)
  }

  /// 模型输入坐标映射回原图坐标，并裁剪到图像范围内
  fn restore(&self, bbox: [f32; 4]) -> [f32; 4] {
    let (w, h) = (self.width as f32, self.height as f32);
    let (px, py) = (self.pad_x as f32, self.pad_y as f32);
    [
      ((bbox[0] - px) / self.scale).clamp(0.0, w),
      ((bbox[1] - py) / self.scale).clamp(0.0, h),
      ((bbox[2] - px) / self.scale).clamp(0.0, w),
      ((bbox[3] - py) / self.scale).clamp(0.0, h),
    ]
  }
}

/// 转换为 [1, 3, S, S] 的 NCHW 张量，像素归一化到 [0, 1]
fn preprocess(frame: &RgbFrame, size: u32) -> (Array<f32, IxDyn>, Letterbox) {
  let letterbox = Letterbox::new(frame.width(), frame.height(), size);
  let (new_w, new_h) = letterbox.resized();
  let resized = image::imageops::resize(
    frame.as_image(),
    new_w,
    new_h,
    FilterType::Triangle,
  );

  let size = size as usize;
  let mut input = Array::from_elem((1, 3, size, size), LETTERBOX_FILL);
  for (x, y, pixel) in resized.enumerate_pixels() {
    let xi = (x + letterbox.pad_x) as usize;
    let yi = (y + letterbox.pad_y) as usize;
    if xi >= size || yi >= size {
      continue;
    }
    for c in 0..3 {
      input[[0, c, yi, xi]] = pixel[c] as f32 / 255.0;
    }
  }

  (input.into_dyn(), letterbox)
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
  class_id: usize,
  score: f32,
  bbox: [f32; 4],
}

/// 解析 [1, 4 + C, N] 输出，置信度过滤后按类别做 NMS
fn postprocess(
  output: ArrayViewD<'_, f32>,
  letterbox: &Letterbox,
  confidence: f32,
  nms_threshold: f32,
  names: &ClassNames,
) -> Result<Vec<DetectItem>, Yolov8Error> {
  let shape = output.shape().to_vec();
  let output = output
    .into_dimensionality::<Ix3>()
    .map_err(|_| Yolov8Error::OutputShape(shape.clone()))?;

  let (batch, channels, num_boxes) = output.dim();
  if batch != 1 || channels <= YOLOV8_BOX_CHANNELS {
    return Err(Yolov8Error::OutputShape(shape));
  }

  let num_classes = channels - YOLOV8_BOX_CHANNELS;
  if num_classes > names.len() {
    return Err(Yolov8Error::LabelMismatch {
      classes: num_classes,
      labels: names.len(),
    });
  }

  let mut candidates = Vec::new();
  for i in 0..num_boxes {
    let (class_id, score) = (0..num_classes)
      .map(|c| (c, output[[0, YOLOV8_BOX_CHANNELS + c, i]]))
      .fold((0usize, f32::MIN), |best, cur| {
        if cur.1 > best.1 { cur } else { best }
      });

    if score < confidence {
      continue;
    }

    let cx = output[[0, 0, i]];
    let cy = output[[0, 1, i]];
    let w = output[[0, 2, i]];
    let h = output[[0, 3, i]];

    candidates.push(Candidate {
      class_id,
      score,
      bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
    });
  }
  debug!("置信度过滤后剩余 {} 个候选框", candidates.len());

  let kept = non_max_suppression(candidates, nms_threshold, YOLOV8_MAX_DETECTIONS);

  Ok(
    kept
      .into_iter()
      .map(|c| DetectItem {
        class_id: c.class_id as u32,
        class_name: names
          .get(c.class_id as u32)
          .unwrap_or_default()
          .to_string(),
        score: c.score.clamp(0.0, 1.0),
        bbox: letterbox.restore(c.bbox),
      })
      .collect(),
  )
}

/// 按置信度降序的贪心 NMS，只抑制同类别的重叠框
fn non_max_suppression(
  mut candidates: Vec<Candidate>,
  iou_threshold: f32,
  max_detections: usize,
) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut keep: Vec<Candidate> = Vec::new();
  for candidate in candidates {
    if keep.len() >= max_detections {
      break;
    }
    let suppressed = keep
      .iter()
      .any(|k| k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold);
    if !suppressed {
      keep.push(candidate);
    }
  }
  keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
  let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
  let inter = ix * iy;
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - inter;
  if union <= 0.0 { 0.0 } else { inter / union }
}
