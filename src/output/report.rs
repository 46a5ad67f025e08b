// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/report.rs - 结构化检测报告
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

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{DetectItem, DetectResult};

const CONFIDENCE_DECIMALS: i32 = 4;
const BBOX_DECIMALS: i32 = 2;
const TIME_DECIMALS: i32 = 2;

pub fn round_to(value: f64, decimals: i32) -> f64 {
  let factor = 10f64.powi(decimals);
  (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBox {
  pub x1: f64,
  pub y1: f64,
  pub x2: f64,
  pub y2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
  pub class_id: u32,
  pub class_name: String,
  pub confidence: f64,
  pub bbox: BBox,
}

impl From<&DetectItem> for DetectionRecord {
  fn from(item: &DetectItem) -> Self {
    let [x1, y1, x2, y2] = item.bbox.map(|v| round_to(v as f64, BBOX_DECIMALS));
    Self {
      class_id: item.class_id,
      class_name: item.class_name.clone(),
      confidence: round_to(item.score as f64, CONFIDENCE_DECIMALS),
      bbox: BBox { x1, y1, x2, y2 },
    }
  }
}

/// 检测结果的聚合视图
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
  pub detections: Vec<DetectionRecord>,
  pub classes_detected: Vec<String>,
  pub count_by_class: BTreeMap<String, usize>,
}

/// 保持模型输出顺序，类别集合按字典序排列
pub fn aggregate(result: &DetectResult) -> Aggregate {
  let mut detections = Vec::with_capacity(result.len());
  let mut classes = BTreeSet::new();
  let mut count_by_class = BTreeMap::new();

  for item in result.items.iter() {
    detections.push(DetectionRecord::from(item));
    classes.insert(item.class_name.clone());
    *count_by_class.entry(item.class_name.clone()).or_insert(0) += 1;
  }

  Aggregate {
    detections,
    classes_detected: classes.into_iter().collect(),
    count_by_class,
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
  pub image_url: String,
  pub model: String,
  pub inference_time_ms: f64,
  pub detections: Vec<DetectionRecord>,
  pub classes_detected: Vec<String>,
  pub count_by_class: BTreeMap<String, usize>,
}

impl DetectionReport {
  pub fn new(
    image_url: impl Into<String>,
    model: impl Into<String>,
    inference_time_ms: f64,
    result: &DetectResult,
  ) -> Self {
    let Aggregate {
      detections,
      classes_detected,
      count_by_class,
    } = aggregate(result);

    Self {
      image_url: image_url.into(),
      model: model.into(),
      inference_time_ms: round_to(inference_time_ms.max(0.0), TIME_DECIMALS),
      detections,
      classes_detected,
      count_by_class,
    }
  }
}
