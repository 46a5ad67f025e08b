// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/labels.rs - 类别索引表
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

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

const COCO_LABELS: &str = include_str!("../../labels/coco.toml");

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("标签文件读取错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("标签文件格式错误: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("标签文件为空")]
  Empty,
}

#[derive(Deserialize)]
struct LabelFile {
  names: Vec<String>,
}

/// 类别索引到类别名称的映射
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames {
  names: Box<[String]>,
}

impl ClassNames {
  /// 内置的 COCO 80 类标签
  pub fn coco() -> Result<Self, LabelError> {
    Self::parse(COCO_LABELS)
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    Self::parse(&content)
  }

  pub fn parse(content: &str) -> Result<Self, LabelError> {
    let file: LabelFile = toml::from_str(content)?;
    if file.names.is_empty() {
      return Err(LabelError::Empty);
    }
    Ok(Self {
      names: file.names.into_boxed_slice(),
    })
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, class_id: u32) -> Option<&str> {
    self.names.get(class_id as usize).map(String::as_str)
  }
}

impl From<Vec<String>> for ClassNames {
  fn from(names: Vec<String>) -> Self {
    Self {
      names: names.into_boxed_slice(),
    }
  }
}
