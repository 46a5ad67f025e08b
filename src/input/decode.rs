// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/decode.rs - 图像解码
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

use thiserror::Error;
use tracing::debug;

use crate::frame::RgbFrame;

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("Image data is empty")]
  Empty,
  #[error("Image decoding error: {0}")]
  Image(#[from] image::ImageError),
}

/// 将任意常见格式的图像字节解码为 RGB 帧
pub fn decode_image(bytes: &[u8]) -> Result<RgbFrame, DecodeError> {
  if bytes.is_empty() {
    return Err(DecodeError::Empty);
  }

  let image = image::load_from_memory(bytes)?;
  debug!(
    "图像解码完成: {}x{}, 原始颜色类型 {:?}",
    image.width(),
    image.height(),
    image.color()
  );

  Ok(RgbFrame::from(image.to_rgb8()))
}
