// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - RGB/BGR 帧定义
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

use image::RgbImage;

const RGB_CHANNELS: usize = 3;

/// RGB 顺序的 NHWC 帧，模型推理使用该帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
  image: RgbImage,
}

impl From<RgbImage> for RgbFrame {
  fn from(image: RgbImage) -> Self {
    Self { image }
  }
}

impl RgbFrame {
  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    self.image.get_pixel(x, y).0
  }

  /// 按行优先排列的 RGB 像素缓冲区
  pub fn as_image(&self) -> &RgbImage {
    &self.image
  }

  /// 生成通道顺序相反的绘制副本，几何尺寸与原帧一致
  pub fn to_bgr(&self) -> BgrFrame {
    let mut buffer = self.image.clone();
    for pixel in buffer.pixels_mut() {
      pixel.0.swap(0, 2);
    }
    BgrFrame { buffer }
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    self.image.clone()
  }
}

/// BGR 顺序的绘制帧
///
/// 内部沿用 `RgbImage` 缓冲区以便直接交给 imageproc 绘制，
/// 但每个像素的三个通道依次存放 B、G、R。
#[derive(Debug, Clone)]
pub struct BgrFrame {
  buffer: RgbImage,
}

impl BgrFrame {
  pub fn width(&self) -> u32 {
    self.buffer.width()
  }

  pub fn height(&self) -> u32 {
    self.buffer.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.buffer.dimensions()
  }

  /// 读取 (x, y) 处的 BGR 像素
  pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    self.buffer.get_pixel(x, y).0
  }

  pub(crate) fn canvas_mut(&mut self) -> &mut RgbImage {
    &mut self.buffer
  }

  /// 换回 RGB 顺序，供编码使用
  pub fn into_rgb_image(self) -> RgbImage {
    let mut buffer = self.buffer;
    for pixel in buffer.pixels_mut() {
      pixel.0.swap(0, 2);
    }
    buffer
  }
}
