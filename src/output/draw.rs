// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::io::Cursor;

use ab_glyph::{FontArc, InvalidFont, PxScale};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::debug;

use crate::{
  frame::BgrFrame,
  model::{DetectItem, DetectResult},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_PLATE_PADDING: i32 = 10;
const LABEL_TEXT_OFFSET: i32 = 5;
const BOX_THICKNESS: i32 = 2;
// 颜色均为 BGR 顺序
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const TEXT_COLOR: [u8; 3] = [0, 0, 0]; // 黑色

#[derive(Error, Debug)]
pub enum EncodeError {
  #[error("PNG encoding error: {0}")]
  Png(#[from] image::ImageError),
}

pub struct Draw {
  font: FontArc,
  font_scale: PxScale,
  box_color: [u8; 3],
  text_color: [u8; 3],
  thickness: i32,
}

impl Draw {
  pub fn new() -> Result<Self, InvalidFont> {
    let font_data = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data)?;

    Ok(Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      box_color: BOX_COLOR,
      text_color: TEXT_COLOR,
      thickness: BOX_THICKNESS,
    })
  }

  pub fn label(item: &DetectItem) -> String {
    format!("{} {:.2}", item.class_name, item.score)
  }

  /// 标签渲染后的宽高
  pub fn label_size(&self, label: &str) -> (u32, u32) {
    text_size(self.font_scale, &self.font, label)
  }

  /// 按模型输出顺序逐个绘制检测框和标签
  pub fn annotate(&self, frame: &mut BgrFrame, result: &DetectResult) {
    let canvas = frame.canvas_mut();
    for item in result.items.iter() {
      self.draw_bbox_with_label(canvas, item);
    }
    debug!("绘制完成: {} 个检测框", result.len());
  }

  fn draw_bbox_with_label(&self, canvas: &mut RgbImage, item: &DetectItem) {
    // 截断取整，不做四舍五入
    let x_min = item.bbox[0] as i32;
    let y_min = item.bbox[1] as i32;
    let x_max = item.bbox[2] as i32;
    let y_max = item.bbox[3] as i32;

    let width = x_max - x_min + 1;
    let height = y_max - y_min + 1;

    // 边框向内加粗
    for t in 0..self.thickness {
      let (w, h) = (width - 2 * t, height - 2 * t);
      if w <= 0 || h <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(w as u32, h as u32);
      draw_hollow_rect_mut(canvas, rect, Rgb(self.box_color));
    }

    let label = Self::label(item);
    let (text_w, text_h) = self.label_size(&label);
    if text_w == 0 || text_h == 0 {
      return;
    }

    // 底板紧贴框的上边缘；越过图像顶部时下移到图像内
    let plate_h = text_h as i32 + LABEL_PLATE_PADDING;
    let plate_y = (y_min - plate_h).max(0);
    let plate = Rect::at(x_min, plate_y).of_size(text_w, plate_h as u32);
    draw_filled_rect_mut(canvas, plate, Rgb(self.box_color));

    draw_text_mut(
      canvas,
      Rgb(self.text_color),
      x_min,
      plate_y + LABEL_TEXT_OFFSET,
      self.font_scale,
      &self.font,
      &label,
    );
  }
}

/// 编码为 PNG，输出前换回 RGB 顺序
pub fn encode_png(frame: BgrFrame) -> Result<Vec<u8>, EncodeError> {
  let image = frame.into_rgb_image();
  let mut bytes = Vec::new();
  image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
  debug!("PNG 编码完成: {} 字节", bytes.len());
  Ok(bytes)
}
