// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use url::Url;

use shanan_serve::input::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_IMAGE_BYTES};

/// Shanan 检测服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// YOLOv8 ONNX 模型路径，例如 yolov8:///models/yolov8n.onnx
  #[arg(long, env = "SHANAN_MODEL", value_name = "MODEL")]
  pub model: Url,

  /// 类别标签文件（TOML），缺省使用内置 COCO 标签
  #[arg(long, env = "SHANAN_LABELS", value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 报告中的模型名称，缺省取模型文件名
  #[arg(long, env = "SHANAN_MODEL_NAME", value_name = "NAME")]
  pub model_name: Option<String>,

  /// 监听地址
  #[arg(long, env = "SHANAN_LISTEN", default_value = "0.0.0.0:8000", value_name = "ADDR")]
  pub listen: SocketAddr,

  /// 远程图像获取超时（秒）
  #[arg(long, env = "SHANAN_FETCH_TIMEOUT_SECS", default_value_t = DEFAULT_FETCH_TIMEOUT.as_secs(), value_name = "SECONDS")]
  pub fetch_timeout_secs: u64,

  /// 远程图像最大字节数
  #[arg(long, env = "SHANAN_MAX_IMAGE_BYTES", default_value_t = DEFAULT_MAX_IMAGE_BYTES, value_name = "BYTES")]
  pub max_image_bytes: u64,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, env = "SHANAN_NMS_THRESHOLD", default_value = "0.7", value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 模型输入尺寸（32 的倍数）
  #[arg(long, env = "SHANAN_INPUT_SIZE", default_value = "640", value_name = "PIXELS")]
  pub input_size: u32,

  /// ONNX Runtime 线程数
  #[arg(long, env = "SHANAN_INTRA_THREADS", default_value = "4", value_name = "COUNT")]
  pub intra_threads: usize,
}
