// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - 检测服务主程序
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

mod args;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use shanan_serve::{
  FromUrl,
  input::ImageFetcher,
  model::{ClassNames, Yolov8Builder},
  output::Draw,
  server,
  task::DetectService,
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("监听地址: {}", args.listen);
  info!("图像获取超时: {} 秒", args.fetch_timeout_secs);

  let names = match &args.labels {
    Some(path) => ClassNames::from_file(path)?,
    None => ClassNames::coco()?,
  };

  let mut builder = Yolov8Builder::from_url(&args.model)?
    .names(names)
    .input_size(args.input_size)
    .nms_threshold(args.nms_threshold)
    .intra_threads(args.intra_threads);
  if let Some(name) = args.model_name {
    builder = builder.model_name(name);
  }
  let model = builder.build()?;
  info!("模型已就绪: {:?}", model);

  let fetcher = ImageFetcher::new(Duration::from_secs(args.fetch_timeout_secs))?
    .with_max_bytes(args.max_image_bytes);
  let draw = Draw::new()?;
  let service = Arc::new(DetectService::new(fetcher, Arc::new(model), draw));

  let listener = tokio::net::TcpListener::bind(args.listen).await?;
  server::serve(listener, server::router(service)).await?;

  info!("服务已退出");
  Ok(())
}
