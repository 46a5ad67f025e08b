// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/api/test_inference_timing.rs - 推理计时范围测试
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

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use shanan_serve::output::DetectionReport;
use shanan_serve::server::INFERENCE_TIME_HEADER;

use super::common::{REMOTE_DELAY, SleepyModel, app, body_bytes, post_json, spawn_image_server};

const MODEL_DELAY: Duration = Duration::from_millis(50);

fn sleepy() -> SleepyModel {
  SleepyModel { delay: MODEL_DELAY }
}

/// 计时只覆盖模型调用，不包括远程获取的 300 ms
fn assert_model_span(elapsed_ms: f64) {
  let model_ms = MODEL_DELAY.as_secs_f64() * 1000.0;
  let remote_ms = REMOTE_DELAY.as_secs_f64() * 1000.0;
  assert!(
    elapsed_ms >= model_ms && elapsed_ms < remote_ms,
    "inference time {} ms outside [{}, {})",
    elapsed_ms,
    model_ms,
    remote_ms
  );
}

#[tokio::test]
async fn test_report_time_excludes_fetch() {
  let base = spawn_image_server().await;
  let response = post_json(
    app(sleepy()),
    "/detect/json",
    json!({ "image": format!("{}/delayed.png", base) }),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);

  let report: DetectionReport = serde_json::from_slice(&body_bytes(response).await).unwrap();
  assert_model_span(report.inference_time_ms);
}

#[tokio::test]
async fn test_image_header_time_excludes_fetch() {
  let base = spawn_image_server().await;
  let response = post_json(
    app(sleepy()),
    "/detect/image",
    json!({ "image": format!("{}/delayed.png", base) }),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);

  let elapsed: f64 = response.headers()[INFERENCE_TIME_HEADER]
    .to_str()
    .unwrap()
    .parse()
    .unwrap();
  assert_model_span(elapsed);
}
