// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/api/test_detect_json.rs - JSON 检测接口测试
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

use axum::http::StatusCode;
use serde_json::json;

use shanan_serve::output::DetectionReport;
use shanan_serve::server::HealthStatus;

use super::common::{MockModel, app, body_bytes, body_json, get_path, post_json, spawn_image_server};

async fn report_for(body: serde_json::Value) -> DetectionReport {
  let response = post_json(app(MockModel::scene()), "/detect/json", body).await;
  assert_eq!(response.status(), StatusCode::OK);
  serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_health_reports_model() {
  let response = get_path(app(MockModel::scene()), "/health").await;
  assert_eq!(response.status(), StatusCode::OK);

  let health: HealthStatus = serde_json::from_slice(&body_bytes(response).await).unwrap();
  assert_eq!(health.status, "ok");
  assert_eq!(health.model, "mock-yolov8");
}

#[tokio::test]
async fn test_report_with_default_confidence() {
  let base = spawn_image_server().await;
  let url = format!("{}/scene.png", base);

  let report = report_for(json!({ "image": url })).await;

  assert_eq!(report.image_url, url);
  assert_eq!(report.model, "mock-yolov8");
  assert!(report.inference_time_ms >= 0.0);
  assert_eq!(report.detections.len(), 2);
  assert!(report.detections.iter().all(|d| d.confidence >= 0.8));
  assert_eq!(report.classes_detected, vec!["dog", "person"]);
  assert_eq!(report.count_by_class.get("dog"), Some(&1));
  assert_eq!(report.count_by_class.get("person"), Some(&1));
}

#[tokio::test]
async fn test_report_rounding_and_order() {
  let base = spawn_image_server().await;
  let report = report_for(json!({ "image": format!("{}/scene.png", base) })).await;

  let dog = &report.detections[0];
  assert_eq!(dog.class_name, "dog");
  assert_eq!(dog.class_id, 16);
  assert_eq!(dog.bbox.x1, 20.4);
  assert_eq!(dog.bbox.y2, 200.2);

  let person = &report.detections[1];
  assert_eq!(person.class_name, "person");
  assert_eq!(person.confidence, 0.8812);
}

#[tokio::test]
async fn test_report_lower_confidence_includes_more() {
  let base = spawn_image_server().await;
  let report = report_for(json!({ "image": format!("{}/scene.png", base), "conf": 0.4 })).await;

  assert_eq!(report.detections.len(), 3);
  assert_eq!(report.classes_detected, vec!["cat", "dog", "person"]);

  let keys: Vec<&String> = report.count_by_class.keys().collect();
  let classes: Vec<&String> = report.classes_detected.iter().collect();
  assert_eq!(keys, classes);
}

#[tokio::test]
async fn test_report_without_detections() {
  let base = spawn_image_server().await;
  let response = post_json(
    app(MockModel::scene()),
    "/detect/json",
    json!({ "image": format!("{}/scene.png", base), "conf": 0.99 }),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);

  let json = body_json(response).await;
  assert_eq!(json["detections"], json!([]));
  assert_eq!(json["classes_detected"], json!([]));
  assert_eq!(json["count_by_class"], json!({}));
}

#[tokio::test]
async fn test_identical_requests_give_identical_reports() {
  let base = spawn_image_server().await;
  let body = json!({ "image": format!("{}/scene.png", base), "conf": 0.5 });

  let mut first = report_for(body.clone()).await;
  let mut second = report_for(body).await;
  first.inference_time_ms = 0.0;
  second.inference_time_ms = 0.0;

  assert_eq!(first, second);
}
