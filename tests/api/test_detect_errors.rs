// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/api/test_detect_errors.rs - 错误路径测试
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

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use serde_json::json;
use tower::ServiceExt;

use super::common::{
  MockModel, PanicModel, app, body_json, post_json, spawn_image_server, unreachable_url,
};

const ENDPOINTS: [&str; 2] = ["/detect/json", "/detect/image"];

#[tokio::test]
async fn test_unreachable_url_returns_fetch_error() {
  let url = unreachable_url();
  for endpoint in ENDPOINTS {
    let response = post_json(app(MockModel::scene()), endpoint, json!({ "image": url })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "failed_to_fetch_image");
    assert_eq!(body["image_url"], url.as_str());
    assert!(!body["message"].as_str().unwrap().is_empty());
  }
}

#[tokio::test]
async fn test_image_url_is_echoed_verbatim() {
  // 不可解析的地址也原样返回
  let url = "not a url at all";
  let response = post_json(app(MockModel::scene()), "/detect/json", json!({ "image": url })).await;
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  assert_eq!(body_json(response).await["image_url"], url);
}

#[tokio::test]
async fn test_remote_not_found_returns_fetch_error() {
  let base = spawn_image_server().await;
  let url = format!("{}/missing.png", base);
  let response = post_json(app(MockModel::scene()), "/detect/json", json!({ "image": url })).await;
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);

  let body = body_json(response).await;
  assert_eq!(body["error"], "failed_to_fetch_image");
  assert!(body["message"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn test_slow_remote_times_out() {
  let base = spawn_image_server().await;
  let url = format!("{}/slow.png", base);
  let response = post_json(app(MockModel::scene()), "/detect/json", json!({ "image": url })).await;
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);

  let body = body_json(response).await;
  assert_eq!(body["error"], "failed_to_fetch_image");
  assert!(body["message"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_undecodable_image_is_reported() {
  let base = spawn_image_server().await;
  let url = format!("{}/garbage.bin", base);
  for endpoint in ENDPOINTS {
    let response = post_json(app(MockModel::scene()), endpoint, json!({ "image": url })).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "failed_to_decode_image");
  }
}

#[tokio::test]
async fn test_invalid_confidence_is_rejected() {
  for conf in [0.0, -1.0, 1.5] {
    let response = post_json(
      app(MockModel::scene()),
      "/detect/json",
      json!({ "image": "http://127.0.0.1:1/x.png", "conf": conf }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_request");
  }
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
  let response = post_json(app(MockModel::scene()), "/detect/json", json!({ "conf": 0.5 })).await;
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  assert_eq!(body_json(response).await["error"], "invalid_request");

  let response = app(MockModel::scene())
    .oneshot(
      Request::builder()
        .method("POST")
        .uri("/detect/image")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  assert_eq!(body_json(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_model_panic_becomes_internal_error() {
  let base = spawn_image_server().await;
  let response = post_json(
    app(PanicModel),
    "/detect/json",
    json!({ "image": format!("{}/scene.png", base) }),
  )
  .await;
  assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

  let body = body_json(response).await;
  assert_eq!(body["error"], "internal_error");
  assert!(!body["message"].as_str().unwrap().contains("exploded"));
}
