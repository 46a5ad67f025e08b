// 该文件是 Shanan （山南西风） 项目的一部分。
// src/server.rs - HTTP 服务
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

use std::any::Any;
use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{State, rejection::JsonRejection},
  http::{HeaderName, HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
  routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
  model::Model,
  output::DetectionReport,
  task::{DetectError, DetectRequest, DetectService},
};

pub const INFERENCE_TIME_HEADER: &str = "x-inference-time-ms";

/// 错误响应体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
  pub error: String,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
  status: StatusCode,
  body: ErrorBody,
}

impl ApiError {
  pub fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
    Self {
      status,
      body: ErrorBody {
        error: error.to_string(),
        message: message.into(),
        image_url: None,
      },
    }
  }

  pub fn invalid_request(message: impl Into<String>) -> Self {
    Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
  }

  /// 不携带内部细节的通用错误
  pub fn internal() -> Self {
    Self::new(
      StatusCode::INTERNAL_SERVER_ERROR,
      "internal_error",
      "Internal server error",
    )
  }

  pub fn status(&self) -> StatusCode {
    self.status
  }

  pub fn body(&self) -> &ErrorBody {
    &self.body
  }
}

impl From<DetectError> for ApiError {
  fn from(err: DetectError) -> Self {
    let message = err.to_string();
    match err {
      DetectError::InvalidConfidence(_) => Self::invalid_request(message),
      DetectError::Fetch { url, .. } => {
        let mut api = Self::new(StatusCode::BAD_REQUEST, "failed_to_fetch_image", message);
        api.body.image_url = Some(url);
        api
      }
      DetectError::Decode(_) => {
        warn!("图像解码失败: {}", message);
        Self::new(
          StatusCode::INTERNAL_SERVER_ERROR,
          "failed_to_decode_image",
          message,
        )
      }
      DetectError::Inference(_) => {
        error!("推理失败: {}", message);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "inference_failed", message)
      }
      DetectError::Encode(_) => {
        error!("PNG 编码失败: {}", message);
        Self::new(
          StatusCode::INTERNAL_SERVER_ERROR,
          "failed_to_encode_image",
          message,
        )
      }
      DetectError::Worker(_) => {
        error!("工作线程失败: {}", message);
        Self::internal()
      }
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::invalid_request(rejection.body_text())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status, Json(self.body)).into_response()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
  pub status: String,
  pub model: String,
}

pub fn router<M: Model + 'static>(service: Arc<DetectService<M>>) -> Router {
  Router::new()
    .route("/health", get(health_handler::<M>))
    .route("/detect/json", post(detect_json_handler::<M>))
    .route("/detect/image", post(detect_image_handler::<M>))
    .layer(CatchPanicLayer::custom(panic_response))
    .layer(TraceLayer::new_for_http())
    .with_state(service)
}

/// 启动服务，收到 Ctrl-C 后等待进行中的请求完成再退出
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
  if let Ok(addr) = listener.local_addr() {
    info!("HTTP 服务监听: {}", addr);
  }
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => info!("收到中断信号，准备退出..."),
    Err(e) => {
      error!("无法监听中断信号: {}", e);
      std::future::pending::<()>().await;
    }
  }
}

fn panic_response(_: Box<dyn Any + Send + 'static>) -> Response {
  error!("请求处理过程中发生 panic");
  ApiError::internal().into_response()
}

async fn health_handler<M: Model + 'static>(
  State(service): State<Arc<DetectService<M>>>,
) -> Json<HealthStatus> {
  Json(HealthStatus {
    status: "ok".to_string(),
    model: service.model_name().to_string(),
  })
}

async fn detect_json_handler<M: Model + 'static>(
  State(service): State<Arc<DetectService<M>>>,
  payload: Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Json<DetectionReport>, ApiError> {
  let Json(request) = payload?;
  let report = service.report(&request).await?;
  Ok(Json(report))
}

async fn detect_image_handler<M: Model + 'static>(
  State(service): State<Arc<DetectService<M>>>,
  payload: Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
  let Json(request) = payload?;
  let image = service.annotate(&request).await?;

  let elapsed = HeaderValue::from_str(&format!("{:.2}", image.inference_time_ms))
    .map_err(|_| ApiError::internal())?;
  let headers = [
    (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
    (HeaderName::from_static(INFERENCE_TIME_HEADER), elapsed),
  ];

  Ok((headers, image.png).into_response())
}
