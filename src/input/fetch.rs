// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/fetch.rs - 远程图像获取
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

use bytes::{Bytes, BytesMut};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 32 * 1024 * 1024;

const FETCH_SCHEMES: [&str; 2] = ["http", "https"];

#[derive(Error, Debug)]
pub enum FetchError {
  #[error("Invalid URL: {0}")]
  InvalidUrl(#[from] url::ParseError),
  #[error("Unsupported URL scheme '{0}', expected http or https")]
  UnsupportedScheme(String),
  #[error("Request timed out after {0:?}")]
  Timeout(Duration),
  #[error("Image body exceeds the {0} byte limit")]
  TooLarge(u64),
  #[error("HTTP status {0}")]
  Status(reqwest::StatusCode),
  #[error("{0}")]
  Request(reqwest::Error),
  #[error("HTTP client error: {0}")]
  Client(reqwest::Error),
}

/// 远程图像获取器，每次请求只发起一次 GET，不重试
#[derive(Debug, Clone)]
pub struct ImageFetcher {
  client: Client,
  timeout: Duration,
  max_bytes: u64,
}

impl ImageFetcher {
  pub fn new(timeout: Duration) -> Result<Self, FetchError> {
    let client = Client::builder()
      .timeout(timeout)
      .user_agent(concat!("shanan-serve/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(FetchError::Client)?;

    Ok(Self {
      client,
      timeout,
      max_bytes: DEFAULT_MAX_IMAGE_BYTES,
    })
  }

  pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
    self.max_bytes = max_bytes;
    self
  }

  /// 获取原始响应体，内容不做任何修改
  pub async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
    let url = Url::parse(url)?;
    if !FETCH_SCHEMES.contains(&url.scheme()) {
      return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
    }

    debug!("开始获取图像: {}", url);
    let mut response = self
      .client
      .get(url.clone())
      .send()
      .await
      .map_err(|e| self.classify(e))?;

    let status = response.status();
    if !status.is_success() {
      warn!("图像获取失败: {} 返回 {}", url, status);
      return Err(FetchError::Status(status));
    }

    if response
      .content_length()
      .is_some_and(|len| len > self.max_bytes)
    {
      warn!("图像过大: {}", url);
      return Err(FetchError::TooLarge(self.max_bytes));
    }

    // 未声明长度时边读边检查
    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
      if (body.len() + chunk.len()) as u64 > self.max_bytes {
        warn!("图像过大: {}", url);
        return Err(FetchError::TooLarge(self.max_bytes));
      }
      body.extend_from_slice(&chunk);
    }
    let body = body.freeze();
    debug!("图像获取完成: {} ({} 字节)", url, body.len());

    Ok(body)
  }

  fn classify(&self, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
      FetchError::Timeout(self.timeout)
    } else {
      FetchError::Request(err)
    }
  }
}
