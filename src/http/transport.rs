//! 传输层
//! 把请求描述交给网络；超时等传输失败统一为 TransportError

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use url::Url;

use super::request::{
    is_absolute_url, Method, MultipartPart, RequestBody, RequestDescriptor, CONTENT_TYPE,
};
use crate::config::ApiConfig;
use crate::error::ApiError;

/// 传输层收到的响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// 解析 JSON；空体或非 JSON 时返回 Null
    pub fn json_or_null(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }

    /// 非 2xx 响应的错误消息：响应文本 > 状态描述 > "HTTP <status>"
    pub fn error_message(&self) -> String {
        let text = self.text();
        if !text.trim().is_empty() {
            return text;
        }
        reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", self.status))
    }
}

/// 传输失败（未收到响应）
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timeout: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: false,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        ApiError::Network { message: e.message }
    }
}

/// HTTP 传输抽象，便于测试替换
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError>;
}

/// 基于 reqwest 的传输实现
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    origin: Url,
}

impl ReqwestTransport {
    /// 创建传输层
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, ApiError> {
        let origin = Url::parse(origin)
            .map_err(|e| ApiError::Config(format!("invalid origin {}: {}", origin, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, origin })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(&config.origin, Duration::from_secs(config.timeout_secs))
    }

    /// 以 "/" 开头的 URL 相对 origin 解析
    fn resolve(&self, url: &str) -> Result<Url, TransportError> {
        let resolved = if is_absolute_url(url) {
            Url::parse(url)
        } else {
            self.origin.join(url)
        };
        resolved.map_err(|e| TransportError::new(format!("invalid url {}: {}", url, e)))
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    fn form(parts: &[MultipartPart]) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for part in parts {
            form = match part {
                MultipartPart::Text { name, value } => form.text(name.clone(), value.clone()),
                MultipartPart::File {
                    name,
                    file_name,
                    content_type,
                    bytes,
                } => {
                    let mut file = Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = content_type {
                        file = file
                            .mime_str(mime)
                            .map_err(|e| TransportError::new(format!("invalid mime {}: {}", mime, e)))?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError> {
        let url = self.resolve(&request.url)?;
        let mut builder = self.client.request(Self::method(request.method), url);

        let multipart = matches!(request.body, Some(RequestBody::Multipart(_)));
        for (name, value) in &request.headers {
            // multipart 边界由 reqwest 生成
            if multipart && name == CONTENT_TYPE {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.body(value.to_string()),
            Some(RequestBody::Multipart(payload)) => builder.multipart(Self::form(&payload.parts)?),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| TransportError {
            message: e.to_string(),
            timeout: e.is_timeout(),
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| TransportError {
            message: e.to_string(),
            timeout: e.is_timeout(),
        })?;

        Ok(TransportResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_body() {
        let response = TransportResponse::new(500, "database down");
        assert_eq!(response.error_message(), "database down");
    }

    #[test]
    fn test_error_message_falls_back_to_reason() {
        assert_eq!(TransportResponse::new(404, "").error_message(), "Not Found");
        assert_eq!(TransportResponse::new(599, "").error_message(), "HTTP 599");
    }

    #[test]
    fn test_json_or_null() {
        assert_eq!(TransportResponse::new(204, "").json_or_null(), serde_json::Value::Null);
        assert_eq!(
            TransportResponse::new(200, r#"{"id":1}"#).json_or_null(),
            serde_json::json!({ "id": 1 })
        );
    }

    #[test]
    fn test_resolve_relative_against_origin() {
        let transport = ReqwestTransport::new("http://127.0.0.1:8080", Duration::from_secs(5)).unwrap();
        assert_eq!(
            transport.resolve("/api/movies").unwrap().as_str(),
            "http://127.0.0.1:8080/api/movies"
        );
        assert_eq!(
            transport.resolve("https://x.example/y").unwrap().as_str(),
            "https://x.example/y"
        );
    }
}
