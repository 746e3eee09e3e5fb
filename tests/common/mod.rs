//! 测试公共模块
//! 提供可编排的假传输层和客户端构造辅助函数

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use console_http::{
    auth::{CredentialStore, UnauthorizedNotifier},
    config::ClientConfig,
    http::{HttpTransport, RequestDescriptor, TransportError, TransportResponse},
    ApiClient,
};

pub const REFRESH_URL: &str = "/api/auth/refresh";
pub const LOGIN_URL: &str = "/api/auth";
pub const LOGOUT_URL: &str = "/api/auth/logout";

type Handler =
    Box<dyn Fn(&RequestDescriptor) -> Result<TransportResponse, TransportError> + Send + Sync>;

/// 假传输层：记录所有请求，由闭包决定响应
pub struct MockTransport {
    handler: Handler,
    delay: Duration,
    refresh_delay: Duration,
    url_delays: Vec<(String, Duration)>,
    requests: Mutex<Vec<RequestDescriptor>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RequestDescriptor) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delay: Duration::ZERO,
            refresh_delay: Duration::ZERO,
            url_delays: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 每个普通请求的响应延迟
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 刷新请求的响应延迟
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// 指定 URL 的响应延迟（优先于其他延迟）
    pub fn with_url_delay(mut self, url: &str, delay: Duration) -> Self {
        self.url_delays.push((url.to_string(), delay));
        self
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, url: &str) -> Vec<RequestDescriptor> {
        self.requests()
            .into_iter()
            .filter(|r| r.url == url)
            .collect()
    }

    pub fn refresh_calls(&self) -> usize {
        self.requests_to(REFRESH_URL).len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        let delay = if let Some((_, delay)) = self.url_delays.iter().find(|(url, _)| *url == request.url) {
            *delay
        } else if request.url == REFRESH_URL {
            self.refresh_delay
        } else {
            self.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        (self.handler)(request)
    }
}

pub fn json(status: u16, body: serde_json::Value) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse::new(status, body.to_string()))
}

pub fn status(status: u16) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse::new(status, Vec::new()))
}

/// 模拟后端：只接受 `valid` 令牌；刷新端点返回 `renewed`
pub fn token_backend(
    valid: &'static str,
    renewed: &'static str,
) -> impl Fn(&RequestDescriptor) -> Result<TransportResponse, TransportError> + Send + Sync + 'static {
    move |request| {
        if request.url == REFRESH_URL {
            return json(200, serde_json::json!({ "token": renewed }));
        }
        if request.bearer_token() == Some(valid) {
            json(200, serde_json::json!({ "url": request.url }))
        } else {
            status(401)
        }
    }
}

/// 测试会话：客户端与其各组件
pub struct TestSession {
    pub client: ApiClient,
    pub transport: Arc<MockTransport>,
    pub store: Arc<CredentialStore>,
    pub notifier: Arc<UnauthorizedNotifier>,
}

/// 以默认配置（base_url = /api）构造客户端
pub fn session(transport: MockTransport) -> TestSession {
    let transport = Arc::new(transport);
    let store = Arc::new(CredentialStore::in_memory());
    let notifier = Arc::new(UnauthorizedNotifier::default());

    let client = ApiClient::with_parts(
        transport.clone(),
        store.clone(),
        notifier.clone(),
        &ClientConfig::default(),
    );

    TestSession {
        client,
        transport,
        store,
        notifier,
    }
}
