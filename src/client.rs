//! 对外调用入口
//! get / post / put / del 均经过执行器，统一继承 401 刷新重试行为

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::auth::{
    CredentialStore, FileStorage, MemoryStorage, StorageBackend, UnauthorizedEvent,
    UnauthorizedNotifier,
};
use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::http::request::with_query;
use crate::http::{
    HttpTransport, Method, RequestBody, RequestBuilder, RequestExecutor,
    RequestOptions, ReqwestTransport,
};

/// API 客户端
#[derive(Clone)]
pub struct ApiClient {
    executor: Arc<RequestExecutor>,
}

impl ApiClient {
    pub fn new(executor: RequestExecutor) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }

    /// 由已有组件组装（测试中注入假传输层与内存存储）
    pub fn with_parts(
        transport: Arc<dyn HttpTransport>,
        store: Arc<CredentialStore>,
        notifier: Arc<UnauthorizedNotifier>,
        config: &ClientConfig,
    ) -> Self {
        let builder = RequestBuilder::new(config.api.base_url.clone());
        Self::new(RequestExecutor::new(
            transport,
            store,
            notifier,
            builder,
            &config.api.refresh_path,
        ))
    }

    /// 按配置创建 reqwest 传输层与存储后端
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::from_config(&config.api)?);

        let backend: Arc<dyn StorageBackend> = match config.storage.backend.to_lowercase().as_str() {
            "memory" => Arc::new(MemoryStorage::new()),
            "file" => Arc::new(FileStorage::open(&config.storage.path)?),
            other => {
                return Err(ApiError::Config(format!("unknown storage backend: {}", other)));
            }
        };

        tracing::debug!(
            base_url = %config.api.base_url,
            storage = %config.storage.backend,
            "API client initialized"
        );

        Ok(Self::with_parts(
            transport,
            Arc::new(CredentialStore::new(backend)),
            Arc::new(UnauthorizedNotifier::default()),
            config,
        ))
    }

    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Value> {
        self.executor.send(path, options).await
    }

    /// GET，params 序列化为查询字符串
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.request(&with_query(path, params), RequestOptions::new(Method::Get))
            .await
    }

    /// GET 并反序列化为调用方类型
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let value = self.get(path, params).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn post(&self, path: &str, body: impl Into<RequestBody>) -> Result<Value> {
        self.request(path, with_body(Method::Post, body.into())).await
    }

    pub async fn put(&self, path: &str, body: impl Into<RequestBody>) -> Result<Value> {
        self.request(path, with_body(Method::Put, body.into())).await
    }

    pub async fn del(&self, path: &str) -> Result<Value> {
        self.request(path, RequestOptions::new(Method::Delete)).await
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        self.executor.store()
    }

    pub fn notifier(&self) -> &Arc<UnauthorizedNotifier> {
        self.executor.notifier()
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// 订阅未授权信号
    pub fn subscribe_unauthorized(&self) -> broadcast::Receiver<UnauthorizedEvent> {
        self.notifier().subscribe()
    }
}

fn with_body(method: Method, body: RequestBody) -> RequestOptions {
    let mut options = RequestOptions::new(method);
    options.body = Some(body);
    options
}
