//! 请求执行器
//! 构造 → 发送 → 401 时刷新 → 以新令牌重试一次 → 成功或会话失效

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use super::request::{BearerSource, RequestBuilder, RequestDescriptor, RequestOptions, REQUEST_ID};
use super::transport::{HttpTransport, TransportResponse};
use crate::auth::{CredentialStore, RefreshCoordinator, UnauthorizedNotifier};
use crate::error::{ApiError, Result};

const UNAUTHORIZED: u16 = 401;

/// 会话失效的触发原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureTrigger {
    /// 收到 401 但没有刷新令牌
    NoRefreshToken,
    /// 某次刷新尝试失败
    RefreshFailed { attempt: u64 },
    /// 刷新后的重试仍然 401
    RetryRejected,
}

/// 请求执行器
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    store: Arc<CredentialStore>,
    builder: RequestBuilder,
    refresh: RefreshCoordinator,
    notifier: Arc<UnauthorizedNotifier>,
    /// 已通知过的会话标记（令牌代次 + 1）
    notified_session: AtomicU64,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<CredentialStore>,
        notifier: Arc<UnauthorizedNotifier>,
        builder: RequestBuilder,
        refresh_path: &str,
    ) -> Self {
        let refresh = RefreshCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            builder.clone(),
            refresh_path,
        );

        Self {
            transport,
            store,
            builder,
            refresh,
            notifier,
            notified_session: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<UnauthorizedNotifier> {
        &self.notifier
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    pub fn builder(&self) -> &RequestBuilder {
        &self.builder
    }

    /// 执行一次逻辑调用，2xx 时返回解析后的响应体（空体或非 JSON 为 Null）
    pub async fn send(&self, path: &str, options: RequestOptions) -> Result<Value> {
        let request_id = Uuid::new_v4();
        let method = options.method;
        let span = tracing::info_span!(
            "api_request",
            request_id = %request_id,
            method = %method,
            path = %path,
        );

        async move {
            let start = Instant::now();
            let result = self.execute(path, &options, request_id).await;
            let elapsed = start.elapsed();

            let outcome = match &result {
                Ok(_) => "success",
                Err(ApiError::Unauthorized) => "unauthorized",
                Err(ApiError::Network { .. }) => "network_error",
                Err(_) => "http_error",
            };
            metrics::counter!("api_requests_total", "method" => method.as_str(), "outcome" => outcome)
                .increment(1);
            metrics::histogram!("api_request_duration_seconds").record(elapsed.as_secs_f64());

            debug!(outcome, elapsed_ms = elapsed.as_millis() as u64, "Request completed");
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, path: &str, options: &RequestOptions, request_id: Uuid) -> Result<Value> {
        // Sending
        let seen = match options.bearer {
            BearerSource::Stored => Some(self.store.snapshot()),
            _ => None,
        };
        let token = match &options.bearer {
            BearerSource::Stored => seen.as_ref().and_then(|s| s.access_token.clone()),
            BearerSource::Explicit(token) => Some(token.clone()),
            BearerSource::Anonymous => None,
        };
        let request = self.prepare(path, options, token.as_deref(), request_id);
        let response = self.transport.send(&request).await?;

        if response.status != UNAUTHORIZED || !recovers(options) {
            return complete(response);
        }

        // Unauthorized
        if self.store.refresh_token().is_none() {
            return Err(self.fail_session(FailureTrigger::NoRefreshToken));
        }

        // Refreshing（显式令牌被拒时不做快捷判断，直接刷新）
        let token = match self.refresh.refresh(seen.as_ref()).await {
            Ok(token) => token,
            Err(failure) => {
                return Err(self.fail_session(FailureTrigger::RefreshFailed {
                    attempt: failure.attempt,
                }))
            }
        };

        // Retrying（只重试一次，再次 401 不再刷新）
        debug!(url = %request.url, "Retrying with renewed access token");
        let response = self.transport.send(&request.with_bearer(&token)).await?;
        if response.status == UNAUTHORIZED {
            return Err(self.fail_session(FailureTrigger::RetryRejected));
        }

        complete(response)
    }

    fn prepare(
        &self,
        path: &str,
        options: &RequestOptions,
        token: Option<&str>,
        request_id: Uuid,
    ) -> RequestDescriptor {
        let mut request = self.builder.build(path, options, token);
        request
            .headers
            .entry(REQUEST_ID.to_string())
            .or_insert_with(|| request_id.to_string());
        request
    }

    /// 清除凭证并广播未授权信号
    ///
    /// 同一代令牌只广播一次：并发失败或在清除之后才到达的 401 不再重复通知，
    /// 重新登录写入新令牌后才会再次通知。
    fn fail_session(&self, trigger: FailureTrigger) -> ApiError {
        let session = self.store.generation() + 1;
        self.store.clear_all();

        let notify = self.notified_session.fetch_max(session, Ordering::SeqCst) < session;

        let attempt = match trigger {
            FailureTrigger::RefreshFailed { attempt } => Some(attempt),
            FailureTrigger::NoRefreshToken | FailureTrigger::RetryRejected => None,
        };
        warn!(trigger = ?trigger, attempt, notify, "Session invalidated, credentials cleared");
        if notify {
            self.notifier.fire();
        }

        ApiError::Unauthorized
    }
}

fn recovers(options: &RequestOptions) -> bool {
    options.session_recovery && options.bearer != BearerSource::Anonymous
}

/// 非 401 终态
fn complete(response: TransportResponse) -> Result<Value> {
    if response.is_success() {
        Ok(response.json_or_null())
    } else {
        Err(ApiError::Http {
            status: response.status,
            message: response.error_message(),
        })
    }
}
