//! 令牌刷新协调器
//! 保证同一时刻最多只有一个刷新网络请求；并发发现令牌过期的调用者共享同一结果

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::store::{CredentialStore, SessionSnapshot};
use crate::http::request::{Method, RequestBuilder, RequestOptions};
use crate::http::transport::HttpTransport;
use crate::models::auth::{RefreshTokenRequest, TokenResponse};

/// 刷新失败原因
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailureReason {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("refresh rejected with status {0}")]
    Rejected(u16),

    #[error("refresh response carried no token")]
    MalformedResponse,

    #[error("refresh transport failed: {0}")]
    Network(String),

    #[error("refresh task aborted")]
    Aborted,
}

/// 一次刷新尝试的失败结果；同一尝试的所有等待者拿到相同的 attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("refresh attempt {attempt} failed: {reason}")]
pub struct RefreshFailure {
    pub attempt: u64,
    pub reason: RefreshFailureReason,
}

/// 成功时为新的访问令牌
pub type RefreshOutcome = Result<String, RefreshFailure>;

type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// 刷新状态（仅内存）
enum RefreshState {
    Idle,
    Refreshing { attempt: u64, pending: PendingRefresh },
}

struct Inner {
    transport: Arc<dyn HttpTransport>,
    store: Arc<CredentialStore>,
    builder: RequestBuilder,
    refresh_path: String,
    state: Mutex<RefreshState>,
    attempts: AtomicU64,
}

/// 令牌刷新协调器
///
/// 刷新在独立任务中执行：即使所有等待者都不再等待，刷新也会完成并写回存储，
/// 之后状态才回到 Idle。
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<CredentialStore>,
        builder: RequestBuilder,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                builder,
                refresh_path: refresh_path.into(),
                state: Mutex::new(RefreshState::Idle),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    /// 获取一个有效的访问令牌，必要时刷新
    ///
    /// `seen` 是失败请求发出时的会话快照（仅当请求使用存储中的令牌）。
    /// 没有刷新在进行、且之后已写入过不同的令牌时，直接返回存储中的令牌；
    /// `None` 表示总是发起（或加入）刷新。
    pub async fn refresh(&self, seen: Option<&SessionSnapshot>) -> RefreshOutcome {
        let pending = {
            let mut state = self.inner.state.lock().await;

            let joined = match &*state {
                RefreshState::Refreshing { attempt, pending } => Some((*attempt, pending.clone())),
                RefreshState::Idle => None,
            };

            match joined {
                Some((attempt, pending)) => {
                    debug!(attempt, "Joining in-flight token refresh");
                    pending
                }
                None => {
                    if let Some(current) = seen.and_then(|seen| self.renewed_since(seen)) {
                        debug!("Access token already renewed, skipping refresh");
                        return Ok(current);
                    }

                    let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let inner = Arc::clone(&self.inner);
                    let handle = tokio::spawn(inner.run(attempt));

                    let pending = async move {
                        handle.await.unwrap_or_else(|e| {
                            warn!(attempt, error = %e, "Token refresh task aborted");
                            Err(RefreshFailure {
                                attempt,
                                reason: RefreshFailureReason::Aborted,
                            })
                        })
                    }
                    .boxed()
                    .shared();

                    *state = RefreshState::Refreshing {
                        attempt,
                        pending: pending.clone(),
                    };
                    pending
                }
            }
        };

        pending.await
    }

    /// 快照之后写入过、且与请求所带令牌不同的访问令牌
    fn renewed_since(&self, seen: &SessionSnapshot) -> Option<String> {
        let store = &self.inner.store;
        if store.generation() == seen.generation {
            return None;
        }
        store
            .access_token()
            .filter(|current| seen.access_token.as_deref() != Some(current.as_str()))
    }

    /// 是否有刷新正在进行
    pub async fn is_refreshing(&self) -> bool {
        matches!(*self.inner.state.lock().await, RefreshState::Refreshing { .. })
    }

    /// 已发起的刷新尝试次数
    pub fn attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

impl Inner {
    async fn run(self: Arc<Self>, attempt: u64) -> RefreshOutcome {
        let result = self.call(attempt).await;

        match &result {
            Ok(_) => {
                metrics::counter!("api_refresh_total", "outcome" => "success").increment(1);
                info!(attempt, "Access token refreshed");
            }
            Err(failure) => {
                metrics::counter!("api_refresh_total", "outcome" => "failure").increment(1);
                warn!(attempt, reason = %failure.reason, "Token refresh failed");
            }
        }

        // 新令牌已写回存储，之后才回到 Idle 并唤醒等待者
        *self.state.lock().await = RefreshState::Idle;
        result
    }

    async fn call(&self, attempt: u64) -> RefreshOutcome {
        let fail = |reason| RefreshFailure { attempt, reason };

        let refresh_token = self
            .store
            .refresh_token()
            .ok_or_else(|| fail(RefreshFailureReason::MissingRefreshToken))?;

        let body = serde_json::to_value(RefreshTokenRequest {
            refresh_token: &refresh_token,
        })
        .unwrap_or_default();
        let options = RequestOptions::new(Method::Post).json(body).anonymous();
        let request = self.builder.build(&self.refresh_path, &options, None);

        debug!(attempt, url = %request.url, "Requesting token refresh");
        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| fail(RefreshFailureReason::Network(e.message)))?;

        if !response.is_success() {
            return Err(fail(RefreshFailureReason::Rejected(response.status)));
        }

        let tokens: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|_| fail(RefreshFailureReason::MalformedResponse))?;
        if tokens.token.is_empty() {
            return Err(fail(RefreshFailureReason::MalformedResponse));
        }

        self.store
            .store_tokens(&tokens.token, tokens.refresh_token.as_deref());
        Ok(tokens.token)
    }
}
