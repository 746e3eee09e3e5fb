//! 认证服务：登录、刷新、登出

use chrono::Utc;
use tracing::{debug, info};
use validator::Validate;

use crate::{
    client::ApiClient,
    config::ApiConfig,
    error::{ApiError, Result},
    http::{Method, RequestOptions},
    models::auth::{Identity, LoginRequest, TokenResponse},
};

/// 登录后写入身份信息的默认角色
const DEFAULT_ROLE: &str = "admin";

pub struct AuthService {
    client: ApiClient,
    login_path: String,
    logout_path: String,
}

impl AuthService {
    pub fn new(client: ApiClient, config: &ApiConfig) -> Self {
        Self {
            client,
            login_path: config.login_path.clone(),
            logout_path: config.logout_path.clone(),
        }
    }

    /// 用户登录
    ///
    /// 匿名发送且不走刷新流程，401 直接作为 HttpError 返回。
    pub async fn login(&self, req: LoginRequest) -> Result<TokenResponse> {
        req.validate()?;

        let body = serde_json::to_value(&req).map_err(|e| ApiError::validation(&e.to_string()))?;
        let options = RequestOptions::new(Method::Post)
            .json(body)
            .anonymous()
            .without_session_recovery();

        let data = self.client.request(&self.login_path, options).await?;
        let tokens: TokenResponse = serde_json::from_value(data)
            .map_err(|e| ApiError::Decode(format!("login response: {}", e)))?;
        if tokens.token.is_empty() {
            return Err(ApiError::Decode("login response carried an empty token".to_string()));
        }

        let store = self.client.store();
        store.store_tokens(&tokens.token, tokens.refresh_token.as_deref());

        let mut identity = Identity::new(req.user_id.clone(), DEFAULT_ROLE);
        identity.logged_in_at = Some(Utc::now());
        store.set_identity(&identity);

        info!(user_id = %req.user_id, "Logged in");
        Ok(tokens)
    }

    /// 主动刷新访问令牌；若已有刷新在进行则共享其结果
    pub async fn refresh_token(&self) -> Result<String> {
        self.client
            .executor()
            .refresh_coordinator()
            .refresh(None)
            .await
            .map_err(|failure| {
                debug!(error = %failure, "Explicit refresh failed");
                ApiError::Unauthorized
            })
    }

    /// 登出：通知后端（失败忽略），然后清除本地凭证与身份
    pub async fn logout(&self) {
        let options = RequestOptions::new(Method::Post)
            .json(serde_json::json!({}))
            .without_session_recovery();

        if let Err(e) = self.client.request(&self.logout_path, options).await {
            debug!(error = %e, "Logout request failed, clearing local session anyway");
        }

        self.client.store().clear_all();
        info!("Logged out");
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.client.store().identity()
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.store().access_token().is_some()
    }
}
