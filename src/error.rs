//! 统一错误模型
//! 所有请求失败最终归一为 Http / Network / Unauthorized 三类，其余为调用方输入或配置问题

use thiserror::Error;

/// 客户端错误类型
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// 非 2xx 且非 401 的响应
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 传输层失败（未收到任何响应，包括超时）
    #[error("Network error: {message}")]
    Network { message: String },

    /// 刷新协议的终态：凭证已清理，未授权信号已广播
    #[error("Unauthorized")]
    Unauthorized,

    /// 2xx 响应体无法解析为调用方期望的类型
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// 对应的 HTTP 状态码（仅 Http 与 Unauthorized 有）
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(401),
            _ => None,
        }
    }

    /// 稳定的错误码，供 UI 或日志分类
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Http { .. } => "HTTP_ERROR",
            ApiError::Network { .. } => "NETWORK_ERROR",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Decode(_) => "DECODE_ERROR",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Config(_) => "CONFIG_ERROR",
            ApiError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// 获取用户友好的错误消息（不包含令牌或传输细节）
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http { message, .. } => message.clone(),
            ApiError::Network { .. } => "Network error, please check your connection".to_string(),
            ApiError::Unauthorized => "Session expired, please log in again".to_string(),
            ApiError::Decode(_) => "Unexpected response from server".to_string(),
            ApiError::Validation(msg) => msg.clone(),
            ApiError::Config(_) => "Configuration error".to_string(),
            ApiError::Storage(_) => "Local storage unavailable".to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    pub fn http(status: u16, message: &str) -> Self {
        ApiError::Http {
            status,
            message: message.to_string(),
        }
    }

    pub fn network(message: &str) -> Self {
        ApiError::Network {
            message: message.to_string(),
        }
    }

    pub fn validation(msg: &str) -> Self {
        ApiError::Validation(msg.to_string())
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for ApiError {
    fn from(e: config::ConfigError) -> Self {
        ApiError::Config(e.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        ApiError::Validation(e.to_string())
    }
}
