//! 配置系统
//! 从默认值与环境变量（前缀 CONSOLE_）加载客户端配置

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API 基础地址，可为相对路径（如 "/api"）或绝对 URL
    pub base_url: String,
    /// 解析以 "/" 开头的相对 URL 时使用的源地址
    pub origin: String,
    /// 请求超时时间（秒），超时视为网络错误
    pub timeout_secs: u64,
    /// 登录端点（相对于 base_url）
    pub login_path: String,
    /// 刷新端点（相对于 base_url）
    pub refresh_path: String,
    /// 登出端点（相对于 base_url）
    pub logout_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 存储后端: memory, file
    pub backend: String,
    /// file 后端的会话文件路径
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty, plain
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "/api".to_string(),
                origin: "http://127.0.0.1:8080".to_string(),
                timeout_secs: 30,
                login_path: "/auth".to_string(),
                refresh_path: "/auth/refresh".to_string(),
                logout_path: "/auth/logout".to_string(),
            },
            storage: StorageConfig {
                backend: "file".to_string(),
                path: ".console-http/session.json".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

impl ClientConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ClientConfig::default();
        let mut settings = Config::builder();

        settings = settings
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("api.origin", defaults.api.origin)?
            .set_default("api.timeout_secs", defaults.api.timeout_secs)?
            .set_default("api.login_path", defaults.api.login_path)?
            .set_default("api.refresh_path", defaults.api.refresh_path)?
            .set_default("api.logout_path", defaults.api.logout_path)?
            .set_default("storage.backend", defaults.storage.backend)?
            .set_default("storage.path", defaults.storage.path)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?;

        // 环境变量示例: CONSOLE_API__BASE_URL=https://api.example.com
        settings = settings.add_source(
            Environment::with_prefix("CONSOLE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ClientConfig = settings.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Message("api.base_url must not be empty".to_string()));
        }

        if !(self.api.origin.starts_with("http://") || self.api.origin.starts_with("https://")) {
            return Err(ConfigError::Message(format!(
                "Invalid api.origin: {}. Must start with http:// or https://",
                self.api.origin
            )));
        }

        if self.api.timeout_secs == 0 || self.api.timeout_secs > 600 {
            return Err(ConfigError::Message(
                "api.timeout_secs must be between 1 and 600".to_string(),
            ));
        }

        match self.storage.backend.to_lowercase().as_str() {
            "memory" | "file" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid storage backend: {}. Must be one of: memory, file",
                    self.storage.backend
                )))
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "plain" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty, plain",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }
}
