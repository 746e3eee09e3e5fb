//! 控制台 HTTP 客户端库
//! 自动附加 Bearer 凭证，访问令牌过期时单飞刷新并重试一次

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod services;
pub mod telemetry;

pub use client::ApiClient;
pub use error::{ApiError, Result};
