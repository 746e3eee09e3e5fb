//! console-http 命令行入口
//! 以文件存储保存会话，便于跨进程复用登录状态

use anyhow::Context;
use clap::{Parser, Subcommand};
use console_http::{
    config::ClientConfig, models::auth::LoginRequest, services::AuthService, telemetry, ApiClient,
};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "console-http", version, about = "Authenticated HTTP client for the console API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 登录并保存令牌
    Login {
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
    },
    /// 登出并清除本地会话
    Logout,
    /// 显示当前身份
    Whoami,
    /// GET 请求
    Get {
        path: String,
        /// 查询参数，格式 key=value，可重复
        #[arg(long = "param", value_parser = parse_pair)]
        params: Vec<(String, String)>,
    },
    /// POST 请求（JSON 请求体）
    Post {
        path: String,
        #[arg(long)]
        data: Option<String>,
    },
    /// PUT 请求（JSON 请求体）
    Put {
        path: String,
        #[arg(long)]
        data: Option<String>,
    },
    /// DELETE 请求
    Delete { path: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载 .env 文件：CONSOLE_ENV 指定时优先 .env.<name>
    if let Ok(name) = std::env::var("CONSOLE_ENV") {
        dotenv::from_filename(format!(".env.{}", name)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    let config = ClientConfig::from_env().context("Failed to load configuration")?;
    telemetry::init_telemetry(&config);

    let client = ApiClient::from_config(&config).context("Failed to initialize API client")?;
    let mut unauthorized = client.subscribe_unauthorized();
    let auth = AuthService::new(client.clone(), &config.api);

    let result = match cli.command {
        Command::Login { user, password } => auth
            .login(LoginRequest {
                user_id: user,
                pwd: password,
            })
            .await
            .map(|_| Value::String("login succeeded".to_string())),
        Command::Logout => {
            auth.logout().await;
            Ok(Value::String("logged out".to_string()))
        }
        Command::Whoami => Ok(auth
            .current_identity()
            .and_then(|identity| serde_json::to_value(identity).ok())
            .unwrap_or(Value::Null)),
        Command::Get { path, params } => {
            let pairs: Vec<(&str, &str)> =
                params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            client.get(&path, &pairs).await
        }
        Command::Post { path, data } => client.post(&path, parse_body(data)?).await,
        Command::Put { path, data } => client.put(&path, parse_body(data)?).await,
        Command::Delete { path } => client.del(&path).await,
    };

    if unauthorized.try_recv().is_ok() {
        eprintln!("warning: session expired, please log in again");
    }

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            tracing::debug!(code = e.code(), error = %e, "Command failed");
            anyhow::bail!("{} ({})", e.user_message(), e.code())
        }
    }
}

fn parse_body(data: Option<String>) -> anyhow::Result<Value> {
    match data {
        Some(raw) => serde_json::from_str(&raw).context("--data must be valid JSON"),
        None => Ok(Value::Object(Default::default())),
    }
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {}", raw))
}
