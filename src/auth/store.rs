//! 凭证存储
//! 访问令牌、刷新令牌与身份信息的读写；存储故障一律吞掉并视为缺失

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use secrecy::Secret;

use super::storage::{MemoryStorage, StorageBackend, StorageError};
use crate::models::auth::Identity;

const ACCESS_TOKEN_KEY: &str = "jwt_token";
const REFRESH_TOKEN_KEY: &str = "jwt_refresh";
const IDENTITY_KEY: &str = "user_info";

/// 凭证快照（Debug 输出不泄露令牌）
#[derive(Debug)]
pub struct Credential {
    pub access_token: Option<Secret<String>>,
    pub refresh_token: Option<Secret<String>>,
}

impl Credential {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// 请求发出时观察到的会话状态
#[derive(Clone)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub access_token: Option<String>,
}

/// 凭证存储
///
/// 每个会话构造一次，通过 Arc 注入到执行器与刷新协调器。所有操作同步且不会失败。
/// 每次写入令牌都会递增代次（仅内存），清除不递增。
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn StorageBackend>,
    generation: Arc<AtomicU64>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 内存存储（测试用）
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn set_access_token(&self, token: &str) {
        self.write(ACCESS_TOKEN_KEY, token);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn clear_access_token(&self) {
        self.remove(&[ACCESS_TOKEN_KEY]);
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn set_refresh_token(&self, token: &str) {
        self.write(REFRESH_TOKEN_KEY, token);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn clear_refresh_token(&self) {
        self.remove(&[REFRESH_TOKEN_KEY]);
    }

    /// 令牌代次：每次写入令牌递增
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// 先读代次再读访问令牌；令牌先写后递增，因此新代次总伴随新令牌
    pub fn snapshot(&self) -> SessionSnapshot {
        let generation = self.generation();
        SessionSnapshot {
            generation,
            access_token: self.access_token(),
        }
    }

    /// 读取两种令牌的快照
    pub fn credential(&self) -> Credential {
        Credential {
            access_token: self.access_token().map(Secret::new),
            refresh_token: self.refresh_token().map(Secret::new),
        }
    }

    /// 写入一组新令牌；refresh 为 None 时保留原刷新令牌
    pub fn store_tokens(&self, access: &str, refresh: Option<&str>) {
        self.set_access_token(access);
        if let Some(refresh) = refresh {
            self.set_refresh_token(refresh);
        }
    }

    /// 身份信息；记录损坏时视为缺失
    pub fn identity(&self) -> Option<Identity> {
        let raw = self.read(IDENTITY_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::debug!(error = %e, "Stored identity is malformed, ignoring");
                None
            }
        }
    }

    pub fn set_identity(&self, identity: &Identity) {
        match serde_json::to_string(identity) {
            Ok(raw) => self.write(IDENTITY_KEY, &raw),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize identity"),
        }
    }

    pub fn clear_identity(&self) {
        self.remove(&[IDENTITY_KEY]);
    }

    /// 清除访问令牌与刷新令牌
    pub fn clear_tokens(&self) {
        self.remove(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY]);
    }

    /// 清除令牌与身份信息；返回后所有读取均为缺失
    pub fn clear_all(&self) {
        self.remove(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, IDENTITY_KEY]);
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                log_fault("read", key, &e);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            log_fault("write", key, &e);
        }
    }

    fn remove(&self, keys: &[&str]) {
        if let Err(e) = self.backend.remove_many(keys) {
            tracing::warn!(keys = ?keys, error = %e, "Credential storage clear failed");
        }
    }
}

fn log_fault(op: &str, key: &str, error: &StorageError) {
    tracing::warn!(op, key, error = %error, "Credential storage fault, treating as absent");
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let credential = self.credential();
        f.debug_struct("CredentialStore")
            .field("has_access_token", &credential.access_token.is_some())
            .field("has_refresh_token", &credential.refresh_token.is_some())
            .finish()
    }
}
