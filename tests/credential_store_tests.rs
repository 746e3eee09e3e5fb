//! 凭证存储集成测试：文件后端跨“重新加载”保留会话

use std::sync::Arc;

use console_http::auth::{CredentialStore, FileStorage};
use console_http::models::auth::Identity;

fn open(path: &std::path::Path) -> CredentialStore {
    CredentialStore::new(Arc::new(FileStorage::open(path).unwrap()))
}

#[test]
fn test_session_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let store = open(&path);
    store.store_tokens("A", Some("R"));
    store.set_identity(&Identity::new("u1", "admin"));
    drop(store);

    let reloaded = open(&path);
    assert_eq!(reloaded.access_token().as_deref(), Some("A"));
    assert_eq!(reloaded.refresh_token().as_deref(), Some("R"));
    assert_eq!(reloaded.identity().unwrap(), Identity::new("u1", "admin"));
}

#[test]
fn test_clear_all_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let store = open(&path);
    store.store_tokens("A", Some("R"));
    store.set_identity(&Identity::new("u1", "admin"));
    store.clear_all();

    let reloaded = open(&path);
    assert!(reloaded.credential().is_empty());
    assert!(reloaded.identity().is_none());
}

#[test]
fn test_slots_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("session.json"));

    store.store_tokens("A", Some("R"));
    store.clear_access_token();
    assert!(store.access_token().is_none());
    assert_eq!(store.refresh_token().as_deref(), Some("R"));

    store.clear_refresh_token();
    store.set_identity(&Identity::new("u1", "viewer"));
    store.clear_identity();
    assert!(store.identity().is_none());
}
