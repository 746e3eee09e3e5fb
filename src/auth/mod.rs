//! Session credentials: storage, single-flight refresh and the unauthorized signal

pub mod notifier;
pub mod refresh;
pub mod storage;
pub mod store;

pub use notifier::{UnauthorizedEvent, UnauthorizedNotifier};
pub use refresh::{RefreshCoordinator, RefreshFailure, RefreshFailureReason, RefreshOutcome};
pub use storage::{FileStorage, MemoryStorage, StorageBackend, StorageError};
pub use store::{Credential, CredentialStore, SessionSnapshot};
