//! Persistence for todo records.
//!
//! # Design
//! `TodoStore` is the only seam between HTTP handling and storage. The
//! router receives an explicitly constructed `Arc<dyn TodoStore>` at
//! startup instead of reaching for a process-wide connection. Each method is
//! one storage round trip; the store's own per-record atomicity is all the
//! concurrency control there is, so concurrent writers to one id resolve as
//! last write wins.

mod memory;
mod sqlite;

use std::{fmt, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::Environment,
    model::{Todo, TodoPatch, ValidationError},
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// CRUD over the todo collection.
#[async_trait]
pub trait TodoStore: Send + Sync {
    /// All records, newest `created_at` first.
    async fn list(&self) -> StoreResult<Vec<Todo>>;

    /// Persist a new record with a trimmed `title` and `completed = false`.
    async fn create(&self, title: &str) -> StoreResult<Todo>;

    /// Apply `patch` to the record with `id` and return the stored result.
    async fn find_and_update(&self, id: Uuid, patch: TodoPatch) -> StoreResult<Todo>;

    /// Remove the record with `id` and return what was removed.
    async fn find_and_delete(&self, id: Uuid) -> StoreResult<Todo>;

    /// Round trip to the backend without touching any record.
    async fn ping(&self) -> StoreResult<()>;

    /// Release the backend connection. Later calls fail with `StoreError::Closed`.
    async fn close(&self) -> StoreResult<()>;

    /// Short backend name for logs and the status endpoint.
    fn backend(&self) -> &'static str;
}

/// Errors surfaced by a `TodoStore`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("todo not found: {0}")]
    NotFound(Uuid),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage connection is closed")]
    Closed,

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("invalid stored record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// True for failures of the backend itself rather than of the request.
    pub fn is_storage(&self) -> bool {
        !matches!(self, StoreError::Validation(_) | StoreError::NotFound(_))
    }
}

/// Where the todo collection lives, parsed from a connection URL.
///
/// Accepted forms: `memory://`, `sqlite::memory:` and `sqlite://<path>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    SqliteMemory,
    SqliteFile(PathBuf),
}

impl StoreLocation {
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        if url == "memory://" || url == "memory:" {
            return Some(Self::Memory);
        }
        if url == "sqlite::memory:" || url == "sqlite://:memory:" {
            return Some(Self::SqliteMemory);
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))?;
        if path.is_empty() {
            return None;
        }
        Some(Self::SqliteFile(PathBuf::from(path)))
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory://"),
            Self::SqliteMemory => f.write_str("sqlite::memory:"),
            Self::SqliteFile(path) => write!(f, "sqlite://{}", path.display()),
        }
    }
}

/// Open the store at `location` and confirm it answers.
pub async fn connect(location: &StoreLocation) -> StoreResult<Arc<dyn TodoStore>> {
    let store: Arc<dyn TodoStore> = match location {
        StoreLocation::Memory => Arc::new(MemoryStore::new()),
        StoreLocation::SqliteMemory => Arc::new(SqliteStore::open_in_memory().await?),
        StoreLocation::SqliteFile(path) => Arc::new(SqliteStore::open(path.clone()).await?),
    };
    store.ping().await?;
    Ok(store)
}

/// A store for `location` that has not connected yet.
///
/// Every operation attempts to connect first and fails with
/// `StoreError::Unavailable` until the backend can be reached.
pub fn detached(location: &StoreLocation) -> Arc<dyn TodoStore> {
    match location {
        StoreLocation::Memory => Arc::new(MemoryStore::new()),
        StoreLocation::SqliteMemory => Arc::new(SqliteStore::detached_in_memory()),
        StoreLocation::SqliteFile(path) => Arc::new(SqliteStore::detached(path.clone())),
    }
}

/// Startup connection policy.
///
/// A store that cannot be reached is fatal in production. Elsewhere the
/// process keeps running on a detached store that reconnects on demand.
pub async fn open_for(
    environment: Environment,
    location: &StoreLocation,
) -> StoreResult<Arc<dyn TodoStore>> {
    match connect(location).await {
        Ok(store) => {
            tracing::info!(backend = store.backend(), %location, "storage connected");
            Ok(store)
        }
        Err(err) if environment.is_production() => {
            tracing::error!(error = %err, %location, "storage connection failed");
            Err(err)
        }
        Err(err) => {
            tracing::warn!(error = %err, %location, "storage connection failed; requests will retry");
            Ok(detached(location))
        }
    }
}
