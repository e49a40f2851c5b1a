//! SQLite-backed todo collection.
//!
//! # Design
//! One `rusqlite::Connection` sits behind a `std::sync::Mutex` and every
//! operation runs on tokio's blocking pool, so handlers never block a
//! runtime worker. The connection slot starts `Detached` when the database
//! could not be opened at startup; each operation then retries the open
//! before running, which is how the server recovers once the storage
//! becomes reachable.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{StoreError, StoreResult, TodoStore};
use crate::model::{Todo, TodoPatch};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS todos (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    id         TEXT    NOT NULL UNIQUE,
    title      TEXT    NOT NULL CHECK (length(trim(title)) > 0),
    completed  INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS todos_created_at ON todos (created_at DESC, seq DESC);
";

const TODO_COLUMNS: &str = "id, title, completed, created_at";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent store for `sqlite://` URLs.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    target: Target,
    slot: Arc<Mutex<Slot>>,
}

#[derive(Clone, Debug)]
enum Target {
    Memory,
    File(PathBuf),
}

#[derive(Debug)]
enum Slot {
    Detached,
    Open(Connection),
    Closed,
}

impl SqliteStore {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: PathBuf) -> StoreResult<Self> {
        Self::open_target(Target::File(path)).await
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> StoreResult<Self> {
        Self::open_target(Target::Memory).await
    }

    /// A store for `path` that connects on first use.
    pub fn detached(path: PathBuf) -> Self {
        Self::with_slot(Target::File(path), Slot::Detached)
    }

    pub fn detached_in_memory() -> Self {
        Self::with_slot(Target::Memory, Slot::Detached)
    }

    fn with_slot(target: Target, slot: Slot) -> Self {
        Self {
            target,
            slot: Arc::new(Mutex::new(slot)),
        }
    }

    async fn open_target(target: Target) -> StoreResult<Self> {
        let t = target.clone();
        let conn = tokio::task::spawn_blocking(move || open_connection(&t)).await??;
        Ok(Self::with_slot(target, Slot::Open(conn)))
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let slot = Arc::clone(&self.slot);
        let target = self.target.clone();
        tokio::task::spawn_blocking(move || {
            let mut slot = slot
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            let conn = slot.ensure_open(&target)?;
            f(conn)
        })
        .await?
    }
}

impl Slot {
    fn ensure_open(&mut self, target: &Target) -> StoreResult<&mut Connection> {
        if let Slot::Detached = self {
            let conn = open_connection(target).map_err(|err| {
                warn!(error = %err, "sqlite reconnect failed");
                StoreError::Unavailable(err.to_string())
            })?;
            info!("sqlite connection restored");
            *self = Slot::Open(conn);
        }
        match self {
            Slot::Open(conn) => Ok(conn),
            Slot::Closed => Err(StoreError::Closed),
            Slot::Detached => Err(StoreError::Unavailable("not connected".to_string())),
        }
    }
}

fn open_connection(target: &Target) -> StoreResult<Connection> {
    let started_at = Instant::now();
    let opened = match target {
        Target::Memory => Connection::open_in_memory(),
        Target::File(path) => Connection::open(path),
    };
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                target_db = ?target,
                duration_ms = started_at.elapsed().as_millis() as u64,
                error = %err,
                "sqlite open failed"
            );
            return Err(err.into());
        }
    };
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(SCHEMA_SQL)?;
    info!(
        target_db = ?target,
        duration_ms = started_at.elapsed().as_millis() as u64,
        "sqlite opened"
    );
    Ok(conn)
}

/// Column values as read, before they are checked.
type RawTodo = (String, String, bool, i64);

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawTodo> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode((id, title, completed, created_at): RawTodo) -> StoreResult<Todo> {
    let id = Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt(format!("id `{id}`: {e}")))?;
    let created_at: DateTime<Utc> = DateTime::from_timestamp_millis(created_at)
        .ok_or_else(|| StoreError::Corrupt(format!("created_at {created_at} out of range")))?;
    let todo = Todo {
        id,
        title,
        completed,
        created_at,
    };
    todo.validate()
        .map_err(|e| StoreError::Corrupt(format!("todo {id}: {e}")))?;
    Ok(todo)
}

fn find(conn: &Connection, id: Uuid) -> StoreResult<Option<Todo>> {
    let raw = conn
        .query_row(
            &format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?1"),
            params![id.to_string()],
            read_raw,
        )
        .optional()?;
    raw.map(decode).transpose()
}

#[async_trait]
impl TodoStore for SqliteStore {
    async fn list(&self) -> StoreResult<Vec<Todo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {TODO_COLUMNS} FROM todos ORDER BY created_at DESC, seq DESC"
            ))?;
            let rows = stmt.query_map([], read_raw)?;
            let mut todos = Vec::new();
            for raw in rows {
                todos.push(decode(raw?)?);
            }
            Ok(todos)
        })
        .await
    }

    async fn create(&self, title: &str) -> StoreResult<Todo> {
        let todo = Todo::new(title)?;
        self.with_conn(move |conn| {
            todo.validate()?;
            conn.execute(
                "INSERT INTO todos (id, title, completed, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    todo.id.to_string(),
                    todo.title,
                    todo.completed,
                    todo.created_at.timestamp_millis(),
                ],
            )?;
            debug!(id = %todo.id, "created todo");
            Ok(todo)
        })
        .await
    }

    async fn find_and_update(&self, id: Uuid, patch: TodoPatch) -> StoreResult<Todo> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut todo = find(&tx, id)?.ok_or(StoreError::NotFound(id))?;
            patch.apply(&mut todo)?;
            tx.execute(
                "UPDATE todos SET title = ?1, completed = ?2 WHERE id = ?3",
                params![todo.title, todo.completed, id.to_string()],
            )?;
            tx.commit()?;
            debug!(%id, "updated todo");
            Ok(todo)
        })
        .await
    }

    async fn find_and_delete(&self, id: Uuid) -> StoreResult<Todo> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let todo = find(&tx, id)?.ok_or(StoreError::NotFound(id))?;
            tx.execute("DELETE FROM todos WHERE id = ?1", params![id.to_string()])?;
            tx.commit()?;
            debug!(%id, "deleted todo");
            Ok(todo)
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> StoreResult<()> {
        let slot = Arc::clone(&self.slot);
        tokio::task::spawn_blocking(move || {
            let mut slot = slot
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            if let Slot::Open(conn) = std::mem::replace(&mut *slot, Slot::Closed) {
                conn.close().map_err(|(_, err)| StoreError::Sqlite(err))?;
                info!("sqlite connection closed");
            }
            Ok(())
        })
        .await?
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
