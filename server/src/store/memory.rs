use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{StoreError, StoreResult, TodoStore};
use crate::model::{Todo, TodoPatch};

/// Volatile store backing `memory://` URLs and tests.
///
/// Records carry an insertion sequence so listing stays in reverse creation
/// order even when two records share a millisecond timestamp.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collection>>,
}

#[derive(Debug, Default)]
struct Collection {
    docs: HashMap<Uuid, Entry>,
    next_seq: u64,
    closed: bool,
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    todo: Todo,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Collection {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Todo>> {
        let col = self.inner.read().await;
        col.ensure_open()?;
        let mut entries: Vec<&Entry> = col.docs.values().collect();
        entries.sort_by(|a, b| {
            b.todo
                .created_at
                .cmp(&a.todo.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(entries.into_iter().map(|e| e.todo.clone()).collect())
    }

    async fn create(&self, title: &str) -> StoreResult<Todo> {
        let todo = Todo::new(title)?;
        let mut col = self.inner.write().await;
        col.ensure_open()?;
        let seq = col.next_seq;
        col.next_seq += 1;
        col.docs.insert(
            todo.id,
            Entry {
                seq,
                todo: todo.clone(),
            },
        );
        debug!(id = %todo.id, "created todo");
        Ok(todo)
    }

    async fn find_and_update(&self, id: Uuid, patch: TodoPatch) -> StoreResult<Todo> {
        let mut col = self.inner.write().await;
        col.ensure_open()?;
        let entry = col.docs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let mut updated = entry.todo.clone();
        patch.apply(&mut updated)?;
        entry.todo = updated.clone();
        debug!(%id, "updated todo");
        Ok(updated)
    }

    async fn find_and_delete(&self, id: Uuid) -> StoreResult<Todo> {
        let mut col = self.inner.write().await;
        col.ensure_open()?;
        let entry = col.docs.remove(&id).ok_or(StoreError::NotFound(id))?;
        debug!(%id, "deleted todo");
        Ok(entry.todo)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.read().await.ensure_open()
    }

    async fn close(&self) -> StoreResult<()> {
        self.inner.write().await.closed = true;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
