use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(test)]
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::clock::LogicalClock;
use crate::todos::repo_types::{NewTodo, Todo, TodoPatch, TodoStatus};

/// Storage contract for todos.
///
/// Absence is reported as `None`, never as an error. Every mutation bumps
/// `updated_at` from a monotonic clock, so successive writes to one todo
/// always carry strictly increasing timestamps.
#[async_trait]
pub trait TodoRepo: Send + Sync {
    /// Insert a todo with a fresh id and `created_at == updated_at`.
    async fn create(&self, new: NewTodo) -> anyhow::Result<Todo>;

    /// Apply `patch` and refresh `updated_at`.
    async fn update(&self, id: &str, patch: TodoPatch) -> anyhow::Result<Option<Todo>>;

    /// Like [`TodoRepo::update`], but only when the stored status is still
    /// `expected`. The check and the write are atomic.
    async fn update_if_status(
        &self,
        id: &str,
        expected: TodoStatus,
        patch: TodoPatch,
    ) -> anyhow::Result<Option<Todo>>;

    /// Like [`TodoRepo::update`], but skipped when the stored status is
    /// `unless`. The check and the write are atomic.
    async fn update_unless_status(
        &self,
        id: &str,
        unless: TodoStatus,
        patch: TodoPatch,
    ) -> anyhow::Result<Option<Todo>>;

    /// Remove a todo, returning what was removed.
    async fn delete(&self, id: &str) -> anyhow::Result<Option<Todo>>;

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Todo>>;

    /// Todos owned by `user_id`, in insertion order.
    async fn find_by_user_id(&self, user_id: &str) -> anyhow::Result<Vec<Todo>>;

    /// Pending todos whose reminder is at or before `as_of`.
    async fn find_due_reminders(&self, as_of: OffsetDateTime) -> anyhow::Result<Vec<Todo>>;
}

#[derive(Debug)]
pub struct InMemoryTodoRepo {
    todos: RwLock<Vec<Todo>>,
    next_id: AtomicU64,
    clock: LogicalClock,
}

impl Default for InMemoryTodoRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTodoRepo {
    pub fn new() -> Self {
        Self::with_clock(LogicalClock::system())
    }

    #[cfg(test)]
    pub fn with_wall_clock(wall: Arc<dyn crate::clock::Clock>) -> Self {
        Self::with_clock(LogicalClock::new(wall))
    }

    fn with_clock(clock: LogicalClock) -> Self {
        Self {
            todos: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            clock,
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.todos.read().await.len()
    }

    async fn patch_where<F>(&self, id: &str, patch: TodoPatch, allow: F) -> Option<Todo>
    where
        F: FnOnce(&Todo) -> bool + Send,
    {
        let mut todos = self.todos.write().await;
        let todo = todos.iter_mut().find(|t| t.id == id)?;
        if !allow(todo) {
            return None;
        }
        patch.apply(todo);
        todo.updated_at = self.clock.now();
        Some(todo.clone())
    }
}

#[async_trait]
impl TodoRepo for InMemoryTodoRepo {
    async fn create(&self, new: NewTodo) -> anyhow::Result<Todo> {
        let mut todos = self.todos.write().await;
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let now = self.clock.now();
        let todo = Todo {
            id: format!("todo-{}", n),
            user_id: new.user_id,
            title: new.title,
            description: new.description,
            status: new.status,
            remind_at: new.remind_at,
            created_at: now,
            updated_at: now,
        };
        todos.push(todo.clone());
        Ok(todo)
    }

    async fn update(&self, id: &str, patch: TodoPatch) -> anyhow::Result<Option<Todo>> {
        Ok(self.patch_where(id, patch, |_| true).await)
    }

    async fn update_if_status(
        &self,
        id: &str,
        expected: TodoStatus,
        patch: TodoPatch,
    ) -> anyhow::Result<Option<Todo>> {
        Ok(self
            .patch_where(id, patch, |t| t.status == expected)
            .await)
    }

    async fn update_unless_status(
        &self,
        id: &str,
        unless: TodoStatus,
        patch: TodoPatch,
    ) -> anyhow::Result<Option<Todo>> {
        Ok(self
            .patch_where(id, patch, |t| t.status != unless)
            .await)
    }

    async fn delete(&self, id: &str) -> anyhow::Result<Option<Todo>> {
        let mut todos = self.todos.write().await;
        let removed = todos
            .iter()
            .position(|t| t.id == id)
            .map(|idx| todos.remove(idx));
        Ok(removed)
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Todo>> {
        Ok(self.todos.read().await.iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_user_id(&self, user_id: &str) -> anyhow::Result<Vec<Todo>> {
        Ok(self
            .todos
            .read()
            .await
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_due_reminders(&self, as_of: OffsetDateTime) -> anyhow::Result<Vec<Todo>> {
        Ok(self
            .todos
            .read()
            .await
            .iter()
            .filter(|t| t.is_reminder_due(as_of))
            .cloned()
            .collect())
    }
}
