use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TodoStatus {
    Pending,
    Done,
    ReminderDue,
}

/// Todo record held by the todo store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,      // store-assigned, `todo-<n>`
    pub user_id: String, // fixed at creation
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub remind_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Todo {
    /// Pending with a reminder at or before `as_of`.
    pub fn is_reminder_due(&self, as_of: OffsetDateTime) -> bool {
        self.status == TodoStatus::Pending && self.remind_at.is_some_and(|at| at <= as_of)
    }
}

/// Fields supplied on creation; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub remind_at: Option<OffsetDateTime>,
}

/// Partial update. Identity fields (`id`, `userId`, `createdAt`) cannot be
/// expressed, and `updatedAt` is always set by the store.
///
/// For the nullable fields the outer `Option` means "present in the patch"
/// and the inner one is the new value, so `null` clears.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub status: Option<TodoStatus>,
    #[serde(default, deserialize_with = "present_rfc3339")]
    pub remind_at: Option<Option<OffsetDateTime>>,
}

impl TodoPatch {
    pub fn status(status: TodoStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, todo: &mut Todo) {
        if let Some(title) = self.title {
            todo.title = title;
        }
        if let Some(description) = self.description {
            todo.description = description;
        }
        if let Some(status) = self.status {
            todo.status = status;
        }
        if let Some(remind_at) = self.remind_at {
            todo.remind_at = remind_at;
        }
    }
}

fn present<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

fn present_rfc3339<'de, D>(d: D) -> Result<Option<Option<OffsetDateTime>>, D::Error>
where
    D: Deserializer<'de>,
{
    time::serde::rfc3339::option::deserialize(d).map(Some)
}
