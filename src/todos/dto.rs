use serde::Deserialize;

/// Request body for todo creation. Any `status` sent by the client is
/// ignored; new todos always start pending.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// RFC 3339 timestamp; blank means no reminder.
    #[serde(default)]
    pub remind_at: Option<String>,
}
