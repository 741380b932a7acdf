use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// User record held by the user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,      // store-assigned, `user-<n>`
    pub email: String,
    pub name: String,    // display name
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
