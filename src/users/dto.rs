use serde::Deserialize;

/// Request body for user creation.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
}
