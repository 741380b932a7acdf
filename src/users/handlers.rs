use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;
use crate::users::dto::CreateUserRequest;
use crate::users::repo_types::User;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), (StatusCode, String)> {
    let Json(payload) = payload.map_err(AppError::from)?;
    let user = state
        .users
        .create_user(&payload.email, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, (StatusCode, String)> {
    Ok(Json(state.users.get_user(&id).await?))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, (StatusCode, String)> {
    Ok(Json(state.users.list_users().await?))
}
