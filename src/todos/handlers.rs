use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;
use crate::todos::dto::CreateTodoRequest;
use crate::todos::repo_types::{Todo, TodoPatch};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", post(create_todo))
        .route(
            "/todos/:id",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
        .route("/todos/:id/complete", post(complete_todo))
        .route("/users/:id/todos", get(list_user_todos))
}

#[instrument(skip(state, payload))]
pub async fn create_todo(
    State(state): State<AppState>,
    payload: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<Todo>), (StatusCode, String)> {
    let Json(payload) = payload.map_err(AppError::from)?;
    let todo = state.todos.create_todo(payload).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/todos/{}", todo.id).parse::<HeaderValue>() {
        headers.insert(axum::http::header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(todo)))
}

#[instrument(skip(state))]
pub async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Todo>, (StatusCode, String)> {
    Ok(Json(state.todos.get_todo(&id).await?))
}

#[instrument(skip(state, patch))]
pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    patch: Result<Json<TodoPatch>, JsonRejection>,
) -> Result<Json<Todo>, (StatusCode, String)> {
    let Json(patch) = patch.map_err(AppError::from)?;
    Ok(Json(state.todos.update_todo(&id, patch).await?))
}

#[instrument(skip(state))]
pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.todos.delete_todo(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn complete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Todo>, (StatusCode, String)> {
    Ok(Json(state.todos.complete_todo(&id).await?))
}

#[instrument(skip(state))]
pub async fn list_user_todos(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Todo>>, (StatusCode, String)> {
    Ok(Json(state.todos.get_todos_by_user(&user_id).await?))
}
