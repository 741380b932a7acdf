use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the user and todo services.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// Unreadable or ill-typed request bodies are bad input, same as a blank title.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<AppError> for (StatusCode, String) {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
            }
        }
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn maps_error_kinds_to_status_codes() {
        let (status, msg): (StatusCode, String) =
            AppError::Validation("Title is required".into()).into();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "Title is required");

        let (status, msg): (StatusCode, String) = AppError::NotFound("Todo not found".into()).into();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(msg, "Todo not found");

        let (status, msg): (StatusCode, String) =
            AppError::Store(anyhow::anyhow!("disk on fire")).into();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!msg.contains("disk"));
    }
}
