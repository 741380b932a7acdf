use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::users::repo::UserRepo;
use crate::users::repo_types::User;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepo>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepo>) -> Self {
        Self { users }
    }

    #[instrument(skip(self))]
    pub async fn create_user(&self, email: &str, name: &str) -> AppResult<User> {
        let email = email.trim().to_lowercase();
        let name = name.trim();

        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::Validation("Invalid email".into()));
        }
        if name.is_empty() {
            warn!("empty user name");
            return Err(AppError::Validation("Name is required".into()));
        }

        let user = self.users.create(&email, name).await?;
        info!(user_id = %user.id, email = %user.email, "user created");
        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> AppResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.users.find_all().await?)
    }
}
