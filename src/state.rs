use crate::config::AppConfig;
use crate::todos::repo::{InMemoryTodoRepo, TodoRepo};
use crate::todos::services::TodoService;
use crate::users::repo::{InMemoryUserRepo, UserRepo};
use crate::users::services::UserService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: UserService,
    pub todos: TodoService,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let users = Arc::new(InMemoryUserRepo::new()) as Arc<dyn UserRepo>;
        let todos = Arc::new(InMemoryTodoRepo::new()) as Arc<dyn TodoRepo>;
        Ok(Self::from_parts(config, users, todos))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        todos: Arc<dyn TodoRepo>,
    ) -> Self {
        Self {
            config,
            users: UserService::new(users.clone()),
            todos: TodoService::new(todos, users),
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::from_parts(
            Arc::new(AppConfig::default()),
            Arc::new(InMemoryUserRepo::new()),
            Arc::new(InMemoryTodoRepo::new()),
        )
    }
}
