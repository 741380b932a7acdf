use time::OffsetDateTime;

mod app;
mod clock;
mod config;
mod error;
mod scheduler;
mod state;
mod todos;
mod users;

use crate::scheduler::Scheduler;
use crate::state::AppState;

const REMINDER_TASK: &str = "reminder-check";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "todo_reminder=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init()?;
    tracing::info!("stores and services initialized");

    let scheduler = Scheduler::new();
    let todos = app_state.todos.clone();
    scheduler.schedule_recurring(REMINDER_TASK, app_state.config.reminder_interval(), move || {
        let todos = todos.clone();
        async move {
            match todos.process_reminders(OffsetDateTime::now_utc()).await {
                Ok(0) => {}
                Ok(n) => tracing::info!(flagged = n, "reminder sweep"),
                Err(e) => tracing::error!(error = %e, "reminder sweep failed"),
            }
        }
    })?;

    let bind_addr = app_state.config.bind_addr();
    let router = app::build_app(app_state);
    app::serve(router, &bind_addr, shutdown_signal()).await?;

    scheduler.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
