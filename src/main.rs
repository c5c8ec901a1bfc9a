use anyhow::Context;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod ids;
mod pagination;
mod state;
mod users;
mod validation;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "healthhub_users=debug,axum=info,tower_http=info".to_string());
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

    let config = AppConfig::from_env()?;
    let state = AppState::init(config).await?;

    if let Some(admin) = &state.config.admin {
        users::services::ensure_admin(&state, admin)
            .await
            .context("ensure bootstrap admin")?;
    }

    let config = state.config.clone();
    app::serve(app::build_app(state), &config).await
}
