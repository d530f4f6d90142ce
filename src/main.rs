use std::time::Duration;

mod app;
mod auth;
mod config;
mod error;
mod pages;
mod state;

use crate::config::SessionMode;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "authgate=debug,axum=info,tower_http=info".to_string());
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

    let state = AppState::init().await?;
    let addr = state.config.bind_addr()?;
    tracing::info!(
        mode = ?state.config.session_mode,
        env = ?state.config.environment,
        "configuration loaded"
    );

    if state.config.session_mode == SessionMode::Registry {
        spawn_session_sweeper(state.clone());
    }

    app::serve(app::build_app(state), addr).await
}

fn spawn_session_sweeper(state: AppState) {
    let period = Duration::from_secs(state.config.session_sweep_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            state.auth.sweep_sessions().await;
        }
    });
}
