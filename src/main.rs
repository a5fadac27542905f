// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dotenvy::dotenv;
use medquiz::config::Config;
use medquiz::routes;
use medquiz::services::session;
use medquiz::state::AppState;
use medquiz::store::{MemoryStore, PgStore, QuizStore};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if present)
    dotenv().ok();

    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store: Arc<dyn QuizStore> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(store, config.clone());
    spawn_sweeper(&state);
    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically closes sessions left idle past the configured timeout and
/// forgets error logs nobody touched for as long.
fn spawn_sweeper(state: &AppState) {
    let store = state.store.clone();
    let diagnostics = state.diagnostics.clone();
    let idle_timeout = state.config.session_idle_timeout_secs;
    let period = Duration::from_secs(state.config.sweep_interval_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            if let Err(e) = session::sweep_stale_sessions(store.as_ref(), idle_timeout, now).await {
                tracing::error!("Session sweep failed: {:?}", e);
            }
            diagnostics
                .prune_idle(now - chrono::Duration::seconds(idle_timeout))
                .await;
        }
    });
}
