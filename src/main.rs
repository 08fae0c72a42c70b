use anyhow::Context;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use fin_health_server_rs::config::Config;
use fin_health_server_rs::database::Database;
use fin_health_server_rs::narrative::ChatCompletionClient;
use fin_health_server_rs::routes::{AppState, app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let db = Database::new(config.sqlite_path())
        .with_context(|| format!("Failed to initialize database at {}", config.sqlite_path()))?;
    let narrator = ChatCompletionClient::new(&config.llm)?;
    if config.llm.api_key.is_none() {
        info!("No LLM API key configured; reports will use the fallback analysis");
    } else {
        info!("Using completion model {} at {}", narrator.model(), config.llm.base_url);
    }

    let shared_state = Arc::new(AppState {
        store: Arc::new(Mutex::new(db)),
        narrator: Arc::new(narrator),
        upload_limit_bytes: config.upload_limit_bytes,
    });

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(shared_state)).await?;
    Ok(())
}
