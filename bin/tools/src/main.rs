//! Line-oriented tool host.
//!
//! Reads one JSON request per line from stdin and writes one JSON response
//! per line to stdout. Logs go to stderr.

mod config;
mod tools;

use crate::config::ToolsConfig;
use crate::tools::ToolHost;
use flowwright_draft::{
    DraftBuilder, InMemorySessionStore, NatsSessionStore, NatsStoreConfig, SessionStore,
    StoreBackend,
};
use flowwright_platform::{HttpPlatformClient, WorkflowPlatform};
use flowwright_schema::KnowledgeBase;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from environment
    let config = ToolsConfig::from_env()?;
    tracing::info!(platform = %config.platform.base_url, "Loaded configuration");

    let platform: Arc<dyn WorkflowPlatform> =
        Arc::new(HttpPlatformClient::new(&config.platform).map_err(|e| e.to_string())?);

    let store: Arc<dyn SessionStore> = match config.session.backend {
        StoreBackend::Memory => {
            let store = InMemorySessionStore::new(config.session.retention());
            store.spawn_sweeper(config.session.sweep_interval());
            Arc::new(store)
        }
        StoreBackend::Nats => {
            let url = config
                .session
                .nats_url
                .clone()
                .ok_or("session.nats_url is required for the nats backend")?;
            let mut nats = NatsStoreConfig::new(
                url,
                config.session.entry_max_age(config.builder.ttl()),
            );
            nats.bucket_name = Some(config.session.nats_bucket.clone());
            tracing::info!(bucket = %config.session.nats_bucket, "Connecting to NATS session store");
            Arc::new(NatsSessionStore::connect(&nats).await?)
        }
    };

    let knowledge = Arc::new(KnowledgeBase::builtin());
    let builder = DraftBuilder::new(store, platform.clone(), knowledge.clone(), config.builder);
    let host = ToolHost::new(builder, platform, knowledge);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    tracing::info!("Tool host ready");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = host.handle_line(&line).await;
                let mut encoded = serde_json::to_vec(&response)?;
                encoded.push(b'\n');
                stdout.write_all(&encoded).await?;
                stdout.flush().await?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
