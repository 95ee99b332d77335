//! Kaiten inbox server

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kaiten_inbox::config::Config;
use kaiten_inbox::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kaiten_inbox=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    let columns = config.workflow_config()?;
    tracing::info!(
        queue_column = columns.queue_column,
        assigned_column = columns.assigned_column,
        files_root = %config.files_root.display(),
        "Starting inbox"
    );

    let state = AppState::from_config(&config).await?;

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(config.cors_layer()?);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
