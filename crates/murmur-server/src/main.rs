use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use murmur_db::Database;
use murmur_server::config::ServerConfig;

const DEFAULT_LOG_FILTER: &str = concat!(
    "murmur=debug,murmur_server=debug,murmur_api=debug,",
    "murmur_gateway=debug,tower_http=debug"
);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let db = Arc::new(Database::open(&config.db_path)?);
    let state = murmur_server::build_state(db, &config);
    let app = murmur_server::app(state, &config);

    info!("Murmur server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
