use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use pv_manager::artifacts::DiskArtifactStore;
use pv_manager::auth::jwt::JwtService;
use pv_manager::config::AppConfig;
use pv_manager::db;
use pv_manager::mailer::{LogMailer, Mailer, SmtpMailer};
use pv_manager::routes::create_router;
use pv_manager::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        artifact_root = %config.artifact_root,
        smtp_configured = config.smtp_host.is_some(),
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let artifacts = Arc::new(DiskArtifactStore::new(config.artifact_root.clone()));
    let mailer: Arc<dyn Mailer> = match SmtpMailer::from_config(&config)? {
        Some(smtp) => Arc::new(smtp),
        None => {
            tracing::warn!("SMTP_HOST not set; outbound email will only be logged");
            Arc::new(LogMailer)
        }
    };
    let jwt = JwtService::from_config(&config)?;

    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;
    let state = AppState::new(pool, config, artifacts, mailer, jwt);
    let router = create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
