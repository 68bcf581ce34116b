use std::sync::Arc;

use anyhow::Context;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

use legaldocs::{
    auth::jwt::JwtService,
    config::AppConfig,
    db,
    notifications::{LogBroadcaster, NotificationBroadcaster},
    routes,
    seed::{self, SeedOutcome},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        free_documents_limit = config.free_documents_limit,
        admin_seeding = config.admin_email.is_some(),
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let applied = db::run_migrations(&pool)?;
    tracing::info!(applied, "database migrations up to date");

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let mut conn = pool.get().context("failed to get database connection")?;
        match seed::ensure_admin(&mut conn, email, password)? {
            SeedOutcome::Created(id) => tracing::info!(user_id = %id, "admin account created"),
            SeedOutcome::Updated(id) => tracing::info!(user_id = %id, "admin account promoted"),
            SeedOutcome::Unchanged(id) => tracing::debug!(user_id = %id, "admin account present"),
        }
    }

    let jwt = JwtService::from_config(&config)?;
    let broadcaster: Arc<dyn NotificationBroadcaster> = Arc::new(LogBroadcaster);
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(pool, config, broadcaster, jwt);
    let app = routes::create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("server received shutdown signal");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
