//! BHAP Tracker API
//!
//! Tracks BHAP proposals from draft, through discussion and voting, to a
//! final status. Runs against PostgreSQL when DATABASE_URL is set and keeps
//! everything in memory otherwise.

mod auth;
mod bhap;
mod config;
mod error;
mod markdown;
mod models;
mod routes;
mod state;

use crate::auth::{hash_password, Role};
use crate::bhap::{BhapError, BhapStore, MemoryStore, NewUser, PgStore};
use crate::config::{BootstrapAdmin, DatabaseConfig, LogFormat, Settings};
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(settings.log_format);

    info!("🚀 Starting BHAP Tracker...");

    let store: Arc<dyn BhapStore> = match &settings.database {
        Some(db) => {
            let pool = init_database_pool(db).await?;
            info!("✅ Database pool created successfully");
            let store = PgStore::new(pool);
            store.ensure_schema().await?;
            Arc::new(store)
        }
        None => {
            warn!("⚠️  DATABASE_URL not set, BHAPs are kept in memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(admin) = &settings.bootstrap_admin {
        bootstrap_admin(store.as_ref(), admin).await?;
    }

    let state = Arc::new(AppState::new(store, settings.bhap.clone()));
    let app = create_router(state, &settings);

    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("📚 API Endpoints:");
    info!("   POST /api/auth/register        - Register new account");
    info!("   POST /api/auth/login           - Login with email/password");
    info!("   POST /api/auth/refresh         - Refresh access token");
    info!("   GET  /api/auth/me              - Get current user");
    info!("   GET  /api/bhaps                - List all BHAPs");
    info!("   POST /api/bhaps                - Create a draft BHAP");
    info!("   GET  /api/bhaps/{{id}}           - View a BHAP");
    info!("   PUT  /api/bhaps/{{id}}           - Edit a draft");
    info!("   POST /api/bhaps/{{id}}/status    - Change status");
    info!("   POST /api/bhaps/{{id}}/vote      - Cast a vote");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bhap_tracker=debug,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init(),
    }
}

/// Create the admin account from configuration unless it already exists
async fn bootstrap_admin(store: &dyn BhapStore, admin: &BootstrapAdmin) -> anyhow::Result<()> {
    let email = admin.email.trim().to_lowercase();
    let result = store
        .create_user(NewUser {
            email: email.clone(),
            password_hash: hash_password(&admin.password)?,
            first_name: "BHAP".to_string(),
            last_name: "Admin".to_string(),
            role: Role::Admin,
        })
        .await;

    match result {
        Ok(user) => info!("👤 Bootstrap admin {} created with id {}", email, user.id),
        Err(BhapError::EmailTaken(_)) => info!("👤 Bootstrap admin {} already exists", email),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Initialize database pool from the parsed DATABASE_URL
async fn init_database_pool(db: &DatabaseConfig) -> anyhow::Result<deadpool_postgres::Pool> {
    use deadpool_postgres::{Config, ManagerConfig, PoolConfig, RecyclingMethod, Runtime};

    let mut cfg = Config::new();
    cfg.host = Some(db.host.clone());
    cfg.port = Some(db.port);
    cfg.user = Some(db.user.clone());
    cfg.password = Some(db.password.clone());
    cfg.dbname = Some(db.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(db.max_pool_size));

    let pool = if db.use_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

        cfg.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| anyhow::anyhow!("Failed to create TLS pool: {}", e))?
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), tokio_postgres::NoTls)
            .map_err(|e| anyhow::anyhow!("Failed to create pool: {}", e))?
    };

    let client = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get pool connection: {}", e))?;
    client
        .query_one("SELECT 1 as ok", &[])
        .await
        .map_err(|e| anyhow::anyhow!("Failed to verify database connection: {}", e))?;

    info!("✅ Database connection successful (TLS: {})", db.use_tls);
    Ok(pool)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
