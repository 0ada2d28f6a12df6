mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{Method, header::{AUTHORIZATION, CONTENT_TYPE}};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use bansos_api::auth;
use bansos_api::storage::{BucketStore, LocalStore, ObjectStore};
use bansos_api::{AppState, AppStateInner};
use bansos_db::rest::RestStore;
use bansos_db::sqlite::SqliteStore;
use bansos_db::{Database, Store};

use crate::config::{Backend, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bansos=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let (store, storage): (Store, Arc<dyn ObjectStore>) = match &config.backend {
        Backend::Local { db_path, upload_dir } => {
            let db = Database::open(db_path)
                .with_context(|| format!("opening database at {}", db_path.display()))?;
            let storage = LocalStore::new(upload_dir.clone())
                .await
                .with_context(|| format!("creating upload directory {}", upload_dir.display()))?;
            let storage: Arc<dyn ObjectStore> = Arc::new(storage);
            info!("Using local backend");
            (Store::new(SqliteStore::new(Arc::new(db))), storage)
        }
        Backend::Hosted(hosted) => {
            let client = reqwest::Client::builder()
                .user_agent(concat!("bansos/", env!("CARGO_PKG_VERSION")))
                .build()
                .context("building HTTP client")?;
            let storage = BucketStore::new(
                client.clone(),
                &hosted.url,
                &hosted.service_role_key,
                &hosted.bucket,
                hosted.signed_url_expiry_secs,
            );
            let storage: Arc<dyn ObjectStore> = Arc::new(storage);
            info!("Using hosted backend at {} (bucket {})", hosted.url, hosted.bucket);
            (Store::new(RestStore::new(client, &hosted.url, &hosted.service_role_key)), storage)
        }
    };

    if config.admin_password == "admin123" {
        warn!("BANSOS_ADMIN_PASSWORD is the default; change it before going live");
    }
    auth::seed_admin(&store, &config.admin_password)
        .await
        .context("seeding admin account")?;

    let state: AppState = Arc::new(AppStateInner {
        store,
        storage,
        jwt_secret: config.jwt_secret.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let app = bansos_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Bansos portal listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
