//! Server assembly: the adapter's route surface wrapped in the
//! fixed-order request pipeline, bound to a listener with graceful
//! shutdown.

use axum::Router;
use axum::http::{Method, header};
use axum::middleware::{from_fn, from_fn_with_state};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use xreg_core::pipeline::{self, AuthConfig};
use xreg_core::{EngineState, GatewayConfig, RegistryBackend, RegistryError, Result, adapter_router};
use xreg_maven::MavenAdapter;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub path_prefix: Option<String>,
    pub cache_dir: PathBuf,
    pub index_db: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            base_url: None,
            api_key: None,
            path_prefix: None,
            cache_dir: PathBuf::from("xreg-cache"),
            index_db: PathBuf::from("maven-index.db"),
        }
    }
}

/// Builds the complete app for one adapter: routes plus the pipeline in
/// its contractual order (normalization outermost, logging innermost).
pub fn build_app(adapter: Arc<MavenAdapter>, config: &ServerConfig) -> Router {
    let gateway = GatewayConfig {
        base_url: config.base_url.clone(),
        ..Default::default()
    };
    let model = Arc::new(adapter.model_document().clone());
    let backend: Arc<dyn RegistryBackend> = adapter;
    let state = EngineState::new(backend, model, gateway);

    let router = adapter_router(state);
    let router = match config.path_prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() && prefix != "/" => {
            Router::new().nest(prefix, router)
        }
        _ => router,
    };

    let auth = Arc::new(AuthConfig {
        api_key: config.api_key.clone(),
    });

    // Layers run top-down in reverse registration order; the last layer
    // added is the first to see a request.
    router
        .layer(from_fn(pipeline::trace_requests))
        .layer(from_fn_with_state(auth, pipeline::authenticate))
        .layer(cors_layer())
        .layer(from_fn(pipeline::conditional))
        .layer(from_fn(pipeline::negotiate))
        .layer(from_fn(pipeline::normalize_path))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_origin(Any)
        .expose_headers([header::LINK])
        .max_age(Duration::from_secs(24 * 60 * 60))
}

/// Binds and serves until ctrl-c.
pub async fn serve(app: Router, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RegistryError::Io(std::io::Error::other(format!("bind {addr}: {e}"))))?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| RegistryError::Io(std::io::Error::other(e.to_string())))?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}
