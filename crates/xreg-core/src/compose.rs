//! Mounting adapters on a shared HTTP server.
//!
//! An adapter can serve standalone (registry root, capabilities, and model
//! at `/`) or mounted under a path prefix on an aggregator. When mounted,
//! the adapter's registry-root route is dropped in favor of the shared
//! root, and its group collection is served at the prefix root; the
//! aggregator publishes a merged model document.

use crate::flags::SPEC_VERSION;
use crate::model::RegistryModel;
use crate::routes::{EngineState, GatewayConfig, adapter_router};
use crate::shape;
use axum::Router;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// One adapter plus the prefix it mounts under.
#[derive(Clone)]
pub struct AdapterMount {
    pub path_prefix: String,
    pub state: EngineState,
}

#[derive(Clone)]
struct ComposedState {
    config: Arc<GatewayConfig>,
    mounts: Arc<Vec<AdapterMount>>,
    started_at: String,
}

/// Builds the shared app: aggregator root, merged model, and each
/// adapter's routes nested under its prefix.
pub fn compose(config: GatewayConfig, mounts: Vec<AdapterMount>) -> Router {
    let state = ComposedState {
        config: Arc::new(config),
        mounts: Arc::new(mounts),
        started_at: shape::now_rfc3339(),
    };

    let mut app = Router::new()
        .route("/", get(shared_root))
        .route("/model", get(merged_model))
        .with_state(state.clone());

    for mount in state.mounts.iter() {
        // The adapter's own root routes collide with the shared root; the
        // nested copy keeps the full tree reachable under the prefix.
        app = app.nest(&mount.path_prefix, adapter_router(mount.state.clone()));
    }
    app
}

async fn shared_root(
    State(state): State<ComposedState>,
    _uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    let base_url = effective_base_url(&state.config, &headers);

    let mut attrs = Map::new();
    attrs.insert("specversion".into(), json!(SPEC_VERSION));
    attrs.insert("registryid".into(), json!(state.config.registry_id));
    attrs.insert("name".into(), json!(state.config.registry_id));
    attrs.insert("description".into(), json!(state.config.description));
    attrs.insert("createdat".into(), json!(state.started_at));
    attrs.insert("modifiedat".into(), json!(state.started_at));
    shape::ensure_identity(&mut attrs, "/", &base_url);

    for mount in state.mounts.iter() {
        let names = mount.state.backend.names();
        // Group collections live at each adapter's prefix root.
        attrs.insert(
            format!("{}url", names.groups),
            json!(format!("{}/{}", mount.path_prefix, names.groups)),
        );
        if let Ok(groups) = mount.state.backend.groups().await {
            attrs.insert(format!("{}count", names.groups), json!(groups.len()));
        }
    }

    let mut body = Value::Object(attrs);
    shape::absolutize_urls(&mut body, &base_url);
    plain_json(&body)
}

async fn merged_model(State(state): State<ComposedState>) -> Response {
    let models: Vec<&RegistryModel> = state.mounts.iter().map(|m| &*m.state.model).collect();
    let merged = RegistryModel::merged(&models);
    plain_json(&merged)
}

fn effective_base_url(config: &GatewayConfig, headers: &HeaderMap) -> String {
    config.base_url.clone().unwrap_or_else(|| {
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        format!("http://{host}")
    })
}

fn plain_json(body: &Value) -> Response {
    let serialized = serde_json::to_vec(body).unwrap_or_default();
    let etag = shape::etag_for(&serialized);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, shape::XREGISTRY_CONTENT_TYPE)
        .header("X-XRegistry-SpecVersion", SPEC_VERSION)
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(axum::body::Body::from(serialized))
        .unwrap_or_default()
}
