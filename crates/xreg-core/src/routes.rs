//! The xRegistry route surface, generic over a [`RegistryBackend`].
//!
//! Eleven GET routes per adapter: registry root, capabilities, model,
//! group collection/detail, resource collection/detail, meta, doc,
//! version collection/detail. Handlers assemble plain JSON bodies, hand
//! them to the flag engine, and emit the standard header set.

use crate::backend::{RegistryBackend, ResourcePage, ResourceQuery};
use crate::error::{RegistryError, Result};
use crate::flags::{EntityKind, Flags, SPEC_VERSION};
use crate::model::RegistryModel;
use crate::pagination::{self, Page};
use crate::problem::Problem;
use crate::shape;
use axum::Router;
use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Resource collections are index-backed and potentially huge; listings
/// without an explicit `limit` get this page size.
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Gateway-level configuration shared by all handlers.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Overrides the base URL derived from the request's Host header.
    pub base_url: Option<String>,
    pub registry_id: String,
    pub description: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            registry_id: "xregistry-gateway".to_string(),
            description: "Read-only xRegistry federation gateway".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct EngineState {
    pub backend: Arc<dyn RegistryBackend>,
    pub model: Arc<RegistryModel>,
    pub config: Arc<GatewayConfig>,
    /// Registry-root creation instant, fixed for the process lifetime.
    pub started_at: String,
}

impl EngineState {
    pub fn new(
        backend: Arc<dyn RegistryBackend>,
        model: Arc<RegistryModel>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            backend,
            model,
            config: Arc::new(config),
            started_at: shape::now_rfc3339(),
        }
    }
}

/// Builds the adapter's route table. The caller layers the pipeline on top.
pub fn adapter_router(state: EngineState) -> Router {
    let names = state.backend.names().clone();
    let gt = &names.groups;
    let rt = &names.resources;

    Router::new()
        .route("/", get(registry_root))
        .route("/capabilities", get(capabilities))
        .route("/model", get(model_doc))
        .route(&format!("/{gt}"), get(group_collection))
        .route(&format!("/{gt}/{{gid}}"), get(group_detail))
        .route(&format!("/{gt}/{{gid}}/{rt}"), get(resource_collection))
        .route(&format!("/{gt}/{{gid}}/{rt}/{{rid}}"), get(resource_detail))
        .route(&format!("/{gt}/{{gid}}/{rt}/{{rid}}/meta"), get(resource_meta))
        .route(&format!("/{gt}/{{gid}}/{rt}/{{rid}}/doc"), get(resource_doc))
        .route(
            &format!("/{gt}/{{gid}}/{rt}/{{rid}}/versions"),
            get(version_collection),
        )
        .route(
            &format!("/{gt}/{{gid}}/{rt}/{{rid}}/versions/{{vid}}"),
            get(version_detail),
        )
        .with_state(state)
}

/// Per-request view: effective base URL, original path, parsed flags.
struct RequestCtx {
    base_url: String,
    path: String,
    query: Option<String>,
    flags: Flags,
    warnings: Vec<String>,
}

impl RequestCtx {
    fn new(state: &EngineState, uri: &OriginalUri, headers: &HeaderMap) -> Result<Self> {
        let flags = Flags::parse(uri.0.query())?;
        let base_url = state.config.base_url.clone().unwrap_or_else(|| {
            let host = headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("localhost");
            format!("http://{host}")
        });
        Ok(Self {
            base_url,
            path: uri.0.path().to_string(),
            query: uri.0.query().map(str::to_string),
            flags,
            warnings: Vec::new(),
        })
    }
}

// Handlers

async fn registry_root(
    State(state): State<EngineState>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    let mut ctx = match RequestCtx::new(&state, &uri, &headers) {
        Ok(ctx) => ctx,
        Err(err) => return problem(&err, uri.0.path()),
    };

    let names = state.backend.names();
    let groups = match state.backend.groups().await {
        Ok(groups) => groups,
        Err(err) => return problem(&err, &ctx.path),
    };

    let mut attrs = Map::new();
    attrs.insert("specversion".into(), json!(SPEC_VERSION));
    attrs.insert("registryid".into(), json!(state.config.registry_id));
    attrs.insert("name".into(), json!(state.config.registry_id));
    attrs.insert("description".into(), json!(state.config.description));
    attrs.insert("createdat".into(), json!(state.started_at));
    attrs.insert("modifiedat".into(), json!(state.started_at));
    shape::ensure_identity(&mut attrs, "/", &ctx.base_url);
    attrs.insert(format!("{}url", names.groups), json!(format!("/{}", names.groups)));
    attrs.insert(format!("{}count", names.groups), json!(groups.len()));

    if ctx.flags.inline.wants("model") {
        attrs.insert("model".into(), state.model.document().clone());
    }
    if ctx.flags.inline.wants("capabilities") {
        attrs.insert("capabilities".into(), capabilities_doc(&state));
    }

    respond_entity(&state, &mut ctx, Value::Object(attrs), EntityKind::Registry)
}

async fn capabilities(
    State(state): State<EngineState>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    let mut ctx = match RequestCtx::new(&state, &uri, &headers) {
        Ok(ctx) => ctx,
        Err(err) => return problem(&err, uri.0.path()),
    };
    let mut body = capabilities_doc(&state);
    shape::absolutize_urls(&mut body, &ctx.base_url);
    finalize(&state, &mut ctx, &body, None)
}

async fn model_doc(
    State(state): State<EngineState>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    let mut ctx = match RequestCtx::new(&state, &uri, &headers) {
        Ok(ctx) => ctx,
        Err(err) => return problem(&err, uri.0.path()),
    };
    let body = state.model.document().clone();
    finalize(&state, &mut ctx, &body, None)
}

async fn group_collection(
    State(state): State<EngineState>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    let mut ctx = match RequestCtx::new(&state, &uri, &headers) {
        Ok(ctx) => ctx,
        Err(err) => return problem(&err, uri.0.path()),
    };
    let names = state.backend.names().clone();

    let groups = match state.backend.groups().await {
        Ok(groups) => groups,
        Err(err) => return problem(&err, &ctx.path),
    };

    let entries: Vec<(String, Map<String, Value>)> = groups
        .into_iter()
        .map(|doc| (doc.id.clone(), doc.attrs))
        .collect();
    let (page, total) = crate::flags::apply_collection(
        &ctx.flags,
        entries,
        state.backend.attribute_schema(),
        &mut ctx.warnings,
    );

    let mut body = Map::new();
    let returned = page.len();
    for (gid, mut attrs) in page {
        let xid = shape::xid(&[&names.groups, &gid]);
        shape::ensure_identity(&mut attrs, &xid, &ctx.base_url);
        attach_group_urls(&mut attrs, &xid, &names.resources);
        if ctx.flags.inline.wants(&names.resources) {
            if let Ok(inlined) =
                inline_resources(&state, &mut ctx, &gid, &names.resources).await
            {
                attrs.insert(names.resources.clone(), inlined);
            }
        }
        let mut value = Value::Object(attrs);
        apply_entry_flags(&ctx.flags, &mut value, EntityKind::Group, &mut ctx.warnings);
        body.insert(sanitize_key(&gid), value);
    }

    let links = ctx.flags.limit.and_then(|limit| {
        pagination::link_header(
            &ctx.path,
            ctx.query.as_deref(),
            Page {
                total,
                limit,
                offset: ctx.flags.offset,
                returned,
            },
        )
    });
    respond_collection(&state, &mut ctx, body, total, links)
}

async fn group_detail(
    State(state): State<EngineState>,
    uri: OriginalUri,
    headers: HeaderMap,
    Path(gid): Path<String>,
) -> Response {
    let mut ctx = match RequestCtx::new(&state, &uri, &headers) {
        Ok(ctx) => ctx,
        Err(err) => return problem(&err, uri.0.path()),
    };
    let names = state.backend.names().clone();

    let doc = match state.backend.group(&gid).await {
        Ok(doc) => doc,
        Err(err) => return problem(&err, &ctx.path),
    };

    let mut attrs = doc.attrs;
    let xid = shape::xid(&[&names.groups, &doc.id]);
    shape::ensure_identity(&mut attrs, &xid, &ctx.base_url);
    attach_group_urls(&mut attrs, &xid, &names.resources);

    if ctx.flags.inline.wants(&names.resources)
        && let Ok(inlined) = inline_resources(&state, &mut ctx, &doc.id, &names.resources).await
    {
        attrs.insert(names.resources.clone(), inlined);
    }

    respond_entity(&state, &mut ctx, Value::Object(attrs), EntityKind::Group)
}

async fn resource_collection(
    State(state): State<EngineState>,
    uri: OriginalUri,
    headers: HeaderMap,
    Path(gid): Path<String>,
) -> Response {
    let mut ctx = match RequestCtx::new(&state, &uri, &headers) {
        Ok(ctx) => ctx,
        Err(err) => return problem(&err, uri.0.path()),
    };
    let names = state.backend.names().clone();

    if let Err(err) = state.backend.group(&gid).await {
        return problem(&err, &ctx.path);
    }

    let limit = ctx.flags.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let sort = ctx.flags.effective_sort();
    let query = ResourceQuery {
        filter: ctx.flags.filter.clone(),
        limit,
        offset: ctx.flags.offset,
        sort_by: Some(sort.attr),
        sort_desc: sort.descending,
    };

    let ResourcePage { entries, total } = match state.backend.resources(&gid, &query).await {
        Ok(page) => page,
        Err(err) => return problem(&err, &ctx.path),
    };

    if ctx.flags.offset > 0 && entries.is_empty() && total > 0 {
        ctx.warnings.push(format!(
            "offset {} is beyond the end of the collection ({total} entries)",
            ctx.flags.offset
        ));
    }

    let mut body = Map::new();
    let returned = entries.len();
    for doc in entries {
        let xid = shape::xid(&[&names.groups, &gid, &names.resources, &doc.id]);
        let mut attrs = doc.attrs;
        shape::ensure_identity(&mut attrs, &xid, &ctx.base_url);
        attach_resource_urls(&mut attrs, &xid);
        let mut value = Value::Object(attrs);
        apply_entry_flags(&ctx.flags, &mut value, EntityKind::Resource, &mut ctx.warnings);
        body.insert(sanitize_key(&doc.id), value);
    }

    let links = pagination::link_header(
        &ctx.path,
        ctx.query.as_deref(),
        Page {
            total: total as usize,
            limit,
            offset: ctx.flags.offset,
            returned,
        },
    );
    respond_collection(&state, &mut ctx, body, total as usize, links)
}

async fn resource_detail(
    State(state): State<EngineState>,
    uri: OriginalUri,
    headers: HeaderMap,
    Path((gid, rid)): Path<(String, String)>,
) -> Response {
    let mut ctx = match RequestCtx::new(&state, &uri, &headers) {
        Ok(ctx) => ctx,
        Err(err) => return problem(&err, uri.0.path()),
    };
    let names = state.backend.names().clone();

    let doc = match state.backend.resource(&gid, &rid).await {
        Ok(doc) => doc,
        Err(err) => return problem(&err, &ctx.path),
    };

    let xid = shape::xid(&[&names.groups, &gid, &names.resources, &doc.id]);
    let mut attrs = doc.attrs;
    shape::ensure_identity(&mut attrs, &xid, &ctx.base_url);
    attach_resource_urls(&mut attrs, &xid);

    if !attrs.contains_key("versionscount") {
        let count = state
            .backend
            .versions(&gid, &rid)
            .await
            .map(|v| v.len())
            .unwrap_or(0);
        attrs.insert("versionscount".into(), json!(count));
    }

    if ctx.flags.inline.wants("meta") {
        match meta_object(&state, &ctx, &gid, &doc.id, &xid).await {
            Ok(meta) => {
                // Inlining substitutes the reference with the object itself.
                attrs.remove("metaurl");
                attrs.insert("meta".into(), meta);
            }
            Err(err) => return problem(&err, &ctx.path),
        }
    }

    respond_entity(&state, &mut ctx, Value::Object(attrs), EntityKind::Resource)
}

async fn resource_meta(
    State(state): State<EngineState>,
    uri: OriginalUri,
    headers: HeaderMap,
    Path((gid, rid)): Path<(String, String)>,
) -> Response {
    let mut ctx = match RequestCtx::new(&state, &uri, &headers) {
        Ok(ctx) => ctx,
        Err(err) => return problem(&err, uri.0.path()),
    };
    let names = state.backend.names().clone();

    let doc = match state.backend.resource(&gid, &rid).await {
        Ok(doc) => doc,
        Err(err) => return problem(&err, &ctx.path),
    };
    let resource_xid = shape::xid(&[&names.groups, &gid, &names.resources, &doc.id]);

    let meta = match meta_object(&state, &ctx, &gid, &doc.id, &resource_xid).await {
        Ok(meta) => meta,
        Err(err) => return problem(&err, &ctx.path),
    };

    respond_entity(&state, &mut ctx, meta, EntityKind::Meta)
}

async fn resource_doc(
    State(state): State<EngineState>,
    uri: OriginalUri,
    headers: HeaderMap,
    Path((gid, rid)): Path<(String, String)>,
) -> Response {
    let ctx = match RequestCtx::new(&state, &uri, &headers) {
        Ok(ctx) => ctx,
        Err(err) => return problem(&err, uri.0.path()),
    };

    let doc = match state.backend.resource(&gid, &rid).await {
        Ok(doc) => doc,
        Err(err) => return problem(&err, &ctx.path),
    };

    if let Some(docs) = doc.attrs.get("docs").and_then(Value::as_str) {
        return Redirect::temporary(docs).into_response();
    }
    if let Some(description) = doc.attrs.get("description").and_then(Value::as_str) {
        return (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            description.to_string(),
        )
            .into_response();
    }
    problem(
        &RegistryError::not_found("document for resource", &rid),
        &ctx.path,
    )
}

async fn version_collection(
    State(state): State<EngineState>,
    uri: OriginalUri,
    headers: HeaderMap,
    Path((gid, rid)): Path<(String, String)>,
) -> Response {
    let mut ctx = match RequestCtx::new(&state, &uri, &headers) {
        Ok(ctx) => ctx,
        Err(err) => return problem(&err, uri.0.path()),
    };
    let names = state.backend.names().clone();

    let versions = match state.backend.versions(&gid, &rid).await {
        Ok(versions) => versions,
        Err(err) => return problem(&err, &ctx.path),
    };

    let entries: Vec<(String, Map<String, Value>)> = versions
        .into_iter()
        .map(|vid| {
            let mut attrs = Map::new();
            attrs.insert("name".into(), json!(vid));
            attrs.insert("versionid".into(), json!(vid));
            (vid, attrs)
        })
        .collect();
    let (page, total) = crate::flags::apply_collection(
        &ctx.flags,
        entries,
        state.backend.attribute_schema(),
        &mut ctx.warnings,
    );

    let mut body = Map::new();
    let returned = page.len();
    for (vid, mut attrs) in page {
        let xid = shape::xid(&[&names.groups, &gid, &names.resources, &rid, "versions", &vid]);
        shape::ensure_identity(&mut attrs, &xid, &ctx.base_url);
        let mut value = Value::Object(attrs);
        apply_entry_flags(&ctx.flags, &mut value, EntityKind::Version, &mut ctx.warnings);
        body.insert(sanitize_key(&vid), value);
    }

    let links = ctx.flags.limit.and_then(|limit| {
        pagination::link_header(
            &ctx.path,
            ctx.query.as_deref(),
            Page {
                total,
                limit,
                offset: ctx.flags.offset,
                returned,
            },
        )
    });
    respond_collection(&state, &mut ctx, body, total, links)
}

async fn version_detail(
    State(state): State<EngineState>,
    uri: OriginalUri,
    headers: HeaderMap,
    Path((gid, rid, vid)): Path<(String, String, String)>,
) -> Response {
    let mut ctx = match RequestCtx::new(&state, &uri, &headers) {
        Ok(ctx) => ctx,
        Err(err) => return problem(&err, uri.0.path()),
    };
    let names = state.backend.names().clone();

    let doc = match state.backend.version(&gid, &rid, &vid).await {
        Ok(doc) => doc,
        Err(err) => return problem(&err, &ctx.path),
    };

    let xid = shape::xid(&[&names.groups, &gid, &names.resources, &rid, "versions", &doc.id]);
    let mut attrs = doc.attrs;
    shape::ensure_identity(&mut attrs, &xid, &ctx.base_url);

    respond_entity(&state, &mut ctx, Value::Object(attrs), EntityKind::Version)
}

// Shared helpers

fn attach_group_urls(attrs: &mut Map<String, Value>, group_xid: &str, resources_name: &str) {
    attrs.insert(
        format!("{resources_name}url"),
        json!(format!("{group_xid}/{resources_name}")),
    );
}

fn attach_resource_urls(attrs: &mut Map<String, Value>, resource_xid: &str) {
    attrs.insert("versionsurl".into(), json!(format!("{resource_xid}/versions")));
    attrs.insert("metaurl".into(), json!(format!("{resource_xid}/meta")));
}

async fn meta_object(
    state: &EngineState,
    ctx: &RequestCtx,
    gid: &str,
    rid: &str,
    resource_xid: &str,
) -> Result<Value> {
    let default_version = state.backend.default_version(gid, rid).await?;
    let mut attrs = Map::new();
    attrs.insert("defaultversionid".into(), json!(default_version));
    attrs.insert(
        "defaultversionurl".into(),
        json!(format!(
            "{resource_xid}/versions/{}",
            shape::encode_segment(&default_version)
        )),
    );
    attrs.insert("defaultversionsticky".into(), json!(false));
    attrs.insert("readonly".into(), json!(true));
    attrs.insert("compatibility".into(), json!("none"));
    let xid = format!("{resource_xid}/meta");
    shape::ensure_identity(&mut attrs, &xid, &ctx.base_url);
    Ok(Value::Object(attrs))
}

async fn inline_resources(
    state: &EngineState,
    ctx: &mut RequestCtx,
    gid: &str,
    resources_name: &str,
) -> Result<Value> {
    let names = state.backend.names().clone();
    let page = state
        .backend
        .resources(
            gid,
            &ResourceQuery {
                limit: DEFAULT_PAGE_LIMIT,
                ..Default::default()
            },
        )
        .await?;

    let mut body = Map::new();
    for doc in page.entries {
        let xid = shape::xid(&[&names.groups, gid, resources_name, &doc.id]);
        let mut attrs = doc.attrs;
        shape::ensure_identity(&mut attrs, &xid, &ctx.base_url);
        attach_resource_urls(&mut attrs, &xid);
        body.insert(sanitize_key(&doc.id), Value::Object(attrs));
    }
    Ok(Value::Object(body))
}

/// Strips per-entry attributes in collection listings. Request-level
/// warnings (epoch, specversion) are handled once, not per entry.
fn apply_entry_flags(
    flags: &Flags,
    value: &mut Value,
    kind: EntityKind,
    warnings: &mut Vec<String>,
) {
    let mut entry_flags = flags.clone();
    entry_flags.epoch = None;
    entry_flags.specversion = None;
    crate::flags::apply_entity(&entry_flags, value, kind, warnings);
}

fn capabilities_doc(state: &EngineState) -> Value {
    let names = state.backend.names();
    json!({
        "self": "/capabilities",
        "flags": [
            "collections", "doc", "epoch", "filter", "inline", "limit",
            "noepoch", "noreadonly", "offset", "schema", "sort", "specversion"
        ],
        "mutable": [],
        "pagination": true,
        "schemas": ["xRegistry-json/1.0-rc1"],
        "specversions": [SPEC_VERSION],
        "apis": [
            "/", "/capabilities", "/model",
            format!("/{}", names.groups),
            format!("/{}/:gid", names.groups),
            format!("/{}/:gid/{}", names.groups, names.resources),
            format!("/{}/:gid/{}/:rid", names.groups, names.resources),
            format!("/{}/:gid/{}/:rid/meta", names.groups, names.resources),
            format!("/{}/:gid/{}/:rid/doc", names.groups, names.resources),
            format!("/{}/:gid/{}/:rid/versions", names.groups, names.resources),
            format!("/{}/:gid/{}/:rid/versions/:vid", names.groups, names.resources),
        ],
    })
}

/// Collection map keys must stay inside the xid character set.
fn sanitize_key(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn respond_entity(
    state: &EngineState,
    ctx: &mut RequestCtx,
    mut body: Value,
    kind: EntityKind,
) -> Response {
    crate::flags::apply_entity(&ctx.flags, &mut body, kind, &mut ctx.warnings);
    shape::absolutize_urls(&mut body, &ctx.base_url);
    finalize(state, ctx, &body, None)
}

fn respond_collection(
    state: &EngineState,
    ctx: &mut RequestCtx,
    body: Map<String, Value>,
    _total: usize,
    links: Option<String>,
) -> Response {
    // Epoch and specversion mismatches warn once per request.
    if let Some(requested) = ctx.flags.epoch
        && requested != 1
    {
        ctx.warnings
            .push(format!("epoch {requested} is not available, serving epoch 1"));
    }
    if let Some(requested) = &ctx.flags.specversion
        && requested != SPEC_VERSION
    {
        ctx.warnings.push(format!(
            "specversion {requested} is not supported, serving {SPEC_VERSION}"
        ));
    }

    let mut body = Value::Object(body);
    shape::absolutize_urls(&mut body, &ctx.base_url);
    finalize(state, ctx, &body, links)
}

fn finalize(
    _state: &EngineState,
    ctx: &mut RequestCtx,
    body: &Value,
    links: Option<String>,
) -> Response {
    let serialized = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(err) => {
            return problem(&RegistryError::Json(err), &ctx.path);
        }
    };
    let etag = shape::etag_for(&serialized);

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, shape::XREGISTRY_CONTENT_TYPE)
        .header("X-XRegistry-SpecVersion", SPEC_VERSION)
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, "no-cache");

    if let Some(epoch) = body.get("epoch").and_then(Value::as_u64) {
        response = response.header("X-XRegistry-Epoch", epoch.to_string());
    }
    if let Some(last_modified) = shape::last_modified(body) {
        response = response.header(header::LAST_MODIFIED, last_modified);
    }
    if let Some(links) = links {
        response = response.header(header::LINK, links);
    }

    let mut response = response
        .body(axum::body::Body::from(serialized))
        .unwrap_or_default();
    for warning in &ctx.warnings {
        let value = format!("299 - \"{}\"", warning.replace('"', "'"));
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().append(header::WARNING, value);
        }
    }
    response
}

fn problem(err: &RegistryError, instance: &str) -> Response {
    tracing::debug!(error = %err, instance, "request failed");
    Problem::from_error(err, instance).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EntityDoc;
    use crate::backend::AttrSpec;
    use crate::flags::FilterTerm;
    use crate::model::TypeNames;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct StubBackend {
        names: TypeNames,
        model: Value,
    }

    impl StubBackend {
        fn new() -> Self {
            Self {
                names: TypeNames::new("javaregistries", "javaregistry", "packages", "package"),
                model: json!({"groups": {"javaregistries": {}}}),
            }
        }

        fn fixture() -> Vec<(&'static str, &'static str)> {
            vec![
                ("org.junit", "junit"),
                ("junit", "junit"),
                ("io.grpc", "grpc-core"),
            ]
        }
    }

    #[async_trait]
    impl RegistryBackend for StubBackend {
        fn names(&self) -> &TypeNames {
            &self.names
        }

        fn model(&self) -> &Value {
            &self.model
        }

        fn attribute_schema(&self) -> &[AttrSpec] {
            &[]
        }

        async fn groups(&self) -> Result<Vec<EntityDoc>> {
            Ok(vec![
                EntityDoc::new("maven-central").with("name", "Maven Central"),
            ])
        }

        async fn group(&self, gid: &str) -> Result<EntityDoc> {
            if gid == "maven-central" {
                Ok(EntityDoc::new("maven-central").with("name", "Maven Central"))
            } else {
                Err(RegistryError::not_found("group", gid))
            }
        }

        async fn resources(&self, _gid: &str, query: &ResourceQuery) -> Result<ResourcePage> {
            let mut all: Vec<EntityDoc> = Self::fixture()
                .into_iter()
                .map(|(g, a)| {
                    EntityDoc::new(format!("{g}:{a}"))
                        .with("name", format!("{g}:{a}"))
                        .with("groupId", g)
                        .with("artifactId", a)
                })
                .collect();

            for term in &query.filter {
                match term {
                    FilterTerm::Text(text) => {
                        all.retain(|d| d.id.contains(text.as_str()));
                    }
                    FilterTerm::Eq { key, value } => {
                        all.retain(|d| d.attrs.get(key).and_then(Value::as_str) == Some(value));
                    }
                }
            }
            all.sort_by(|a, b| a.id.cmp(&b.id));
            let total = all.len() as u64;
            let entries = all
                .into_iter()
                .skip(query.offset)
                .take(query.limit)
                .collect();
            Ok(ResourcePage { entries, total })
        }

        async fn resource(&self, _gid: &str, rid: &str) -> Result<EntityDoc> {
            let found = Self::fixture()
                .into_iter()
                .find(|(g, a)| format!("{g}:{a}") == rid);
            match found {
                Some((g, a)) => Ok(EntityDoc::new(rid)
                    .with("name", rid)
                    .with("groupId", g)
                    .with("artifactId", a)
                    .with("versionscount", 2)),
                None => Err(RegistryError::not_found("package", rid)),
            }
        }

        async fn versions(&self, _gid: &str, _rid: &str) -> Result<Vec<String>> {
            Ok(vec!["4.12".to_string(), "4.13.2".to_string()])
        }

        async fn version(&self, _gid: &str, rid: &str, vid: &str) -> Result<EntityDoc> {
            if vid == "4.12" || vid == "4.13.2" {
                Ok(EntityDoc::new(vid).with("name", rid).with("version", vid))
            } else {
                Err(RegistryError::not_found("version", vid))
            }
        }

        async fn default_version(&self, _gid: &str, _rid: &str) -> Result<String> {
            Ok("4.13.2".to_string())
        }
    }

    fn app() -> Router {
        let backend = Arc::new(StubBackend::new());
        let model = Arc::new(
            RegistryModel::load(
                r#"{"groups": {"javaregistries": {"plural": "javaregistries"}}}"#,
                backend.names(),
            )
            .unwrap(),
        );
        adapter_router(EngineState::new(backend, model, GatewayConfig::default()))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, HeaderMap, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    #[tokio::test]
    async fn test_registry_root() {
        let (status, headers, body) = get_json(app(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["xid"], "/");
        assert_eq!(body["epoch"], 1);
        assert_eq!(body["specversion"], SPEC_VERSION);
        assert_eq!(body["javaregistriescount"], 1);
        assert!(body["self"].as_str().unwrap().starts_with("http://"));
        assert!(headers.contains_key(header::ETAG));
        assert_eq!(headers.get("X-XRegistry-SpecVersion").unwrap(), SPEC_VERSION);
        assert!(
            headers
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .contains("xRegistry-json")
        );
    }

    #[tokio::test]
    async fn test_group_collection_and_detail() {
        let (status, _, body) = get_json(app(), "/javaregistries").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["maven-central"].is_object());
        assert_eq!(
            body["maven-central"]["xid"],
            "/javaregistries/maven-central"
        );

        let (status, _, body) = get_json(app(), "/javaregistries/maven-central").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Maven Central");
        assert!(
            body["packagesurl"]
                .as_str()
                .unwrap()
                .ends_with("/javaregistries/maven-central/packages")
        );
    }

    #[tokio::test]
    async fn test_group_not_found_problem() {
        let (status, _, body) = get_json(app(), "/javaregistries/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["type"].as_str().unwrap().contains("not_found"));
        assert_eq!(body["instance"], "/javaregistries/nope");
    }

    #[tokio::test]
    async fn test_resource_collection_paging_and_links() {
        let (status, headers, body) = get_json(
            app(),
            "/javaregistries/maven-central/packages?limit=2&offset=0&filter=junit",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_object().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains_key("junit:junit"));
        assert!(entries.contains_key("org.junit:junit"));

        let link = headers.get(header::LINK).unwrap().to_str().unwrap();
        assert!(link.contains("rel=\"first\""));
        assert!(link.contains("rel=\"next\""));
        assert!(link.contains("rel=\"last\""));
        assert!(link.contains("count=\"2\""));
        assert!(link.contains("per-page=\"2\""));
        assert!(link.contains("filter=junit"));
    }

    #[tokio::test]
    async fn test_resource_detail_identity() {
        let (status, _, body) =
            get_json(app(), "/javaregistries/maven-central/packages/junit:junit").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["groupId"], "junit");
        assert_eq!(body["artifactId"], "junit");
        assert_eq!(
            body["xid"],
            "/javaregistries/maven-central/packages/junit:junit"
        );
        let self_url = body["self"].as_str().unwrap();
        assert!(self_url.ends_with("/javaregistries/maven-central/packages/junit:junit"));
        assert!(body["versionsurl"].as_str().unwrap().ends_with("/versions"));
        assert_eq!(body["versionscount"], 2);
    }

    #[tokio::test]
    async fn test_resource_meta_inline() {
        let (status, _, body) = get_json(
            app(),
            "/javaregistries/maven-central/packages/junit:junit?inline=meta",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let meta = &body["meta"];
        assert_eq!(meta["defaultversionid"], "4.13.2");
        assert_eq!(meta["readonly"], true);
        assert_eq!(meta["compatibility"], "none");
        assert!(meta["xid"].as_str().unwrap().ends_with("/meta"));
        assert!(body.get("metaurl").is_none());
    }

    #[tokio::test]
    async fn test_meta_endpoint() {
        let (status, _, body) = get_json(
            app(),
            "/javaregistries/maven-central/packages/junit:junit/meta",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["readonly"], true);
        assert_eq!(
            body["xid"],
            "/javaregistries/maven-central/packages/junit:junit/meta"
        );
        assert!(
            body["defaultversionurl"]
                .as_str()
                .unwrap()
                .ends_with("/versions/4.13.2")
        );
    }

    #[tokio::test]
    async fn test_version_collection_and_detail() {
        let (status, _, body) = get_json(
            app(),
            "/javaregistries/maven-central/packages/junit:junit/versions",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_object().unwrap().len(), 2);
        assert_eq!(
            body["4.13.2"]["xid"],
            "/javaregistries/maven-central/packages/junit:junit/versions/4.13.2"
        );

        let (status, _, body) = get_json(
            app(),
            "/javaregistries/maven-central/packages/junit:junit/versions/4.12",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], "4.12");
    }

    #[tokio::test]
    async fn test_model_endpoint() {
        let (status, _, body) = get_json(app(), "/model").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["groups"]["javaregistries"].is_object());
    }

    #[tokio::test]
    async fn test_capabilities_endpoint() {
        let (status, _, body) = get_json(app(), "/capabilities").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["flags"].as_array().unwrap().iter().any(|f| f == "inline"));
        assert_eq!(body["pagination"], true);
    }

    #[tokio::test]
    async fn test_invalid_limit_is_400() {
        let (status, _, body) =
            get_json(app(), "/javaregistries/maven-central/packages?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["type"].as_str().unwrap().contains("invalid_data"));
    }

    #[tokio::test]
    async fn test_offset_beyond_end_warns() {
        let (status, headers, body) = get_json(
            app(),
            "/javaregistries/maven-central/packages?limit=2&offset=50",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_object().unwrap().is_empty());
        assert!(headers.contains_key(header::WARNING));
    }

    #[tokio::test]
    async fn test_noepoch_strips_epoch() {
        let (_, headers, body) = get_json(app(), "/?noepoch=true").await;
        assert!(body.get("epoch").is_none());
        assert!(!headers.contains_key("X-XRegistry-Epoch"));
    }

    #[tokio::test]
    async fn test_doc_endpoint_falls_back_to_404() {
        let (status, _, _) = get_json(
            app(),
            "/javaregistries/maven-central/packages/junit:junit/doc",
        )
        .await;
        // Stub resources carry neither docs nor description.
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
