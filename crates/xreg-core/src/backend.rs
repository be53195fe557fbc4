//! The seam between the serving engine and per-ecosystem adapters.
//!
//! A `RegistryBackend` exposes one group type (e.g. `javaregistries`) with
//! its groups, resources, and versions as plain attribute maps. The engine
//! owns identity, shaping, flags, and pagination; the backend owns upstream
//! integration. Resource-collection listing delegates filter, sort, and
//! paging to the backend so index-backed adapters can push them into SQL.

use crate::error::Result;
use crate::flags::FilterTerm;
use crate::model::TypeNames;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One entity's identifier plus its domain attributes.
///
/// Attributes carry only what the adapter knows (`name`, declared schema
/// attributes); the engine attaches `xid`, `self`, `epoch`, and timestamps.
#[derive(Debug, Clone)]
pub struct EntityDoc {
    pub id: String,
    pub attrs: Map<String, Value>,
}

impl EntityDoc {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attrs: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }
}

/// Listing parameters pushed down to the backend.
#[derive(Debug, Clone, Default)]
pub struct ResourceQuery {
    pub filter: Vec<FilterTerm>,
    pub limit: usize,
    pub offset: usize,
    pub sort_by: Option<String>,
    pub sort_desc: bool,
}

/// One page of resources plus the total matching count.
#[derive(Debug, Clone)]
pub struct ResourcePage {
    pub entries: Vec<EntityDoc>,
    pub total: u64,
}

/// Attribute value kinds an adapter's schema may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Xid,
}

/// One declared resource attribute, used for filter coercion.
#[derive(Debug, Clone)]
pub struct AttrSpec {
    pub name: &'static str,
    pub kind: AttrType,
    pub optional: bool,
}

impl AttrSpec {
    pub const fn new(name: &'static str, kind: AttrType, optional: bool) -> Self {
        Self {
            name,
            kind,
            optional,
        }
    }
}

#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Type naming for this adapter's slice of the tree.
    fn names(&self) -> &TypeNames;

    /// The adapter's rewritten model document.
    fn model(&self) -> &Value;

    /// Declared resource attributes (filter coercion, schema checks).
    fn attribute_schema(&self) -> &[AttrSpec];

    /// All groups fronted by this adapter. Expected to be small.
    async fn groups(&self) -> Result<Vec<EntityDoc>>;

    /// One group, or `NotFound`.
    async fn group(&self, gid: &str) -> Result<EntityDoc>;

    /// A page of the group's resource collection.
    async fn resources(&self, gid: &str, query: &ResourceQuery) -> Result<ResourcePage>;

    /// Full resource detail including declared attributes.
    async fn resource(&self, gid: &str, rid: &str) -> Result<EntityDoc>;

    /// All version identifiers, upstream order preserved.
    async fn versions(&self, gid: &str, rid: &str) -> Result<Vec<String>>;

    /// One version's detail.
    async fn version(&self, gid: &str, rid: &str, vid: &str) -> Result<EntityDoc>;

    /// The version the resource's `meta` object points at.
    async fn default_version(&self, gid: &str, rid: &str) -> Result<String>;
}
