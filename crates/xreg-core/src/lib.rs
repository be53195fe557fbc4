//! The reusable xRegistry serving engine.
//!
//! Every per-ecosystem adapter shares this crate: the conditional HTTP
//! cache for upstream calls, the declarative model loader, the query-flag
//! engine, response shaping and pagination, the fixed-order request
//! pipeline, and the route surface generic over a [`RegistryBackend`].

pub mod backend;
pub mod cache;
pub mod compose;
pub mod error;
pub mod flags;
pub mod model;
pub mod pagination;
pub mod pipeline;
pub mod problem;
pub mod routes;
pub mod shape;

pub use backend::{AttrSpec, AttrType, EntityDoc, RegistryBackend, ResourcePage, ResourceQuery};
pub use cache::HttpCache;
pub use compose::{AdapterMount, compose};
pub use error::{RegistryError, Result};
pub use flags::{EntityKind, FilterTerm, Flags, InlineSpec, SPEC_VERSION};
pub use model::{RegistryModel, TypeNames};
pub use pipeline::AuthConfig;
pub use problem::{ErrorKind, Problem};
pub use routes::{EngineState, GatewayConfig, adapter_router};
