//! Maven Central adapter for the xRegistry gateway.
//!
//! Fronts the Solr search endpoint, the repository's POM and
//! `maven-metadata.xml` files, and a locally built package-name index as
//! one read-only xRegistry group type.

pub mod adapter;
pub mod client;
pub mod error;
pub mod index;
pub mod metadata;
pub mod pom;
pub mod resolver;
pub mod types;
pub mod version;

pub use adapter::{GroupConfig, MavenAdapter, default_names};
pub use client::{MAVEN_REPO_BASE, MAVEN_SEARCH_BASE, MavenClient, artifact_page_url};
pub use error::{MavenError, Result};
pub use index::{
    BuildReport, IndexBuildOptions, NEXUS_INDEX_URL, PackageStore, SearchField, SearchQuery,
    SortColumn, build_index,
};
pub use metadata::parse_metadata;
pub use pom::parse_pom;
pub use resolver::{ResolvedDependency, VersionRequirement, parse_requirement, resolve};
pub use types::{ArtifactMetadata, Coordinates, PomDependency, PomProject};
pub use version::{compare_versions, is_prerelease, is_snapshot};
