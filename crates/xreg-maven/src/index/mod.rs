//! The bulk package-index subsystem: builder and searchable store.

pub mod builder;
pub mod store;

pub use builder::{BuildReport, IndexBuildOptions, NEXUS_INDEX_URL, build_index};
pub use store::{
    PackageRow, PackageStore, SearchField, SearchQuery, SearchResults, SortColumn,
};
