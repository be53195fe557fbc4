//! The Maven Central adapter: a [`RegistryBackend`] over the Solr search
//! endpoint, the repository's POM/metadata files, and (when built) the
//! local package-name index.

use crate::client::{MavenClient, artifact_page_url};
use crate::index::{PackageStore, SearchField, SearchQuery, SortColumn};
use crate::resolver;
use crate::types::{Coordinates, PomDependency, PomProject};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::{Arc, RwLock};
use xreg_core::{
    AttrSpec, AttrType, EntityDoc, FilterTerm, HttpCache, RegistryBackend, RegistryError,
    RegistryModel, ResourcePage, ResourceQuery, Result, TypeNames,
};

/// Raw model document, rewritten against [`default_names`] at load time.
pub const MODEL_JSON: &str = include_str!("model.json");

const MAVEN_ATTRS: &[AttrSpec] = &[
    AttrSpec::new("groupId", AttrType::String, false),
    AttrSpec::new("artifactId", AttrType::String, false),
    AttrSpec::new("version", AttrType::String, true),
    AttrSpec::new("packaging", AttrType::String, true),
    AttrSpec::new("description", AttrType::String, true),
    AttrSpec::new("homepage", AttrType::String, true),
    AttrSpec::new("organization", AttrType::Object, true),
    AttrSpec::new("developers", AttrType::Array, true),
    AttrSpec::new("licenses", AttrType::Array, true),
    AttrSpec::new("scm", AttrType::Object, true),
    AttrSpec::new("issueManagement", AttrType::Object, true),
    AttrSpec::new("dependencies", AttrType::Array, true),
];

pub fn default_names() -> TypeNames {
    TypeNames::new("javaregistries", "javaregistry", "packages", "package")
}

/// One upstream registry instance this adapter fronts.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            id: "maven-central".to_string(),
            name: "Maven Central".to_string(),
            description: "Apache Maven Central repository".to_string(),
        }
    }
}

pub struct MavenAdapter {
    names: TypeNames,
    model: RegistryModel,
    client: MavenClient,
    groups: Vec<GroupConfig>,
    /// Swapped by the refresh scheduler after an index rebuild.
    store: RwLock<Option<Arc<PackageStore>>>,
}

impl MavenAdapter {
    pub fn new(cache: Arc<HttpCache>) -> Result<Self> {
        Self::with_client(MavenClient::new(cache))
    }

    pub fn with_client(client: MavenClient) -> Result<Self> {
        let names = default_names();
        let model = RegistryModel::load(MODEL_JSON, &names)?;
        Ok(Self {
            names,
            model,
            client,
            groups: vec![GroupConfig::default()],
            store: RwLock::new(None),
        })
    }

    /// Points the adapter at a freshly built index database.
    pub fn attach_store(&self, path: &Path) -> Result<()> {
        let store = PackageStore::open_read_only(path).map_err(RegistryError::from)?;
        *self.store.write().expect("store lock poisoned") = Some(Arc::new(store));
        Ok(())
    }

    pub fn has_store(&self) -> bool {
        self.store.read().expect("store lock poisoned").is_some()
    }

    pub fn model_document(&self) -> &RegistryModel {
        &self.model
    }

    fn current_store(&self) -> Option<Arc<PackageStore>> {
        self.store.read().expect("store lock poisoned").clone()
    }

    fn group_config(&self, gid: &str) -> Result<&GroupConfig> {
        self.groups
            .iter()
            .find(|g| g.id == gid)
            .ok_or_else(|| RegistryError::not_found("group", gid))
    }

    fn resource_base_path(&self, gid: &str, coordinates: &str) -> String {
        format!(
            "/{}/{}/{}/{}",
            self.names.groups, gid, self.names.resources, coordinates
        )
    }

    /// Maps the engine's pushed-down filter onto one index search.
    ///
    /// A single equality term on an indexed field becomes an exact-match
    /// query; everything else joins into one free-text expression.
    fn index_query(filter: &[FilterTerm], limit: usize, offset: usize, sort_by: Option<&str>, sort_desc: bool) -> SearchQuery {
        let mut text_terms: Vec<String> = Vec::new();
        let mut eq_terms: Vec<(&str, &str)> = Vec::new();
        for term in filter {
            match term {
                FilterTerm::Text(text) => text_terms.push(text.clone()),
                FilterTerm::Eq { key, value } => eq_terms.push((key, value)),
            }
        }

        let (query, exact_match, field) = match (text_terms.is_empty(), eq_terms.as_slice()) {
            (true, [(key, value)]) if is_indexed_field(key) => (
                (*value).to_string(),
                true,
                SearchField::parse(Some(key)),
            ),
            _ => {
                for (_, value) in &eq_terms {
                    text_terms.push((*value).to_string());
                }
                (text_terms.join(" "), false, SearchField::default())
            }
        };

        SearchQuery {
            query,
            limit,
            offset,
            exact_match,
            field,
            sort_by: SortColumn::parse(sort_by),
            sort_desc,
        }
    }

    async fn resources_from_store(
        &self,
        store: Arc<PackageStore>,
        query: SearchQuery,
    ) -> Result<ResourcePage> {
        let results = tokio::task::spawn_blocking(move || store.search(&query))
            .await
            .map_err(|e| RegistryError::Index(e.to_string()))?
            .map_err(RegistryError::from)?;

        let entries = results
            .results
            .into_iter()
            .map(|row| {
                EntityDoc::new(row.coordinates.clone())
                    .with("name", row.coordinates)
                    .with("groupId", row.group_id)
                    .with("artifactId", row.artifact_id)
            })
            .collect();
        Ok(ResourcePage {
            entries,
            total: results.total_count,
        })
    }

    async fn resources_from_search(&self, query: &ResourceQuery) -> Result<ResourcePage> {
        let text = query
            .filter
            .iter()
            .map(|term| match term {
                FilterTerm::Text(text) => text.clone(),
                FilterTerm::Eq { value, .. } => value.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ");

        let page = self
            .client
            .search(&text, query.limit, query.offset)
            .await
            .map_err(RegistryError::from)?;

        let entries = page
            .docs
            .into_iter()
            .map(|hit| {
                let coordinates = hit.coordinates.to_string();
                EntityDoc::new(coordinates.clone())
                    .with("name", coordinates)
                    .with("groupId", hit.coordinates.group_id)
                    .with("artifactId", hit.coordinates.artifact_id)
            })
            .collect();
        Ok(ResourcePage {
            entries,
            total: page.num_found,
        })
    }

    /// Builds the declared attribute map for one artifact version.
    async fn project_attrs(
        &self,
        gid: &str,
        coords: &Coordinates,
        version: &str,
        pom: Option<PomProject>,
        versions_count: usize,
    ) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert("name".into(), json!(coords.to_string()));
        attrs.insert("groupId".into(), json!(coords.group_id));
        attrs.insert("artifactId".into(), json!(coords.artifact_id));
        attrs.insert("version".into(), json!(version));
        attrs.insert("versionscount".into(), json!(versions_count));
        attrs.insert("docs".into(), json!(artifact_page_url(coords)));

        let Some(pom) = pom else {
            attrs.insert("packaging".into(), json!("jar"));
            return attrs;
        };

        attrs.insert(
            "packaging".into(),
            json!(pom.packaging.clone().unwrap_or_else(|| "jar".to_string())),
        );
        if let Some(description) = &pom.description {
            attrs.insert("description".into(), json!(description));
        }
        if let Some(url) = &pom.url {
            attrs.insert("homepage".into(), json!(url));
        }
        if let Some(organization) = &pom.organization {
            attrs.insert("organization".into(), object(organization));
        }
        if !pom.developers.is_empty() {
            attrs.insert("developers".into(), array(&pom.developers));
        }
        if !pom.licenses.is_empty() {
            attrs.insert("licenses".into(), array(&pom.licenses));
        }
        if let Some(scm) = &pom.scm {
            attrs.insert("scm".into(), object(scm));
        }
        if let Some(issues) = &pom.issue_management {
            attrs.insert("issueManagement".into(), object(issues));
        }

        let dependencies = self.resolve_dependencies(gid, &pom.dependencies).await;
        attrs.insert("dependencies".into(), Value::Array(dependencies));
        attrs
    }

    /// Resolves each POM dependency into the declared wire shape, with
    /// `package` cross-references per the range-resolution rules.
    async fn resolve_dependencies(&self, gid: &str, deps: &[PomDependency]) -> Vec<Value> {
        let mut out = Vec::with_capacity(deps.len());
        for dep in deps {
            let dep_coords = Coordinates {
                group_id: dep.group_id.clone(),
                artifact_id: dep.artifact_id.clone(),
            };
            let available = match self.client.metadata(&dep_coords).await {
                Ok(Some(meta)) => Some(meta.versions),
                Ok(None) => None,
                Err(err) => {
                    tracing::debug!(
                        dependency = %dep_coords,
                        error = %err,
                        "dependency metadata unavailable"
                    );
                    None
                }
            };

            let requirement = resolver::parse_requirement(dep.version.as_deref());
            let base_path = self.resource_base_path(gid, &dep_coords.to_string());
            let resolved = resolver::resolve(&requirement, available.as_deref(), &base_path);

            let mut entry = Map::new();
            entry.insert("groupId".into(), json!(dep.group_id));
            entry.insert("artifactId".into(), json!(dep.artifact_id));
            if let Some(version) = &dep.version {
                entry.insert("version".into(), json!(version));
            }
            entry.insert(
                "scope".into(),
                json!(dep.scope.clone().unwrap_or_else(|| "compile".to_string())),
            );
            entry.insert(
                "optional".into(),
                json!(dep.optional.as_deref() == Some("true")),
            );
            if let Some(package) = resolved.package {
                entry.insert("package".into(), json!(package));
            }
            if let Some(version) = resolved.resolved_version {
                entry.insert("resolved_version".into(), json!(version));
            }
            out.push(Value::Object(entry));
        }
        out
    }
}

fn object<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn array<T: serde::Serialize>(values: &[T]) -> Value {
    serde_json::to_value(values).unwrap_or_else(|_| Value::Array(Vec::new()))
}

fn is_indexed_field(key: &str) -> bool {
    matches!(
        key,
        "groupId" | "group_id" | "artifactId" | "artifact_id" | "coordinates" | "name"
    )
}

#[async_trait]
impl RegistryBackend for MavenAdapter {
    fn names(&self) -> &TypeNames {
        &self.names
    }

    fn model(&self) -> &Value {
        self.model.document()
    }

    fn attribute_schema(&self) -> &[AttrSpec] {
        MAVEN_ATTRS
    }

    async fn groups(&self) -> Result<Vec<EntityDoc>> {
        Ok(self
            .groups
            .iter()
            .map(|g| {
                EntityDoc::new(&g.id)
                    .with("name", g.name.as_str())
                    .with("description", g.description.as_str())
            })
            .collect())
    }

    async fn group(&self, gid: &str) -> Result<EntityDoc> {
        let group = self.group_config(gid)?;
        Ok(EntityDoc::new(&group.id)
            .with("name", group.name.as_str())
            .with("description", group.description.as_str()))
    }

    async fn resources(&self, gid: &str, query: &ResourceQuery) -> Result<ResourcePage> {
        self.group_config(gid)?;
        match self.current_store() {
            Some(store) => {
                let search = Self::index_query(
                    &query.filter,
                    query.limit,
                    query.offset,
                    query.sort_by.as_deref(),
                    query.sort_desc,
                );
                self.resources_from_store(store, search).await
            }
            None => self.resources_from_search(query).await,
        }
    }

    async fn resource(&self, gid: &str, rid: &str) -> Result<EntityDoc> {
        self.group_config(gid)?;
        let coords = Coordinates::parse(rid).map_err(RegistryError::from)?;

        let meta = self
            .client
            .metadata(&coords)
            .await
            .map_err(RegistryError::from)?
            .ok_or_else(|| RegistryError::not_found("package", rid))?;
        let version = meta.default_version().ok_or_else(|| {
            RegistryError::upstream(format!("no versions listed for {coords}"))
        })?;

        let pom = self
            .client
            .pom(&coords, &version)
            .await
            .map_err(RegistryError::from)?;
        let attrs = self
            .project_attrs(gid, &coords, &version, pom, meta.versions.len())
            .await;
        Ok(EntityDoc {
            id: coords.to_string(),
            attrs,
        })
    }

    async fn versions(&self, gid: &str, rid: &str) -> Result<Vec<String>> {
        self.group_config(gid)?;
        let coords = Coordinates::parse(rid).map_err(RegistryError::from)?;
        self.client
            .versions(&coords)
            .await
            .map_err(RegistryError::from)
    }

    async fn version(&self, gid: &str, rid: &str, vid: &str) -> Result<EntityDoc> {
        self.group_config(gid)?;
        let coords = Coordinates::parse(rid).map_err(RegistryError::from)?;

        let meta = self
            .client
            .metadata(&coords)
            .await
            .map_err(RegistryError::from)?
            .ok_or_else(|| RegistryError::not_found("package", rid))?;
        if !meta.versions.iter().any(|v| v == vid) {
            return Err(RegistryError::not_found("version", vid));
        }

        let pom = self
            .client
            .pom(&coords, vid)
            .await
            .map_err(RegistryError::from)?;
        let mut attrs = self
            .project_attrs(gid, &coords, vid, pom, meta.versions.len())
            .await;
        attrs.insert("versionid".into(), json!(vid));
        Ok(EntityDoc {
            id: vid.to_string(),
            attrs,
        })
    }

    async fn default_version(&self, gid: &str, rid: &str) -> Result<String> {
        self.group_config(gid)?;
        let coords = Coordinates::parse(rid).map_err(RegistryError::from)?;
        let meta = self
            .client
            .metadata(&coords)
            .await
            .map_err(RegistryError::from)?
            .ok_or_else(|| RegistryError::not_found("package", rid))?;
        meta.default_version()
            .ok_or_else(|| RegistryError::upstream(format!("no versions listed for {coords}")))
    }
}
