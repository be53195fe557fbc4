//! Maven Central upstream client.
//!
//! Two integration modes: Solr search against the `solrsearch/select`
//! endpoint when no local index is available, and plain-HTTP fetches of
//! POMs and `maven-metadata.xml` from the repository. Every outbound call
//! goes through the conditional HTTP cache.

use crate::error::{MavenError, Result};
use crate::metadata::parse_metadata;
use crate::pom::parse_pom;
use crate::types::{ArtifactMetadata, Coordinates, PomProject};
use crate::version::compare_versions;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use xreg_core::{HttpCache, RegistryError};

pub const MAVEN_SEARCH_BASE: &str = "https://search.maven.org/solrsearch/select";
pub const MAVEN_REPO_BASE: &str = "https://repo1.maven.org/maven2";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const XML_ACCEPT: (&str, &str) = ("accept", "application/xml,text/xml");

/// Landing page for an artifact, used as the `docs` attribute.
pub fn artifact_page_url(coords: &Coordinates) -> String {
    format!(
        "https://central.sonatype.com/artifact/{}/{}",
        coords.group_id, coords.artifact_id
    )
}

#[derive(Clone)]
pub struct MavenClient {
    cache: Arc<HttpCache>,
    repo_base: String,
    search_base: String,
}

impl MavenClient {
    pub fn new(cache: Arc<HttpCache>) -> Self {
        Self {
            cache,
            repo_base: MAVEN_REPO_BASE.to_string(),
            search_base: MAVEN_SEARCH_BASE.to_string(),
        }
    }

    /// Points the client at alternative endpoints (mirrors, tests).
    pub fn with_bases(
        cache: Arc<HttpCache>,
        repo_base: impl Into<String>,
        search_base: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            repo_base: repo_base.into(),
            search_base: search_base.into(),
        }
    }

    /// Solr search over coordinates. An empty query lists everything the
    /// endpoint will page through.
    pub async fn search(&self, query: &str, rows: usize, start: usize) -> Result<SolrPage> {
        let q = if query.is_empty() {
            "*:*".to_string()
        } else {
            solr_query(query)
        };
        let url = format!(
            "{base}?q={q}&core=gav&rows={rows}&start={start}&wt=json",
            base = self.search_base,
            q = urlencoding::encode(&q),
        );
        let data = self.cache.get_with(&url, &[], SEARCH_TIMEOUT).await?;
        parse_search_response(&data)
    }

    /// Artifact-level metadata; `None` when the artifact does not exist.
    pub async fn metadata(&self, coords: &Coordinates) -> Result<Option<ArtifactMetadata>> {
        let url = format!(
            "{}/{}/{}/maven-metadata.xml",
            self.repo_base,
            coords.group_path(),
            coords.artifact_id
        );
        match self.cache.get_with(&url, &[XML_ACCEPT], FETCH_TIMEOUT).await {
            Ok(data) => {
                let xml = String::from_utf8_lossy(&data);
                Ok(Some(parse_metadata(&xml)?))
            }
            Err(RegistryError::UpstreamStatus { status: 404, .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// One version's POM; `None` when that version does not exist.
    pub async fn pom(&self, coords: &Coordinates, version: &str) -> Result<Option<PomProject>> {
        let url = format!(
            "{}/{}/{}/{}/{}-{}.pom",
            self.repo_base,
            coords.group_path(),
            coords.artifact_id,
            version,
            coords.artifact_id,
            version
        );
        match self.cache.get_with(&url, &[XML_ACCEPT], FETCH_TIMEOUT).await {
            Ok(data) => {
                let xml = String::from_utf8_lossy(&data);
                Ok(Some(parse_pom(&xml)?))
            }
            Err(RegistryError::UpstreamStatus { status: 404, .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Version identifiers known for an artifact, upstream order preserved.
    pub async fn versions(&self, coords: &Coordinates) -> Result<Vec<String>> {
        match self.metadata(coords).await? {
            Some(meta) => Ok(meta.versions),
            None => Err(MavenError::ArtifactNotFound {
                coordinates: coords.to_string(),
            }),
        }
    }

    /// Versions from the Solr index, newest first — the fallback when no
    /// repository metadata is reachable.
    pub async fn versions_via_search(&self, coords: &Coordinates) -> Result<Vec<String>> {
        let q = format!(
            "g:{} AND a:{}",
            solr_quote(&coords.group_id),
            solr_quote(&coords.artifact_id)
        );
        let url = format!(
            "{base}?q={q}&core=gav&rows=200&wt=json",
            base = self.search_base,
            q = urlencoding::encode(&q),
        );
        let data = self.cache.get_with(&url, &[], SEARCH_TIMEOUT).await?;
        let mut versions: Vec<String> = parse_version_response(&data)?;
        versions.sort_by(|a, b| compare_versions(b, a));
        Ok(versions)
    }
}

fn solr_query(query: &str) -> String {
    match query.split_once(':') {
        Some((group, artifact)) if !group.is_empty() && !artifact.is_empty() => {
            format!("g:{} AND a:{}", solr_quote(group), solr_quote(artifact))
        }
        _ => query.to_string(),
    }
}

fn solr_quote(term: &str) -> String {
    format!("\"{}\"", term.replace('"', ""))
}

// Solr wire shapes

#[derive(Deserialize)]
struct SolrResponse {
    response: SolrBody,
}

#[derive(Deserialize)]
struct SolrBody {
    #[serde(rename = "numFound", default)]
    num_found: u64,
    #[serde(default)]
    docs: Vec<SolrDoc>,
}

#[derive(Deserialize)]
struct SolrDoc {
    g: String,
    a: String,
    #[serde(default)]
    v: Option<String>,
    #[serde(rename = "latestVersion", default)]
    latest_version: Option<String>,
}

/// One page of Solr search results.
#[derive(Debug, Clone)]
pub struct SolrPage {
    pub num_found: u64,
    pub docs: Vec<SolrHit>,
}

#[derive(Debug, Clone)]
pub struct SolrHit {
    pub coordinates: Coordinates,
    pub version: Option<String>,
}

fn parse_search_response(data: &[u8]) -> Result<SolrPage> {
    let response: SolrResponse = serde_json::from_slice(data)?;
    let docs = response
        .response
        .docs
        .into_iter()
        .map(|d| SolrHit {
            coordinates: Coordinates {
                group_id: d.g,
                artifact_id: d.a,
            },
            version: d.v.or(d.latest_version),
        })
        .collect();
    Ok(SolrPage {
        num_found: response.response.num_found,
        docs,
    })
}

fn parse_version_response(data: &[u8]) -> Result<Vec<String>> {
    let response: SolrResponse = serde_json::from_slice(data)?;
    Ok(response
        .response
        .docs
        .into_iter()
        .filter_map(|d| d.v)
        .collect())
}
