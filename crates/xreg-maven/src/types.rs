//! Domain types for Maven coordinates, metadata, and POM documents.

use crate::error::{MavenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A `groupId:artifactId` pair, the resource identity for this adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinates {
    pub group_id: String,
    pub artifact_id: String,
}

impl Coordinates {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(2, ':');
        match (parts.next(), parts.next()) {
            (Some(group_id), Some(artifact_id))
                if !group_id.is_empty() && !artifact_id.is_empty() =>
            {
                Ok(Self {
                    group_id: group_id.to_string(),
                    artifact_id: artifact_id.to_string(),
                })
            }
            _ => Err(MavenError::InvalidCoordinates {
                coordinates: raw.to_string(),
            }),
        }
    }

    /// Repository path segment: `org.junit` becomes `org/junit`.
    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

/// Artifact-level `maven-metadata.xml` content.
#[derive(Debug, Clone, Default)]
pub struct ArtifactMetadata {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub latest: Option<String>,
    pub release: Option<String>,
    pub versions: Vec<String>,
}

impl ArtifactMetadata {
    /// The version the resource's meta object points at: release, then
    /// latest, then the newest listed version.
    pub fn default_version(&self) -> Option<String> {
        self.release
            .clone()
            .or_else(|| self.latest.clone())
            .or_else(|| self.versions.last().cloned())
    }
}

/// One `<dependency>` of a POM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub optional: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Organization {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Developer {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct License {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scm {
    pub url: Option<String>,
    pub connection: Option<String>,
    #[serde(rename = "developerConnection")]
    pub developer_connection: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueManagement {
    pub system: Option<String>,
    pub url: Option<String>,
}

/// A parsed POM, with repeated children normalized to lists.
#[derive(Debug, Clone, Default)]
pub struct PomProject {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// `<url>` — the project homepage.
    pub url: Option<String>,
    pub organization: Option<Organization>,
    pub developers: Vec<Developer>,
    pub licenses: Vec<License>,
    pub scm: Option<Scm>,
    pub issue_management: Option<IssueManagement>,
    pub dependencies: Vec<PomDependency>,
    pub properties: HashMap<String, String>,
}

impl PomProject {
    /// Resolves `${property}` references in dependency versions against the
    /// POM's properties plus the implicit `project.version`.
    pub fn interpolate(&mut self) {
        let mut table = self.properties.clone();
        if let Some(version) = &self.version {
            table.insert("project.version".to_string(), version.clone());
        }
        for dep in &mut self.dependencies {
            if let Some(version) = &dep.version
                && let Some(key) = version
                    .strip_prefix("${")
                    .and_then(|rest| rest.strip_suffix('}'))
                && let Some(resolved) = table.get(key)
            {
                dep.version = Some(resolved.clone());
            }
        }
    }
}
