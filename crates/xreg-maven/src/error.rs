//! Errors specific to the Maven Central adapter.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MavenError {
    #[error("Failed to parse {file}: {message}")]
    ParseError { file: String, message: String },

    #[error("Invalid Maven coordinates '{coordinates}': expected 'groupId:artifactId'")]
    InvalidCoordinates { coordinates: String },

    #[error("Artifact '{coordinates}' not found on Maven Central")]
    ArtifactNotFound { coordinates: String },

    #[error("Version '{version}' of '{coordinates}' not found")]
    VersionNotFound {
        coordinates: String,
        version: String,
    },

    #[error("Maven Central request failed: {message}")]
    UpstreamError { message: String },

    #[error("Index store error: {0}")]
    IndexError(String),

    #[error("Index build failed during {phase}: {message}")]
    BuildError { phase: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl MavenError {
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn build(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BuildError {
            phase: phase.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MavenError>;

impl From<rusqlite::Error> for MavenError {
    fn from(err: rusqlite::Error) -> Self {
        Self::IndexError(err.to_string())
    }
}

impl From<xreg_core::RegistryError> for MavenError {
    fn from(err: xreg_core::RegistryError) -> Self {
        match err {
            xreg_core::RegistryError::Upstream { message } => Self::UpstreamError { message },
            xreg_core::RegistryError::Cache(message) => Self::UpstreamError { message },
            xreg_core::RegistryError::Io(e) => Self::Io(e),
            xreg_core::RegistryError::Json(e) => Self::Json(e),
            other => Self::UpstreamError {
                message: other.to_string(),
            },
        }
    }
}

impl From<MavenError> for xreg_core::RegistryError {
    fn from(err: MavenError) -> Self {
        match err {
            MavenError::ArtifactNotFound { coordinates } => {
                Self::not_found("package", coordinates)
            }
            MavenError::VersionNotFound { version, .. } => Self::not_found("version", version),
            MavenError::InvalidCoordinates { coordinates } => {
                Self::invalid(format!("invalid coordinates '{coordinates}'"))
            }
            MavenError::UpstreamError { message } => Self::Upstream { message },
            MavenError::ParseError { file, message } => Self::Upstream {
                message: format!("unparseable upstream document {file}: {message}"),
            },
            MavenError::IndexError(message) => Self::Index(message),
            MavenError::BuildError { phase, message } => {
                Self::Index(format!("build phase {phase}: {message}"))
            }
            MavenError::Io(e) => Self::Io(e),
            MavenError::Json(e) => Self::Json(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MavenError::ArtifactNotFound {
            coordinates: "junit:junit".into(),
        };
        assert_eq!(
            err.to_string(),
            "Artifact 'junit:junit' not found on Maven Central"
        );

        let err = MavenError::InvalidCoordinates {
            coordinates: "bad".into(),
        };
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_not_found_maps_to_core_not_found() {
        let err = MavenError::ArtifactNotFound {
            coordinates: "a:b".into(),
        };
        let core: xreg_core::RegistryError = err.into();
        assert!(matches!(core, xreg_core::RegistryError::NotFound { .. }));
    }

    #[test]
    fn test_upstream_roundtrip() {
        let core = xreg_core::RegistryError::upstream("timeout");
        let maven: MavenError = core.into();
        assert!(matches!(maven, MavenError::UpstreamError { .. }));

        let back: xreg_core::RegistryError = maven.into();
        assert!(matches!(back, xreg_core::RegistryError::Upstream { .. }));
    }

    #[test]
    fn test_build_error_maps_to_index() {
        let err = MavenError::build("download", "connection reset");
        let core: xreg_core::RegistryError = err.into();
        assert!(matches!(core, xreg_core::RegistryError::Index(_)));
    }
}
