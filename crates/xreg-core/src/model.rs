//! Declarative resource-schema loading.
//!
//! Adapters ship a model document describing their group and resource types
//! and the attribute schema of resources. The document may use the
//! placeholder names `{groups}`, `{group}`, `{resources}`, `{resource}`;
//! the loader rewrites them to the adapter's configured plural/singular
//! before the model is published at `GET /model`.

use crate::error::{RegistryError, Result};
use serde_json::Value;

/// Naming for one adapter's slice of the registry tree.
#[derive(Debug, Clone)]
pub struct TypeNames {
    pub groups: String,
    pub group: String,
    pub resources: String,
    pub resource: String,
}

impl TypeNames {
    pub fn new(
        groups: impl Into<String>,
        group: impl Into<String>,
        resources: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            groups: groups.into(),
            group: group.into(),
            resources: resources.into(),
            resource: resource.into(),
        }
    }
}

/// A parsed, name-rewritten model document.
#[derive(Debug, Clone)]
pub struct RegistryModel {
    document: Value,
}

impl RegistryModel {
    /// Parses a raw model document, unwrapping the top-level `model` key and
    /// substituting placeholder type names. Fails fast on malformed input.
    pub fn load(raw: &str, names: &TypeNames) -> Result<Self> {
        let rewritten = raw
            .replace("{groups}", &names.groups)
            .replace("{group}", &names.group)
            .replace("{resources}", &names.resources)
            .replace("{resource}", &names.resource);

        let parsed: Value = serde_json::from_str(&rewritten).map_err(|e| RegistryError::Model {
            message: e.to_string(),
        })?;

        let document = match parsed {
            Value::Object(mut map) => match map.remove("model") {
                Some(inner @ Value::Object(_)) => inner,
                Some(_) => {
                    return Err(RegistryError::Model {
                        message: "'model' key must hold an object".into(),
                    });
                }
                None => Value::Object(map),
            },
            _ => {
                return Err(RegistryError::Model {
                    message: "model document must be a JSON object".into(),
                });
            }
        };

        if document.get("groups").is_none() {
            return Err(RegistryError::Model {
                message: "model document has no 'groups' section".into(),
            });
        }

        Ok(Self { document })
    }

    /// The document served verbatim at `GET /model`.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Merges several adapter models into one document for an aggregator.
    pub fn merged(models: &[&Self]) -> Value {
        let mut groups = serde_json::Map::new();
        for model in models {
            if let Some(section) = model.document.get("groups").and_then(Value::as_object) {
                for (name, spec) in section {
                    groups.insert(name.clone(), spec.clone());
                }
            }
        }
        serde_json::json!({ "groups": groups })
    }
}
