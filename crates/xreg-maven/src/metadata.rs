//! `maven-metadata.xml` parsing for version discovery.

use crate::error::{MavenError, Result};
use crate::types::ArtifactMetadata;
use crate::xml::push_general_ref;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Parses an artifact-level `maven-metadata.xml` listing available versions.
pub fn parse_metadata(xml: &str) -> Result<ArtifactMetadata> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut meta = ArtifactMetadata::default();
    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).to_string());
                text_buf.clear();
            }
            Ok(Event::Text(ref e)) => {
                if let Ok(decoded) = e.decode() {
                    text_buf.push_str(&decoded);
                }
            }
            Ok(Event::GeneralRef(ref e)) => {
                push_general_ref(&mut text_buf, e);
            }
            Ok(Event::End(_)) => {
                match path.join(">").as_str() {
                    "metadata>groupId" => meta.group_id = Some(text_buf.clone()),
                    "metadata>artifactId" => meta.artifact_id = Some(text_buf.clone()),
                    "metadata>versioning>latest" => meta.latest = Some(text_buf.clone()),
                    "metadata>versioning>release" => meta.release = Some(text_buf.clone()),
                    "metadata>versioning>versions>version" => {
                        meta.versions.push(text_buf.clone());
                    }
                    _ => {}
                }
                path.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MavenError::parse("maven-metadata.xml", e.to_string()));
            }
            _ => {}
        }
    }

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_artifact_metadata() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>junit</groupId>
  <artifactId>junit</artifactId>
  <versioning>
    <latest>4.13.2</latest>
    <release>4.13.2</release>
    <versions>
      <version>4.11</version>
      <version>4.12</version>
      <version>4.13</version>
      <version>4.13.2</version>
    </versions>
    <lastUpdated>20210213164632</lastUpdated>
  </versioning>
</metadata>"#;
        let meta = parse_metadata(xml).unwrap();
        assert_eq!(meta.group_id.as_deref(), Some("junit"));
        assert_eq!(meta.artifact_id.as_deref(), Some("junit"));
        assert_eq!(meta.latest.as_deref(), Some("4.13.2"));
        assert_eq!(meta.release.as_deref(), Some("4.13.2"));
        assert_eq!(meta.versions.len(), 4);
        assert_eq!(meta.versions[0], "4.11");
        assert_eq!(meta.default_version().as_deref(), Some("4.13.2"));
    }

    #[test]
    fn test_parse_metadata_without_release() {
        let xml = r"<metadata>
  <versioning>
    <versions>
      <version>0.1.0</version>
      <version>0.2.0</version>
    </versions>
  </versioning>
</metadata>";
        let meta = parse_metadata(xml).unwrap();
        assert!(meta.release.is_none());
        assert_eq!(meta.default_version().as_deref(), Some("0.2.0"));
    }

    #[test]
    fn test_parse_metadata_malformed() {
        let result = parse_metadata(r#"<metadata attr="unclosed></metadata>"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_metadata_empty() {
        let meta = parse_metadata("<metadata></metadata>").unwrap();
        assert!(meta.versions.is_empty());
        assert!(meta.default_version().is_none());
    }
}
