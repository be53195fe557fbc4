//! Response shaping: identity attributes, URL absolutization, and the
//! standard xRegistry response headers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const XREGISTRY_CONTENT_TYPE: &str =
    "application/json; charset=utf-8; schema=\"xRegistry-json/1.0-rc1\"";

/// Builds the `xid` for a path below the registry root.
///
/// Segments are joined verbatim except for percent-encoding; identifiers
/// keep their colons, dots, and dashes.
pub fn xid(segments: &[&str]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&encode_segment(segment));
    }
    out
}

/// Percent-encodes one path segment, keeping the characters xid grammar
/// allows through unescaped.
pub fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-') {
            out.push(c);
        } else {
            out.push_str(&urlencoding::encode(&c.to_string()));
        }
    }
    out
}

/// Ensures the required identity attributes are present on an entity body.
///
/// `epoch` defaults to 1 (read-only upstreams) and both timestamps default
/// to the current instant when the upstream supplied none.
pub fn ensure_identity(attrs: &mut Map<String, Value>, xid: &str, base_url: &str) {
    let self_url = format!("{}{}", base_url.trim_end_matches('/'), xid);
    attrs.insert("xid".into(), Value::String(xid.to_string()));
    attrs.insert("self".into(), Value::String(self_url));
    attrs
        .entry("epoch")
        .or_insert_with(|| Value::Number(1.into()));

    let now = Value::String(now_rfc3339());
    attrs.entry("createdat").or_insert_with(|| now.clone());
    attrs.entry("modifiedat").or_insert_with(|| now);
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Walks a response body and rewrites every URL-bearing property
/// (`self`, `docs`, and any key ending in `url`) from relative to absolute.
///
/// One declarative pass after the body is assembled, so nested inlined
/// entities are covered and nothing is rewritten twice.
pub fn absolutize_urls(value: &mut Value, base_url: &str) {
    let base = base_url.trim_end_matches('/');
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if is_url_key(key) {
                    if let Value::String(s) = val
                        && !s.contains("://")
                        && s.starts_with('/')
                    {
                        *s = format!("{base}{s}");
                    }
                } else {
                    absolutize_urls(val, base_url);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                absolutize_urls(item, base_url);
            }
        }
        _ => {}
    }
}

fn is_url_key(key: &str) -> bool {
    key == "self" || key == "docs" || key.ends_with("url")
}

/// Deterministic entity tag over the serialized body.
pub fn etag_for(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    let mut hex = String::with_capacity(32);
    for byte in &digest[..16] {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("\"{hex}\"")
}

/// Parses an entity's `modifiedat` for the `Last-Modified` header.
pub fn last_modified(body: &Value) -> Option<String> {
    let raw = body.get("modifiedat")?.as_str()?;
    let parsed: DateTime<Utc> = raw.parse().ok()?;
    Some(parsed.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_xid_root_and_nesting() {
        assert_eq!(xid(&[]), "/");
        assert_eq!(
            xid(&["javaregistries", "maven-central"]),
            "/javaregistries/maven-central"
        );
        assert_eq!(
            xid(&["javaregistries", "maven-central", "packages", "junit:junit"]),
            "/javaregistries/maven-central/packages/junit:junit"
        );
    }

    #[test]
    fn test_xid_percent_encodes_reserved() {
        assert_eq!(
            xid(&["packages", "a b/c"]),
            "/packages/a%20b%2Fc"
        );
    }

    #[test]
    fn test_ensure_identity_defaults() {
        let mut attrs = Map::new();
        attrs.insert("name".into(), json!("junit:junit"));
        ensure_identity(&mut attrs, "/javaregistries/maven-central", "http://localhost:3000");

        assert_eq!(attrs["xid"], "/javaregistries/maven-central");
        assert_eq!(
            attrs["self"],
            "http://localhost:3000/javaregistries/maven-central"
        );
        assert_eq!(attrs["epoch"], 1);
        let created = attrs["createdat"].as_str().unwrap();
        let modified = attrs["modifiedat"].as_str().unwrap();
        assert!(created.parse::<DateTime<Utc>>().is_ok());
        assert!(modified >= created);
    }

    #[test]
    fn test_ensure_identity_keeps_existing_epoch() {
        let mut attrs = Map::new();
        attrs.insert("epoch".into(), json!(4));
        ensure_identity(&mut attrs, "/", "http://h");
        assert_eq!(attrs["epoch"], 4);
    }

    #[test]
    fn test_absolutize_rewrites_relative_urls() {
        let mut body = json!({
            "self": "/javaregistries/maven-central",
            "versionsurl": "/javaregistries/maven-central/packages/x/versions",
            "docs": "/docs/page",
            "homepage": "/not-a-url-key",
            "nested": {"metaurl": "/a/meta"},
            "list": [{"defaultversionurl": "/a/versions/1"}]
        });
        absolutize_urls(&mut body, "http://gw.example/");

        assert_eq!(body["self"], "http://gw.example/javaregistries/maven-central");
        assert_eq!(
            body["versionsurl"],
            "http://gw.example/javaregistries/maven-central/packages/x/versions"
        );
        assert_eq!(body["docs"], "http://gw.example/docs/page");
        // Non-URL keys are left alone.
        assert_eq!(body["homepage"], "/not-a-url-key");
        assert_eq!(body["nested"]["metaurl"], "http://gw.example/a/meta");
        assert_eq!(body["list"][0]["defaultversionurl"], "http://gw.example/a/versions/1");
    }

    #[test]
    fn test_absolutize_skips_absolute_urls() {
        let mut body = json!({"docs": "https://example.org/doc"});
        absolutize_urls(&mut body, "http://gw.example");
        assert_eq!(body["docs"], "https://example.org/doc");
    }

    #[test]
    fn test_etag_is_deterministic() {
        let a = etag_for(b"{\"x\":1}");
        let b = etag_for(b"{\"x\":1}");
        let c = etag_for(b"{\"x\":2}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with('"') && a.ends_with('"'));
    }

    #[test]
    fn test_last_modified_format() {
        let body = json!({"modifiedat": "2026-03-01T12:30:45Z"});
        let header = last_modified(&body).unwrap();
        assert_eq!(header, "Sun, 01 Mar 2026 12:30:45 GMT");
    }

    #[test]
    fn test_last_modified_invalid() {
        assert!(last_modified(&json!({"modifiedat": "not-a-date"})).is_none());
        assert!(last_modified(&json!({})).is_none());
    }
}
