//! The xRegistry query-flag engine.
//!
//! Parses the uniform flag set (`limit`, `offset`, `filter`, `sort`,
//! `inline`, `doc`, `collections`, `noepoch`, `epoch`, `specversion`,
//! `schema`, `noreadonly`) and applies it to entity and collection bodies.
//! Application order is fixed: filter, sort, paginate, inline, then the
//! epoch/doc/schema attribute rewrites, so inlining never changes counts.

use crate::backend::{AttrSpec, AttrType};
use crate::error::{RegistryError, Result};
use serde_json::{Map, Value};
use std::borrow::Cow;

pub const SPEC_VERSION: &str = "1.0-rc1";

/// One parsed `filter=` term. Terms are ANDed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTerm {
    /// `key=value` equality against a declared attribute.
    Eq { key: String, value: String },
    /// Bare term: substring match over the entity identifier.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InlineSpec {
    #[default]
    None,
    All,
    Names(Vec<String>),
}

impl InlineSpec {
    pub fn wants(&self, name: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Names(names) => names.iter().any(|n| n == name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortSpec {
    pub attr: String,
    pub descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            attr: "name".to_string(),
            descending: false,
        }
    }
}

/// The full parsed flag set for one request.
#[derive(Debug, Clone, Default)]
pub struct Flags {
    pub limit: Option<usize>,
    pub offset: usize,
    pub filter: Vec<FilterTerm>,
    pub sort: Option<SortSpec>,
    pub inline: InlineSpec,
    pub strip_docs: bool,
    pub strip_collections: bool,
    pub noepoch: bool,
    pub epoch: Option<u64>,
    pub specversion: Option<String>,
    pub schema: bool,
    pub noreadonly: bool,
}

impl Flags {
    /// Parses flags from a raw query string. Unknown parameters are left
    /// for pagination-link preservation and otherwise ignored.
    pub fn parse(query: Option<&str>) -> Result<Self> {
        let mut flags = Self::default();
        let Some(query) = query else {
            return Ok(flags);
        };

        for (key, value) in query_pairs(query) {
            match key.as_ref() {
                "limit" => {
                    let n: i64 = value
                        .parse()
                        .map_err(|_| RegistryError::invalid(format!("invalid limit '{value}'")))?;
                    if n <= 0 {
                        return Err(RegistryError::invalid(format!(
                            "limit must be a positive integer, got '{value}'"
                        )));
                    }
                    flags.limit = Some(n as usize);
                }
                "offset" => {
                    let n: i64 = value
                        .parse()
                        .map_err(|_| RegistryError::invalid(format!("invalid offset '{value}'")))?;
                    if n < 0 {
                        return Err(RegistryError::invalid(format!(
                            "offset must be non-negative, got '{value}'"
                        )));
                    }
                    flags.offset = n as usize;
                }
                "filter" => flags.filter = parse_filter(&value),
                "sort" => flags.sort = Some(parse_sort(&value)),
                "inline" => flags.inline = parse_inline(&value),
                "doc" => flags.strip_docs = value == "false",
                "collections" => flags.strip_collections = value == "false",
                "noepoch" => flags.noepoch = value == "true",
                "epoch" => flags.epoch = value.parse().ok(),
                "specversion" => flags.specversion = Some(value.into_owned()),
                "schema" => flags.schema = value == "true",
                "noreadonly" => flags.noreadonly = value == "true",
                _ => {}
            }
        }
        Ok(flags)
    }

    pub fn effective_sort(&self) -> SortSpec {
        self.sort.clone().unwrap_or_default()
    }
}

/// Splits a raw query string without normalizing reserved characters in
/// values beyond percent-decoding.
pub fn query_pairs(query: &str) -> impl Iterator<Item = (Cow<'_, str>, Cow<'_, str>)> {
    query.split('&').filter(|s| !s.is_empty()).map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (
            urlencoding::decode(k).unwrap_or(Cow::Borrowed(k)),
            urlencoding::decode(v).unwrap_or(Cow::Borrowed(v)),
        )
    })
}

fn parse_filter(raw: &str) -> Vec<FilterTerm> {
    raw.split(',')
        .filter(|t| !t.is_empty())
        .map(|term| match term.split_once('=') {
            Some((k, v)) => FilterTerm::Eq {
                key: k.to_string(),
                value: v.to_string(),
            },
            None => FilterTerm::Text(term.to_string()),
        })
        .collect()
}

/// `sort=<attr>[=asc|=desc]` — the direction rides inside the value.
fn parse_sort(raw: &str) -> SortSpec {
    match raw.split_once('=') {
        Some((attr, dir)) => SortSpec {
            attr: attr.to_string(),
            descending: dir.eq_ignore_ascii_case("desc"),
        },
        None => SortSpec {
            attr: raw.to_string(),
            descending: false,
        },
    }
}

fn parse_inline(raw: &str) -> InlineSpec {
    if raw == "*" || raw == "true" {
        return InlineSpec::All;
    }
    let names: Vec<String> = raw
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        InlineSpec::None
    } else {
        InlineSpec::Names(names)
    }
}

/// Returns true when the entity (id + attributes) passes every filter term.
///
/// Equality compares case-insensitively; numeric and boolean comparisons
/// coerce when the attribute's declared type permits.
pub fn matches_filter(
    id: &str,
    attrs: &Map<String, Value>,
    terms: &[FilterTerm],
    schema: &[AttrSpec],
) -> bool {
    terms.iter().all(|term| match term {
        FilterTerm::Text(text) => id.to_lowercase().contains(&text.to_lowercase()),
        FilterTerm::Eq { key, value } => {
            let Some(actual) = attrs.get(key) else {
                return false;
            };
            let declared = schema.iter().find(|a| a.name == key).map(|a| a.kind);
            value_matches(actual, value, declared)
        }
    })
}

fn value_matches(actual: &Value, expected: &str, declared: Option<AttrType>) -> bool {
    match (actual, declared) {
        (Value::Number(n), Some(AttrType::Number)) | (Value::Number(n), None) => expected
            .parse::<f64>()
            .is_ok_and(|e| n.as_f64().is_some_and(|a| (a - e).abs() < f64::EPSILON)),
        (Value::Bool(b), Some(AttrType::Boolean)) | (Value::Bool(b), None) => {
            expected.parse::<bool>().is_ok_and(|e| e == *b)
        }
        (Value::String(s), _) => s.eq_ignore_ascii_case(expected),
        _ => false,
    }
}

/// Attributes sortable on every entity kind regardless of the declared
/// resource schema.
const CORE_SORT_ATTRS: &[&str] = &[
    "name",
    "description",
    "epoch",
    "createdat",
    "modifiedat",
    "versionid",
];

/// Replaces a sort on an undeclared attribute with the default, so an
/// unknown `sort=` request is indistinguishable from no `sort=` at all.
pub fn validated_sort(sort: SortSpec, schema: &[AttrSpec]) -> SortSpec {
    let known = CORE_SORT_ATTRS.contains(&sort.attr.as_str())
        || schema.iter().any(|a| a.name == sort.attr);
    if known { sort } else { SortSpec::default() }
}

/// Sorts entries by the given attribute, tie-breaking on the identifier.
pub fn sort_entries(entries: &mut [(String, Map<String, Value>)], sort: &SortSpec) {
    entries.sort_by(|(a_id, a), (b_id, b)| {
        let av = a.get(&sort.attr);
        let bv = b.get(&sort.attr);
        let ord = match (av, bv) {
            (Some(av), Some(bv)) => compare_values(av, bv),
            // Fall back to the identifier when the attribute is absent.
            _ => std::cmp::Ordering::Equal,
        };
        let ord = ord.then_with(|| a_id.cmp(b_id));
        if sort.descending { ord.reverse() } else { ord }
    });
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => std::cmp::Ordering::Equal,
    }
}

/// Applies filter, sort, and pagination to an in-memory collection.
///
/// Returns the page plus the post-filter total. An offset beyond the end
/// yields an empty page and a warning, not an error.
pub fn apply_collection(
    flags: &Flags,
    mut entries: Vec<(String, Map<String, Value>)>,
    schema: &[AttrSpec],
    warnings: &mut Vec<String>,
) -> (Vec<(String, Map<String, Value>)>, usize) {
    if !flags.filter.is_empty() {
        entries.retain(|(id, attrs)| matches_filter(id, attrs, &flags.filter, schema));
    }

    sort_entries(&mut entries, &validated_sort(flags.effective_sort(), schema));

    let total = entries.len();
    if flags.offset > 0 && flags.offset >= total {
        if total > 0 || flags.offset > 0 {
            warnings.push(format!(
                "offset {} is beyond the end of the collection ({} entries)",
                flags.offset, total
            ));
        }
        return (Vec::new(), total);
    }

    let page: Vec<_> = match flags.limit {
        Some(limit) => entries.into_iter().skip(flags.offset).take(limit).collect(),
        None => entries.into_iter().skip(flags.offset).collect(),
    };
    (page, total)
}

/// Entity kinds, for required-attribute validation under `schema=true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Registry,
    Group,
    Resource,
    Version,
    Meta,
}

impl EntityKind {
    fn required(self) -> &'static [&'static str] {
        match self {
            Self::Meta => &["xid", "self", "epoch", "readonly", "compatibility"],
            Self::Registry => &["xid", "self", "epoch", "createdat", "modifiedat"],
            _ => &["xid", "self", "epoch", "createdat", "modifiedat", "name"],
        }
    }
}

/// Applies the post-inline attribute rewrites in their fixed order:
/// `epoch=N` check, `noepoch`, `doc=false`, `collections=false`,
/// `specversion`, then `schema=true` validation.
pub fn apply_entity(
    flags: &Flags,
    body: &mut Value,
    kind: EntityKind,
    warnings: &mut Vec<String>,
) {
    let Some(obj) = body.as_object_mut() else {
        return;
    };

    if let Some(requested) = flags.epoch {
        let current = obj.get("epoch").and_then(Value::as_u64).unwrap_or(1);
        if requested != current {
            warnings.push(format!(
                "epoch {requested} is not available, serving epoch {current}"
            ));
        }
    }

    if flags.noepoch {
        obj.remove("epoch");
    }

    if flags.strip_docs {
        obj.remove("docs");
    }

    if flags.strip_collections {
        let stripped: Vec<String> = obj
            .keys()
            .filter(|k| k.ends_with("url") && *k != "self")
            .cloned()
            .collect();
        for key in stripped {
            obj.remove(&key);
        }
    }

    if let Some(requested) = &flags.specversion
        && requested != SPEC_VERSION
    {
        warnings.push(format!(
            "specversion {requested} is not supported, serving {SPEC_VERSION}"
        ));
    }

    if flags.schema {
        let errors: Vec<String> = kind
            .required()
            .iter()
            .filter(|field| !obj.contains_key(**field))
            .map(|field| format!("missing required attribute '{field}'"))
            .collect();

        let mut schema_obj = Map::new();
        schema_obj.insert("valid".into(), Value::Bool(errors.is_empty()));
        schema_obj.insert("version".into(), Value::String(SPEC_VERSION.into()));
        if !errors.is_empty() {
            warnings.push(format!("schema validation failed: {}", errors.join("; ")));
            schema_obj.insert(
                "errors".into(),
                Value::Array(errors.into_iter().map(Value::String).collect()),
            );
        }
        obj.insert("_schema".into(), Value::Object(schema_obj));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_parse_defaults() {
        let flags = Flags::parse(None).unwrap();
        assert!(flags.limit.is_none());
        assert_eq!(flags.offset, 0);
        assert!(flags.filter.is_empty());
        assert!(matches!(flags.inline, InlineSpec::None));
    }

    #[test]
    fn test_parse_limit_and_offset() {
        let flags = Flags::parse(Some("limit=20&offset=40")).unwrap();
        assert_eq!(flags.limit, Some(20));
        assert_eq!(flags.offset, 40);
    }

    #[test]
    fn test_parse_invalid_limit() {
        assert!(Flags::parse(Some("limit=0")).is_err());
        assert!(Flags::parse(Some("limit=-3")).is_err());
        assert!(Flags::parse(Some("limit=abc")).is_err());
        assert!(Flags::parse(Some("offset=-1")).is_err());
    }

    #[test]
    fn test_parse_filter_terms() {
        let flags = Flags::parse(Some("filter=groupId=junit,core")).unwrap();
        assert_eq!(
            flags.filter,
            vec![
                FilterTerm::Eq {
                    key: "groupId".into(),
                    value: "junit".into()
                },
                FilterTerm::Text("core".into()),
            ]
        );
    }

    #[test]
    fn test_parse_sort_direction() {
        let flags = Flags::parse(Some("sort=name%3Ddesc")).unwrap();
        let sort = flags.sort.unwrap();
        assert_eq!(sort.attr, "name");
        assert!(sort.descending);

        let flags = Flags::parse(Some("sort=groupId")).unwrap();
        assert!(!flags.sort.unwrap().descending);
    }

    #[test]
    fn test_parse_inline_variants() {
        assert!(matches!(
            Flags::parse(Some("inline=*")).unwrap().inline,
            InlineSpec::All
        ));
        assert!(matches!(
            Flags::parse(Some("inline=true")).unwrap().inline,
            InlineSpec::All
        ));
        let flags = Flags::parse(Some("inline=meta,model")).unwrap();
        assert!(flags.inline.wants("meta"));
        assert!(flags.inline.wants("model"));
        assert!(!flags.inline.wants("capabilities"));
    }

    #[test]
    fn test_filter_text_matches_identifier() {
        let attrs = obj(json!({"name": "org.junit:junit"}));
        assert!(matches_filter(
            "org.junit:junit",
            &attrs,
            &[FilterTerm::Text("JUnit".into())],
            &[]
        ));
        assert!(!matches_filter(
            "io.grpc:grpc-core",
            &attrs,
            &[FilterTerm::Text("junit".into())],
            &[]
        ));
    }

    #[test]
    fn test_filter_equality_case_insensitive() {
        let attrs = obj(json!({"groupId": "JUnit"}));
        let terms = [FilterTerm::Eq {
            key: "groupId".into(),
            value: "junit".into(),
        }];
        assert!(matches_filter("junit:junit", &attrs, &terms, &[]));
    }

    #[test]
    fn test_filter_boolean_coercion() {
        let schema = [AttrSpec::new("optional", AttrType::Boolean, true)];
        let attrs = obj(json!({"optional": true}));
        let terms = [FilterTerm::Eq {
            key: "optional".into(),
            value: "true".into(),
        }];
        assert!(matches_filter("x", &attrs, &terms, &schema));
    }

    #[test]
    fn test_filter_terms_are_anded() {
        let attrs = obj(json!({"groupId": "junit", "artifactId": "junit"}));
        let terms = [
            FilterTerm::Eq {
                key: "groupId".into(),
                value: "junit".into(),
            },
            FilterTerm::Eq {
                key: "artifactId".into(),
                value: "other".into(),
            },
        ];
        assert!(!matches_filter("junit:junit", &attrs, &terms, &[]));
    }

    #[test]
    fn test_sort_default_ascending_name() {
        let mut entries = vec![
            ("b".to_string(), obj(json!({"name": "zeta"}))),
            ("a".to_string(), obj(json!({"name": "alpha"}))),
        ];
        sort_entries(&mut entries, &SortSpec::default());
        assert_eq!(entries[0].0, "a");
    }

    #[test]
    fn test_sort_descending_with_tiebreak() {
        let mut entries = vec![
            ("b".to_string(), obj(json!({"name": "same"}))),
            ("a".to_string(), obj(json!({"name": "same"}))),
            ("c".to_string(), obj(json!({"name": "other"}))),
        ];
        sort_entries(
            &mut entries,
            &SortSpec {
                attr: "name".into(),
                descending: true,
            },
        );
        // "same" > "other"; ties reverse the id order under desc.
        assert_eq!(entries[0].0, "b");
        assert_eq!(entries[1].0, "a");
        assert_eq!(entries[2].0, "c");
    }

    #[test]
    fn test_unknown_sort_attr_matches_no_sort_baseline() {
        // Entries where identifier order and name order disagree, so a
        // degenerate id tie-break would be visible.
        let entries = || {
            vec![
                ("b-group".to_string(), obj(json!({"name": "Apple"}))),
                ("a-group".to_string(), obj(json!({"name": "Zebra"}))),
            ]
        };
        let mut warnings = Vec::new();

        let baseline_flags = Flags::parse(None).unwrap();
        let (baseline, _) = apply_collection(&baseline_flags, entries(), &[], &mut warnings);

        let unknown_flags = Flags::parse(Some("sort=nonexistent")).unwrap();
        let (sorted, _) = apply_collection(&unknown_flags, entries(), &[], &mut warnings);

        assert_eq!(sorted, baseline);
        // The default order is ascending name, not ascending identifier.
        assert_eq!(sorted[0].0, "b-group");
        assert_eq!(sorted[1].0, "a-group");
    }

    #[test]
    fn test_validated_sort_keeps_declared_attrs() {
        let schema = [AttrSpec::new("groupId", AttrType::String, false)];
        let kept = validated_sort(
            SortSpec {
                attr: "groupId".into(),
                descending: true,
            },
            &schema,
        );
        assert_eq!(kept.attr, "groupId");
        assert!(kept.descending);

        let core = validated_sort(
            SortSpec {
                attr: "name".into(),
                descending: true,
            },
            &schema,
        );
        assert_eq!(core.attr, "name");
        assert!(core.descending);

        let fallback = validated_sort(
            SortSpec {
                attr: "nonexistent".into(),
                descending: true,
            },
            &schema,
        );
        assert_eq!(fallback.attr, "name");
        assert!(!fallback.descending);
    }

    #[test]
    fn test_apply_collection_pipeline() {
        let flags = Flags::parse(Some("filter=junit&limit=1&offset=1")).unwrap();
        let entries = vec![
            ("org.junit:junit".to_string(), obj(json!({"name": "org.junit:junit"}))),
            ("junit:junit".to_string(), obj(json!({"name": "junit:junit"}))),
            ("io.grpc:grpc-core".to_string(), obj(json!({"name": "io.grpc:grpc-core"}))),
        ];
        let mut warnings = Vec::new();
        let (page, total) = apply_collection(&flags, entries, &[], &mut warnings);
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].0, "org.junit:junit");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_apply_collection_offset_beyond_end() {
        let flags = Flags::parse(Some("limit=10&offset=99")).unwrap();
        let entries = vec![("a".to_string(), obj(json!({"name": "a"})))];
        let mut warnings = Vec::new();
        let (page, total) = apply_collection(&flags, entries, &[], &mut warnings);
        assert!(page.is_empty());
        assert_eq!(total, 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_apply_entity_noepoch_and_doc() {
        let flags = Flags::parse(Some("noepoch=true&doc=false")).unwrap();
        let mut body = json!({"xid": "/", "self": "http://x/", "epoch": 1, "docs": "http://d"});
        let mut warnings = Vec::new();
        apply_entity(&flags, &mut body, EntityKind::Registry, &mut warnings);
        assert!(body.get("epoch").is_none());
        assert!(body.get("docs").is_none());
    }

    #[test]
    fn test_apply_entity_collections_false() {
        let flags = Flags::parse(Some("collections=false")).unwrap();
        let mut body = json!({
            "self": "http://x/r",
            "versionsurl": "http://x/r/versions",
            "metaurl": "http://x/r/meta",
            "name": "r"
        });
        let mut warnings = Vec::new();
        apply_entity(&flags, &mut body, EntityKind::Resource, &mut warnings);
        assert!(body.get("versionsurl").is_none());
        assert!(body.get("metaurl").is_none());
        assert_eq!(body["self"], "http://x/r");
    }

    #[test]
    fn test_apply_entity_epoch_mismatch_warns() {
        let flags = Flags::parse(Some("epoch=7")).unwrap();
        let mut body = json!({"epoch": 1});
        let mut warnings = Vec::new();
        apply_entity(&flags, &mut body, EntityKind::Group, &mut warnings);
        assert_eq!(body["epoch"], 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("epoch 7"));
    }

    #[test]
    fn test_apply_entity_specversion_mismatch_warns() {
        let flags = Flags::parse(Some("specversion=0.5")).unwrap();
        let mut body = json!({"epoch": 1});
        let mut warnings = Vec::new();
        apply_entity(&flags, &mut body, EntityKind::Group, &mut warnings);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_apply_entity_schema_validation() {
        let flags = Flags::parse(Some("schema=true")).unwrap();
        let mut body = json!({
            "xid": "/g/x", "self": "http://h/g/x", "epoch": 1,
            "createdat": "2026-01-01T00:00:00Z", "modifiedat": "2026-01-01T00:00:00Z",
            "name": "x"
        });
        let mut warnings = Vec::new();
        apply_entity(&flags, &mut body, EntityKind::Group, &mut warnings);
        assert_eq!(body["_schema"]["valid"], true);
        assert!(warnings.is_empty());

        let mut incomplete = json!({"xid": "/g/x"});
        apply_entity(&flags, &mut incomplete, EntityKind::Group, &mut warnings);
        assert_eq!(incomplete["_schema"]["valid"], false);
        assert!(!warnings.is_empty());
    }
}
