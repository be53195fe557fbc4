//! The package-name index store: one `packages` table plus an FTS5
//! projection kept synchronous by triggers.
//!
//! The live server opens the database read-only; only the index builder
//! writes. Search queries translate to either exact-match SQL or an FTS
//! MATCH expression with prefix semantics.

use crate::error::{MavenError, Result};
use rusqlite::{Connection, OpenFlags, params};
use std::path::Path;
use std::sync::Mutex;

/// Sortable columns. Unknown sort requests fall back to `coordinates ASC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    GroupId,
    ArtifactId,
    Coordinates,
}

impl SortColumn {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw? {
            "group_id" | "groupId" => Some(Self::GroupId),
            "artifact_id" | "artifactId" => Some(Self::ArtifactId),
            "coordinates" | "name" => Some(Self::Coordinates),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::GroupId => "group_id",
            Self::ArtifactId => "artifact_id",
            Self::Coordinates => "coordinates",
        }
    }
}

/// Fields an exact-match search may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchField {
    GroupId,
    ArtifactId,
    #[default]
    Coordinates,
}

impl SearchField {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("group_id" | "groupId") => Self::GroupId,
            Some("artifact_id" | "artifactId") => Self::ArtifactId,
            _ => Self::Coordinates,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::GroupId => "group_id",
            Self::ArtifactId => "artifact_id",
            Self::Coordinates => "coordinates",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: String,
    pub limit: usize,
    pub offset: usize,
    pub exact_match: bool,
    pub field: SearchField,
    pub sort_by: Option<SortColumn>,
    pub sort_desc: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRow {
    pub id: i64,
    pub group_id: String,
    pub artifact_id: String,
    pub coordinates: String,
}

#[derive(Debug, Clone)]
pub struct SearchResults {
    pub results: Vec<PackageRow>,
    pub total_count: u64,
    pub has_more: bool,
}

pub struct PackageStore {
    conn: Mutex<Connection>,
}

impl PackageStore {
    /// Opens an existing index read-only (the server path).
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens (or creates) a writable store, applying the schema. Used by
    /// the builder and by tests that seed fixtures.
    pub fn open_writable(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn insert(&self, group_id: &str, artifact_id: &str) -> Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO packages (group_id, artifact_id, coordinates)
             VALUES (?1, ?2, ?1 || ':' || ?2)",
            params![group_id, artifact_id],
        )?;
        Ok(())
    }

    pub fn count_all(&self) -> Result<u64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM packages", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn get_by_coordinates(&self, group_id: &str, artifact_id: &str) -> Result<Option<PackageRow>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, group_id, artifact_id, coordinates FROM packages
             WHERE group_id = ?1 AND artifact_id = ?2",
        )?;
        let mut rows = stmt.query_map(params![group_id, artifact_id], row_to_package)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Runs one search with its parallel count, per the uniform contract:
    /// empty query pages the whole table, `exact_match` compares the chosen
    /// field, anything else goes through FTS with prefix semantics.
    pub fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        let order = order_clause(query);
        let conn = self.conn.lock().expect("store mutex poisoned");

        let (mut results, total_count) = if query.query.is_empty() {
            let sql = format!(
                "SELECT id, group_id, artifact_id, coordinates FROM packages
                 ORDER BY {order} LIMIT ?1 OFFSET ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![query.limit as i64, query.offset as i64], row_to_package)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let total: u64 =
                conn.query_row("SELECT COUNT(*) FROM packages", [], |row| row.get(0))?;
            (rows, total)
        } else if query.exact_match {
            let column = query.field.column();
            let sql = format!(
                "SELECT id, group_id, artifact_id, coordinates FROM packages
                 WHERE {column} = ?1 ORDER BY {order} LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![query.query, query.limit as i64, query.offset as i64],
                    row_to_package,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let count_sql = format!("SELECT COUNT(*) FROM packages WHERE {column} = ?1");
            let total: u64 = conn.query_row(&count_sql, params![query.query], |row| row.get(0))?;
            (rows, total)
        } else {
            let Some(expression) = fts_expression(&query.query) else {
                return Ok(SearchResults {
                    results: Vec::new(),
                    total_count: 0,
                    has_more: false,
                });
            };
            let sql = format!(
                "SELECT p.id, p.group_id, p.artifact_id, p.coordinates
                 FROM packages p JOIN packages_fts f ON p.id = f.rowid
                 WHERE packages_fts MATCH ?1
                 ORDER BY {order} LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![expression, query.limit as i64, query.offset as i64],
                    row_to_package,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let total: u64 = conn.query_row(
                "SELECT COUNT(*) FROM packages_fts WHERE packages_fts MATCH ?1",
                params![expression],
                |row| row.get(0),
            )?;
            (rows, total)
        };

        if query.limit > 0 {
            results.truncate(query.limit);
        }
        let has_more = (query.offset + results.len()) < total_count as usize;
        Ok(SearchResults {
            results,
            total_count,
            has_more,
        })
    }
}

fn row_to_package(row: &rusqlite::Row<'_>) -> std::result::Result<PackageRow, rusqlite::Error> {
    Ok(PackageRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        artifact_id: row.get(2)?,
        coordinates: row.get(3)?,
    })
}

fn order_clause(query: &SearchQuery) -> String {
    match query.sort_by {
        Some(column) => {
            let direction = if query.sort_desc { "DESC" } else { "ASC" };
            format!("{} {direction}", column.column())
        }
        None => "coordinates ASC".to_string(),
    }
}

/// Translates a raw query into an FTS5 MATCH expression.
///
/// Characters outside `[\w\-_.:\s]` are stripped first. A `g:a` query
/// becomes a phrase pair; single terms get prefix semantics.
pub fn fts_expression(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':') || c.is_whitespace())
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    if let Some((group, artifact)) = cleaned.split_once(':') {
        let (group, artifact) = (group.trim(), artifact.trim());
        if !group.is_empty() && !artifact.is_empty() {
            return Some(format!("\"{group}\" AND \"{artifact}\""));
        }
    }

    let terms: Vec<&str> = cleaned.split_whitespace().collect();
    Some(
        terms
            .iter()
            .map(|t| format!("\"{t}\"*"))
            .collect::<Vec<_>>()
            .join(" AND "),
    )
}

/// Applies the full schema: base table, B-tree indexes, FTS projection,
/// and the three synchronizing triggers.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS packages (
             id INTEGER PRIMARY KEY,
             group_id TEXT NOT NULL,
             artifact_id TEXT NOT NULL,
             coordinates TEXT NOT NULL,
             created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
             UNIQUE(group_id, artifact_id)
         );
         CREATE INDEX IF NOT EXISTS idx_packages_group_id ON packages(group_id);
         CREATE INDEX IF NOT EXISTS idx_packages_artifact_id ON packages(artifact_id);
         CREATE INDEX IF NOT EXISTS idx_packages_coordinates ON packages(coordinates);
         CREATE VIRTUAL TABLE IF NOT EXISTS packages_fts USING fts5(
             group_id, artifact_id, coordinates,
             content='packages', content_rowid='id'
         );
         CREATE TRIGGER IF NOT EXISTS packages_ai AFTER INSERT ON packages BEGIN
             INSERT INTO packages_fts(rowid, group_id, artifact_id, coordinates)
             VALUES (new.id, new.group_id, new.artifact_id, new.coordinates);
         END;
         CREATE TRIGGER IF NOT EXISTS packages_ad AFTER DELETE ON packages BEGIN
             INSERT INTO packages_fts(packages_fts, rowid, group_id, artifact_id, coordinates)
             VALUES ('delete', old.id, old.group_id, old.artifact_id, old.coordinates);
         END;
         CREATE TRIGGER IF NOT EXISTS packages_au AFTER UPDATE ON packages BEGIN
             INSERT INTO packages_fts(packages_fts, rowid, group_id, artifact_id, coordinates)
             VALUES ('delete', old.id, old.group_id, old.artifact_id, old.coordinates);
             INSERT INTO packages_fts(rowid, group_id, artifact_id, coordinates)
             VALUES (new.id, new.group_id, new.artifact_id, new.coordinates);
         END;",
    )
    .map_err(|e| MavenError::IndexError(e.to_string()))?;
    Ok(())
}
