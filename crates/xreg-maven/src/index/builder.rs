//! Periodic construction of the package-name index from the Nexus
//! Maven repository index.
//!
//! Pipeline: freshness check, conditional archive download, external
//! extractor run, `.fld` ingest into a staging database, FTS rebuild and
//! compaction, then an atomic rename over the previous database. Any
//! phase failure leaves the previous database untouched.

use crate::error::{MavenError, Result};
use crate::index::store;
use rusqlite::{Connection, params};
use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::process::Command;

pub const NEXUS_INDEX_URL: &str =
    "https://repo.maven.apache.org/maven2/.index/nexus-maven-repository-index.gz";

const DEFAULT_EXTRACTOR_IMAGE: &str = "maven-index-exporter:latest";
const PROGRESS_EVERY: u64 = 100_000;

#[derive(Debug, Clone)]
pub struct IndexBuildOptions {
    /// Working directory holding the downloaded archive and `export/`.
    pub workdir: PathBuf,
    /// Final database location.
    pub output: PathBuf,
    /// Rebuild even when the database is fresh.
    pub force: bool,
    /// Databases younger than this are left alone unless forced.
    pub freshness: Duration,
    /// Docker image of the external index extractor.
    pub extractor_image: String,
}

impl IndexBuildOptions {
    pub fn new(workdir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            output: output.into(),
            force: false,
            freshness: Duration::from_secs(24 * 60 * 60),
            extractor_image: DEFAULT_EXTRACTOR_IMAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub skipped: bool,
    pub lines_read: u64,
    pub packages_inserted: u64,
}

/// Runs the full pipeline. Each phase failure is tagged with its phase
/// name so the CLI can exit non-zero with a usable message.
pub async fn build_index(options: &IndexBuildOptions) -> Result<BuildReport> {
    if !options.force && is_fresh(&options.output, options.freshness) {
        tracing::info!(db = %options.output.display(), "index database is fresh, skipping rebuild");
        return Ok(BuildReport {
            skipped: true,
            ..Default::default()
        });
    }

    tokio::fs::create_dir_all(&options.workdir)
        .await
        .map_err(|e| MavenError::build("prepare", e.to_string()))?;

    let archive = options.workdir.join("nexus-maven-repository-index.gz");
    download_archive(NEXUS_INDEX_URL, &archive).await?;
    run_extractor(options).await?;
    let fld = find_fld_file(&options.workdir.join("export"))?;

    let staging = options.output.with_extension("db.tmp");
    let report = {
        let staging = staging.clone();
        tokio::task::spawn_blocking(move || ingest(&fld, &staging))
            .await
            .map_err(|e| MavenError::build("ingest", e.to_string()))??
    };

    tokio::fs::rename(&staging, &options.output)
        .await
        .map_err(|e| MavenError::build("publish", e.to_string()))?;

    tracing::info!(
        lines = report.lines_read,
        packages = report.packages_inserted,
        db = %options.output.display(),
        "index rebuild complete"
    );
    Ok(report)
}

fn is_fresh(path: &Path, freshness: Duration) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age < freshness)
        .unwrap_or(false)
}

/// Downloads the archive, conditional on the local copy's mtime.
async fn download_archive(url: &str, target: &Path) -> Result<()> {
    let client = reqwest_client();
    let mut request = client.get(url);
    if let Ok(metadata) = std::fs::metadata(target)
        && let Ok(modified) = metadata.modified()
    {
        let since = chrono::DateTime::<chrono::Utc>::from(modified)
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        request = request.header("if-modified-since", since);
    }

    let response = request
        .send()
        .await
        .map_err(|e| MavenError::build("download", e.to_string()))?;

    if response.status().as_u16() == 304 {
        tracing::info!(url, "nexus index unchanged upstream");
        return Ok(());
    }
    if !response.status().is_success() {
        return Err(MavenError::build(
            "download",
            format!("GET {url} returned {}", response.status()),
        ));
    }

    let tmp = target.with_extension("gz.part");
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|e| MavenError::build("download", e.to_string()))?;
    let mut response = response;
    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| MavenError::build("download", e.to_string()))?
    {
        tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
            .await
            .map_err(|e| MavenError::build("download", e.to_string()))?;
        written += chunk.len() as u64;
    }
    drop(file);
    tokio::fs::rename(&tmp, target)
        .await
        .map_err(|e| MavenError::build("download", e.to_string()))?;

    tracing::info!(url, bytes = written, "nexus index archive downloaded");
    Ok(())
}

fn reqwest_client() -> reqwest::Client {
    reqwest::Client::new()
}

/// Runs the external extractor, which consumes the working directory as
/// `/work` and emits `export/*.fld`.
async fn run_extractor(options: &IndexBuildOptions) -> Result<()> {
    let workdir = options
        .workdir
        .canonicalize()
        .map_err(|e| MavenError::build("extract", e.to_string()))?;

    let status = Command::new("docker")
        .arg("run")
        .arg("--rm")
        .arg("-v")
        .arg(format!("{}:/work", workdir.display()))
        .arg(&options.extractor_image)
        .status()
        .await
        .map_err(|e| MavenError::build("extract", e.to_string()))?;

    if !status.success() {
        return Err(MavenError::build(
            "extract",
            format!("extractor exited with {status}"),
        ));
    }
    Ok(())
}

fn find_fld_file(export_dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(export_dir)
        .map_err(|e| MavenError::build("extract", format!("{}: {e}", export_dir.display())))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "fld") {
            return Ok(path);
        }
    }
    Err(MavenError::build(
        "extract",
        format!("no .fld file under {}", export_dir.display()),
    ))
}

/// Streams the `.fld` file into a staging database: one transaction,
/// `INSERT OR IGNORE`, in-memory dedup, then FTS rebuild and `VACUUM`.
fn ingest(fld: &Path, staging: &Path) -> Result<BuildReport> {
    // A stale staging file from an aborted run must not leak rows in.
    let _ = std::fs::remove_file(staging);

    let conn = Connection::open(staging)?;
    store::ensure_schema(&conn)?;

    let file = std::fs::File::open(fld)
        .map_err(|e| MavenError::build("ingest", format!("{}: {e}", fld.display())))?;
    let reader = std::io::BufReader::new(file);

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut report = BuildReport::default();

    conn.execute_batch("BEGIN")?;
    {
        let mut insert = conn.prepare(
            "INSERT OR IGNORE INTO packages (group_id, artifact_id, coordinates)
             VALUES (?1, ?2, ?1 || ':' || ?2)",
        )?;

        for line in reader.lines() {
            let line = line.map_err(|e| MavenError::build("ingest", e.to_string()))?;
            report.lines_read += 1;
            if report.lines_read % PROGRESS_EVERY == 0 {
                tracing::info!(
                    lines = report.lines_read,
                    packages = report.packages_inserted,
                    "index ingest progress"
                );
            }

            let Some(payload) = line.strip_prefix("value ") else {
                continue;
            };
            let mut parts = payload.split('|');
            let (Some(group_id), Some(artifact_id)) = (parts.next(), parts.next()) else {
                continue;
            };
            if group_id.is_empty() || artifact_id.is_empty() {
                continue;
            }
            if !seen.insert((group_id.to_string(), artifact_id.to_string())) {
                continue;
            }
            let changed = insert.execute(params![group_id, artifact_id])?;
            report.packages_inserted += changed as u64;
        }
    }
    conn.execute_batch("COMMIT")?;

    // Rebuild the projection from the content table, then compact.
    conn.execute(
        "INSERT INTO packages_fts(packages_fts) VALUES ('rebuild')",
        [],
    )?;
    conn.execute_batch("VACUUM")?;
    Ok(report)
}
