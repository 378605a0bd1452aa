//! ---
//! rcvr_section: "05-procedures"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Filesystem corruption scan."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rcvr_catalog::{RecoveryContext, RecoveryExecutor, RecoveryResult};
use rcvr_common::config::ScanProcedureConfig;
use serde_json::json;
use tracing::warn;
use walkdir::WalkDir;

/// Reports zero-length files and JSON files that fail to parse.
#[derive(Debug, Clone)]
pub struct FilesystemScan {
    directory: PathBuf,
    max_files: usize,
}

impl FilesystemScan {
    pub fn new(config: &ScanProcedureConfig) -> Self {
        Self {
            directory: config.directory.clone(),
            max_files: config.max_files,
        }
    }
}

#[derive(Debug, Default)]
struct ScanReport {
    scanned: usize,
    truncated: bool,
    corrupt: Vec<(String, String)>,
}

fn scan_directory(directory: &Path, max_files: usize) -> ScanReport {
    let mut report = ScanReport::default();
    for entry in WalkDir::new(directory).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry during scan");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if report.scanned >= max_files {
            report.truncated = true;
            break;
        }
        report.scanned += 1;

        let path = entry.path();
        let display = path.display().to_string();
        let len = entry.metadata().map(|metadata| metadata.len()).unwrap_or(0);
        if len == 0 {
            report.corrupt.push((display, "empty file".into()));
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            let parsed = std::fs::read(path)
                .map_err(|err| err.to_string())
                .and_then(|bytes| {
                    serde_json::from_slice::<serde_json::Value>(&bytes).map_err(|err| err.to_string())
                });
            if let Err(reason) = parsed {
                report.corrupt.push((display, reason));
            }
        }
    }
    report
}

#[async_trait]
impl RecoveryExecutor for FilesystemScan {
    async fn execute(&self, context: &RecoveryContext) -> Result<RecoveryResult> {
        let directory = context
            .get("directory")
            .and_then(|value| value.as_str())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.directory.clone());
        if !directory.is_dir() {
            return Ok(RecoveryResult::failure(format!(
                "scan directory {} does not exist",
                directory.display()
            )));
        }

        let max_files = self.max_files;
        let scan_root = directory.clone();
        let report = tokio::task::spawn_blocking(move || scan_directory(&scan_root, max_files))
            .await
            .context("filesystem scan task failed")?;

        let corrupt: Vec<_> = report
            .corrupt
            .iter()
            .map(|(path, reason)| json!({ "path": path, "reason": reason }))
            .collect();
        let details = json!({
            "directory": directory.display().to_string(),
            "scanned": report.scanned,
            "truncated": report.truncated,
            "corrupt": corrupt,
        });
        let result = if report.corrupt.is_empty() {
            RecoveryResult::success(format!("scanned {} files, no corruption found", report.scanned))
        } else {
            RecoveryResult::failure(format!(
                "{} corrupted files found in {}",
                report.corrupt.len(),
                directory.display()
            ))
        };
        Ok(result.with_details(details))
    }
}
