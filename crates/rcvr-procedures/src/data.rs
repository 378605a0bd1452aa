//! ---
//! rcvr_section: "05-procedures"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Backup-based data restoration."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rcvr_catalog::{RecoveryContext, RecoveryExecutor, RecoveryResult, StepLog};
use rcvr_common::config::DataProcedureConfig;
use serde_json::json;
use tokio::fs;

/// Restores the newest backup. A missing backup stops the procedure before
/// anything is written.
#[derive(Debug, Clone)]
pub struct DataRecovery {
    backup_dir: PathBuf,
    restore_dir: PathBuf,
}

impl DataRecovery {
    pub fn new(config: &DataProcedureConfig) -> Self {
        Self {
            backup_dir: config.backup_dir.clone(),
            restore_dir: config.restore_dir.clone(),
        }
    }
}

async fn newest_backup(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to list backups in {}", dir.display()))
        }
    };
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let path = entry.path();
        let newer = match &newest {
            Some((best, best_path)) => (modified, &path) > (*best, best_path),
            None => true,
        };
        if newer {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

#[async_trait]
impl RecoveryExecutor for DataRecovery {
    async fn execute(&self, _context: &RecoveryContext) -> Result<RecoveryResult> {
        let mut log = StepLog::new();

        let Some(backup) = newest_backup(&self.backup_dir).await? else {
            log.fail(
                "locate_backup",
                format!("no backup found in {}", self.backup_dir.display()),
            );
            return Ok(log.finish("data restored"));
        };
        log.pass("locate_backup", backup.display().to_string());

        let bytes = fs::read(&backup)
            .await
            .with_context(|| format!("failed to read backup {}", backup.display()))?;
        if let Err(err) = serde_json::from_slice::<serde_json::Value>(&bytes) {
            log.fail("verify_backup", format!("backup is not valid JSON: {err}"));
            return Ok(log.finish("data restored"));
        }
        log.pass("verify_backup", format!("{} bytes verified", bytes.len()));

        fs::create_dir_all(&self.restore_dir)
            .await
            .with_context(|| format!("failed to create {}", self.restore_dir.display()))?;
        let file_name = backup
            .file_name()
            .context("backup path has no file name")?;
        let target = self.restore_dir.join(file_name);
        fs::write(&target, &bytes)
            .await
            .with_context(|| format!("failed to write {}", target.display()))?;
        log.pass("restore", target.display().to_string());

        Ok(log
            .finish(format!("restored {}", backup.display()))
            .with_details(json!({
                "backup": backup.display().to_string(),
                "restored_to": target.display().to_string(),
            })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn executor(root: &Path) -> DataRecovery {
        DataRecovery::new(&DataProcedureConfig {
            backup_dir: root.join("backups"),
            restore_dir: root.join("restore"),
        })
    }

    #[tokio::test]
    async fn missing_backup_is_a_hard_stop() {
        let dir = tempdir().unwrap();
        let result = executor(dir.path()).execute(&RecoveryContext::new()).await.unwrap();
        assert!(!result.success);
        assert!(result.message.contains("no backup found"));
        assert_eq!(result.steps.len(), 1);
        assert!(!dir.path().join("restore").exists());
    }

    #[tokio::test]
    async fn newest_valid_backup_is_restored() {
        let dir = tempdir().unwrap();
        let backups = dir.path().join("backups");
        std::fs::create_dir_all(&backups).unwrap();
        std::fs::write(backups.join("2024-01-01.json"), br#"{"rows": 1}"#).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(backups.join("2024-01-02.json"), br#"{"rows": 2}"#).unwrap();

        let result = executor(dir.path()).execute(&RecoveryContext::new()).await.unwrap();
        assert!(result.success, "{}", result.message);
        let restored = std::fs::read_to_string(dir.path().join("restore").join("2024-01-02.json")).unwrap();
        assert_eq!(restored, r#"{"rows": 2}"#);
        assert_eq!(result.steps.len(), 3);
    }

    #[tokio::test]
    async fn corrupt_backup_fails_verification() {
        let dir = tempdir().unwrap();
        let backups = dir.path().join("backups");
        std::fs::create_dir_all(&backups).unwrap();
        std::fs::write(backups.join("latest.json"), b"{ truncated").unwrap();

        let result = executor(dir.path()).execute(&RecoveryContext::new()).await.unwrap();
        assert!(!result.success);
        assert!(result.message.contains("verify_backup"));
        assert!(!dir.path().join("restore").exists());
    }
}
