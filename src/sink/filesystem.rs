// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Filesystem sink: line-protocol files on local disk, for offline capture

use super::backend::Sink;
use crate::config::{FilesystemConfig, RetentionPolicy};
use crate::record::Record;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Appends records to `<base>/<database>/<retention_policy>/<YYYY-MM-DD>.lp`
pub struct FilesystemSink {
    base_path: PathBuf,
    database: String,
}

impl FilesystemSink {
    pub fn new(config: &FilesystemConfig, database: &str) -> Result<Self> {
        let base_path = PathBuf::from(&config.base_path);

        info!("Initializing filesystem sink at: {}", base_path.display());

        Ok(Self {
            base_path,
            database: database.to_string(),
        })
    }

    fn database_dir(&self) -> PathBuf {
        self.base_path.join(&self.database)
    }

    fn policy_dir(&self, retention_policy: &str) -> PathBuf {
        self.database_dir().join(retention_policy)
    }

    /// Daily file a record lands in, keyed by the record's own timestamp
    fn file_path(&self, retention_policy: &str, record: &Record) -> PathBuf {
        let day = record.timestamp.format("%Y-%m-%d").to_string();
        self.policy_dir(retention_policy).join(format!("{}.lp", day))
    }

    fn metadata_path(&self, retention_policy: &str) -> PathBuf {
        self.policy_dir(retention_policy).join("retention.json")
    }
}

#[async_trait]
impl Sink for FilesystemSink {
    async fn ping(&self) -> Result<bool> {
        // Writable base directory (created on demand) counts as reachable
        if let Err(e) = fs::create_dir_all(&self.base_path).await {
            warn!(
                "Ping failed - cannot create base path {}: {}",
                self.base_path.display(),
                e
            );
            return Ok(false);
        }

        let probe = self.base_path.join(".ping");
        match fs::File::create(&probe).await {
            Ok(mut f) => {
                if let Err(e) = f.write_all(b"ping").await {
                    warn!("Ping failed - cannot write: {}", e);
                    return Ok(false);
                }
                let _ = fs::remove_file(&probe).await;
                Ok(true)
            }
            Err(e) => {
                warn!("Ping failed - cannot create file: {}", e);
                Ok(false)
            }
        }
    }

    async fn ensure_database(&self, name: &str) -> Result<()> {
        let dir = self.base_path.join(name);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
        info!("Database directory ready: {}", dir.display());
        Ok(())
    }

    async fn ensure_retention_policy(&self, policy: &RetentionPolicy) -> Result<()> {
        let dir = self.policy_dir(&policy.name);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create policy directory {}", dir.display()))?;

        // Retention is not enforced on disk; the policy is kept for reference
        let metadata = serde_json::to_string_pretty(policy)
            .context("Failed to serialize retention policy")?;
        fs::write(self.metadata_path(&policy.name), metadata)
            .await
            .context("Failed to write retention policy metadata")?;

        Ok(())
    }

    async fn write(&self, records: &[Record], retention_policy: &str) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        // Group by target file, keeping arrival order within each file
        let mut per_file: BTreeMap<PathBuf, String> = BTreeMap::new();
        for record in records {
            let line = record.to_line_protocol()?;
            let body = per_file.entry(self.file_path(retention_policy, record)).or_default();
            body.push_str(&line);
            body.push('\n');
        }

        fs::create_dir_all(self.policy_dir(retention_policy))
            .await
            .context("Failed to create policy directory")?;

        for (path, body) in per_file {
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;

            file.write_all(body.as_bytes())
                .await
                .context("Failed to write records")?;
            file.flush().await.context("Failed to flush records")?;

            debug!("Appended {} bytes to {}", body.len(), path.display());
        }

        Ok(())
    }

    fn sink_type(&self) -> &str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn create_test_sink() -> (FilesystemSink, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = FilesystemConfig {
            base_path: temp_dir.path().to_string_lossy().to_string(),
        };
        let sink = FilesystemSink::new(&config, "vnpy_record").unwrap();
        (sink, temp_dir)
    }

    fn record(day: u32, value: f64) -> Record {
        let mut fields = BTreeMap::new();
        fields.insert("last".to_string(), FieldValue::Float(value));
        Record::new(
            "tick",
            BTreeMap::new(),
            fields,
            Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_ping_and_provision() {
        let (sink, _temp_dir) = create_test_sink();
        assert!(sink.ping().await.unwrap());

        sink.ensure_database("vnpy_record").await.unwrap();
        sink.ensure_retention_policy(&RetentionPolicy::default())
            .await
            .unwrap();

        assert!(sink.policy_dir("rt").is_dir());
        let saved: RetentionPolicy =
            serde_json::from_str(&std::fs::read_to_string(sink.metadata_path("rt")).unwrap())
                .unwrap();
        assert_eq!(saved, RetentionPolicy::default());
    }

    #[tokio::test]
    async fn test_write_appends_in_order() {
        let (sink, _temp_dir) = create_test_sink();

        sink.write(&[record(2, 1.0), record(2, 2.0)], "rt").await.unwrap();
        sink.write(&[record(2, 3.0)], "rt").await.unwrap();

        let content = std::fs::read_to_string(sink.policy_dir("rt").join("2024-01-02.lp")).unwrap();
        let values: Vec<&str> = content
            .lines()
            .map(|line| line.split(' ').nth(1).unwrap())
            .collect();
        assert_eq!(values, vec!["last=1", "last=2", "last=3"]);
    }

    #[tokio::test]
    async fn test_write_splits_by_day() {
        let (sink, _temp_dir) = create_test_sink();
        sink.write(&[record(2, 1.0), record(3, 2.0)], "rt").await.unwrap();

        assert!(sink.policy_dir("rt").join("2024-01-02.lp").exists());
        assert!(sink.policy_dir("rt").join("2024-01-03.lp").exists());
    }

    #[tokio::test]
    async fn test_write_non_finite_fails() {
        let (sink, _temp_dir) = create_test_sink();
        assert!(sink.write(&[record(2, f64::NAN)], "rt").await.is_err());
    }
}
