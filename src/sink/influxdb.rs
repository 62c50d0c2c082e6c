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

// InfluxDB 1.x HTTP API sink

use super::backend::Sink;
use crate::config::{ConnectionSettings, InfluxDbConfig, RetentionPolicy};
use crate::record::{encode_batch, Record};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

/// InfluxDB client writing line protocol over HTTP
pub struct InfluxDbSink {
    client: Client,
    base_url: String,
    database: String,
    user: String,
    password: String,
    gzip: bool,
}

/// Body of a /query response
#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    error: Option<String>,
}

impl QueryResponse {
    fn first_error(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.results.iter().find_map(|r| r.error.as_deref()))
    }
}

impl InfluxDbSink {
    pub fn new(
        config: &InfluxDbConfig,
        connection: &ConnectionSettings,
        database: &str,
    ) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        let scheme = if config.use_https { "https" } else { "http" };
        let base_url = format!("{}://{}:{}", scheme, connection.host, connection.port);

        Ok(Self {
            client,
            base_url,
            database: database.to_string(),
            user: connection.user.clone(),
            password: connection.password.clone(),
            gzip: config.gzip,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.user.is_empty() {
            request
        } else {
            request.basic_auth(&self.user, Some(&self.password))
        }
    }

    /// Run one InfluxQL statement and surface statement-level errors
    async fn query(&self, statement: &str) -> Result<()> {
        debug!("InfluxQL: {}", statement);

        let request = self
            .client
            .post(format!("{}/query", self.base_url))
            .form(&[("q", statement)]);

        let response = self
            .authorize(request)
            .send()
            .await
            .context("Failed to send query")?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let parsed: QueryResponse = serde_json::from_str(&text).unwrap_or_default();

        if let Some(error) = parsed.first_error() {
            bail!("{}", error);
        }
        if !status.is_success() {
            bail!("InfluxDB query failed with status {}: {}", status, text);
        }

        Ok(())
    }

    fn retention_policy_clauses(policy: &RetentionPolicy) -> String {
        let mut clauses = format!(
            "DURATION {} REPLICATION {} SHARD DURATION {}",
            policy.duration, policy.replication, policy.shard_duration
        );
        if policy.default {
            clauses.push_str(" DEFAULT");
        }
        clauses
    }

    fn compress(body: &str) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder
            .write_all(body.as_bytes())
            .context("Failed to gzip write body")?;
        encoder.finish().context("Failed to gzip write body")
    }
}

#[async_trait]
impl Sink for InfluxDbSink {
    async fn ping(&self) -> Result<bool> {
        let request = self.client.get(format!("{}/ping", self.base_url));
        let response = self
            .authorize(request)
            .send()
            .await
            .with_context(|| format!("InfluxDB at {} is unreachable", self.base_url))?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => {
                let version = response
                    .headers()
                    .get("X-Influxdb-Version")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown")
                    .to_string();
                info!("Connected to InfluxDB {} (version {})", self.base_url, version);
                Ok(true)
            }
            status => {
                warn!("InfluxDB ping failed with status: {}", status);
                Ok(false)
            }
        }
    }

    async fn ensure_database(&self, name: &str) -> Result<()> {
        // CREATE DATABASE is a no-op for an existing database
        self.query(&format!("CREATE DATABASE {}", quote_ident(name)))
            .await
            .with_context(|| format!("Failed to create database '{}'", name))?;
        info!("Database '{}' ready", name);
        Ok(())
    }

    async fn ensure_retention_policy(&self, policy: &RetentionPolicy) -> Result<()> {
        let clauses = Self::retention_policy_clauses(policy);
        let target = format!(
            "{} ON {}",
            quote_ident(&policy.name),
            quote_ident(&self.database)
        );

        match self
            .query(&format!("CREATE RETENTION POLICY {} {}", target, clauses))
            .await
        {
            Ok(()) => {}
            Err(e) if e.to_string().contains("already exists") => {
                info!(
                    "Retention policy '{}' exists with other settings, altering",
                    policy.name
                );
                self.query(&format!("ALTER RETENTION POLICY {} {}", target, clauses))
                    .await
                    .with_context(|| {
                        format!("Failed to alter retention policy '{}'", policy.name)
                    })?;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to create retention policy '{}'", policy.name)
                })
            }
        }

        info!(
            "Retention policy '{}' on '{}' ready ({})",
            policy.name, self.database, clauses
        );
        Ok(())
    }

    async fn write(&self, records: &[Record], retention_policy: &str) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let body = encode_batch(records)?;
        let mut request = self.client.post(format!("{}/write", self.base_url)).query(&[
            ("db", self.database.as_str()),
            ("rp", retention_policy),
            ("precision", "s"),
        ]);

        request = if self.gzip {
            request
                .header("Content-Encoding", "gzip")
                .body(Self::compress(&body)?)
        } else {
            request.body(body)
        };

        let response = self
            .authorize(request.header("Content-Type", "text/plain; charset=utf-8"))
            .send()
            .await
            .context("Failed to send write request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("InfluxDB write failed with status {}: {}", status, error_text);
        }

        debug!(
            "Wrote {} records to {}.{}",
            records.len(),
            self.database,
            retention_policy
        );
        Ok(())
    }

    fn sink_type(&self) -> &str {
        "influxdb"
    }
}

/// Double-quote an InfluxQL identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}
