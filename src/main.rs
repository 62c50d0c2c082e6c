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

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use influx_recorder::config::LoggingConfig;
use influx_recorder::{
    load_config_with_env, replay_lines, ConnectionSettings, EventBus, Recorder, WorkerState,
    DEFAULT_SETTINGS_FILE,
};

/// Influx Recorder - Record tick, trade and log events into InfluxDB
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    /// Connection settings file (host, port, user, password)
    #[arg(short, long, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    /// JSON-lines event feed, "-" for stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Server host (overrides settings file)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides settings file)
    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    user: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// Write the effective connection settings back to the settings file
    #[arg(long)]
    save_settings: bool,
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match logging.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

async fn open_input(input: &str) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("Failed to open event feed {}", input))?;
    Ok(Box::new(BufReader::new(file)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration from file
    let config = load_config_with_env(&args.config)?;
    init_logging(&config.logging)?;

    info!("Starting Influx Recorder");
    info!("Loaded configuration from: {:?}", args.config);
    info!("Sink backend: {}", config.sink.backend);

    // Connection settings: file, then CLI overrides
    let mut connection =
        ConnectionSettings::load_or(&args.settings, (&config.sink.influxdb).into())?;
    if let Some(host) = args.host {
        connection.host = host;
    }
    if let Some(port) = args.port {
        connection.port = port;
    }
    if let Some(user) = args.user {
        connection.user = user;
    }
    if let Some(password) = args.password {
        connection.password = password;
    }
    if args.save_settings {
        connection.save(&args.settings)?;
    }

    // Nothing publishes on the bus here; the feed is replayed with backpressure
    let bus = Arc::new(EventBus::new());
    let recorder = Recorder::new(config, bus);
    recorder.start_recording(&connection).await?;

    let input = open_input(&args.input).await?;
    let wait = recorder.config().recorder.enqueue_timeout();
    let mut state = recorder.watch_state();

    // Run until the feed ends, Ctrl+C, or the worker faults
    tokio::select! {
        result = replay_lines(input, &recorder, wait) => {
            match result {
                Ok(count) => info!("Event feed ended after {} events", count),
                Err(e) => error!("Event feed error: {:#}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = async { state.wait_for(WorkerState::is_faulted).await.is_ok() } => {
            warn!("Recorder worker faulted, shutting down");
        }
    }

    // Cleanup
    recorder.close().await;

    if let Some(stats) = recorder.inbox_stats().await {
        info!(
            "Inbox: {} enqueued, {} dequeued, {} rejected",
            stats.enqueued, stats.dequeued, stats.rejected
        );
    }
    if let Some(stats) = recorder.worker_stats().await {
        info!(
            "Worker: {} records in {} batches, {} unmapped, {} discarded",
            stats.records_written, stats.batches_written, stats.unmapped, stats.discarded
        );
    }

    if let Some(cause) = recorder.last_fault().await {
        error!("Recording ended with a fault: {}", cause);
        std::process::exit(1);
    }

    info!("Influx Recorder shut down successfully");
    // A pending stdin read would otherwise hold the runtime open
    std::process::exit(0)
}
