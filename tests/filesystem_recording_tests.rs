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

/// End-to-end recording into the filesystem sink
///
use chrono::{TimeZone, Utc};
use influx_recorder::config::{ConnectionSettings, RecorderConfig};
use influx_recorder::event::{Direction, Exchange, LogData, LogLevel, TickData, TradeData};
use influx_recorder::{
    publish_lines, replay_lines, Event, EventBus, EventKind, Recorder, RecorderError, WorkerState,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn filesystem_config(temp_dir: &TempDir) -> RecorderConfig {
    let mut config = RecorderConfig::default();
    config.sink.backend = "filesystem".to_string();
    config.sink.filesystem.base_path = temp_dir.path().to_string_lossy().to_string();
    config.recorder.poll_timeout_ms = 20;
    config
}

fn read_day(temp_dir: &TempDir, day: &str) -> String {
    let path = temp_dir
        .path()
        .join("vnpy_record")
        .join("rt")
        .join(format!("{}.lp", day));
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_record_all_kinds_to_disk() {
    let temp_dir = TempDir::new().unwrap();
    let bus = Arc::new(EventBus::new());
    let recorder = Recorder::new(filesystem_config(&temp_dir), bus.clone());
    recorder
        .start_recording(&ConnectionSettings::default())
        .await
        .unwrap();

    let at = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
    bus.publish(Event::Tick(TickData {
        symbol: "AAPL".to_string(),
        exchange: Exchange::Nasdaq,
        datetime: at,
        last_price: 150.0,
        bid_price_1: 149.9,
        ask_price_1: 150.1,
        volume: 1000.0,
    }));
    bus.publish(Event::Trade(TradeData {
        symbol: "IF2401".to_string(),
        exchange: Exchange::Cffex,
        direction: Direction::Long,
        datetime: at,
        price: 3500.2,
        volume: 2.0,
        order_ref: "ref-1".to_string(),
        vt_orderid: "CTP.1".to_string(),
        vt_tradeid: "CTP.T1".to_string(),
    }));
    bus.publish(Event::StrategyLog(LogData {
        level: LogLevel::Warning,
        time: at,
        msg: "position \"flat\"".to_string(),
        source: "atr_rsi".to_string(),
    }));

    // Stop drains everything still queued
    recorder.stop_recording().await;
    assert!(matches!(recorder.state(), WorkerState::Stopped));

    let content = read_day(&temp_dir, "2024-01-02");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "tick,exchange=NASDAQ,symbol=AAPL ask=150.1,bid=149.9,last=150,volume=1000 1704205800",
            "trade,direction=LONG,exchange=CFFEX,symbol=IF2401 datetime=\"2024-01-02T14:30:00\",orderRef=\"ref-1\",price=3500.2,volume=2,vt_orderid=\"CTP.1\",vt_tradeid=\"CTP.T1\" 1704205800",
            "strategy_log,level=WARNING datetime=\"2024-01-02T14:30:00\",msg=\"position \\\"flat\\\"\" 1704205800",
        ]
    );

    let retention = temp_dir.path().join("vnpy_record").join("rt").join("retention.json");
    assert!(retention.exists());
}

#[tokio::test]
async fn test_json_feed_recorded() {
    let temp_dir = TempDir::new().unwrap();
    let bus = Arc::new(EventBus::new());
    let recorder = Recorder::new(filesystem_config(&temp_dir), bus.clone());
    recorder
        .start_recording(&ConnectionSettings::default())
        .await
        .unwrap();

    let feed = concat!(
        r#"{"type":"log","level":"INFO","time":"2024-03-05T08:00:00.750Z","msg":"gateway connected"}"#,
        "\n",
        r#"{"type":"log","level":"ERROR","time":"2024-03-05T08:00:01Z","msg":"order rejected"}"#,
        "\n",
    );
    let published = publish_lines(feed.as_bytes(), &bus).await.unwrap();
    assert_eq!(published, 2);

    recorder.close().await;

    let content = read_day(&temp_dir, "2024-03-05");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    // Sub-second precision is dropped
    assert!(lines[0].starts_with("log,level=INFO datetime=\"2024-03-05T08:00:00\""));
    assert!(lines[0].ends_with(" 1709625600"));
    assert!(lines[1].contains("msg=\"order rejected\""));
}

#[tokio::test]
async fn test_malformed_host_rejected_before_connecting() {
    let bus = Arc::new(EventBus::new());
    let recorder = Recorder::new(RecorderConfig::default(), bus.clone());

    let result = recorder
        .start_recording(&ConnectionSettings::new("", 8086, "", ""))
        .await;

    assert!(matches!(result, Err(RecorderError::Configuration(_))));
    assert!(matches!(recorder.state(), WorkerState::Idle));
}

#[tokio::test]
async fn test_unreachable_influxdb_fails_start() {
    // Grab a free port, then release it so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let bus = Arc::new(EventBus::new());
    let recorder = Recorder::new(RecorderConfig::default(), bus.clone());

    let result = recorder
        .start_recording(&ConnectionSettings::new("127.0.0.1", port, "", ""))
        .await;

    assert!(matches!(result, Err(RecorderError::Connection(_))));
    assert!(!recorder.is_running().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_replay_larger_than_inbox_loses_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = filesystem_config(&temp_dir);
    config.recorder.queue_capacity = 8;
    config.recorder.max_batch_size = 4;
    let recorder = Recorder::new(config, Arc::new(EventBus::new()));
    recorder
        .start_recording(&ConnectionSettings::default())
        .await
        .unwrap();

    let feed: String = (0..1000)
        .map(|i| {
            format!(
                "{{\"type\":\"log\",\"time\":\"2024-03-05T08:00:00Z\",\"msg\":\"evt_{}\"}}\n",
                i
            )
        })
        .collect();
    let recorded = replay_lines(feed.as_bytes(), &recorder, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(recorded, 1000);

    let inbox = recorder.inbox_stats().await.unwrap();
    assert_eq!(inbox.rejected, 0);
    recorder.close().await;

    let content = read_day(&temp_dir, "2024-03-05");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1000);
    for (i, line) in lines.iter().enumerate() {
        assert!(line.contains(&format!("msg=\"evt_{}\"", i)), "line {}: {}", i, line);
    }
}

#[tokio::test]
async fn test_replay_skips_disabled_kinds_and_needs_a_session() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = filesystem_config(&temp_dir);
    config.recorder.events = vec![EventKind::Log];
    let recorder = Recorder::new(config, Arc::new(EventBus::new()));

    let feed = concat!(
        r#"{"type":"log","time":"2024-03-05T08:00:00Z","msg":"kept"}"#,
        "\n",
        r#"{"type":"strategy_log","time":"2024-03-05T08:00:00Z","msg":"ignored"}"#,
        "\n",
    );

    // Not recording yet
    let result = replay_lines(feed.as_bytes(), &recorder, Duration::from_millis(50)).await;
    assert!(result.is_err());

    recorder
        .start_recording(&ConnectionSettings::default())
        .await
        .unwrap();
    let recorded = replay_lines(feed.as_bytes(), &recorder, Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(recorded, 1);
    recorder.close().await;

    let content = read_day(&temp_dir, "2024-03-05");
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("msg=\"kept\""));
}
