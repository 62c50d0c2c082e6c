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

// Domain events delivered by the application event bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange a symbol is listed on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    Nasdaq,
    Nyse,
    Arca,
    Smart,
    Cme,
    Cbot,
    Nymex,
    Comex,
    Globex,
    Ice,
    Sehk,
    Hkfe,
    Sse,
    Szse,
    Cffex,
    Shfe,
    Dce,
    Czce,
    Ine,
    Binance,
    Local,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Nasdaq => "NASDAQ",
            Exchange::Nyse => "NYSE",
            Exchange::Arca => "ARCA",
            Exchange::Smart => "SMART",
            Exchange::Cme => "CME",
            Exchange::Cbot => "CBOT",
            Exchange::Nymex => "NYMEX",
            Exchange::Comex => "COMEX",
            Exchange::Globex => "GLOBEX",
            Exchange::Ice => "ICE",
            Exchange::Sehk => "SEHK",
            Exchange::Hkfe => "HKFE",
            Exchange::Sse => "SSE",
            Exchange::Szse => "SZSE",
            Exchange::Cffex => "CFFEX",
            Exchange::Shfe => "SHFE",
            Exchange::Dce => "DCE",
            Exchange::Czce => "CZCE",
            Exchange::Ine => "INE",
            Exchange::Binance => "BINANCE",
            Exchange::Local => "LOCAL",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
    Net,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
            Direction::Net => "NET",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-of-book market snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickData {
    pub symbol: String,
    pub exchange: Exchange,
    pub datetime: DateTime<Utc>,
    pub last_price: f64,
    pub bid_price_1: f64,
    pub ask_price_1: f64,
    pub volume: f64,
}

/// Fill reported by a gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeData {
    pub symbol: String,
    pub exchange: Exchange,
    pub direction: Direction,
    pub datetime: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
    #[serde(default)]
    pub order_ref: String,
    pub vt_orderid: String,
    pub vt_tradeid: String,
}

/// Log line emitted by a gateway, engine or strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogData {
    #[serde(default)]
    pub level: LogLevel,
    pub time: DateTime<Utc>,
    pub msg: String,
    #[serde(default)]
    pub source: String,
}

/// Event discriminant, used as the subscription key on the event bus
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Tick,
    Trade,
    Log,
    StrategyLog,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Tick,
        EventKind::Trade,
        EventKind::Log,
        EventKind::StrategyLog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Tick => "tick",
            EventKind::Trade => "trade",
            EventKind::Log => "log",
            EventKind::StrategyLog => "strategy_log",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event published by producers. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Tick(TickData),
    Trade(TradeData),
    Log(LogData),
    StrategyLog(LogData),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Tick(_) => EventKind::Tick,
            Event::Trade(_) => EventKind::Trade,
            Event::Log(_) => EventKind::Log,
            Event::StrategyLog(_) => EventKind::StrategyLog,
        }
    }
}
