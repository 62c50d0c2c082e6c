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

//! Event to record mapping.
//!
//! Every function here is pure: the same event always yields the same record.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{RecorderError, Result};
use crate::event::{Event, EventKind, LogData, TickData, TradeData};
use crate::record::{format_timestamp, FieldValue, Record};

pub const TICK_MEASUREMENT: &str = "tick";
pub const TRADE_MEASUREMENT: &str = "trade";
pub const LOG_MEASUREMENT: &str = "log";
pub const STRATEGY_LOG_MEASUREMENT: &str = "strategy_log";

/// Maps events of the enabled kinds to records
#[derive(Debug, Clone)]
pub struct RecordMapper {
    enabled: BTreeSet<EventKind>,
}

impl RecordMapper {
    pub fn new(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            enabled: kinds.into_iter().collect(),
        }
    }

    /// Mapper for every known event kind
    pub fn all() -> Self {
        Self::new(EventKind::ALL)
    }

    /// Kinds this mapper handles, in a stable order
    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.enabled.iter().copied()
    }

    pub fn handles(&self, kind: EventKind) -> bool {
        self.enabled.contains(&kind)
    }

    /// Map an event, failing with a configuration error for disabled kinds.
    pub fn map(&self, event: &Event) -> Result<Record> {
        match event {
            Event::Tick(tick) if self.handles(EventKind::Tick) => Ok(tick_record(tick)),
            Event::Trade(trade) if self.handles(EventKind::Trade) => Ok(trade_record(trade)),
            Event::Log(log) if self.handles(EventKind::Log) => {
                Ok(log_record(LOG_MEASUREMENT, log))
            }
            Event::StrategyLog(log) if self.handles(EventKind::StrategyLog) => {
                Ok(log_record(STRATEGY_LOG_MEASUREMENT, log))
            }
            other => Err(RecorderError::unmapped(other.kind())),
        }
    }
}

impl Default for RecordMapper {
    fn default() -> Self {
        Self::all()
    }
}

pub fn tick_record(tick: &TickData) -> Record {
    let mut tags = BTreeMap::new();
    tags.insert("symbol".to_string(), tick.symbol.clone());
    tags.insert("exchange".to_string(), tick.exchange.as_str().to_string());

    let mut fields = BTreeMap::new();
    fields.insert("last".to_string(), FieldValue::Float(tick.last_price));
    fields.insert("bid".to_string(), FieldValue::Float(tick.bid_price_1));
    fields.insert("ask".to_string(), FieldValue::Float(tick.ask_price_1));
    fields.insert("volume".to_string(), FieldValue::Float(tick.volume));

    Record::new(TICK_MEASUREMENT, tags, fields, tick.datetime)
}

pub fn trade_record(trade: &TradeData) -> Record {
    let mut tags = BTreeMap::new();
    tags.insert("symbol".to_string(), trade.symbol.clone());
    tags.insert("exchange".to_string(), trade.exchange.as_str().to_string());
    tags.insert("direction".to_string(), trade.direction.as_str().to_string());

    let mut fields = BTreeMap::new();
    fields.insert(
        "datetime".to_string(),
        FieldValue::String(format_timestamp(&trade.datetime)),
    );
    fields.insert("price".to_string(), FieldValue::Float(trade.price));
    fields.insert("volume".to_string(), FieldValue::Float(trade.volume));
    fields.insert("orderRef".to_string(), FieldValue::String(trade.order_ref.clone()));
    fields.insert("vt_orderid".to_string(), FieldValue::String(trade.vt_orderid.clone()));
    fields.insert("vt_tradeid".to_string(), FieldValue::String(trade.vt_tradeid.clone()));

    Record::new(TRADE_MEASUREMENT, tags, fields, trade.datetime)
}

pub fn log_record(measurement: &str, log: &LogData) -> Record {
    let mut tags = BTreeMap::new();
    tags.insert("level".to_string(), log.level.as_str().to_string());

    let mut fields = BTreeMap::new();
    fields.insert(
        "datetime".to_string(),
        FieldValue::String(format_timestamp(&log.time)),
    );
    fields.insert("msg".to_string(), FieldValue::String(log.msg.clone()));

    Record::new(measurement, tags, fields, log.time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Direction, Exchange, LogLevel};
    use chrono::{TimeZone, Utc};

    fn sample_tick() -> TickData {
        TickData {
            symbol: "AAPL".to_string(),
            exchange: Exchange::Nasdaq,
            datetime: Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap(),
            last_price: 150.0,
            bid_price_1: 149.9,
            ask_price_1: 150.1,
            volume: 1000.0,
        }
    }

    fn sample_trade() -> TradeData {
        TradeData {
            symbol: "IF2403".to_string(),
            exchange: Exchange::Cffex,
            direction: Direction::Short,
            datetime: Utc.with_ymd_and_hms(2024, 3, 1, 1, 45, 12).unwrap(),
            price: 3520.4,
            volume: 2.0,
            order_ref: "17".to_string(),
            vt_orderid: "CTP.17".to_string(),
            vt_tradeid: "CTP.9001".to_string(),
        }
    }

    #[test]
    fn test_tick_mapping() {
        let record = tick_record(&sample_tick());
        assert_eq!(record.measurement, "tick");
        assert_eq!(record.tags["symbol"], "AAPL");
        assert_eq!(record.tags["exchange"], "NASDAQ");
        assert_eq!(record.tags.len(), 2);
        assert_eq!(record.fields["last"], FieldValue::Float(150.0));
        assert_eq!(record.fields["bid"], FieldValue::Float(149.9));
        assert_eq!(record.fields["ask"], FieldValue::Float(150.1));
        assert_eq!(record.fields["volume"], FieldValue::Float(1000.0));
        assert_eq!(record.fields.len(), 4);
    }

    #[test]
    fn test_trade_mapping() {
        let record = trade_record(&sample_trade());
        assert_eq!(record.measurement, "trade");
        assert_eq!(record.tags["direction"], "SHORT");
        assert_eq!(record.tags["exchange"], "CFFEX");
        assert_eq!(
            record.fields["datetime"],
            FieldValue::String("2024-03-01T01:45:12".to_string())
        );
        assert_eq!(record.fields["vt_tradeid"], FieldValue::from("CTP.9001"));
        assert_eq!(record.fields["orderRef"], FieldValue::from("17"));
    }

    #[test]
    fn test_log_and_strategy_log_mapping() {
        let log = LogData {
            level: LogLevel::Error,
            time: Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 1).unwrap(),
            msg: "order rejected".to_string(),
            source: "CtaStrategy".to_string(),
        };
        let mapper = RecordMapper::all();

        let plain = mapper.map(&Event::Log(log.clone())).unwrap();
        assert_eq!(plain.measurement, "log");
        assert_eq!(plain.tags["level"], "ERROR");
        assert_eq!(plain.fields["msg"], FieldValue::from("order rejected"));

        let strategy = mapper.map(&Event::StrategyLog(log)).unwrap();
        assert_eq!(strategy.measurement, "strategy_log");
        assert_eq!(strategy.fields, plain.fields);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let mapper = RecordMapper::all();
        let event = Event::Trade(sample_trade());
        assert_eq!(mapper.map(&event).unwrap(), mapper.map(&event).unwrap());
    }

    #[test]
    fn test_disabled_kind_is_configuration_error() {
        let mapper = RecordMapper::new([EventKind::Trade]);
        let result = mapper.map(&Event::Tick(sample_tick()));
        assert!(matches!(result, Err(RecorderError::Configuration(_))));
        assert!(mapper.map(&Event::Trade(sample_trade())).is_ok());
    }
}
