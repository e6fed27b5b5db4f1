//! Trading-day session classification
//! Derives the current market phase from wall-clock time in exchange-local
//! (Eastern) time and picks the upstream query variant to use for it.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};

/// Phase of the trading day/week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Weekend,
    PreMarket,
    MarketOpen,
    AfterHours,
    FuturesOpen,
    #[default]
    MarketClosed,
}

/// Which upstream endpoint variant to query for the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Realtime,
    Premarket,
    Afterhours,
    Futures,
    #[default]
    Daily,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Weekend => "weekend",
            SessionState::PreMarket => "pre_market",
            SessionState::MarketOpen => "market_open",
            SessionState::AfterHours => "after_hours",
            SessionState::FuturesOpen => "futures_open",
            SessionState::MarketClosed => "market_closed",
        }
    }

    /// Upstream data-source hint for this session
    pub fn data_source(&self) -> DataSource {
        match self {
            SessionState::MarketOpen => DataSource::Realtime,
            SessionState::PreMarket => DataSource::Premarket,
            SessionState::AfterHours => DataSource::Afterhours,
            SessionState::FuturesOpen => DataSource::Futures,
            SessionState::Weekend | SessionState::MarketClosed => DataSource::Daily,
        }
    }

    /// Extended-hours ETF slices are only meaningful around the open/close.
    pub fn is_extended_hours(&self) -> bool {
        matches!(self, SessionState::PreMarket | SessionState::AfterHours)
    }
}

// Minute-of-day boundaries in Eastern time
const PRE_MARKET_START: u32 = 4 * 60; // 04:00
const MARKET_OPEN: u32 = 9 * 60 + 30; // 09:30
const MARKET_CLOSE: u32 = 16 * 60; // 16:00
const AFTER_HOURS_END: u32 = 20 * 60; // 20:00

/// Classify a timestamp into a trading session. Total over all inputs;
/// weekends win before any time-of-day bucketing.
pub fn classify(now: DateTime<Utc>) -> SessionState {
    let local = now.with_timezone(&New_York);

    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return SessionState::Weekend;
    }

    let minute_of_day = local.hour() * 60 + local.minute();

    match minute_of_day {
        m if (PRE_MARKET_START..MARKET_OPEN).contains(&m) => SessionState::PreMarket,
        m if (MARKET_OPEN..MARKET_CLOSE).contains(&m) => SessionState::MarketOpen,
        m if (MARKET_CLOSE..AFTER_HOURS_END).contains(&m) => SessionState::AfterHours,
        m if m >= AFTER_HOURS_END || m < PRE_MARKET_START => SessionState::FuturesOpen,
        _ => SessionState::MarketClosed,
    }
}
