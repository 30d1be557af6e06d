use crate::core::errors::ExchangeError;
use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical trading pair, rendered as `BASE_QUOTE` (e.g. `BTC_USDT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub base: String,
    pub quote: String,
}

impl Symbol {
    /// Create a new symbol with validation
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Result<Self, ExchangeError> {
        let base = base.into();
        let quote = quote.into();

        if base.is_empty() || quote.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "Base and quote assets cannot be empty".to_string(),
            ));
        }

        Ok(Self { base, quote })
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base, self.quote)
    }
}

impl FromStr for Symbol {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s.split_once('_').ok_or_else(|| {
            ExchangeError::InvalidParameters(format!("Symbol '{}' is not in BASE_QUOTE form", s))
        })?;
        Self::new(base, quote)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    #[default]
    Spot,
    Margin,
    Futures,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Spot => "spot",
            Self::Margin => "margin",
            Self::Futures => "futures",
        })
    }
}

/// Public market data versus authenticated account data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    #[default]
    Market,
    User,
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Market => "market",
            Self::User => "user",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    PostOnly,
    FillOrKill,
    ImmediateOrCancel,
    Stop,
    Trigger,
    Oco,
    TrailingStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Paused,
    Triggered,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
    Net,
}

/// Candle width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KlineInterval {
    Minutes1,
    Minutes3,
    Minutes5,
    Minutes15,
    Minutes30,
    Hours1,
    Hours2,
    Hours4,
    Hours6,
    Hours12,
    Days1,
    Weeks1,
    Months1,
}

impl KlineInterval {
    /// Canonical short form (`1m`, `4h`, `1d`, `1M`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minutes1 => "1m",
            Self::Minutes3 => "3m",
            Self::Minutes5 => "5m",
            Self::Minutes15 => "15m",
            Self::Minutes30 => "30m",
            Self::Hours1 => "1h",
            Self::Hours2 => "2h",
            Self::Hours4 => "4h",
            Self::Hours6 => "6h",
            Self::Hours12 => "12h",
            Self::Days1 => "1d",
            Self::Weeks1 => "1w",
            Self::Months1 => "1M",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Self::Minutes1,
            Self::Minutes3,
            Self::Minutes5,
            Self::Minutes15,
            Self::Minutes30,
            Self::Hours1,
            Self::Hours2,
            Self::Hours4,
            Self::Hours6,
            Self::Hours12,
            Self::Days1,
            Self::Weeks1,
            Self::Months1,
        ]
    }

    /// Width of the interval, or `None` for calendar months.
    fn fixed_duration(self) -> Option<Duration> {
        let minutes = match self {
            Self::Minutes1 => 1,
            Self::Minutes3 => 3,
            Self::Minutes5 => 5,
            Self::Minutes15 => 15,
            Self::Minutes30 => 30,
            Self::Hours1 => 60,
            Self::Hours2 => 120,
            Self::Hours4 => 240,
            Self::Hours6 => 360,
            Self::Hours12 => 720,
            Self::Days1 => 1_440,
            Self::Weeks1 => 10_080,
            Self::Months1 => return None,
        };
        Some(Duration::minutes(minutes))
    }

    /// Move a millisecond timestamp by `steps` intervals (negative goes back).
    ///
    /// Monthly candles move by calendar months, so the result is not a fixed
    /// offset from the input.
    pub fn shift(self, millis: i64, steps: i32) -> Result<i64, ExchangeError> {
        let out_of_range =
            || ExchangeError::InvalidParameters(format!("Timestamp {} out of range", millis));
        let time = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(out_of_range)?;

        let shifted = match self.fixed_duration() {
            Some(step) => time.checked_add_signed(step * steps),
            None => {
                let months = Months::new(steps.unsigned_abs());
                if steps >= 0 {
                    time.checked_add_months(months)
                } else {
                    time.checked_sub_months(months)
                }
            }
        };

        shifted
            .map(|t| t.timestamp_millis())
            .ok_or_else(out_of_range)
    }

    /// Close time of a candle opened at `open_time`.
    pub fn close_time(self, open_time: i64) -> Result<i64, ExchangeError> {
        self.shift(open_time, 1)
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Canonical records produced by the normalizer. Timestamps are Unix millis.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPrice {
    pub symbol: Symbol,
    pub market: MarketType,
    pub price: Decimal,
    pub base_volume: Option<Decimal>,
    pub quote_volume: Option<Decimal>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketKline {
    pub symbol: Symbol,
    pub market: MarketType,
    pub interval: KlineInterval,
    pub open_time: i64,
    pub close_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub base_volume: Decimal,
    pub quote_volume: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Client order id, when one was assigned.
    pub id: Option<String>,
    pub exchange_id: String,
    pub symbol: Symbol,
    pub market: MarketType,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub base_quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub executed_quantity: Decimal,
    pub average_price: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub commission_asset: Option<String>,
    pub created: i64,
    pub updated: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub asset: String,
    pub equity: Decimal,
    pub cash_balance: Decimal,
    pub available: Decimal,
    pub frozen: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsAccountUpdate {
    pub timestamp: i64,
    pub total_equity: Option<Decimal>,
    pub balances: Vec<AccountBalance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub asset: String,
    pub cash_balance: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionChange {
    pub position_id: String,
    pub symbol: Symbol,
    pub market: MarketType,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub average_price: Option<Decimal>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsBalancePositionUpdate {
    pub timestamp: i64,
    pub event_type: String,
    pub balances: Vec<BalanceChange>,
    pub positions: Vec<PositionChange>,
}

/// Any record a channel stream can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelEvent {
    Price(MarketPrice),
    Kline(MarketKline),
    Account(WsAccountUpdate),
    BalancePosition(WsBalancePositionUpdate),
    Order(Order),
}

macro_rules! channel_event_conversions {
    ($($variant:ident => $record:ty),* $(,)?) => {
        $(
            impl From<$record> for ChannelEvent {
                fn from(record: $record) -> Self {
                    Self::$variant(record)
                }
            }

            impl TryFrom<ChannelEvent> for $record {
                type Error = ChannelEvent;

                fn try_from(event: ChannelEvent) -> Result<Self, Self::Error> {
                    match event {
                        ChannelEvent::$variant(record) => Ok(record),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

channel_event_conversions! {
    Price => MarketPrice,
    Kline => MarketKline,
    Account => WsAccountUpdate,
    BalancePosition => WsBalancePositionUpdate,
    Order => Order,
}

/// Parameters for a historical candle query. Times are Unix millis and
/// inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlinesRequest {
    pub symbol: Symbol,
    pub interval: KlineInterval,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub limit: Option<usize>,
}

impl KlinesRequest {
    pub fn new(symbol: Symbol, interval: KlineInterval) -> Self {
        Self {
            symbol,
            interval,
            start: None,
            end: None,
            limit: None,
        }
    }

    #[must_use]
    pub const fn start(mut self, start: i64) -> Self {
        self.start = Some(start);
        self
    }

    #[must_use]
    pub const fn end(mut self, end: i64) -> Self {
        self.end = Some(end);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Initial,
    Login,
    Connected,
    Reconnecting,
    Closing,
}

/// Lifecycle notifications published by a WebSocket session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Open,
    Reconnected,
    LoggedIn,
    Reconnecting,
    Closed,
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-31T00:00:00Z
    const JAN_31: i64 = 1_706_659_200_000;

    #[test]
    fn test_symbol_round_trip() {
        let symbol: Symbol = "BTC_USDT".parse().unwrap();
        assert_eq!(symbol.base, "BTC");
        assert_eq!(symbol.quote, "USDT");
        assert_eq!(symbol.to_string(), "BTC_USDT");
        assert!("BTCUSDT".parse::<Symbol>().is_err());
        assert!("_USDT".parse::<Symbol>().is_err());
    }

    #[test]
    fn test_fixed_interval_close_time() {
        assert_eq!(
            KlineInterval::Minutes15.close_time(JAN_31).unwrap(),
            JAN_31 + 15 * 60_000
        );
        assert_eq!(
            KlineInterval::Hours4.shift(JAN_31, -2).unwrap(),
            JAN_31 - 8 * 3_600_000
        );
    }

    #[test]
    fn test_month_interval_uses_calendar() {
        // Jan 31 + 1 month clamps to Feb 29 in a leap year.
        let feb_29 = 1_709_164_800_000;
        assert_eq!(KlineInterval::Months1.close_time(JAN_31).unwrap(), feb_29);
        // Dec 31 2023
        assert_eq!(
            KlineInterval::Months1.shift(JAN_31, -1).unwrap(),
            1_703_980_800_000
        );
    }

    #[test]
    fn test_channel_event_try_from() {
        let price = MarketPrice {
            symbol: Symbol::new("BTC", "USDT").unwrap(),
            market: MarketType::Spot,
            price: Decimal::ONE,
            base_volume: None,
            quote_volume: None,
            timestamp: 0,
        };
        let event = ChannelEvent::from(price.clone());
        assert_eq!(MarketPrice::try_from(event.clone()), Ok(price));
        assert!(MarketKline::try_from(event).is_err());
    }
}
