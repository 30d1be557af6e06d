use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// OKX API standard response wrapper
#[derive(Debug, Deserialize, Serialize)]
pub struct OkxResponse<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    pub data: T,
}

/// `instType` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentType {
    Spot,
    Margin,
    Swap,
    Futures,
    Option,
    Any,
}

impl InstrumentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spot => "SPOT",
            Self::Margin => "MARGIN",
            Self::Swap => "SWAP",
            Self::Futures => "FUTURES",
            Self::Option => "OPTION",
            Self::Any => "ANY",
        }
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OKX instrument information
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxInstrument {
    pub inst_type: String,  // SPOT, MARGIN, SWAP, FUTURES, OPTION
    pub inst_id: String,    // e.g., BTC-USDT
    pub inst_family: String,
    pub base_ccy: String,
    pub quote_ccy: String,
    pub settle_ccy: String,
    pub ct_val: String, // Contract value
    pub ct_val_ccy: String,
    pub list_time: String,
    pub exp_time: String,
    pub lever: String, // Max leverage
    pub tick_sz: String,
    pub lot_sz: String,
    pub min_sz: String,
    pub ct_type: String, // linear, inverse
    pub state: String,   // live, suspend, preopen, test
}

/// OKX ticker, as pushed on `tickers` and returned by `market/ticker`
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxTicker {
    pub inst_type: String,
    pub inst_id: String,
    pub last: String,        // Last traded price
    pub last_sz: String,     // Last traded size
    pub ask_px: String,      // Best ask price
    pub ask_sz: String,      // Best ask size
    pub bid_px: String,      // Best bid price
    pub bid_sz: String,      // Best bid size
    pub open_24h: String,    // 24h opening price
    pub high_24h: String,    // 24h highest price
    pub low_24h: String,     // 24h lowest price
    pub vol_ccy_24h: String, // 24h volume: base coin for derivatives, quote for spot
    pub vol_24h: String,     // 24h volume in contracts (derivatives) or base (spot)
    pub ts: String,          // Timestamp
    pub sod_utc0: String,    // Start of day UTC+0
    pub sod_utc8: String,    // Start of day UTC+8
}

/// OKX mark price
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxMarkPrice {
    pub inst_type: String,
    pub inst_id: String,
    pub mark_px: String,
    pub ts: String,
}

/// Candle row: `[ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]`
pub type OkxCandle = Vec<String>;

/// OKX Order request
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OkxOrderRequest {
    pub inst_id: String,  // Instrument ID
    pub td_mode: String,  // Trade mode: cash, cross, isolated
    pub side: String,     // Order side: buy, sell
    pub ord_type: String, // Order type: market, limit, post_only, fok, ioc
    pub sz: String,       // Quantity to buy or sell
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px: Option<String>, // Order price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ccy: Option<String>, // Margin currency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>, // Client order ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_side: Option<String>, // long, short, net
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tgt_ccy: Option<String>, // Target currency: base_ccy, quote_ccy
}

/// OKX order acknowledgement (place / cancel)
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxOrderResponse {
    pub ord_id: String,
    pub cl_ord_id: String,
    pub tag: String,
    pub s_code: String, // Per-order result code
    pub s_msg: String,
}

/// OKX order details, from `trade/order` and the `orders` channel
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxOrder {
    pub inst_type: String,
    pub inst_id: String,
    pub ord_id: String,
    pub cl_ord_id: String,
    pub px: String,
    pub sz: String,
    pub ord_type: String,
    pub side: String,
    pub pos_side: String,
    pub td_mode: String,
    pub acc_fill_sz: String, // Accumulated fill size
    pub fill_px: String,
    pub avg_px: String,
    pub state: String,
    pub fee_ccy: String,
    pub fee: String, // Negative means charged
    pub u_time: String,
    pub c_time: String,
}

/// OKX algo order, from the `orders-algo` channel
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxAlgoOrder {
    pub inst_type: String,
    pub inst_id: String,
    pub algo_id: String,
    pub algo_cl_ord_id: String,
    pub ord_type: String, // conditional, oco, trigger, move_order_stop
    pub side: String,
    pub sz: String,
    pub state: String,
    pub trigger_px: String,
    pub ord_px: String,
    pub actual_sz: String,
    pub actual_px: String,
    pub c_time: String,
    pub u_time: String,
}

/// OKX account balance, from `account/balance` and the `account` channel
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxAccount {
    pub u_time: String,
    pub total_eq: String, // Total equity in USD
    pub details: Vec<OkxBalance>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxBalance {
    pub ccy: String,
    pub eq: String,
    pub cash_bal: String,
    pub avail_bal: String,
    pub frozen_bal: String,
    pub upl: String,
    pub u_time: String,
}

/// Push from the `balance_and_position` channel
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxBalanceAndPosition {
    pub p_time: String,
    pub event_type: String, // snapshot, delivered, filled, transferred, ...
    pub bal_data: Vec<OkxBalanceData>,
    pub pos_data: Vec<OkxPositionData>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxBalanceData {
    pub ccy: String,
    pub cash_bal: String,
    pub u_time: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxPositionData {
    pub pos_id: String,
    pub inst_id: String,
    pub inst_type: String,
    pub mgn_mode: String,
    pub pos_side: String,
    pub pos: String,
    pub avg_px: String,
    pub ccy: String,
    pub u_time: String,
}

/// Outbound WebSocket operation frame
#[derive(Debug, Serialize, Clone)]
pub struct OkxWsRequest<A> {
    pub op: String, // Operation: subscribe, unsubscribe, login
    pub args: Vec<A>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OkxLoginArgs {
    pub api_key: String,
    pub passphrase: String,
    pub timestamp: String,
    pub sign: String,
}

/// Fields the exchange adds to an argument echo on its own.
const INJECTED_FIELDS: &[&str] = &["uid"];

/// Argument echo attached to inbound frames.
///
/// Kept as a field map so the echo can be compared with what was sent
/// regardless of field order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct WsArg(BTreeMap<String, Value>);

impl WsArg {
    pub fn channel(&self) -> Option<&str> {
        self.get("channel")
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Drop fields the caller never sent (e.g. the echoed user id).
    #[must_use]
    pub fn stripped(mut self) -> Self {
        for field in INJECTED_FIELDS {
            self.0.remove(*field);
        }
        self
    }

    /// Canonical `field=value` list, sorted by field name.
    pub fn key(&self) -> String {
        self.0
            .iter()
            .map(|(field, value)| match value {
                Value::String(s) => format!("{}={}", field, s),
                other => format!("{}={}", field, other),
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for WsArg {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_arg_strips_uid_and_sorts() {
        let arg: WsArg = serde_json::from_str(
            r#"{"channel":"orders","uid":"77982378738415879","instType":"SWAP"}"#,
        )
        .unwrap();
        let arg = arg.stripped();

        assert_eq!(arg.channel(), Some("orders"));
        assert_eq!(arg.get("uid"), None);
        assert_eq!(arg.key(), "channel=orders;instType=SWAP");
    }

    #[test]
    fn test_ticker_field_names() {
        let ticker: OkxTicker = serde_json::from_str(
            r#"{"instId":"BTC-USDT","last":"9999.99","volCcy24h":"2222","open24h":"9000","ts":"1597026383085"}"#,
        )
        .unwrap();
        assert_eq!(ticker.vol_ccy_24h, "2222");
        assert_eq!(ticker.open_24h, "9000");
        assert!(ticker.ask_px.is_empty());
    }
}
