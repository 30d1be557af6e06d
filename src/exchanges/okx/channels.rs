use crate::core::errors::ExchangeError;
use crate::core::multicast::ChannelStream;
use crate::core::types::{ChannelEvent, KlineInterval};
use crate::exchanges::okx::conversions::{
    format_kline_interval, parse_account_update, parse_algo_order, parse_balance_position,
    parse_inst_id, parse_kline_interval, parse_kline_row, parse_order, parse_price_ticker,
};
use crate::exchanges::okx::types::{InstrumentType, OkxCandle, WsArg};
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

/// Arguments of one subscription frame, one variant per supported channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionArguments {
    Tickers {
        inst_id: String,
    },
    Candles {
        interval: KlineInterval,
        inst_id: String,
    },
    Account {
        ccy: Option<String>,
    },
    BalanceAndPosition,
    Orders {
        inst_type: InstrumentType,
        inst_family: Option<String>,
        inst_id: Option<String>,
    },
    OrdersAlgo {
        inst_type: InstrumentType,
        inst_family: Option<String>,
        inst_id: Option<String>,
    },
}

impl SubscriptionArguments {
    pub fn channel(&self) -> String {
        match self {
            Self::Tickers { .. } => "tickers".to_string(),
            Self::Candles { interval, .. } => format!("candle{}", format_kline_interval(*interval)),
            Self::Account { .. } => "account".to_string(),
            Self::BalanceAndPosition => "balance_and_position".to_string(),
            Self::Orders { .. } => "orders".to_string(),
            Self::OrdersAlgo { .. } => "orders-algo".to_string(),
        }
    }

    /// Wire fields in frame order, `channel` first.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("channel", self.channel())];
        match self {
            Self::Tickers { inst_id } | Self::Candles { inst_id, .. } => {
                fields.push(("instId", inst_id.clone()));
            }
            Self::Account { ccy } => {
                if let Some(ccy) = ccy {
                    fields.push(("ccy", ccy.clone()));
                }
            }
            Self::BalanceAndPosition => {}
            Self::Orders {
                inst_type,
                inst_family,
                inst_id,
            }
            | Self::OrdersAlgo {
                inst_type,
                inst_family,
                inst_id,
            } => {
                fields.push(("instType", inst_type.as_str().to_string()));
                if let Some(family) = inst_family {
                    fields.push(("instFamily", family.clone()));
                }
                if let Some(inst_id) = inst_id {
                    fields.push(("instId", inst_id.clone()));
                }
            }
        }
        fields
    }

    pub fn to_ws_arg(&self) -> WsArg {
        self.fields().into_iter().collect()
    }

    /// Canonical identity of this group; equal to the key of its echo.
    pub fn key(&self) -> String {
        self.to_ws_arg().key()
    }
}

impl Serialize for SubscriptionArguments {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.fields();
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (field, value) in &fields {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

/// Key of a stream built from one or more argument groups.
pub fn channel_key(args: &[SubscriptionArguments]) -> String {
    args.iter()
        .map(SubscriptionArguments::key)
        .collect::<Vec<_>>()
        .join("|")
}

/// Closed table from channel name to payload parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Tickers,
    Candles(KlineInterval),
    Account,
    BalanceAndPosition,
    Orders,
    OrdersAlgo,
}

impl ChannelKind {
    pub fn from_channel(channel: &str) -> Result<Self, ExchangeError> {
        match channel {
            "tickers" => Ok(Self::Tickers),
            "account" => Ok(Self::Account),
            "balance_and_position" => Ok(Self::BalanceAndPosition),
            "orders" => Ok(Self::Orders),
            "orders-algo" => Ok(Self::OrdersAlgo),
            other => match other.strip_prefix("candle") {
                Some(bar) => parse_kline_interval(bar).map(Self::Candles),
                None => Err(ExchangeError::UnknownChannel(other.to_string())),
            },
        }
    }

    /// Normalize every item of a push.
    pub fn parse(self, arg: &WsArg, data: &[Value]) -> Result<Vec<ChannelEvent>, ExchangeError> {
        match self {
            Self::Tickers => parse_items(data, parse_price_ticker),
            Self::Candles(interval) => {
                let inst_id = arg.get("instId").ok_or_else(|| {
                    ExchangeError::ParseError("Candle push without instId".to_string())
                })?;
                let (symbol, market) = parse_inst_id(inst_id)?;
                parse_items(data, |row: &OkxCandle| {
                    parse_kline_row(&symbol, market, interval, row)
                })
            }
            Self::Account => parse_items(data, parse_account_update),
            Self::BalanceAndPosition => parse_items(data, parse_balance_position),
            Self::Orders => parse_items(data, parse_order),
            Self::OrdersAlgo => parse_items(data, parse_algo_order),
        }
    }
}

fn parse_items<W, R>(
    data: &[Value],
    parse: impl Fn(&W) -> Result<R, ExchangeError>,
) -> Result<Vec<ChannelEvent>, ExchangeError>
where
    W: DeserializeOwned,
    R: Into<ChannelEvent>,
{
    data.iter()
        .map(|item| {
            let wire: W = serde_json::from_value(item.clone())?;
            parse(&wire).map(Into::into)
        })
        .collect()
}

struct ChannelEntry {
    key: String,
    groups: Vec<SubscriptionArguments>,
    group_keys: Vec<String>,
    stream: ChannelStream<ChannelEvent>,
}

/// Outcome of registering a stream.
#[derive(Debug, Clone)]
pub struct Registration {
    pub stream: ChannelStream<ChannelEvent>,
    /// Whether the stream is new; only new streams need subscribe frames.
    pub created: bool,
    pub groups: Vec<SubscriptionArguments>,
}

/// Streams of one session, keyed by channel key.
///
/// At most one stream exists per key. Streams nobody observes are dropped
/// lazily: on respawn, or when a push for them arrives.
#[derive(Default)]
pub struct ChannelRegistry {
    entries: Vec<ChannelEntry>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn register(
        &mut self,
        args: Vec<SubscriptionArguments>,
    ) -> Result<Registration, ExchangeError> {
        if args.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "At least one argument group is required".to_string(),
            ));
        }

        let key = channel_key(&args);
        if let Some(entry) = self.entries.iter().find(|entry| entry.key == key) {
            return Ok(Registration {
                stream: entry.stream.clone(),
                created: false,
                groups: entry.groups.clone(),
            });
        }

        let stream = ChannelStream::new();
        let group_keys = args.iter().map(SubscriptionArguments::key).collect();
        self.entries.push(ChannelEntry {
            key,
            groups: args.clone(),
            group_keys,
            stream: stream.clone(),
        });

        Ok(Registration {
            stream,
            created: true,
            groups: args,
        })
    }

    /// Groups to subscribe after (re)connecting. Unobserved streams are
    /// completed and removed; a group shared by several streams is listed once.
    pub fn respawn(&mut self) -> Vec<SubscriptionArguments> {
        self.entries.retain(|entry| {
            let observed = entry.stream.observer_count() > 0;
            if !observed {
                debug!(key = %entry.key, "Dropping unobserved channel");
                entry.stream.complete();
            }
            observed
        });

        let mut seen: Vec<&str> = Vec::new();
        let mut groups = Vec::new();
        for entry in &self.entries {
            for (group, key) in entry.groups.iter().zip(&entry.group_keys) {
                if !seen.contains(&key.as_str()) {
                    seen.push(key);
                    groups.push(group.clone());
                }
            }
        }
        groups
    }

    /// Route one push to the first live stream owning its argument group.
    ///
    /// Unobserved owners met on the way are completed and removed. Returns
    /// the groups no remaining stream uses, which should be unsubscribed.
    pub fn dispatch(&mut self, arg: WsArg, data: &[Value]) -> Vec<SubscriptionArguments> {
        let arg = arg.stripped();
        let group_key = arg.key();
        let mut unsubscribe: Vec<SubscriptionArguments> = Vec::new();

        loop {
            let Some(index) = self
                .entries
                .iter()
                .position(|entry| entry.group_keys.contains(&group_key))
            else {
                debug!(key = %group_key, "No stream owns this push");
                break;
            };

            let entry = &self.entries[index];
            if entry.stream.observer_count() > 0 {
                match arg
                    .channel()
                    .ok_or_else(|| ExchangeError::ParseError("Push without channel".to_string()))
                    .and_then(ChannelKind::from_channel)
                    .and_then(|kind| kind.parse(&arg, data))
                {
                    Ok(events) => {
                        for event in events {
                            entry.stream.publish(event);
                        }
                    }
                    Err(e) => warn!(key = %group_key, error = %e, "Failed to parse channel push"),
                }
                break;
            }

            let entry = self.entries.remove(index);
            debug!(key = %entry.key, "Dropping unobserved channel");
            entry.stream.complete();
            for (group, key) in entry.groups.into_iter().zip(entry.group_keys) {
                let still_used = self
                    .entries
                    .iter()
                    .any(|other| other.group_keys.contains(&key));
                let queued = unsubscribe.iter().any(|g| g.key() == key);
                if !still_used && !queued {
                    unsubscribe.push(group);
                }
            }
        }

        unsubscribe
    }

    /// Complete every stream and forget them.
    pub fn destroy(&mut self) {
        for entry in self.entries.drain(..) {
            entry.stream.complete();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MarketPrice;
    use serde_json::json;

    fn tickers(inst_id: &str) -> SubscriptionArguments {
        SubscriptionArguments::Tickers {
            inst_id: inst_id.to_string(),
        }
    }

    fn ticker_push(inst_id: &str) -> (WsArg, Vec<Value>) {
        let arg: WsArg =
            serde_json::from_value(json!({"channel": "tickers", "instId": inst_id})).unwrap();
        let data = vec![json!({
            "instType": "SPOT",
            "instId": inst_id,
            "last": "100",
            "volCcy24h": "1000",
            "ts": "1706659200000"
        })];
        (arg, data)
    }

    #[test]
    fn test_serialize_frame_fields() {
        let candles = SubscriptionArguments::Candles {
            interval: KlineInterval::Hours1,
            inst_id: "BTC-USDT".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&candles).unwrap(),
            r#"{"channel":"candle1H","instId":"BTC-USDT"}"#
        );

        let orders = SubscriptionArguments::Orders {
            inst_type: InstrumentType::Swap,
            inst_family: Some("BTC-USDT".to_string()),
            inst_id: None,
        };
        assert_eq!(
            orders.key(),
            "channel=orders;instFamily=BTC-USDT;instType=SWAP"
        );
    }

    #[test]
    fn test_channel_key_joins_groups() {
        let key = channel_key(&[tickers("A-B"), SubscriptionArguments::BalanceAndPosition]);
        assert_eq!(
            key,
            "channel=tickers;instId=A-B|channel=balance_and_position"
        );
    }

    #[test]
    fn test_channel_kind_table() {
        assert_eq!(
            ChannelKind::from_channel("candle1W").unwrap(),
            ChannelKind::Candles(KlineInterval::Weeks1)
        );
        assert!(matches!(
            ChannelKind::from_channel("books5"),
            Err(ExchangeError::UnknownChannel(_))
        ));
        assert!(ChannelKind::from_channel("candle7m").is_err());
    }

    #[test]
    fn test_register_shares_stream_per_key() {
        let mut registry = ChannelRegistry::new();
        let first = registry.register(vec![tickers("BTC-USDT")]).unwrap();
        let second = registry.register(vec![tickers("BTC-USDT")]).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert!(first.stream.ptr_eq(&second.stream));
        assert_eq!(registry.len(), 1);
        assert!(registry.register(Vec::new()).is_err());
    }

    #[test]
    fn test_respawn_drops_unobserved_and_dedups() {
        let mut registry = ChannelRegistry::new();
        let observed = registry.register(vec![tickers("BTC-USDT")]).unwrap();
        let _rx = observed.stream.subscribe();
        let shared = registry
            .register(vec![tickers("BTC-USDT"), tickers("ETH-USDT")])
            .unwrap();
        let _rx2 = shared.stream.subscribe();
        let orphan = registry.register(vec![tickers("XRP-USDT")]).unwrap();

        let groups = registry.respawn();

        assert_eq!(groups, vec![tickers("BTC-USDT"), tickers("ETH-USDT")]);
        assert!(orphan.stream.is_completed());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_dispatch_delivers_to_one_stream() {
        let mut registry = ChannelRegistry::new();
        let single = registry.register(vec![tickers("BTC-USDT")]).unwrap();
        let mut a = single.stream.subscribe().filtered::<MarketPrice>();
        let multi = registry
            .register(vec![tickers("BTC-USDT"), tickers("ETH-USDT")])
            .unwrap();
        let mut b = multi.stream.subscribe();

        let (arg, data) = ticker_push("BTC-USDT");
        assert!(registry.dispatch(arg, &data).is_empty());

        let price = a.try_recv().unwrap();
        assert_eq!(price.symbol.to_string(), "BTC_USDT");
        assert!(b.try_recv().is_none());
    }

    #[test]
    fn test_dispatch_skips_unobserved_owner() {
        let mut registry = ChannelRegistry::new();
        let abandoned = registry.register(vec![tickers("BTC-USDT")]).unwrap();
        drop(abandoned.stream.subscribe());
        let live = registry
            .register(vec![tickers("BTC-USDT"), tickers("ETH-USDT")])
            .unwrap();
        let mut rx = live.stream.subscribe();

        let (arg, data) = ticker_push("BTC-USDT");
        let unsubscribe = registry.dispatch(arg, &data);

        // BTC-USDT is still used by the live stream
        assert!(unsubscribe.is_empty());
        assert!(abandoned.stream.is_completed());
        assert!(rx.try_recv().is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_dispatch_unsubscribes_last_owner() {
        let mut registry = ChannelRegistry::new();
        let gone = registry.register(vec![tickers("BTC-USDT")]).unwrap();

        let (arg, data) = ticker_push("BTC-USDT");
        let unsubscribe = registry.dispatch(arg, &data);

        assert_eq!(unsubscribe, vec![tickers("BTC-USDT")]);
        assert!(gone.stream.is_completed());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dispatch_ignores_injected_uid() {
        let mut registry = ChannelRegistry::new();
        let reg = registry
            .register(vec![SubscriptionArguments::Orders {
                inst_type: InstrumentType::Spot,
                inst_family: None,
                inst_id: Some("BTC-USDT".to_string()),
            }])
            .unwrap();
        let mut rx = reg.stream.subscribe();

        let arg: WsArg = serde_json::from_value(json!({
            "channel": "orders",
            "instType": "SPOT",
            "instId": "BTC-USDT",
            "uid": "77982378738415879"
        }))
        .unwrap();
        let data = vec![json!({
            "instId": "BTC-USDT",
            "ordId": "1",
            "sz": "1",
            "ordType": "market",
            "side": "buy",
            "state": "filled",
            "accFillSz": "1",
            "cTime": "1706659200000",
            "uTime": "1706659200000"
        })];
        registry.dispatch(arg, &data);

        assert!(matches!(rx.try_recv(), Some(ChannelEvent::Order(_))));
    }

    #[test]
    fn test_destroy_completes_streams() {
        let mut registry = ChannelRegistry::new();
        let reg = registry.register(vec![tickers("BTC-USDT")]).unwrap();
        let mut rx = reg.stream.subscribe();

        registry.destroy();

        assert!(registry.is_empty());
        assert!(reg.stream.is_completed());
        assert!(rx.try_recv().is_none());
    }
}
