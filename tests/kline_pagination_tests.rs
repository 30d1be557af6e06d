use async_trait::async_trait;
use lotusx_okx::core::kernel::rest::{Params, RequestOptions};
use lotusx_okx::core::kernel::RestClient;
use lotusx_okx::{ExchangeError, KlineInterval, KlinesRequest, MarketType, OkxRest, Symbol};
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::{json, Value};

const MINUTE: i64 = 60_000;
// First candle of the synthetic history, aligned to the minute
const ORIGIN: i64 = 1_700_000_040_000;
const PAGE_SIZE: usize = 100;

/// Serves `history-candles` pages out of a contiguous run of one-minute
/// candles, honoring the exclusive `after`/`before` bounds the way the
/// exchange does.
struct CandleHistory {
    open_times: Vec<i64>,
    calls: Mutex<Vec<Params>>,
}

impl CandleHistory {
    fn new(count: i64) -> Self {
        Self {
            open_times: (0..count).map(|i| ORIGIN + i * MINUTE).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn cursor(params: &Params, key: &str) -> Option<i64> {
        params
            .get(key)
            .and_then(Value::as_str)
            .and_then(|value| value.parse().ok())
    }

    fn calls(&self) -> Vec<Params> {
        self.calls.lock().clone()
    }

    fn row(open_time: i64) -> Value {
        json!([
            open_time.to_string(),
            "100",
            "110",
            "90",
            "105",
            "2",
            "210",
            "210",
            "1"
        ])
    }
}

#[async_trait]
impl RestClient for CandleHistory {
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Value, ExchangeError> {
        assert_eq!(method, Method::GET);
        assert_eq!(endpoint, "/api/v5/market/history-candles");
        assert!(options.is_public);

        let after = Self::cursor(&options.params, "after");
        let before = Self::cursor(&options.params, "before");
        self.calls.lock().push(options.params);

        let data: Vec<Value> = self
            .open_times
            .iter()
            .rev()
            .filter(|&&t| after.map_or(true, |after| t < after))
            .filter(|&&t| before.map_or(true, |before| t > before))
            .take(PAGE_SIZE)
            .map(|&t| Self::row(t))
            .collect();

        Ok(json!({"code": "0", "msg": "", "data": data}))
    }
}

fn btc_usdt() -> Symbol {
    Symbol::new("BTC", "USDT").unwrap()
}

fn candle_at(index: i64) -> i64 {
    ORIGIN + index * MINUTE
}

fn open_times(klines: &[lotusx_okx::MarketKline]) -> Vec<i64> {
    klines.iter().map(|kline| kline.open_time).collect()
}

fn assert_consecutive_newest_first(times: &[i64]) {
    for pair in times.windows(2) {
        assert_eq!(pair[0] - pair[1], MINUTE, "gap or duplicate in {:?}", pair);
    }
}

#[cfg(test)]
mod kline_pagination_tests {
    use super::*;

    #[tokio::test]
    async fn test_interval_only_issues_one_request() {
        let rest = OkxRest::new(CandleHistory::new(1_000), MarketType::Spot);
        let request = KlinesRequest::new(btc_usdt(), KlineInterval::Minutes1);

        let klines = rest.get_klines(&request).await.unwrap();

        let history = rest.rest_client();
        let calls = history.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].get("instId").and_then(Value::as_str),
            Some("BTC-USDT")
        );
        assert_eq!(calls[0].get("bar").and_then(Value::as_str), Some("1m"));
        assert!(calls[0].get("after").is_none());
        assert!(calls[0].get("before").is_none());

        assert_eq!(klines.len(), PAGE_SIZE);
        assert_eq!(klines[0].open_time, candle_at(999));
        assert_eq!(klines[0].close_time, candle_at(1_000));
        assert_consecutive_newest_first(&open_times(&klines));
    }

    #[tokio::test]
    async fn test_start_alone_issues_one_cursorless_request() {
        let rest = OkxRest::new(CandleHistory::new(1_000), MarketType::Spot);
        let request =
            KlinesRequest::new(btc_usdt(), KlineInterval::Minutes1).start(candle_at(950));

        let klines = rest.get_klines(&request).await.unwrap();

        let calls = rest.rest_client().calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].get("after").is_none());
        assert!(calls[0].get("before").is_none());
        // Without `end` or `limit` the start bound plays no part
        assert_eq!(klines.len(), PAGE_SIZE);
        assert_eq!(klines[0].open_time, candle_at(999));
    }

    #[tokio::test]
    async fn test_limit_only_walks_back_and_truncates() {
        let rest = OkxRest::new(CandleHistory::new(1_000), MarketType::Spot);
        let request = KlinesRequest::new(btc_usdt(), KlineInterval::Minutes1).limit(250);

        let klines = rest.get_klines(&request).await.unwrap();

        let calls = rest.rest_client().calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].get("after").is_none());
        assert_eq!(
            calls[1].get("after").and_then(Value::as_str),
            Some(candle_at(900).to_string().as_str())
        );
        assert_eq!(
            calls[2].get("after").and_then(Value::as_str),
            Some(candle_at(800).to_string().as_str())
        );

        assert_eq!(klines.len(), 250);
        assert_eq!(klines[0].open_time, candle_at(999));
        assert_eq!(klines[249].open_time, candle_at(750));
        assert_consecutive_newest_first(&open_times(&klines));
    }

    #[tokio::test]
    async fn test_limit_beyond_history_stops_on_empty_page() {
        let rest = OkxRest::new(CandleHistory::new(230), MarketType::Spot);
        let request = KlinesRequest::new(btc_usdt(), KlineInterval::Minutes1).limit(5_000);

        let klines = rest.get_klines(&request).await.unwrap();

        // Two full pages, one partial, then the empty page
        assert_eq!(rest.rest_client().calls().len(), 4);
        assert_eq!(klines.len(), 230);
        assert_eq!(klines.last().map(|k| k.open_time), Some(ORIGIN));
    }

    #[tokio::test]
    async fn test_range_is_inclusive_on_both_ends() {
        let rest = OkxRest::new(CandleHistory::new(1_000), MarketType::Spot);
        let request = KlinesRequest::new(btc_usdt(), KlineInterval::Minutes1)
            .start(candle_at(100))
            .end(candle_at(349));

        let klines = rest.get_klines(&request).await.unwrap();

        let calls = rest.rest_client().calls();
        assert_eq!(
            calls[0].get("after").and_then(Value::as_str),
            Some(candle_at(350).to_string().as_str())
        );
        for call in &calls {
            assert_eq!(
                call.get("before").and_then(Value::as_str),
                Some(candle_at(99).to_string().as_str())
            );
        }

        assert_eq!(klines.len(), 250);
        assert_eq!(klines[0].open_time, candle_at(349));
        assert_eq!(klines[249].open_time, candle_at(100));
        assert_consecutive_newest_first(&open_times(&klines));
    }

    #[tokio::test]
    async fn test_end_and_limit_stop_at_first_bound() {
        let rest = OkxRest::new(CandleHistory::new(1_000), MarketType::Spot);
        let request = KlinesRequest::new(btc_usdt(), KlineInterval::Minutes1)
            .end(candle_at(599))
            .limit(150);

        let klines = rest.get_klines(&request).await.unwrap();

        assert_eq!(rest.rest_client().calls().len(), 2);
        assert_eq!(klines.len(), 150);
        assert_eq!(klines[0].open_time, candle_at(599));
        assert_eq!(klines[149].open_time, candle_at(450));
    }

    #[tokio::test]
    async fn test_empty_history() {
        let rest = OkxRest::new(CandleHistory::new(0), MarketType::Spot);
        let request = KlinesRequest::new(btc_usdt(), KlineInterval::Minutes1)
            .end(candle_at(10))
            .limit(10);

        let klines = rest.get_klines(&request).await.unwrap();

        assert!(klines.is_empty());
        assert_eq!(rest.rest_client().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_futures_volumes_on_paged_candles() {
        let rest = OkxRest::new(CandleHistory::new(10), MarketType::Futures);
        let request = KlinesRequest::new(btc_usdt(), KlineInterval::Minutes1).limit(3);

        let klines = rest.get_klines(&request).await.unwrap();

        let calls = rest.rest_client().calls();
        assert_eq!(
            calls[0].get("instId").and_then(Value::as_str),
            Some("BTC-USDT-SWAP")
        );
        assert_eq!(klines.len(), 3);
        assert_eq!(klines[0].market, MarketType::Futures);
        assert_eq!(klines[0].base_volume.to_string(), "210");
        assert_eq!(klines[0].quote_volume.to_string(), "22050");
    }
}
