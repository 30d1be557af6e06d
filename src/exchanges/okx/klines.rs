use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::types::{KlinesRequest, MarketKline};
use crate::exchanges::okx::conversions::parse_kline_row;
use crate::exchanges::okx::rest::{CandleQuery, OkxRest};
use tracing::{debug, instrument};

impl<R: RestClient> OkxRest<R> {
    /// Historical candles for an inclusive `[start, end]` range.
    ///
    /// The upstream range excludes its own bounds, so both ends are widened
    /// by one interval. Pages arrive newest first and are concatenated in
    /// that order:
    /// - no `end`, no `limit`: a single cursorless page, `start` ignored
    /// - `limit` only: walk backwards from now until `limit` candles
    /// - `end`: walk backwards from `end` until `start` is passed, the
    ///   history runs out, or `limit` is reached
    #[instrument(skip(self), fields(symbol = %request.symbol, interval = %request.interval))]
    pub async fn get_klines(
        &self,
        request: &KlinesRequest,
    ) -> Result<Vec<MarketKline>, ExchangeError> {
        let interval = request.interval;
        let paged = request.end.is_some() || request.limit.is_some();
        let before = match request.start {
            Some(start) if paged => Some(interval.shift(start, -1)?),
            _ => None,
        };
        let mut after = request
            .end
            .map(|end| interval.shift(end, 1))
            .transpose()?;

        let mut results: Vec<MarketKline> = Vec::new();
        loop {
            let query = CandleQuery {
                after,
                before,
                limit: None,
            };
            let page = self
                .get_history_candles(&request.symbol, interval, query)
                .await?;
            debug!(?after, ?before, rows = page.len(), "Fetched candle page");
            if page.is_empty() {
                break;
            }

            let klines = page
                .iter()
                .map(|row| parse_kline_row(&request.symbol, self.market(), interval, row))
                .collect::<Result<Vec<_>, _>>()?;
            let earliest = klines.iter().map(|kline| kline.open_time).min();
            results.extend(klines);

            if !paged {
                break;
            }
            if request.limit.is_some_and(|limit| results.len() >= limit) {
                break;
            }
            let Some(earliest) = earliest else {
                break;
            };
            // A page that does not move the cursor back would repeat forever
            if after.is_some_and(|cursor| earliest >= cursor) {
                break;
            }
            if before.is_some_and(|floor| earliest <= floor) {
                break;
            }
            after = Some(earliest);
        }

        if let Some(limit) = request.limit {
            results.truncate(limit);
        }
        Ok(results)
    }
}
