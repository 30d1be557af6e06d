use crate::core::errors::{ApiError, ExchangeError};
use crate::core::kernel::rest::{Params, RequestOptions};
use crate::core::kernel::RestClient;
use crate::core::types::{KlineInterval, MarketPrice, MarketType, OrderSide, OrderType, Symbol};
use crate::exchanges::okx::conversions::{
    format_inst_id, format_inst_type, format_kline_interval, format_order_side, format_order_type,
    parse_mark_price,
};
use crate::exchanges::okx::types::{
    OkxAccount, OkxCandle, OkxInstrument, OkxMarkPrice, OkxOrder, OkxOrderRequest,
    OkxOrderResponse, OkxResponse, OkxTicker,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Paging cursor for candle endpoints. Times are Unix millis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandleQuery {
    /// Return candles older than this open time
    pub after: Option<i64>,
    /// Return candles newer than this open time
    pub before: Option<i64>,
    pub limit: Option<u32>,
}

/// OKX REST API client implementation
#[derive(Debug)]
pub struct OkxRest<R: RestClient> {
    rest_client: R,
    market: MarketType,
}

impl<R: RestClient> OkxRest<R> {
    pub fn new(rest_client: R, market: MarketType) -> Self {
        Self {
            rest_client,
            market,
        }
    }

    pub const fn market(&self) -> MarketType {
        self.market
    }

    pub fn rest_client(&self) -> &R {
        &self.rest_client
    }

    /// Extract `data` from an envelope the transport has already checked.
    fn handle_response<T>(&self, response_value: Value) -> Result<T, ExchangeError>
    where
        T: DeserializeOwned,
    {
        let response: OkxResponse<T> = serde_json::from_value(response_value)?;
        Ok(response.data)
    }

    /// Like `handle_response`, for endpoints answering with a one-item list.
    fn handle_single_item_response<T>(
        &self,
        response_value: Value,
        error_msg: &str,
    ) -> Result<T, ExchangeError>
    where
        T: DeserializeOwned,
    {
        let items: Vec<T> = self.handle_response(response_value)?;

        items
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::ParseError(error_msg.to_string()))
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Params,
    ) -> Result<T, ExchangeError> {
        let response_value = self
            .rest_client
            .get(endpoint, RequestOptions::public(params))
            .await?;
        self.handle_response(response_value)
    }

    async fn private_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Params,
    ) -> Result<T, ExchangeError> {
        let response_value = self
            .rest_client
            .get(endpoint, RequestOptions::private(params))
            .await?;
        self.handle_response(response_value)
    }

    async fn private_post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Params,
    ) -> Result<T, ExchangeError> {
        let response_value = self
            .rest_client
            .post(endpoint, RequestOptions::private(params))
            .await?;
        self.handle_response(response_value)
    }

    fn inst_type(&self) -> &'static str {
        format_inst_type(self.market).as_str()
    }

    // Public market data

    /// Get trading instruments for the configured market
    pub async fn get_instruments(&self) -> Result<Vec<OkxInstrument>, ExchangeError> {
        self.public_get(
            "/api/v5/public/instruments",
            Params::new().with("instType", self.inst_type()),
        )
        .await
    }

    /// Get a single instrument's trading rules
    pub async fn get_instrument(&self, symbol: &Symbol) -> Result<OkxInstrument, ExchangeError> {
        let params = Params::new()
            .with("instType", self.inst_type())
            .with("instId", format_inst_id(symbol, self.market));
        let response_value = self
            .rest_client
            .get("/api/v5/public/instruments", RequestOptions::public(params))
            .await?;
        self.handle_single_item_response(response_value, "No instrument data found")
    }

    /// Highest buy and lowest sell limit prices
    pub async fn get_price_limit(&self, symbol: &Symbol) -> Result<Vec<Value>, ExchangeError> {
        self.public_get(
            "/api/v5/public/price-limit",
            Params::new().with("instId", format_inst_id(symbol, self.market)),
        )
        .await
    }

    pub async fn get_mark_price(&self, symbol: &Symbol) -> Result<OkxMarkPrice, ExchangeError> {
        let params = Params::new()
            .with("instType", self.inst_type())
            .with("instId", format_inst_id(symbol, self.market));
        let response_value = self
            .rest_client
            .get("/api/v5/public/mark-price", RequestOptions::public(params))
            .await?;
        self.handle_single_item_response(response_value, "No mark price data found")
    }

    /// Current mark price as a canonical record (volumes are not reported)
    pub async fn get_price_ticker(&self, symbol: &Symbol) -> Result<MarketPrice, ExchangeError> {
        let mark = self.get_mark_price(symbol).await?;
        parse_mark_price(&mark)
    }

    pub async fn get_ticker(&self, symbol: &Symbol) -> Result<OkxTicker, ExchangeError> {
        let params = Params::new().with("instId", format_inst_id(symbol, self.market));
        let response_value = self
            .rest_client
            .get("/api/v5/market/ticker", RequestOptions::public(params))
            .await?;
        self.handle_single_item_response(response_value, "No ticker data found")
    }

    /// Recent candles, newest first
    pub async fn get_candles(
        &self,
        symbol: &Symbol,
        interval: KlineInterval,
        query: CandleQuery,
    ) -> Result<Vec<OkxCandle>, ExchangeError> {
        self.public_get(
            "/api/v5/market/candles",
            self.candle_params(symbol, interval, query),
        )
        .await
    }

    /// Archived candles, newest first
    pub async fn get_history_candles(
        &self,
        symbol: &Symbol,
        interval: KlineInterval,
        query: CandleQuery,
    ) -> Result<Vec<OkxCandle>, ExchangeError> {
        self.public_get(
            "/api/v5/market/history-candles",
            self.candle_params(symbol, interval, query),
        )
        .await
    }

    fn candle_params(&self, symbol: &Symbol, interval: KlineInterval, query: CandleQuery) -> Params {
        Params::new()
            .with("instId", format_inst_id(symbol, self.market))
            .with("bar", format_kline_interval(interval))
            .with_opt("after", query.after.map(|t| t.to_string()))
            .with_opt("before", query.before.map(|t| t.to_string()))
            .with_opt("limit", query.limit.map(|l| l.to_string()))
    }

    // Account API endpoints

    /// Get account balance
    pub async fn get_balance(&self, ccy: Option<&str>) -> Result<Vec<OkxAccount>, ExchangeError> {
        self.private_get(
            "/api/v5/account/balance",
            Params::new().with_opt("ccy", ccy),
        )
        .await
    }

    pub async fn get_positions(
        &self,
        inst_id: Option<&str>,
        pos_id: Option<&str>,
    ) -> Result<Vec<Value>, ExchangeError> {
        let params = Params::new()
            .with("instType", self.inst_type())
            .with_opt("instId", inst_id)
            .with_opt("posId", pos_id);
        self.private_get("/api/v5/account/positions", params).await
    }

    pub async fn get_positions_history(
        &self,
        inst_id: Option<&str>,
        mgn_mode: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Value>, ExchangeError> {
        let params = Params::new()
            .with("instType", self.inst_type())
            .with_opt("instId", inst_id)
            .with_opt("mgnMode", mgn_mode)
            .with_opt("limit", limit.map(|l| l.to_string()));
        self.private_get("/api/v5/account/positions-history", params).await
    }

    /// `long_short_mode` or `net_mode`
    pub async fn set_position_mode(&self, pos_mode: &str) -> Result<Vec<Value>, ExchangeError> {
        self.private_post(
            "/api/v5/account/set-position-mode",
            Params::new().with("posMode", pos_mode),
        )
        .await
    }

    pub async fn get_leverage_info(
        &self,
        inst_id: &str,
        mgn_mode: &str,
    ) -> Result<Vec<Value>, ExchangeError> {
        let params = Params::new()
            .with("instId", inst_id)
            .with("mgnMode", mgn_mode);
        self.private_get("/api/v5/account/leverage-info", params).await
    }

    pub async fn set_leverage(
        &self,
        inst_id: &str,
        lever: &str,
        mgn_mode: &str,
        pos_side: Option<&str>,
    ) -> Result<Vec<Value>, ExchangeError> {
        let params = Params::new()
            .with("instId", inst_id)
            .with("lever", lever)
            .with("mgnMode", mgn_mode)
            .with_opt("posSide", pos_side);
        self.private_post("/api/v5/account/set-leverage", params).await
    }

    pub async fn get_fee_rates(&self, inst_id: Option<&str>) -> Result<Vec<Value>, ExchangeError> {
        let params = Params::new()
            .with("instType", self.inst_type())
            .with_opt("instId", inst_id);
        self.private_get("/api/v5/account/trade-fee", params).await
    }

    // Trading API endpoints

    /// Place a new order. A per-order rejection (`sCode != "0"`) is an error.
    pub async fn place_order(
        &self,
        order: &OkxOrderRequest,
    ) -> Result<OkxOrderResponse, ExchangeError> {
        let endpoint = "/api/v5/trade/order";
        let response_value = self
            .rest_client
            .post(endpoint, RequestOptions::private(body_params(order)?))
            .await?;
        let response: OkxOrderResponse =
            self.handle_single_item_response(response_value, "No order response data found")?;
        check_order_ack(response, "POST", endpoint)
    }

    pub async fn close_position(
        &self,
        inst_id: &str,
        mgn_mode: &str,
        pos_side: Option<&str>,
    ) -> Result<Vec<Value>, ExchangeError> {
        let params = Params::new()
            .with("instId", inst_id)
            .with("mgnMode", mgn_mode)
            .with_opt("posSide", pos_side);
        self.private_post("/api/v5/trade/close-position", params).await
    }

    /// Cancel an order by exchange or client id
    pub async fn cancel_order(
        &self,
        inst_id: &str,
        ord_id: Option<&str>,
        cl_ord_id: Option<&str>,
    ) -> Result<OkxOrderResponse, ExchangeError> {
        let endpoint = "/api/v5/trade/cancel-order";
        let params = order_id_params(inst_id, ord_id, cl_ord_id)?;
        let response_value = self
            .rest_client
            .post(endpoint, RequestOptions::private(params))
            .await?;
        let response: OkxOrderResponse =
            self.handle_single_item_response(response_value, "No cancel response data found")?;
        check_order_ack(response, "POST", endpoint)
    }

    pub async fn get_pending_orders(
        &self,
        inst_id: Option<&str>,
    ) -> Result<Vec<OkxOrder>, ExchangeError> {
        let params = Params::new()
            .with("instType", self.inst_type())
            .with_opt("instId", inst_id);
        self.private_get("/api/v5/trade/orders-pending", params).await
    }

    /// Get order details
    pub async fn get_order(
        &self,
        inst_id: &str,
        ord_id: Option<&str>,
        cl_ord_id: Option<&str>,
    ) -> Result<OkxOrder, ExchangeError> {
        let params = order_id_params(inst_id, ord_id, cl_ord_id)?;
        let response_value = self
            .rest_client
            .get("/api/v5/trade/order", RequestOptions::private(params))
            .await?;
        self.handle_single_item_response(response_value, "No order data found")
    }

    // Funding API endpoints

    pub async fn get_asset_balances(&self, ccy: Option<&str>) -> Result<Vec<Value>, ExchangeError> {
        self.private_get("/api/v5/asset/balances", Params::new().with_opt("ccy", ccy)).await
    }

    pub async fn get_currencies(&self, ccy: Option<&str>) -> Result<Vec<Value>, ExchangeError> {
        self.private_get(
            "/api/v5/asset/currencies",
            Params::new().with_opt("ccy", ccy),
        )
        .await
    }

    /// Move funds between accounts (`6` funding, `18` trading)
    pub async fn funds_transfer(
        &self,
        ccy: &str,
        amt: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<Value>, ExchangeError> {
        let params = Params::new()
            .with("ccy", ccy)
            .with("amt", amt)
            .with("from", from)
            .with("to", to);
        self.private_post("/api/v5/asset/transfer", params).await
    }
}

impl OkxOrderRequest {
    pub fn new(
        inst_id: impl Into<String>,
        td_mode: impl Into<String>,
        side: impl Into<String>,
        ord_type: impl Into<String>,
        sz: impl Into<String>,
    ) -> Self {
        Self {
            inst_id: inst_id.into(),
            td_mode: td_mode.into(),
            side: side.into(),
            ord_type: ord_type.into(),
            sz: sz.into(),
            px: None,
            ccy: None,
            cl_ord_id: None,
            pos_side: None,
            tag: None,
            tgt_ccy: None,
        }
    }

    /// Request for `symbol` in canonical terms. Spot trades in cash mode,
    /// margin and futures in cross margin.
    pub fn for_symbol(
        symbol: &Symbol,
        market: MarketType,
        side: OrderSide,
        order_type: OrderType,
        quantity: Decimal,
    ) -> Self {
        let td_mode = match market {
            MarketType::Spot => "cash",
            MarketType::Margin | MarketType::Futures => "cross",
        };
        Self::new(
            format_inst_id(symbol, market),
            td_mode,
            format_order_side(side),
            format_order_type(order_type),
            quantity.to_string(),
        )
    }

    #[must_use]
    pub fn price(mut self, px: impl Into<String>) -> Self {
        self.px = Some(px.into());
        self
    }

    #[must_use]
    pub fn client_order_id(mut self, cl_ord_id: impl Into<String>) -> Self {
        self.cl_ord_id = Some(cl_ord_id.into());
        self
    }
}

/// Flatten a serializable request into ordered body parameters.
fn body_params<T: Serialize>(body: &T) -> Result<Params, ExchangeError> {
    match serde_json::to_value(body)? {
        Value::Object(map) => Ok(map
            .into_iter()
            .fold(Params::new(), |params, (key, value)| params.with(key, value))),
        other => Err(ExchangeError::InvalidParameters(format!(
            "Request body must be a JSON object, got {}",
            other
        ))),
    }
}

fn order_id_params(
    inst_id: &str,
    ord_id: Option<&str>,
    cl_ord_id: Option<&str>,
) -> Result<Params, ExchangeError> {
    if ord_id.is_none() && cl_ord_id.is_none() {
        return Err(ExchangeError::InvalidParameters(
            "Either ordId or clOrdId is required".to_string(),
        ));
    }
    Ok(Params::new()
        .with("instId", inst_id)
        .with_opt("ordId", ord_id)
        .with_opt("clOrdId", cl_ord_id))
}

fn check_order_ack(
    response: OkxOrderResponse,
    method: &str,
    endpoint: &str,
) -> Result<OkxOrderResponse, ExchangeError> {
    if response.s_code.is_empty() || response.s_code == "0" {
        return Ok(response);
    }
    Err(ApiError {
        code: response.s_code.clone(),
        message: response.s_msg.clone(),
        status: 200,
        body: serde_json::to_string(&response)?,
        headers: HashMap::new(),
        method: method.to_string(),
        request_url: endpoint.to_string(),
        request_body: None,
    }
    .into())
}
