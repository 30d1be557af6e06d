use super::types::{
    InstrumentType, OkxAccount, OkxAlgoOrder, OkxBalanceAndPosition, OkxMarkPrice, OkxOrder,
    OkxTicker,
};
use crate::core::errors::ExchangeError;
use crate::core::types::{
    AccountBalance, BalanceChange, KlineInterval, MarketKline, MarketPrice, MarketType, Order,
    OrderSide, OrderStatus, OrderType, PositionChange, PositionSide, StreamType, Symbol,
    WsAccountUpdate, WsBalancePositionUpdate,
};
use rust_decimal::Decimal;
use std::str::FromStr;

// Symbols and instruments

/// `BTC-USDT` -> `BTC_USDT`
pub fn parse_symbol(inst_id: &str) -> Result<Symbol, ExchangeError> {
    let mut parts = inst_id.split('-');
    match (parts.next(), parts.next()) {
        (Some(base), Some(quote)) => Symbol::new(base, quote),
        _ => Err(ExchangeError::unmapped("symbol", inst_id)),
    }
}

/// `BTC_USDT` -> `BTC-USDT`
pub fn format_symbol(symbol: &Symbol) -> String {
    format!("{}-{}", symbol.base, symbol.quote)
}

pub fn parse_market_type(inst_type: &str) -> Result<MarketType, ExchangeError> {
    match inst_type {
        "SPOT" => Ok(MarketType::Spot),
        "MARGIN" => Ok(MarketType::Margin),
        "SWAP" | "FUTURES" => Ok(MarketType::Futures),
        other => Err(ExchangeError::unmapped("market type", other)),
    }
}

pub const fn format_market_type(market: MarketType) -> &'static str {
    format_inst_type(market).as_str()
}

pub const fn format_inst_type(market: MarketType) -> InstrumentType {
    match market {
        MarketType::Spot => InstrumentType::Spot,
        MarketType::Margin => InstrumentType::Margin,
        MarketType::Futures => InstrumentType::Swap,
    }
}

/// Split an instrument id into its pair and market.
///
/// Two segments are spot, a dated third segment is a delivery future and
/// any other third segment is read as an instrument type (`SWAP`).
pub fn parse_inst_id(inst_id: &str) -> Result<(Symbol, MarketType), ExchangeError> {
    let segments: Vec<&str> = inst_id.split('-').collect();
    match segments.as_slice() {
        [base, quote] => Ok((Symbol::new(*base, *quote)?, MarketType::Spot)),
        [base, quote, suffix] => {
            let market = if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                MarketType::Futures
            } else {
                parse_market_type(suffix)
                    .map_err(|_| ExchangeError::unmapped("instrument", inst_id))?
            };
            Ok((Symbol::new(*base, *quote)?, market))
        }
        _ => Err(ExchangeError::unmapped("instrument", inst_id)),
    }
}

pub fn format_inst_id(symbol: &Symbol, market: MarketType) -> String {
    match market {
        MarketType::Spot | MarketType::Margin => format_symbol(symbol),
        MarketType::Futures => format!("{}-SWAP", format_symbol(symbol)),
    }
}

/// Instrument family (`BTC-USDT`), used to filter derivative channels.
pub fn format_inst_family(symbol: &Symbol) -> String {
    format_symbol(symbol)
}

// Closed mapping tables

pub fn parse_order_side(side: &str) -> Result<OrderSide, ExchangeError> {
    match side {
        "buy" => Ok(OrderSide::Buy),
        "sell" => Ok(OrderSide::Sell),
        other => Err(ExchangeError::unmapped("order side", other)),
    }
}

pub const fn format_order_side(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

pub fn parse_order_type(ord_type: &str) -> Result<OrderType, ExchangeError> {
    match ord_type {
        "market" => Ok(OrderType::Market),
        "limit" => Ok(OrderType::Limit),
        "post_only" => Ok(OrderType::PostOnly),
        "fok" => Ok(OrderType::FillOrKill),
        "ioc" => Ok(OrderType::ImmediateOrCancel),
        "conditional" => Ok(OrderType::Stop),
        "trigger" => Ok(OrderType::Trigger),
        "oco" => Ok(OrderType::Oco),
        "move_order_stop" => Ok(OrderType::TrailingStop),
        other => Err(ExchangeError::unmapped("order type", other)),
    }
}

pub const fn format_order_type(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
        OrderType::PostOnly => "post_only",
        OrderType::FillOrKill => "fok",
        OrderType::ImmediateOrCancel => "ioc",
        OrderType::Stop => "conditional",
        OrderType::Trigger => "trigger",
        OrderType::Oco => "oco",
        OrderType::TrailingStop => "move_order_stop",
    }
}

pub fn parse_order_status(state: &str) -> Result<OrderStatus, ExchangeError> {
    match state {
        "live" => Ok(OrderStatus::New),
        "partially_filled" => Ok(OrderStatus::PartiallyFilled),
        "filled" => Ok(OrderStatus::Filled),
        "canceled" | "mmp_canceled" => Ok(OrderStatus::Cancelled),
        other => Err(ExchangeError::unmapped("order status", other)),
    }
}

pub fn parse_algo_order_status(state: &str) -> Result<OrderStatus, ExchangeError> {
    match state {
        "live" => Ok(OrderStatus::New),
        "pause" => Ok(OrderStatus::Paused),
        "partially_effective" => Ok(OrderStatus::PartiallyFilled),
        "effective" => Ok(OrderStatus::Triggered),
        "canceled" => Ok(OrderStatus::Cancelled),
        "order_failed" => Ok(OrderStatus::Rejected),
        other => Err(ExchangeError::unmapped("algo order status", other)),
    }
}

pub fn parse_position_side(pos_side: &str) -> Result<PositionSide, ExchangeError> {
    match pos_side {
        "long" => Ok(PositionSide::Long),
        "short" => Ok(PositionSide::Short),
        "net" => Ok(PositionSide::Net),
        other => Err(ExchangeError::unmapped("position side", other)),
    }
}

pub fn parse_kline_interval(bar: &str) -> Result<KlineInterval, ExchangeError> {
    match bar {
        "1m" => Ok(KlineInterval::Minutes1),
        "3m" => Ok(KlineInterval::Minutes3),
        "5m" => Ok(KlineInterval::Minutes5),
        "15m" => Ok(KlineInterval::Minutes15),
        "30m" => Ok(KlineInterval::Minutes30),
        "1H" => Ok(KlineInterval::Hours1),
        "2H" => Ok(KlineInterval::Hours2),
        "4H" => Ok(KlineInterval::Hours4),
        "6H" => Ok(KlineInterval::Hours6),
        "12H" => Ok(KlineInterval::Hours12),
        "1D" => Ok(KlineInterval::Days1),
        "1W" => Ok(KlineInterval::Weeks1),
        "1M" => Ok(KlineInterval::Months1),
        other => Err(ExchangeError::unmapped("kline interval", other)),
    }
}

pub const fn format_kline_interval(interval: KlineInterval) -> &'static str {
    match interval {
        KlineInterval::Minutes1 => "1m",
        KlineInterval::Minutes3 => "3m",
        KlineInterval::Minutes5 => "5m",
        KlineInterval::Minutes15 => "15m",
        KlineInterval::Minutes30 => "30m",
        KlineInterval::Hours1 => "1H",
        KlineInterval::Hours2 => "2H",
        KlineInterval::Hours4 => "4H",
        KlineInterval::Hours6 => "6H",
        KlineInterval::Hours12 => "12H",
        KlineInterval::Days1 => "1D",
        KlineInterval::Weeks1 => "1W",
        KlineInterval::Months1 => "1M",
    }
}

pub fn parse_stream_type(path: &str) -> Result<StreamType, ExchangeError> {
    match path {
        "public" => Ok(StreamType::Market),
        "private" => Ok(StreamType::User),
        other => Err(ExchangeError::unmapped("stream type", other)),
    }
}

pub const fn format_stream_type(stream: StreamType) -> &'static str {
    match stream {
        StreamType::Market => "public",
        StreamType::User => "private",
    }
}

// Numbers

/// A number the exchange always fills in; blank is a parse error.
fn decimal(field: &str, value: &str) -> Result<Decimal, ExchangeError> {
    if value.is_empty() {
        return Err(ExchangeError::ParseError(format!("Missing {}", field)));
    }
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| ExchangeError::ParseError(format!("Invalid {} '{}': {}", field, value, e)))
}

fn optional_decimal(field: &str, value: &str) -> Result<Option<Decimal>, ExchangeError> {
    if value.is_empty() {
        Ok(None)
    } else {
        decimal(field, value).map(Some)
    }
}

/// Amounts OKX leaves blank when nothing applies: balance fields outside
/// the current account mode, position size, filled size before any fill and
/// algo sizes given as a close fraction. Blank reads as zero.
fn amount_or_zero(field: &str, value: &str) -> Result<Decimal, ExchangeError> {
    Ok(optional_decimal(field, value)?.unwrap_or(Decimal::ZERO))
}

fn millis(field: &str, value: &str) -> Result<i64, ExchangeError> {
    value
        .parse::<i64>()
        .map_err(|e| ExchangeError::ParseError(format!("Invalid {} '{}': {}", field, value, e)))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Base and quote volumes from OKX `volCcy`.
///
/// Derivatives report `volCcy` in the base coin, spot and margin in the quote
/// currency. A zero price yields a zero base volume.
pub fn trade_volumes(
    market: MarketType,
    vol_ccy: Decimal,
    price: Decimal,
) -> Result<(Decimal, Decimal), ExchangeError> {
    match market {
        MarketType::Futures => {
            let quote = vol_ccy.checked_mul(price).ok_or_else(|| {
                ExchangeError::ParseError(format!("Quote volume overflow: {} x {}", vol_ccy, price))
            })?;
            Ok((vol_ccy, quote))
        }
        MarketType::Spot | MarketType::Margin => {
            let base = vol_ccy.checked_div(price).unwrap_or(Decimal::ZERO);
            Ok((base, vol_ccy))
        }
    }
}

// Record parsers

pub fn parse_price_ticker(ticker: &OkxTicker) -> Result<MarketPrice, ExchangeError> {
    let (symbol, market) = parse_inst_id(&ticker.inst_id)?;
    let price = decimal("last", &ticker.last)?;
    let (base_volume, quote_volume) = match optional_decimal("volCcy24h", &ticker.vol_ccy_24h)? {
        Some(vol_ccy) => {
            let (base, quote) = trade_volumes(market, vol_ccy, price)?;
            (Some(base), Some(quote))
        }
        None => (None, None),
    };

    Ok(MarketPrice {
        symbol,
        market,
        price,
        base_volume,
        quote_volume,
        timestamp: millis("ts", &ticker.ts)?,
    })
}

/// One candle row: `[ts, o, h, l, c, vol, volCcy, ...]`.
pub fn parse_kline_row(
    symbol: &Symbol,
    market: MarketType,
    interval: KlineInterval,
    row: &[String],
) -> Result<MarketKline, ExchangeError> {
    if row.len() < 7 {
        return Err(ExchangeError::ParseError(format!(
            "Candle row has {} fields, expected at least 7",
            row.len()
        )));
    }

    let open_time = millis("ts", &row[0])?;
    let close = decimal("close", &row[4])?;
    let vol_ccy = decimal("volCcy", &row[6])?;
    let (base_volume, quote_volume) = trade_volumes(market, vol_ccy, close)?;

    Ok(MarketKline {
        symbol: symbol.clone(),
        market,
        interval,
        open_time,
        close_time: interval.close_time(open_time)?,
        open: decimal("open", &row[1])?,
        high: decimal("high", &row[2])?,
        low: decimal("low", &row[3])?,
        close,
        base_volume,
        quote_volume,
    })
}

pub fn parse_mark_price(mark: &OkxMarkPrice) -> Result<MarketPrice, ExchangeError> {
    let (symbol, inst_market) = parse_inst_id(&mark.inst_id)?;
    let market = if mark.inst_type.is_empty() {
        inst_market
    } else {
        parse_market_type(&mark.inst_type)?
    };

    Ok(MarketPrice {
        symbol,
        market,
        price: decimal("markPx", &mark.mark_px)?,
        base_volume: None,
        quote_volume: None,
        timestamp: millis("ts", &mark.ts)?,
    })
}

pub fn parse_account_update(account: &OkxAccount) -> Result<WsAccountUpdate, ExchangeError> {
    let balances = account
        .details
        .iter()
        .map(|detail| {
            Ok(AccountBalance {
                asset: detail.ccy.clone(),
                equity: amount_or_zero("eq", &detail.eq)?,
                cash_balance: amount_or_zero("cashBal", &detail.cash_bal)?,
                available: amount_or_zero("availBal", &detail.avail_bal)?,
                frozen: amount_or_zero("frozenBal", &detail.frozen_bal)?,
            })
        })
        .collect::<Result<Vec<_>, ExchangeError>>()?;

    Ok(WsAccountUpdate {
        timestamp: millis("uTime", &account.u_time)?,
        total_equity: optional_decimal("totalEq", &account.total_eq)?,
        balances,
    })
}

pub fn parse_balance_position(
    update: &OkxBalanceAndPosition,
) -> Result<WsBalancePositionUpdate, ExchangeError> {
    let balances = update
        .bal_data
        .iter()
        .map(|bal| {
            Ok(BalanceChange {
                asset: bal.ccy.clone(),
                cash_balance: amount_or_zero("cashBal", &bal.cash_bal)?,
                timestamp: millis("uTime", &bal.u_time)?,
            })
        })
        .collect::<Result<Vec<_>, ExchangeError>>()?;

    let positions = update
        .pos_data
        .iter()
        .map(|pos| {
            let (symbol, inst_market) = parse_inst_id(&pos.inst_id)?;
            let market = if pos.inst_type.is_empty() {
                inst_market
            } else {
                parse_market_type(&pos.inst_type)?
            };
            Ok(PositionChange {
                position_id: pos.pos_id.clone(),
                symbol,
                market,
                side: parse_position_side(&pos.pos_side)?,
                quantity: amount_or_zero("pos", &pos.pos)?,
                average_price: optional_decimal("avgPx", &pos.avg_px)?,
                timestamp: millis("uTime", &pos.u_time)?,
            })
        })
        .collect::<Result<Vec<_>, ExchangeError>>()?;

    Ok(WsBalancePositionUpdate {
        timestamp: millis("pTime", &update.p_time)?,
        event_type: update.event_type.clone(),
        balances,
        positions,
    })
}

pub fn parse_order(order: &OkxOrder) -> Result<Order, ExchangeError> {
    let (symbol, market) = parse_inst_id(&order.inst_id)?;
    let created = millis("cTime", &order.c_time)?;
    let updated = if order.u_time.is_empty() {
        created
    } else {
        millis("uTime", &order.u_time)?
    };

    Ok(Order {
        id: non_empty(&order.cl_ord_id),
        exchange_id: order.ord_id.clone(),
        symbol,
        market,
        side: parse_order_side(&order.side)?,
        order_type: parse_order_type(&order.ord_type)?,
        status: parse_order_status(&order.state)?,
        base_quantity: decimal("sz", &order.sz)?,
        price: optional_decimal("px", &order.px)?,
        stop_price: None,
        executed_quantity: amount_or_zero("accFillSz", &order.acc_fill_sz)?,
        average_price: optional_decimal("avgPx", &order.avg_px)?,
        commission: optional_decimal("fee", &order.fee)?,
        commission_asset: non_empty(&order.fee_ccy),
        created,
        updated,
    })
}

/// `-1` is OKX's marker for "execute at market price".
fn algo_price(field: &str, value: &str) -> Result<Option<Decimal>, ExchangeError> {
    if value == "-1" {
        Ok(None)
    } else {
        optional_decimal(field, value)
    }
}

pub fn parse_algo_order(order: &OkxAlgoOrder) -> Result<Order, ExchangeError> {
    let (symbol, market) = parse_inst_id(&order.inst_id)?;
    let created = millis("cTime", &order.c_time)?;
    let updated = if order.u_time.is_empty() {
        created
    } else {
        millis("uTime", &order.u_time)?
    };

    Ok(Order {
        id: non_empty(&order.algo_cl_ord_id),
        exchange_id: order.algo_id.clone(),
        symbol,
        market,
        side: parse_order_side(&order.side)?,
        order_type: parse_order_type(&order.ord_type)?,
        status: parse_algo_order_status(&order.state)?,
        base_quantity: amount_or_zero("sz", &order.sz)?,
        price: algo_price("ordPx", &order.ord_px)?,
        stop_price: optional_decimal("triggerPx", &order.trigger_px)?,
        executed_quantity: amount_or_zero("actualSz", &order.actual_sz)?,
        average_price: algo_price("actualPx", &order.actual_px)?,
        commission: None,
        commission_asset: None,
        created,
        updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc_usdt() -> Symbol {
        Symbol::new("BTC", "USDT").unwrap()
    }

    #[test]
    fn test_symbol_round_trip() {
        assert_eq!(parse_symbol("BTC-USDT").unwrap(), btc_usdt());
        assert_eq!(format_symbol(&btc_usdt()), "BTC-USDT");
        assert!(parse_symbol("BTCUSDT").is_err());
    }

    #[test]
    fn test_parse_inst_id() {
        assert_eq!(
            parse_inst_id("BTC-USDT").unwrap(),
            (btc_usdt(), MarketType::Spot)
        );
        assert_eq!(
            parse_inst_id("BTC-USDT-SWAP").unwrap(),
            (btc_usdt(), MarketType::Futures)
        );
        let (symbol, market) = parse_inst_id("BTC-USD-250328").unwrap();
        assert_eq!(symbol.to_string(), "BTC_USD");
        assert_eq!(market, MarketType::Futures);

        assert!(matches!(
            parse_inst_id("BTC-USD-250328-60000-C"),
            Err(ExchangeError::UnmappedValue { kind: "instrument", .. })
        ));
        assert!(matches!(
            parse_inst_id("BTC-USDT-PERP"),
            Err(ExchangeError::UnmappedValue { .. })
        ));
    }

    #[test]
    fn test_format_inst_id() {
        assert_eq!(format_inst_id(&btc_usdt(), MarketType::Spot), "BTC-USDT");
        assert_eq!(format_inst_id(&btc_usdt(), MarketType::Margin), "BTC-USDT");
        assert_eq!(
            format_inst_id(&btc_usdt(), MarketType::Futures),
            "BTC-USDT-SWAP"
        );
    }

    #[test]
    fn test_bidirectional_tables_invert() {
        for market in [MarketType::Spot, MarketType::Margin, MarketType::Futures] {
            assert_eq!(parse_market_type(format_market_type(market)).unwrap(), market);
        }
        for side in [OrderSide::Buy, OrderSide::Sell] {
            assert_eq!(parse_order_side(format_order_side(side)).unwrap(), side);
        }
        for order_type in [
            OrderType::Market,
            OrderType::Limit,
            OrderType::PostOnly,
            OrderType::FillOrKill,
            OrderType::ImmediateOrCancel,
            OrderType::Stop,
            OrderType::Trigger,
            OrderType::Oco,
            OrderType::TrailingStop,
        ] {
            assert_eq!(
                parse_order_type(format_order_type(order_type)).unwrap(),
                order_type
            );
        }
        for interval in KlineInterval::all() {
            assert_eq!(
                parse_kline_interval(format_kline_interval(interval)).unwrap(),
                interval
            );
        }
        for stream in [StreamType::Market, StreamType::User] {
            assert_eq!(parse_stream_type(format_stream_type(stream)).unwrap(), stream);
        }
    }

    #[test]
    fn test_unmapped_values_are_errors() {
        assert!(matches!(
            parse_order_type("twap"),
            Err(ExchangeError::UnmappedValue { kind: "order type", .. })
        ));
        assert!(parse_order_side("hold").is_err());
        assert!(parse_kline_interval("1h").is_err());
        assert!(parse_market_type("OPTION").is_err());
        assert!(parse_order_status("pause").is_err());
        assert!(parse_algo_order_status("filled").is_err());
        assert!(parse_stream_type("business").is_err());
    }

    #[test]
    fn test_status_tables() {
        assert_eq!(parse_order_status("mmp_canceled").unwrap(), OrderStatus::Cancelled);
        assert_eq!(parse_algo_order_status("effective").unwrap(), OrderStatus::Triggered);
        assert_eq!(parse_algo_order_status("order_failed").unwrap(), OrderStatus::Rejected);
    }

    #[test]
    fn test_trade_volumes() {
        assert_eq!(
            trade_volumes(MarketType::Futures, dec!(10), dec!(2)).unwrap(),
            (dec!(10), dec!(20))
        );
        assert_eq!(
            trade_volumes(MarketType::Spot, dec!(10), dec!(2)).unwrap(),
            (dec!(5), dec!(10))
        );
        assert_eq!(
            trade_volumes(MarketType::Margin, dec!(10), Decimal::ZERO).unwrap(),
            (Decimal::ZERO, dec!(10))
        );
    }

    #[test]
    fn test_parse_price_ticker() {
        let ticker = OkxTicker {
            inst_id: "BTC-USDT-SWAP".to_string(),
            last: "40000".to_string(),
            vol_ccy_24h: "3".to_string(),
            ts: "1706659200000".to_string(),
            ..OkxTicker::default()
        };
        let price = parse_price_ticker(&ticker).unwrap();

        assert_eq!(price.market, MarketType::Futures);
        assert_eq!(price.price, dec!(40000));
        assert_eq!(price.base_volume, Some(dec!(3)));
        assert_eq!(price.quote_volume, Some(dec!(120000)));
        assert_eq!(price.timestamp, 1_706_659_200_000);
    }

    #[test]
    fn test_parse_kline_row() {
        let row: Vec<String> = [
            "1706659200000",
            "100",
            "110",
            "90",
            "105",
            "7",
            "2100",
            "2100",
            "1",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect();

        let kline =
            parse_kline_row(&btc_usdt(), MarketType::Spot, KlineInterval::Hours1, &row).unwrap();
        assert_eq!(kline.open_time, 1_706_659_200_000);
        assert_eq!(kline.close_time, 1_706_662_800_000);
        assert_eq!(kline.close, dec!(105));
        assert_eq!(kline.base_volume, dec!(20));
        assert_eq!(kline.quote_volume, dec!(2100));

        assert!(parse_kline_row(&btc_usdt(), MarketType::Spot, KlineInterval::Hours1, &row[..4])
            .is_err());
    }

    #[test]
    fn test_parse_order() {
        let order = OkxOrder {
            inst_id: "ETH-USDT".to_string(),
            ord_id: "312269865356374016".to_string(),
            cl_ord_id: "b1".to_string(),
            px: "2000".to_string(),
            sz: "0.5".to_string(),
            ord_type: "limit".to_string(),
            side: "sell".to_string(),
            acc_fill_sz: "0.2".to_string(),
            avg_px: "2000".to_string(),
            state: "partially_filled".to_string(),
            fee: "-0.4".to_string(),
            fee_ccy: "USDT".to_string(),
            c_time: "1597026383085".to_string(),
            ..OkxOrder::default()
        };
        let parsed = parse_order(&order).unwrap();

        assert_eq!(parsed.id.as_deref(), Some("b1"));
        assert_eq!(parsed.status, OrderStatus::PartiallyFilled);
        assert_eq!(parsed.side, OrderSide::Sell);
        assert_eq!(parsed.executed_quantity, dec!(0.2));
        assert_eq!(parsed.commission, Some(dec!(-0.4)));
        assert_eq!(parsed.updated, parsed.created);
    }

    #[test]
    fn test_parse_algo_order_market_price() {
        let order = OkxAlgoOrder {
            inst_id: "BTC-USDT-SWAP".to_string(),
            algo_id: "681096944655273984".to_string(),
            ord_type: "conditional".to_string(),
            side: "buy".to_string(),
            sz: "1".to_string(),
            state: "live".to_string(),
            trigger_px: "41000".to_string(),
            ord_px: "-1".to_string(),
            c_time: "1706659200000".to_string(),
            u_time: "1706659201000".to_string(),
            ..OkxAlgoOrder::default()
        };
        let parsed = parse_algo_order(&order).unwrap();

        assert_eq!(parsed.order_type, OrderType::Stop);
        assert_eq!(parsed.price, None);
        assert_eq!(parsed.stop_price, Some(dec!(41000)));
        assert_eq!(parsed.id, None);
        assert_eq!(parsed.updated, 1_706_659_201_000);
    }

    #[test]
    fn test_blank_required_number_is_an_error() {
        let ticker = OkxTicker {
            inst_id: "BTC-USDT".to_string(),
            last: String::new(),
            ts: "1".to_string(),
            ..OkxTicker::default()
        };
        match parse_price_ticker(&ticker) {
            Err(ExchangeError::ParseError(msg)) => assert_eq!(msg, "Missing last"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_blank_fill_amounts_read_as_zero() {
        let order = OkxAlgoOrder {
            inst_id: "BTC-USDT-SWAP".to_string(),
            algo_id: "1".to_string(),
            ord_type: "conditional".to_string(),
            side: "sell".to_string(),
            state: "live".to_string(),
            c_time: "1706659200000".to_string(),
            ..OkxAlgoOrder::default()
        };
        let parsed = parse_algo_order(&order).unwrap();

        assert_eq!(parsed.base_quantity, Decimal::ZERO);
        assert_eq!(parsed.executed_quantity, Decimal::ZERO);
        assert_eq!(parsed.stop_price, None);
    }

    #[test]
    fn test_invalid_number_names_field() {
        let ticker = OkxTicker {
            inst_id: "BTC-USDT".to_string(),
            last: "abc".to_string(),
            ts: "1".to_string(),
            ..OkxTicker::default()
        };
        match parse_price_ticker(&ticker) {
            Err(ExchangeError::ParseError(msg)) => assert!(msg.contains("last")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
