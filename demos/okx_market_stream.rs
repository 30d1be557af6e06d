use lotusx_okx::{KlineInterval, KlinesRequest, MarketType, OkxBuilder, SessionEvent, Symbol};
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Public data only; add credentials with `.with_credentials(..)` for
    // account endpoints and private streams
    let builder = OkxBuilder::new()
        .with_testnet(false)
        .with_market(MarketType::Spot);
    let symbol: Symbol = "BTC_USDT".parse()?;

    let rest = builder.clone().build_rest()?;
    let now = chrono::Utc::now().timestamp_millis();
    let request = KlinesRequest::new(symbol.clone(), KlineInterval::Hours1)
        .start(now - 24 * 3_600_000)
        .end(now);
    match rest.get_klines(&request).await {
        Ok(klines) => info!(count = klines.len(), "Fetched last day of hourly candles"),
        Err(e) => warn!(error = %e, "Error fetching candles"),
    }

    let ws = builder.build_ws()?;
    let mut events = ws.events();
    let mut prices = ws.price_ticker(&symbol).await?;
    ws.connect()?;

    let deadline = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            Some(price) = prices.recv() => {
                info!(symbol = %price.symbol, price = %price.price, "Ticker");
            }
            Ok(event) = events.recv() => {
                if event == SessionEvent::Closed {
                    break;
                }
                info!(?event, "Session event");
            }
            () = &mut deadline => {
                ws.close()?;
                deadline.as_mut().reset(tokio::time::Instant::now() + Duration::from_secs(5));
            }
        }
    }

    Ok(())
}
