/// Transport kernel shared by the exchange layer
///
/// The kernel holds transport logic and the trait seams the exchange code
/// plugs into; nothing here knows OKX channel names or payload shapes.
///
/// ## Transport
/// - `RestClient`: HTTP interface resolving to the checked response envelope
/// - `ReqwestRest`: reqwest implementation with offline request preparation
/// - `WsConnector`: dials one socket and hands back its split halves
///
/// ## Authentication
/// - `sign`: HMAC-SHA256/base64 primitive
/// - `Signer`: turns a prepared request into authentication headers
///
/// ## Message Handling
/// - `WsCodec`: exchange-specific frame encoding/decoding
///
/// # Example
/// ```rust,no_run
/// use lotusx_okx::core::kernel::*;
/// use lotusx_okx::core::kernel::rest::{Params, RequestOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RestClientConfig::new("https://www.okx.com".to_string(), "okx".to_string());
/// let rest = RestClientBuilder::new(config).build()?;
///
/// let params = Params::new().with("instId", "BTC-USDT");
/// let envelope = rest
///     .get("/api/v5/market/ticker", RequestOptions::public(params))
///     .await?;
/// println!("{}", envelope["data"]);
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod rest;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use codec::WsCodec;
pub use rest::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use signer::{sign, SignatureResult, Signer};
pub use ws::{TungsteniteConnector, WsConnector, WsSocket};
