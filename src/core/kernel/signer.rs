use crate::core::errors::ExchangeError;
use base64::engine::general_purpose;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Result type for signing operations: ordered header pairs to attach.
pub type SignatureResult = Result<Vec<(String, String)>, ExchangeError>;

/// HMAC-SHA256 of `message` keyed by `secret`, base64 encoded (standard alphabet).
///
/// Shared by REST request signing and the WebSocket login frame.
pub fn sign(message: &str, secret: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::AuthError(format!("Failed to create HMAC: {}", e)))?;

    mac.update(message.as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Signer trait for request authentication
///
/// Implementations turn a prepared request into the authentication headers
/// the exchange expects.
pub trait Signer: Send + Sync {
    /// Sign a request and return the headers to attach
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, etc.)
    /// * `endpoint` - API endpoint path
    /// * `query_string` - Encoded query string (without leading '?')
    /// * `body` - Raw request body bytes
    /// * `timestamp` - Request timestamp in milliseconds
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        query_string: &str,
        body: &[u8],
        timestamp: u64,
    ) -> SignatureResult;
}
