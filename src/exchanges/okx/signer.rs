use crate::core::config::OkxConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{sign, SignatureResult, Signer};
use crate::exchanges::okx::types::OkxLoginArgs;
use secrecy::{ExposeSecret, Secret};

/// Path signed by the WebSocket login frame.
const WS_LOGIN_PATH: &str = "/users/self/verify";

pub struct OkxSigner {
    api_key: String,
    secret_key: Secret<String>,
    passphrase: Secret<String>,
    is_test: bool,
}

impl OkxSigner {
    pub fn new(api_key: String, secret_key: String, passphrase: String, is_test: bool) -> Self {
        Self {
            api_key,
            secret_key: Secret::new(secret_key),
            passphrase: Secret::new(passphrase),
            is_test,
        }
    }

    pub fn from_config(config: &OkxConfig) -> Self {
        Self::new(
            config.api_key().to_string(),
            config.api_secret().to_string(),
            config.api_passphrase().to_string(),
            config.is_test,
        )
    }

    /// OKX REST timestamp: ISO-8601 UTC with milliseconds.
    pub fn iso_timestamp(timestamp_ms: u64) -> Result<String, ExchangeError> {
        let datetime = chrono::DateTime::from_timestamp_millis(timestamp_ms as i64)
            .ok_or_else(|| ExchangeError::AuthError("Invalid timestamp".to_string()))?;

        Ok(datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
    }

    /// Signature for the WebSocket `login` operation.
    pub fn login_signature(&self, timestamp: &str) -> Result<String, ExchangeError> {
        sign(
            &format!("{}GET{}", timestamp, WS_LOGIN_PATH),
            self.secret_key.expose_secret(),
        )
    }

    /// Arguments of the `login` operation; `timestamp` is Unix seconds.
    pub fn login_args(&self, timestamp: i64) -> Result<OkxLoginArgs, ExchangeError> {
        let timestamp = timestamp.to_string();
        Ok(OkxLoginArgs {
            api_key: self.api_key.clone(),
            passphrase: self.passphrase.expose_secret().clone(),
            sign: self.login_signature(&timestamp)?,
            timestamp,
        })
    }
}

impl std::fmt::Debug for OkxSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OkxSigner")
            .field("api_key", &"[REDACTED]")
            .field("is_test", &self.is_test)
            .finish_non_exhaustive()
    }
}

impl Signer for OkxSigner {
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        query_string: &str,
        body: &[u8],
        timestamp: u64,
    ) -> SignatureResult {
        let timestamp = Self::iso_timestamp(timestamp)?;

        // The signed path carries the query string for GET/DELETE
        let request_path = if query_string.is_empty() {
            endpoint.to_string()
        } else {
            format!("{}?{}", endpoint, query_string)
        };

        let body_str = std::str::from_utf8(body)
            .map_err(|e| ExchangeError::AuthError(format!("Invalid body encoding: {}", e)))?;

        let prehash = format!("{}{}{}{}", timestamp, method, request_path, body_str);
        let signature = sign(&prehash, self.secret_key.expose_secret())?;

        Ok(vec![
            ("OK-ACCESS-KEY".to_string(), self.api_key.clone()),
            ("OK-ACCESS-SIGN".to_string(), signature),
            ("OK-ACCESS-TIMESTAMP".to_string(), timestamp),
            (
                "OK-ACCESS-PASSPHRASE".to_string(),
                self.passphrase.expose_secret().clone(),
            ),
            (
                "x-simulated-trading".to_string(),
                if self.is_test { "1" } else { "0" }.to_string(),
            ),
        ])
    }
}
