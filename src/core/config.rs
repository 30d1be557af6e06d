use crate::core::types::{MarketType, StreamType};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

pub const DEFAULT_REST_URL: &str = "https://www.okx.com";
pub const DEFAULT_BROKER_ID: &str = "215489475109851136";
pub const DEFAULT_RECONNECT_PERIOD: Duration = Duration::from_secs(5);
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(18);
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for one OKX client (REST) or one WebSocket session.
///
/// Credentials are held as [`Secret`]s and never appear in `Debug` or
/// serialized output.
#[derive(Debug, Clone)]
pub struct OkxConfig {
    pub api_key: Secret<String>,
    pub api_secret: Secret<String>,
    pub api_passphrase: Secret<String>,
    /// Demo trading: simulated-trading header on REST, `wspap` host on WS.
    pub is_test: bool,
    pub market: MarketType,
    pub stream_type: StreamType,
    pub reconnect_period: Duration,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub base_url: Option<String>,
    pub broker_id: String,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for OkxConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("OkxConfig", 11)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("api_secret", "[REDACTED]")?;
        state.serialize_field("api_passphrase", "[REDACTED]")?;
        state.serialize_field("is_test", &self.is_test)?;
        state.serialize_field("market", &self.market)?;
        state.serialize_field("stream_type", &self.stream_type)?;
        state.serialize_field("reconnect_period_ms", &millis(self.reconnect_period))?;
        state.serialize_field("ping_interval_ms", &millis(self.ping_interval))?;
        state.serialize_field("pong_timeout_ms", &millis(self.pong_timeout))?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("broker_id", &self.broker_id)?;
        state.end()
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl<'de> Deserialize<'de> for OkxConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct OkxConfigHelper {
            #[serde(default)]
            api_key: String,
            #[serde(default)]
            api_secret: String,
            #[serde(default)]
            api_passphrase: String,
            is_test: Option<bool>,
            #[serde(default)]
            market: MarketType,
            #[serde(default)]
            stream_type: StreamType,
            reconnect_period_ms: Option<u64>,
            ping_interval_ms: Option<u64>,
            pong_timeout_ms: Option<u64>,
            base_url: Option<String>,
            broker_id: Option<String>,
        }

        let helper = OkxConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            api_key: Secret::new(helper.api_key),
            api_secret: Secret::new(helper.api_secret),
            api_passphrase: Secret::new(helper.api_passphrase),
            is_test: helper.is_test.unwrap_or(true),
            market: helper.market,
            stream_type: helper.stream_type,
            reconnect_period: helper
                .reconnect_period_ms
                .map_or(DEFAULT_RECONNECT_PERIOD, Duration::from_millis),
            ping_interval: helper
                .ping_interval_ms
                .map_or(DEFAULT_PING_INTERVAL, Duration::from_millis),
            pong_timeout: helper
                .pong_timeout_ms
                .map_or(DEFAULT_PONG_TIMEOUT, Duration::from_millis),
            base_url: helper.base_url,
            broker_id: helper
                .broker_id
                .unwrap_or_else(|| DEFAULT_BROKER_ID.to_string()),
        })
    }
}

impl OkxConfig {
    /// Create a new configuration with API credentials.
    ///
    /// Demo trading is on by default; call `.testnet(false)` for production.
    #[must_use]
    pub fn new(api_key: String, api_secret: String, api_passphrase: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            api_secret: Secret::new(api_secret),
            api_passphrase: Secret::new(api_passphrase),
            is_test: true,
            market: MarketType::default(),
            stream_type: StreamType::default(),
            reconnect_period: DEFAULT_RECONNECT_PERIOD,
            ping_interval: DEFAULT_PING_INTERVAL,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
            base_url: None,
            broker_id: DEFAULT_BROKER_ID.to_string(),
        }
    }

    /// Create configuration for read-only operations (market data only)
    #[must_use]
    pub fn read_only() -> Self {
        Self::new(String::new(), String::new(), String::new())
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
            && !self.api_secret.expose_secret().is_empty()
            && !self.api_passphrase.expose_secret().is_empty()
    }

    #[must_use]
    pub const fn testnet(mut self, is_test: bool) -> Self {
        self.is_test = is_test;
        self
    }

    #[must_use]
    pub const fn market(mut self, market: MarketType) -> Self {
        self.market = market;
        self
    }

    #[must_use]
    pub const fn stream_type(mut self, stream_type: StreamType) -> Self {
        self.stream_type = stream_type;
        self
    }

    #[must_use]
    pub const fn reconnect_period(mut self, period: Duration) -> Self {
        self.reconnect_period = period;
        self
    }

    #[must_use]
    pub const fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    #[must_use]
    pub const fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Set custom REST base URL
    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    #[must_use]
    pub fn broker_id(mut self, broker_id: String) -> Self {
        self.broker_id = broker_id;
        self
    }

    /// Get API key (use carefully - exposes secret)
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Get API secret (use carefully - exposes secret)
    pub fn api_secret(&self) -> &str {
        self.api_secret.expose_secret()
    }

    /// Get API passphrase (use carefully - exposes secret)
    pub fn api_passphrase(&self) -> &str {
        self.api_passphrase.expose_secret()
    }

    pub fn rest_base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_REST_URL)
    }

    /// WebSocket endpoint for the configured stream type.
    pub fn ws_url(&self) -> String {
        let path = match self.stream_type {
            StreamType::Market => "public",
            StreamType::User => "private",
        };
        if self.is_test {
            format!(
                "wss://wspap.okx.com:8443/ws/v5/{}?brokerId={}",
                path, self.broker_id
            )
        } else {
            format!("wss://ws.okx.com:8443/ws/v5/{}", path)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_type == StreamType::User && !self.has_credentials() {
            return Err(ConfigError::MissingCredentials);
        }
        for (name, value) in [
            ("reconnect_period", self.reconnect_period),
            ("ping_interval", self.ping_interval),
            ("pong_timeout", self.pong_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Credentials are required for private streams and signed requests")]
    MissingCredentials,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
