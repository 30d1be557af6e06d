use crate::core::config::OkxConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClientBuilder, RestClientConfig, WsConnector};
use crate::core::types::{MarketType, StreamType};
use crate::exchanges::okx::rest::OkxRest;
use crate::exchanges::okx::signer::OkxSigner;
use crate::exchanges::okx::websocket::OkxWebsocket;
use std::sync::Arc;
use std::time::Duration;

/// Builder for OKX REST clients and WebSocket sessions
///
/// One builder describes one market; build a REST client, a public session
/// and a private session from clones of it as needed.
#[derive(Debug, Clone)]
pub struct OkxBuilder {
    config: OkxConfig,
    rest_timeout: u64,
}

impl Default for OkxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OkxBuilder {
    /// Create a new `OkxBuilder` for public data only
    pub fn new() -> Self {
        Self {
            config: OkxConfig::read_only(),
            rest_timeout: 30,
        }
    }

    /// Set the whole configuration
    pub fn with_config(mut self, config: OkxConfig) -> Self {
        self.config = config;
        self
    }

    /// Set API credentials, keeping every other setting
    pub fn with_credentials(
        mut self,
        api_key: String,
        secret_key: String,
        passphrase: String,
    ) -> Self {
        let previous = self.config;
        let mut config = OkxConfig::new(api_key, secret_key, passphrase)
            .testnet(previous.is_test)
            .market(previous.market)
            .stream_type(previous.stream_type)
            .reconnect_period(previous.reconnect_period)
            .ping_interval(previous.ping_interval)
            .pong_timeout(previous.pong_timeout)
            .broker_id(previous.broker_id);
        config.base_url = previous.base_url;
        self.config = config;
        self
    }

    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.config.is_test = testnet;
        self
    }

    pub fn with_market(mut self, market: MarketType) -> Self {
        self.config.market = market;
        self
    }

    pub fn with_stream_type(mut self, stream_type: StreamType) -> Self {
        self.config.stream_type = stream_type;
        self
    }

    /// Set base URL for REST API
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.config.base_url = Some(base_url);
        self
    }

    /// Set WebSocket reconnection delay
    pub fn with_ws_reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_period = interval;
        self
    }

    /// Set WebSocket ping interval for heartbeat
    pub fn with_ws_ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    pub fn with_ws_pong_timeout(mut self, timeout: Duration) -> Self {
        self.config.pong_timeout = timeout;
        self
    }

    /// Set REST client timeout in seconds
    pub fn with_rest_timeout(mut self, timeout: u64) -> Self {
        self.rest_timeout = timeout;
        self
    }

    pub fn config(&self) -> &OkxConfig {
        &self.config
    }

    /// Build a REST client; requests are signed when credentials are set
    pub fn build_rest(self) -> Result<OkxRest<ReqwestRest>, ExchangeError> {
        let rest_config =
            RestClientConfig::new(self.config.rest_base_url().to_string(), "okx".to_string())
                .with_timeout(self.rest_timeout);

        let mut rest_builder = RestClientBuilder::new(rest_config);
        if self.config.has_credentials() {
            rest_builder = rest_builder.with_signer(Arc::new(OkxSigner::from_config(&self.config)));
        }

        Ok(OkxRest::new(rest_builder.build()?, self.config.market))
    }

    /// Build a WebSocket session for the configured stream type
    pub fn build_ws(self) -> Result<OkxWebsocket, ExchangeError> {
        OkxWebsocket::new(self.config)
    }

    pub fn build_ws_with_connector(
        self,
        connector: impl WsConnector,
    ) -> Result<OkxWebsocket, ExchangeError> {
        OkxWebsocket::with_connector(self.config, connector)
    }
}
