use crate::core::config::ConfigError;
use crate::core::errors::{ApiError, ExchangeError};
use crate::core::kernel::signer::Signer;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, Request, Response, Url};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Characters `encodeURIComponent` leaves alone; everything else, space
/// included, is percent-encoded.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Ordered request parameters.
///
/// Insertion order is kept all the way to the wire: it is the order of the
/// query string for GET/DELETE and of the JSON object keys for POST/PUT, and
/// therefore the order of the string that gets signed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, Value)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    /// Append the pair only when a value is present.
    #[must_use]
    pub fn with_opt<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Pairs rendered for a query string. Strings are used verbatim, other
    /// JSON values by their JSON text.
    pub fn query_pairs(&self) -> impl Iterator<Item = (&str, String)> {
        self.0.iter().map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.as_str(), rendered)
        })
    }

    /// Percent-encoded `k=v&k=v` query. Spaces become `%20`, not `+`.
    pub fn query_string(&self) -> String {
        self.query_pairs()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(key, QUERY_COMPONENT),
                    utf8_percent_encode(&value, QUERY_COMPONENT)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self.0.iter().cloned().collect();
        Value::Object(map)
    }
}

/// Per-request options: parameters, extra headers and whether to sign.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub params: Params,
    pub headers: Vec<(String, String)>,
    pub is_public: bool,
}

impl RequestOptions {
    pub fn public(params: Params) -> Self {
        Self {
            params,
            headers: Vec::new(),
            is_public: true,
        }
    }

    pub fn private(params: Params) -> Self {
        Self {
            params,
            headers: Vec::new(),
            is_public: false,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// REST client trait for making HTTP requests
///
/// Implementations resolve to the full response envelope on success and to
/// [`ExchangeError::Api`] when the exchange rejected the call.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Make a request with an explicit method
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `endpoint` - The API endpoint path, e.g. `/api/v5/trade/order`
    /// * `options` - Parameters, extra headers and the public/private flag
    ///
    /// # Returns
    /// The response body as a JSON value
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Value, ExchangeError>;

    async fn get(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ExchangeError> {
        self.request(Method::GET, endpoint, options).await
    }

    async fn post(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ExchangeError> {
        self.request(Method::POST, endpoint, options).await
    }

    async fn put(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ExchangeError> {
        self.request(Method::PUT, endpoint, options).await
    }

    async fn delete(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Value, ExchangeError> {
        self.request(Method::DELETE, endpoint, options).await
    }
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl RestClientConfig {
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url,
            exchange_name,
            timeout_seconds: 30,
            user_agent: "LotusX/1.0".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
        }
    }

    /// Set the signer for authenticated requests
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| {
                ConfigError::InvalidConfiguration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(ReqwestRest {
            client,
            config: self.config,
            signer: self.signer,
        })
    }
}

/// What was sent, kept for error reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    pub body: Option<String>,
}

impl RequestSnapshot {
    fn of(request: &Request) -> Self {
        let body = request
            .body()
            .and_then(|body| body.as_bytes())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
        Self {
            method: request.method().to_string(),
            url: request.url().to_string(),
            body,
        }
    }
}

/// Implementation of `RestClient` using reqwest
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    fn build_url(&self, endpoint: &str) -> Result<Url, ExchangeError> {
        let raw = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        Url::parse(&raw)
            .map_err(|e| ExchangeError::InvalidParameters(format!("Invalid URL '{}': {}", raw, e)))
    }

    /// Build the exact request that would be sent, signed at `timestamp` (ms).
    ///
    /// GET/DELETE parameters go to the query string, POST/PUT parameters to a
    /// JSON body. The signer sees the same encoded query and body bytes that
    /// end up on the wire.
    pub fn prepare(
        &self,
        method: &Method,
        endpoint: &str,
        options: &RequestOptions,
        timestamp: u64,
    ) -> Result<Request, ExchangeError> {
        let mut url = self.build_url(endpoint)?;
        let has_body = *method == Method::POST || *method == Method::PUT;

        let body = if has_body {
            Some(serde_json::to_string(&options.params.to_json())?)
        } else {
            if !options.params.is_empty() {
                url.set_query(Some(&options.params.query_string()));
            }
            None
        };
        let query_string = url.query().unwrap_or_default().to_string();

        let mut request = self.client.request(method.clone(), url);

        if has_body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json");
        }

        if !options.is_public {
            let signer = self.signer.as_ref().ok_or_else(|| {
                ExchangeError::AuthError(
                    "Authentication required but no signer provided".to_string(),
                )
            })?;
            let headers = signer.sign_request(
                method.as_str(),
                endpoint,
                &query_string,
                body.as_deref().unwrap_or_default().as_bytes(),
                timestamp,
            )?;
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        for (key, value) in &options.headers {
            request = request.header(key, value);
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        Ok(request.build()?)
    }

    /// Handle the response and extract JSON
    #[instrument(skip(self, response, snapshot), fields(exchange = %self.config.exchange_name, status = %response.status()))]
    async fn handle_response(
        &self,
        response: Response,
        snapshot: RequestSnapshot,
    ) -> Result<Value, ExchangeError> {
        let status = response.status().as_u16();
        let headers = header_map(response.headers());
        let body = response.text().await?;

        trace!("Response body: {}", body);

        parse_envelope(status, headers, body, snapshot)
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(skip(self, options), fields(exchange = %self.config.exchange_name, method = %method, endpoint = %endpoint, param_count = options.params.len()))]
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Value, ExchangeError> {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        let request = self.prepare(&method, endpoint, &options, timestamp)?;
        let snapshot = RequestSnapshot::of(&request);

        debug!(url = %snapshot.url, "Sending request");
        let response = self.client.execute(request).await?;

        self.handle_response(response, snapshot).await
    }
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

/// Check an exchange envelope `{code, msg, data}`.
///
/// Only `code == "0"` under a 2xx status is a success; the whole envelope is
/// returned in that case. Everything else becomes an [`ApiError`] carrying
/// the raw response and the originating request.
pub fn parse_envelope(
    status: u16,
    headers: HashMap<String, String>,
    body: String,
    request: RequestSnapshot,
) -> Result<Value, ExchangeError> {
    let reject = |code: String, message: String| -> ExchangeError {
        ApiError {
            code,
            message,
            status,
            body: body.clone(),
            headers: headers.clone(),
            method: request.method.clone(),
            request_url: request.url.clone(),
            request_body: request.body.clone(),
        }
        .into()
    };

    let value: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            return Err(reject(
                status.to_string(),
                format!("Unparseable response body: {}", e),
            ))
        }
    };

    let code = match value.get("code") {
        Some(Value::String(code)) => Some(code.clone()),
        Some(Value::Number(code)) => Some(code.to_string()),
        _ => None,
    };
    let message = value
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match code {
        Some(code) if code == "0" && (200..300).contains(&status) => Ok(value),
        Some(code) => Err(reject(code, message)),
        None if (200..300).contains(&status) => Err(reject(
            status.to_string(),
            "Response envelope has no code".to_string(),
        )),
        None => Err(reject(status.to_string(), message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> RequestSnapshot {
        RequestSnapshot {
            method: "GET".to_string(),
            url: "https://www.okx.com/api/v5/market/ticker?instId=BTC-USDT".to_string(),
            body: None,
        }
    }

    #[test]
    fn test_params_keep_insertion_order() {
        let params = Params::new()
            .with("instId", "BTC-USDT")
            .with("bar", "1m")
            .with_opt("after", None::<String>)
            .with("limit", 100);

        let pairs: Vec<_> = params.query_pairs().collect();
        assert_eq!(
            pairs,
            vec![
                ("instId", "BTC-USDT".to_string()),
                ("bar", "1m".to_string()),
                ("limit", "100".to_string()),
            ]
        );
        assert_eq!(
            params.to_json().to_string(),
            r#"{"instId":"BTC-USDT","bar":"1m","limit":100}"#
        );
    }

    #[test]
    fn test_query_string_percent_encodes_components() {
        let params = Params::new()
            .with("clOrdId", "a b")
            .with("instIds", "BTC-USDT,ETH-USDT")
            .with("limit", 5);
        assert_eq!(
            params.query_string(),
            "clOrdId=a%20b&instIds=BTC-USDT%2CETH-USDT&limit=5"
        );
    }

    #[test]
    fn test_envelope_success() {
        let body = json!({"code": "0", "msg": "", "data": [{"ts": "1"}]}).to_string();
        let value = parse_envelope(200, HashMap::new(), body, snapshot()).unwrap();
        assert_eq!(value["data"][0]["ts"], "1");
    }

    #[test]
    fn test_envelope_logical_failure_under_http_200() {
        let body = r#"{"code":"51000","msg":"Parameter instId error","data":[]}"#.to_string();
        let error = parse_envelope(200, HashMap::new(), body.clone(), snapshot()).unwrap_err();

        match error {
            ExchangeError::Api(api) => {
                assert_eq!(api.code, "51000");
                assert_eq!(api.message, "Parameter instId error");
                assert_eq!(api.body, body);
                assert_eq!(api.method, "GET");
                assert!(api.request_url.ends_with("instId=BTC-USDT"));
            }
            other => panic!("Expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_envelope_non_json_error_page() {
        let error = parse_envelope(
            502,
            HashMap::new(),
            "<html>Bad Gateway</html>".to_string(),
            snapshot(),
        )
        .unwrap_err();
        assert_eq!(error.code(), Some("502"));
    }
}
