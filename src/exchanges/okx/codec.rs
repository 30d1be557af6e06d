use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::exchanges::okx::channels::SubscriptionArguments;
use crate::exchanges::okx::signer::OkxSigner;
use crate::exchanges::okx::types::{OkxWsRequest, WsArg};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

/// `event` values of operation replies and notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WsEventTag {
    Login,
    Subscribe,
    Unsubscribe,
    Error,
    Notice,
    ChannelConnCount,
    ChannelConnCountError,
}

/// OKX WebSocket message types
#[derive(Debug, Clone, PartialEq)]
pub enum OkxMessage {
    /// Operation reply or notice
    Event {
        event: WsEventTag,
        code: Option<String>,
        msg: Option<String>,
        arg: Option<WsArg>,
    },
    /// Channel push
    Channel { arg: WsArg, data: Vec<Value> },
    /// Pong response
    Pong,
}

impl OkxMessage {
    /// Successful login acknowledgement.
    pub fn is_login_ack(&self) -> bool {
        matches!(
            self,
            Self::Event {
                event: WsEventTag::Login,
                code: Some(code),
                ..
            } if code == "0"
        )
    }
}

#[derive(Deserialize)]
struct RawFrame {
    event: Option<String>,
    code: Option<String>,
    msg: Option<String>,
    arg: Option<WsArg>,
    data: Option<Vec<Value>>,
}

/// OKX WebSocket codec implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct OkxCodec;

impl OkxCodec {
    pub const fn new() -> Self {
        Self
    }

    fn encode_request<A: Serialize>(op: &str, args: Vec<A>) -> Result<Message, ExchangeError> {
        let request = OkxWsRequest {
            op: op.to_string(),
            args,
        };
        Ok(Message::Text(serde_json::to_string(&request)?))
    }

    /// Signed `login` frame; `timestamp` is Unix seconds.
    pub fn encode_login(
        &self,
        signer: &OkxSigner,
        timestamp: i64,
    ) -> Result<Message, ExchangeError> {
        Self::encode_request("login", vec![signer.login_args(timestamp)?])
    }
}

impl WsCodec for OkxCodec {
    type Subscription = SubscriptionArguments;
    type Message = OkxMessage;

    fn encode_subscription(
        &self,
        args: &[SubscriptionArguments],
    ) -> Result<Message, ExchangeError> {
        Self::encode_request("subscribe", args.to_vec())
    }

    fn encode_unsubscription(
        &self,
        args: &[SubscriptionArguments],
    ) -> Result<Message, ExchangeError> {
        Self::encode_request("unsubscribe", args.to_vec())
    }

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError> {
        let text = match message {
            Message::Text(text) => text,
            Message::Binary(data) => String::from_utf8(data).map_err(|e| {
                ExchangeError::ParseError(format!("Invalid UTF-8 in binary message: {}", e))
            })?,
            Message::Pong(_) => return Ok(Some(OkxMessage::Pong)),
            _ => return Ok(None), // Ping/Close are handled by the session
        };

        // Application-level keepalive reply
        if text == "pong" {
            return Ok(Some(OkxMessage::Pong));
        }

        let frame: RawFrame = serde_json::from_str(&text)
            .map_err(|e| ExchangeError::ParseError(format!("Failed to parse JSON: {}", e)))?;

        if let Some(event) = frame.event {
            let tag = serde_json::from_value(Value::String(event.clone()))
                .map_err(|_| ExchangeError::ParseError(format!("Unknown event '{}'", event)))?;
            return Ok(Some(OkxMessage::Event {
                event: tag,
                code: frame.code,
                msg: frame.msg,
                arg: frame.arg,
            }));
        }

        match (frame.arg, frame.data) {
            (Some(arg), Some(data)) => Ok(Some(OkxMessage::Channel { arg, data })),
            _ => Err(ExchangeError::ParseError(format!(
                "Unrecognized message: {}",
                text
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str) -> Result<Option<OkxMessage>, ExchangeError> {
        OkxCodec::new().decode_message(Message::Text(text.to_string()))
    }

    #[test]
    fn test_encode_subscription() {
        let msg = OkxCodec::new()
            .encode_subscription(&[SubscriptionArguments::Tickers {
                inst_id: "BTC-USDT".to_string(),
            }])
            .unwrap();
        assert_eq!(
            msg,
            Message::Text(
                r#"{"op":"subscribe","args":[{"channel":"tickers","instId":"BTC-USDT"}]}"#
                    .to_string()
            )
        );
    }

    #[test]
    fn test_encode_login() {
        let signer = OkxSigner::new(
            "key".to_string(),
            "secret".to_string(),
            "phrase".to_string(),
            true,
        );
        let Message::Text(text) = OkxCodec::new().encode_login(&signer, 1_538_054_050).unwrap()
        else {
            panic!("expected a text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["op"], "login");
        assert_eq!(value["args"][0]["apiKey"], "key");
        assert_eq!(value["args"][0]["passphrase"], "phrase");
        assert_eq!(value["args"][0]["timestamp"], "1538054050");
        assert_eq!(
            value["args"][0]["sign"],
            signer.login_signature("1538054050").unwrap().as_str()
        );
    }

    #[test]
    fn test_decode_pong() {
        assert_eq!(decode("pong").unwrap(), Some(OkxMessage::Pong));
        assert_eq!(
            OkxCodec::new()
                .decode_message(Message::Pong(Vec::new()))
                .unwrap(),
            Some(OkxMessage::Pong)
        );
        assert_eq!(
            OkxCodec::new()
                .decode_message(Message::Ping(Vec::new()))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_decode_events() {
        let login = decode(r#"{"event":"login","code":"0","msg":"","connId":"a4d3ae55"}"#)
            .unwrap()
            .unwrap();
        assert!(login.is_login_ack());

        let failed = decode(r#"{"event":"error","code":"60009","msg":"Login failed."}"#)
            .unwrap()
            .unwrap();
        assert!(!failed.is_login_ack());
        assert!(matches!(
            failed,
            OkxMessage::Event {
                event: WsEventTag::Error,
                ..
            }
        ));

        let count = decode(
            r#"{"event":"channel-conn-count","channel":"orders","connCount":"2","connId":"abcd1234"}"#,
        )
        .unwrap()
        .unwrap();
        assert!(matches!(
            count,
            OkxMessage::Event {
                event: WsEventTag::ChannelConnCount,
                ..
            }
        ));

        assert!(decode(r#"{"event":"mystery"}"#).is_err());
    }

    #[test]
    fn test_decode_channel_push() {
        let msg = decode(
            r#"{"arg":{"channel":"tickers","instId":"BTC-USDT"},"data":[{"instId":"BTC-USDT","last":"1"}]}"#,
        )
        .unwrap()
        .unwrap();
        match msg {
            OkxMessage::Channel { arg, data } => {
                assert_eq!(arg.channel(), Some("tickers"));
                assert_eq!(data.len(), 1);
            }
            other => panic!("unexpected message: {:?}", other),
        }

        assert!(decode(r#"{"arg":{"channel":"tickers"}}"#).is_err());
        assert!(decode("not json").is_err());
    }
}
