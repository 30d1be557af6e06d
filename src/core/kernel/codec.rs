use crate::core::errors::ExchangeError;
use tokio_tungstenite::tungstenite::Message;

/// Frame codec for one exchange's WebSocket protocol
///
/// Turns subscription arguments into operation frames and raw frames into
/// typed messages. Keepalive and close frames stay with the session.
pub trait WsCodec: Send + Sync + 'static {
    /// Arguments identifying one channel subscription
    type Subscription: Send + Sync;

    /// The type representing parsed messages from this exchange
    type Message: Send + Sync;

    /// One `subscribe` frame covering `args`
    fn encode_subscription(&self, args: &[Self::Subscription]) -> Result<Message, ExchangeError>;

    fn encode_unsubscription(&self, args: &[Self::Subscription])
        -> Result<Message, ExchangeError>;

    /// `Ok(None)` for frames the codec has no use for.
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError>;
}
