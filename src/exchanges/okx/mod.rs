pub mod channels;
pub mod codec;
pub mod conversions;
pub mod signer;
pub mod types;

pub mod builder;
pub mod klines;
pub mod rest;
pub mod websocket;

// Re-export main components
pub use builder::OkxBuilder;
pub use channels::{channel_key, ChannelRegistry, SubscriptionArguments};
pub use codec::{OkxCodec, OkxMessage, WsEventTag};
pub use rest::{CandleQuery, OkxRest};
pub use signer::OkxSigner;
pub use types::{
    InstrumentType, OkxAccount, OkxAlgoOrder, OkxBalanceAndPosition, OkxInstrument, OkxMarkPrice,
    OkxOrder, OkxOrderRequest, OkxOrderResponse, OkxResponse, OkxTicker, WsArg,
};
pub use websocket::{ChannelSubscription, OkxWebsocket};
