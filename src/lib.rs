pub mod core;
pub mod exchanges;

pub use core::{
    config::OkxConfig,
    errors::{ApiError, ExchangeError},
    types::*,
};
pub use exchanges::okx::{OkxBuilder, OkxRest, OkxWebsocket};
