use crate::core::config::OkxConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{TungsteniteConnector, WsCodec, WsConnector, WsSocket};
use crate::core::multicast::{ChannelReceiver, ChannelStream, FilteredReceiver};
use crate::core::types::{
    ChannelEvent, ConnectionState, KlineInterval, MarketKline, MarketPrice, MarketType, Order,
    SessionEvent, StreamType, Symbol, WsAccountUpdate, WsBalancePositionUpdate,
};
use crate::exchanges::okx::channels::{ChannelRegistry, SubscriptionArguments};
use crate::exchanges::okx::codec::{OkxCodec, OkxMessage, WsEventTag};
use crate::exchanges::okx::conversions::{format_inst_family, format_inst_id, format_inst_type};
use crate::exchanges::okx::signer::OkxSigner;
use futures_util::{SinkExt, Stream, StreamExt};
use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval_at, sleep, timeout, Instant, Interval, MissedTickBehavior, Sleep};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// How long a socket may take to acknowledge a close before it is dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(3);
/// Bound on the close handshake when tearing down for a reconnect.
const RECONNECT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
const EVENT_CAPACITY: usize = 64;

type StreamReply =
    Result<(ChannelStream<ChannelEvent>, ChannelReceiver<ChannelEvent>), ExchangeError>;
type ConnectFuture = Pin<Box<dyn Future<Output = Result<WsSocket, ExchangeError>> + Send>>;

enum Command {
    Connect,
    Reconnect,
    Close,
    Destroy,
    Register {
        args: Vec<SubscriptionArguments>,
        reply: oneshot::Sender<StreamReply>,
    },
    ChannelCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to one OKX WebSocket session.
///
/// The session runs on its own task and owns the socket, the keepalive
/// timers and the channel registry. It reconnects on its own until
/// [`close`](Self::close) is called; dropping every handle shuts it down.
#[derive(Debug, Clone)]
pub struct OkxWebsocket {
    market: MarketType,
    stream_type: StreamType,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl OkxWebsocket {
    /// Session over a real socket. Must be called inside a tokio runtime.
    pub fn new(config: OkxConfig) -> Result<Self, ExchangeError> {
        Self::with_connector(config, TungsteniteConnector::default())
    }

    /// Session dialing through `connector`.
    pub fn with_connector(
        config: OkxConfig,
        connector: impl WsConnector,
    ) -> Result<Self, ExchangeError> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Initial);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let ws_id = format!("{}-{}-ws", config.market, config.stream_type);
        let handle = Self {
            market: config.market,
            stream_type: config.stream_type,
            commands: command_tx,
            state: state_rx,
            events: events.clone(),
        };

        let signer = match config.stream_type {
            StreamType::User => Some(OkxSigner::from_config(&config)),
            StreamType::Market => None,
        };
        let session = Session {
            url: config.ws_url(),
            config,
            connector: Arc::new(connector),
            codec: OkxCodec::new(),
            signer,
            registry: ChannelRegistry::new(),
            state_tx,
            events,
            commands: command_rx,
            socket: None,
            connecting: None,
            ping_timer: None,
            pong_deadline: None,
            reconnect_at: None,
            close_deadline: None,
        };
        tokio::spawn(session.run().instrument(info_span!("okx_ws", ws_id = %ws_id)));

        Ok(handle)
    }

    fn send(&self, command: Command) -> Result<(), ExchangeError> {
        self.commands
            .send(command)
            .map_err(|_| ExchangeError::SessionClosed)
    }

    pub fn connect(&self) -> Result<(), ExchangeError> {
        self.send(Command::Connect)
    }

    pub fn reconnect(&self) -> Result<(), ExchangeError> {
        self.send(Command::Reconnect)
    }

    /// Close the socket and cancel every timer, including a pending reconnect.
    pub fn close(&self) -> Result<(), ExchangeError> {
        self.send(Command::Close)
    }

    /// Complete every channel stream and forget them.
    pub fn destroy(&self) -> Result<(), ExchangeError> {
        self.send(Command::Destroy)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Number of registered channel streams.
    pub async fn channel_count(&self) -> Result<usize, ExchangeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ChannelCount { reply })?;
        rx.await.map_err(|_| ExchangeError::SessionClosed)
    }

    /// Register (or join) the stream for `args`, subscribed as one unit.
    pub async fn subscribe_channel(
        &self,
        args: Vec<SubscriptionArguments>,
    ) -> Result<ChannelSubscription<ChannelEvent>, ExchangeError> {
        self.register(args).await
    }

    async fn register<R: TryFrom<ChannelEvent>>(
        &self,
        args: Vec<SubscriptionArguments>,
    ) -> Result<ChannelSubscription<R>, ExchangeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Register { args, reply })?;
        let (stream, receiver) = rx.await.map_err(|_| ExchangeError::SessionClosed)??;
        Ok(ChannelSubscription {
            stream,
            receiver: receiver.filtered(),
        })
    }

    fn require_stream(&self, expected: StreamType, channel: &str) -> Result<(), ExchangeError> {
        if self.stream_type == expected {
            Ok(())
        } else {
            Err(ExchangeError::InvalidParameters(format!(
                "Channel '{}' needs a {} stream, this session is {}",
                channel, expected, self.stream_type
            )))
        }
    }

    pub async fn price_ticker(
        &self,
        symbol: &Symbol,
    ) -> Result<ChannelSubscription<MarketPrice>, ExchangeError> {
        self.require_stream(StreamType::Market, "tickers")?;
        self.register(vec![SubscriptionArguments::Tickers {
            inst_id: format_inst_id(symbol, self.market),
        }])
        .await
    }

    pub async fn kline_ticker(
        &self,
        symbol: &Symbol,
        interval: KlineInterval,
    ) -> Result<ChannelSubscription<MarketKline>, ExchangeError> {
        self.require_stream(StreamType::Market, "candle")?;
        self.register(vec![SubscriptionArguments::Candles {
            interval,
            inst_id: format_inst_id(symbol, self.market),
        }])
        .await
    }

    pub async fn account_update(
        &self,
        ccy: Option<&str>,
    ) -> Result<ChannelSubscription<WsAccountUpdate>, ExchangeError> {
        self.require_stream(StreamType::User, "account")?;
        self.register(vec![SubscriptionArguments::Account {
            ccy: ccy.map(str::to_string),
        }])
        .await
    }

    pub async fn balance_position_update(
        &self,
    ) -> Result<ChannelSubscription<WsBalancePositionUpdate>, ExchangeError> {
        self.require_stream(StreamType::User, "balance_and_position")?;
        self.register(vec![SubscriptionArguments::BalanceAndPosition])
            .await
    }

    /// Regular and algo order updates on one stream.
    ///
    /// Derivatives are filtered by instrument family, spot and margin by
    /// instrument id.
    pub async fn order_update(
        &self,
        symbol: Option<&Symbol>,
    ) -> Result<ChannelSubscription<Order>, ExchangeError> {
        self.require_stream(StreamType::User, "orders")?;
        let inst_type = format_inst_type(self.market);
        let (inst_family, inst_id) = match self.market {
            MarketType::Futures => (symbol.map(format_inst_family), None),
            MarketType::Spot | MarketType::Margin => {
                (None, symbol.map(|s| format_inst_id(s, self.market)))
            }
        };

        self.register(vec![
            SubscriptionArguments::Orders {
                inst_type,
                inst_family: inst_family.clone(),
                inst_id: inst_id.clone(),
            },
            SubscriptionArguments::OrdersAlgo {
                inst_type,
                inst_family,
                inst_id,
            },
        ])
        .await
    }
}

/// One observer of a channel stream, narrowed to the record type `R`.
///
/// Dropping it detaches the observer; the stream is unsubscribed once no
/// observer is left.
#[derive(Debug)]
pub struct ChannelSubscription<R> {
    stream: ChannelStream<ChannelEvent>,
    receiver: FilteredReceiver<ChannelEvent, R>,
}

impl<R: TryFrom<ChannelEvent>> ChannelSubscription<R> {
    /// The shared stream behind this subscription.
    pub fn stream(&self) -> &ChannelStream<ChannelEvent> {
        &self.stream
    }

    pub async fn recv(&mut self) -> Option<R> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<R> {
        self.receiver.try_recv()
    }
}

impl<R: TryFrom<ChannelEvent>> Stream for ChannelSubscription<R> {
    type Item = R;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<R>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

struct Session {
    config: OkxConfig,
    url: String,
    connector: Arc<dyn WsConnector>,
    codec: OkxCodec,
    signer: Option<OkxSigner>,
    registry: ChannelRegistry,
    state_tx: watch::Sender<ConnectionState>,
    events: broadcast::Sender<SessionEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    socket: Option<WsSocket>,
    connecting: Option<ConnectFuture>,
    ping_timer: Option<Interval>,
    pong_deadline: Option<Pin<Box<Sleep>>>,
    reconnect_at: Option<Pin<Box<Sleep>>>,
    close_deadline: Option<Pin<Box<Sleep>>>,
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => pending().await,
    }
}

async fn expire(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(deadline) => deadline.as_mut().await,
        None => pending().await,
    }
}

async fn dial(connecting: &mut Option<ConnectFuture>) -> Result<WsSocket, ExchangeError> {
    match connecting {
        Some(connecting) => connecting.as_mut().await,
        None => pending().await,
    }
}

async fn next_frame(socket: &mut Option<WsSocket>) -> Option<Result<Message, ExchangeError>> {
    match socket {
        Some(socket) => socket.stream.next().await,
        None => pending().await,
    }
}

impl Session {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("All handles dropped, shutting down");
                        self.shutdown().await;
                        break;
                    }
                },
                result = dial(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_dialed(result).await;
                }
                frame = next_frame(&mut self.socket) => self.on_frame(frame).await,
                _ = tick(&mut self.ping_timer) => self.ping().await,
                _ = expire(&mut self.pong_deadline) => {
                    self.pong_deadline = None;
                    warn!("Pong timeout, reconnecting");
                    self.reconnect().await;
                }
                _ = expire(&mut self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.connect();
                }
                _ = expire(&mut self.close_deadline) => {
                    self.close_deadline = None;
                    debug!("Close not acknowledged in time, dropping socket");
                    self.finish_close();
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Reconnect => self.reconnect().await,
            Command::Close => self.close().await,
            Command::Destroy => {
                debug!(channels = self.registry.len(), "Destroying channel streams");
                self.registry.destroy();
            }
            Command::Register { args, reply } => {
                let result = self.register(args).await;
                let _ = reply.send(result);
            }
            Command::ChannelCount { reply } => {
                let _ = reply.send(self.registry.len());
            }
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        trace!(?state, "State change");
        self.state_tx.send_replace(state);
    }

    fn emit(&self, event: SessionEvent) {
        // No listener is fine
        let _ = self.events.send(event);
    }

    fn connect(&mut self) {
        if self.socket.is_some() || self.connecting.is_some() {
            debug!("Already connected or connecting");
            return;
        }
        self.reconnect_at = None;

        info!(url = %self.url, "Connecting");
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        self.connecting = Some(Box::pin(async move { connector.connect(&url).await }));
    }

    async fn on_dialed(&mut self, result: Result<WsSocket, ExchangeError>) {
        match result {
            Ok(socket) => {
                self.socket = Some(socket);
                self.on_open().await;
            }
            Err(e) => {
                error!(error = %e, "Connection attempt failed");
                self.emit(SessionEvent::Error(e.to_string()));
                if self.state() != ConnectionState::Reconnecting {
                    self.set_state(ConnectionState::Reconnecting);
                    self.emit(SessionEvent::Reconnecting);
                }
                self.schedule_reconnect();
            }
        }
    }

    async fn on_open(&mut self) {
        if self.state() == ConnectionState::Reconnecting {
            info!("Reconnected");
            self.emit(SessionEvent::Reconnected);
        } else {
            info!("Connected");
            self.emit(SessionEvent::Open);
        }

        match self.config.stream_type {
            StreamType::User => self.login().await,
            StreamType::Market => self.on_connected().await,
        }
    }

    async fn login(&mut self) {
        self.set_state(ConnectionState::Login);

        let frame = match &self.signer {
            Some(signer) => self
                .codec
                .encode_login(signer, chrono::Utc::now().timestamp()),
            None => Err(ExchangeError::AuthError(
                "Private stream without credentials".to_string(),
            )),
        };
        match frame {
            Ok(frame) => {
                debug!("Sending login");
                if let Err(e) = self.send_frame(frame).await {
                    error!(error = %e, "Failed to send login");
                }
                // The ack must arrive like a pong would
                self.pong_deadline = Some(Box::pin(sleep(self.config.pong_timeout)));
            }
            Err(e) => {
                error!(error = %e, "Failed to build login frame");
                self.emit(SessionEvent::Error(e.to_string()));
            }
        }
    }

    async fn on_connected(&mut self) {
        self.set_state(ConnectionState::Connected);

        let period = self.config.ping_interval;
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ping_timer = Some(timer);

        let groups = self.registry.respawn();
        if !groups.is_empty() {
            debug!(groups = groups.len(), "Respawning channel subscriptions");
        }
        for group in groups {
            self.subscribe(group).await;
        }
    }

    async fn subscribe(&mut self, group: SubscriptionArguments) {
        let result = match self.codec.encode_subscription(std::slice::from_ref(&group)) {
            Ok(frame) => self.send_frame(frame).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(channel = %group.channel(), error = %e, "Failed to subscribe");
        }
    }

    async fn unsubscribe(&mut self, group: SubscriptionArguments) {
        let result = match self
            .codec
            .encode_unsubscription(std::slice::from_ref(&group))
        {
            Ok(frame) => self.send_frame(frame).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(channel = %group.channel(), error = %e, "Failed to unsubscribe");
        }
    }

    async fn send_frame(&mut self, frame: Message) -> Result<(), ExchangeError> {
        match self.socket.as_mut() {
            Some(socket) => socket.sink.send(frame).await,
            None => Err(ExchangeError::WebSocketError("Socket is not open".to_string())),
        }
    }

    async fn ping(&mut self) {
        trace!("Sending ping");
        // Counted from the oldest unanswered ping
        if self.pong_deadline.is_none() {
            self.pong_deadline = Some(Box::pin(sleep(self.config.pong_timeout)));
        }
        if let Err(e) = self.send_frame(Message::Ping(Vec::new())).await {
            error!(error = %e, "Failed to send ping");
        }
    }

    fn cancel_keepalive(&mut self) {
        self.ping_timer = None;
        self.pong_deadline = None;
    }

    fn schedule_reconnect(&mut self) {
        debug!(period = ?self.config.reconnect_period, "Scheduling reconnect");
        self.reconnect_at = Some(Box::pin(sleep(self.config.reconnect_period)));
    }

    async fn reconnect(&mut self) {
        if self.state() == ConnectionState::Reconnecting {
            return;
        }
        info!("Reconnecting");
        self.set_state(ConnectionState::Reconnecting);
        self.cancel_keepalive();
        self.connecting = None;

        if let Some(mut socket) = self.socket.take() {
            match timeout(RECONNECT_CLOSE_TIMEOUT, socket.sink.send(Message::Close(None))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "Close before reconnect failed"),
                Err(_) => debug!("Close before reconnect timed out"),
            }
        }

        self.emit(SessionEvent::Reconnecting);
        self.schedule_reconnect();
    }

    async fn close(&mut self) {
        info!("Closing");
        self.cancel_keepalive();
        self.reconnect_at = None;
        self.connecting = None;

        if self.socket.is_none() {
            self.finish_close();
            return;
        }
        self.set_state(ConnectionState::Closing);
        if let Err(e) = self.send_frame(Message::Close(None)).await {
            debug!(error = %e, "Failed to send close frame");
        }
        self.close_deadline = Some(Box::pin(sleep(CLOSE_TIMEOUT)));
    }

    fn finish_close(&mut self) {
        self.socket = None;
        self.close_deadline = None;
        self.set_state(ConnectionState::Initial);
        info!("Closed");
        self.emit(SessionEvent::Closed);
    }

    async fn on_socket_closed(&mut self) {
        self.socket = None;
        self.cancel_keepalive();
        if self.state() == ConnectionState::Closing {
            self.finish_close();
        } else {
            warn!("Socket closed unexpectedly");
            self.reconnect().await;
        }
    }

    async fn on_frame(&mut self, frame: Option<Result<Message, ExchangeError>>) {
        let message = match frame {
            None => return self.on_socket_closed().await,
            Some(Err(e)) => {
                // The stream ends after an error; the close path reconnects
                error!(error = %e, "Socket error");
                self.emit(SessionEvent::Error(e.to_string()));
                return;
            }
            Some(Ok(message)) => message,
        };

        match message {
            Message::Ping(payload) => {
                trace!("Received ping, sending pong");
                if let Err(e) = self.send_frame(Message::Pong(payload)).await {
                    error!(error = %e, "Failed to send pong");
                }
            }
            Message::Close(frame) => {
                debug!(?frame, "Received close frame");
                self.on_socket_closed().await;
            }
            message => match self.codec.decode_message(message) {
                Ok(Some(message)) => self.on_message(message).await,
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Failed to decode message"),
            },
        }
    }

    async fn on_message(&mut self, message: OkxMessage) {
        if message.is_login_ack() {
            if self.state() == ConnectionState::Login {
                info!("Logged in");
                self.pong_deadline = None;
                self.emit(SessionEvent::LoggedIn);
                self.on_connected().await;
            }
            return;
        }

        match message {
            OkxMessage::Pong => {
                trace!("Received pong");
                self.pong_deadline = None;
            }
            OkxMessage::Channel { arg, data } => {
                let unsubscribe = self.registry.dispatch(arg, &data);
                if self.state() == ConnectionState::Connected {
                    for group in unsubscribe {
                        self.unsubscribe(group).await;
                    }
                }
            }
            OkxMessage::Event {
                event: event @ (WsEventTag::Login | WsEventTag::Error),
                code,
                msg,
                ..
            } => {
                let code = code.unwrap_or_default();
                let msg = msg.unwrap_or_default();
                error!(?event, code = %code, msg = %msg, "Exchange reported an error");
                self.emit(SessionEvent::Error(format!("{} - {}", code, msg)));
            }
            OkxMessage::Event {
                event: WsEventTag::Notice,
                msg,
                ..
            } => warn!(msg = ?msg, "Exchange notice"),
            OkxMessage::Event { event, arg, .. } => {
                debug!(?event, arg = ?arg.map(|a| a.key()), "Exchange event");
            }
        }
    }

    async fn register(&mut self, args: Vec<SubscriptionArguments>) -> StreamReply {
        let registration = self.registry.register(args)?;
        let receiver = registration.stream.subscribe();

        if registration.created && self.state() == ConnectionState::Connected {
            for group in registration.groups {
                self.subscribe(group).await;
            }
        }
        Ok((registration.stream, receiver))
    }

    async fn shutdown(&mut self) {
        self.cancel_keepalive();
        self.reconnect_at = None;
        self.connecting = None;
        if let Some(mut socket) = self.socket.take() {
            let _ = timeout(RECONNECT_CLOSE_TIMEOUT, socket.sink.send(Message::Close(None))).await;
        }
        self.registry.destroy();
        self.set_state(ConnectionState::Initial);
    }
}
