//! WebSocket Game Server
//!
//! Async WebSocket front end for the ledger. Each connection authenticates
//! once, then every request is applied to the shared ledger under a single
//! lock so transitions stay strictly sequential. Ledger events are fanned out
//! to the players they concern.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{interval, timeout};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{invalid, ConfigError, DEFAULT_LOBBY_WAIT_TIMEOUT, ENV_PREFIX};
use crate::core::hash::Digest;
use crate::core::identity::Address;
use crate::game::error::GameError;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::player::PlayerStatus;
use crate::ledger::GameLedger;
use crate::network::auth::{resolve_address, AuthConfig};
use crate::network::protocol::{
    AnswerRequest, AuthRequest, AuthResult, ClientMessage, ErrorCode, ServerError, ServerMessage,
    StatusInfo,
};
use crate::network::session::{SessionError, SessionId, SessionManager};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Connections silent for this long are dropped.
    pub idle_timeout: Duration,
    /// Waiting players are withdrawn after this long.
    pub lobby_wait_timeout: Duration,
    /// How often the cleanup loop runs.
    pub cleanup_interval: Duration,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            lobby_wait_timeout: DEFAULT_LOBBY_WAIT_TIMEOUT,
            cleanup_interval: Duration::from_secs(10),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Load `PROOFGAME_BIND_ADDR` and `PROOFGAME_MAX_CONNECTIONS` over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let key = format!("{}BIND_ADDR", ENV_PREFIX);
        if let Ok(value) = std::env::var(&key) {
            config.bind_addr = value.parse().map_err(|e| invalid(&key, &value, e))?;
        }

        let key = format!("{}MAX_CONNECTIONS", ENV_PREFIX);
        if let Ok(value) = std::env::var(&key) {
            config.max_connections = value.parse().map_err(|e| invalid(&key, &value, e))?;
        }

        Ok(config)
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Ledger plus the position of the last event fanned out to clients.
#[derive(Debug)]
pub struct SharedLedger {
    ledger: GameLedger,
    delivered: u64,
}

impl SharedLedger {
    /// Wrap a ledger. Events already in its log are not delivered.
    pub fn new(ledger: GameLedger) -> Self {
        let delivered = ledger.engine().events().next_seq();
        Self { ledger, delivered }
    }

    /// The ledger.
    pub fn ledger(&self) -> &GameLedger {
        &self.ledger
    }

    /// Events recorded since the previous call.
    fn take_new_events(&mut self) -> Vec<GameEvent> {
        let events = self.ledger.events_since(self.delivered).to_vec();
        self.delivered += events.len() as u64;
        events
    }
}

/// Players an event is delivered to.
pub fn event_recipients(data: &GameEventData) -> Vec<Address> {
    match data {
        GameEventData::PlayerRegistered { player, .. }
        | GameEventData::PlayerWithdrawn { player, .. }
        | GameEventData::QuestionAnswered { player, .. }
        | GameEventData::QuestionForfeited { player, .. } => vec![*player],
        GameEventData::QuestionAssigned { members, .. } => members.clone(),
        GameEventData::ModuleRevoked { released_players, .. } => released_players.clone(),
        _ => Vec::new(),
    }
}

/// Apply one authenticated request to the ledger.
///
/// Failures come back as `ServerMessage::Error`; the ledger guarantees they
/// changed nothing.
pub fn execute_request(ledger: &mut GameLedger, caller: Address, msg: ClientMessage) -> ServerMessage {
    let result = match msg {
        ClientMessage::Auth(_) => {
            return ServerMessage::Error(ServerError::new(
                ErrorCode::InvalidInput,
                "Already authenticated",
            ));
        }
        ClientMessage::Ping { timestamp } => return pong(timestamp),
        ClientMessage::AddGovernor { governor } => {
            ledger.add_governor(caller, governor).map(|_| ack("add_governor"))
        }
        ClientMessage::RemoveGovernor { governor } => {
            ledger.remove_governor(caller, governor).map(|_| ack("remove_governor"))
        }
        ClientMessage::AddModule { module } => {
            ledger.add_module(caller, module).map(|_| ack("add_module"))
        }
        ClientMessage::RevokeModule { module } => {
            ledger.revoke_module(caller, module).map(|_| ack("revoke_module"))
        }
        ClientMessage::AddQuestion { module, question, tier } => {
            ledger.add_question(caller, module, question, tier).map(|_| ack("add_question"))
        }
        ClientMessage::DeactivateQuestion { module, question } => {
            ledger.deactivate_question(caller, module, question).map(|_| ack("deactivate_question"))
        }
        ClientMessage::Register { tier, module } => {
            ledger.register(caller, caller, tier, module).map(|lobby| ServerMessage::Registered {
                lobby,
                status: ledger.player_status(&caller),
            })
        }
        ClientMessage::Withdraw => {
            ledger.withdraw(caller, caller).map(|lobby| ServerMessage::Withdrawn { lobby })
        }
        ClientMessage::Forfeit => ledger
            .forfeit(caller, caller)
            .map(|(lobby, question)| ServerMessage::Forfeited { lobby, question }),
        ClientMessage::GetLobbyQuestion => ledger
            .get_lobby_question(&caller)
            .map(|question| ServerMessage::LobbyQuestion { question }),
        ClientMessage::AnswerQuestion(req) => answer(ledger, caller, &req),
        ClientMessage::Status => Ok(ServerMessage::Status(StatusInfo {
            address: caller,
            status: ledger.player_status(&caller),
            rounds_completed: ledger
                .engine()
                .player(&caller)
                .map(|p| p.rounds_completed)
                .unwrap_or(0),
        })),
    };

    result.unwrap_or_else(|e| {
        debug!("Request from {} failed: {}", caller.short(), e);
        ServerMessage::Error(ServerError::from(&e))
    })
}

fn answer(
    ledger: &mut GameLedger,
    caller: Address,
    req: &AnswerRequest,
) -> Result<ServerMessage, GameError> {
    let accepted = ledger.answer_question(caller, req.module, &req.proof(), req.question)?;
    Ok(ServerMessage::AnswerResult { question: req.question, accepted })
}

fn ack(request: &str) -> ServerMessage {
    ServerMessage::Ack { request: request.to_string() }
}

fn pong(timestamp: u64) -> ServerMessage {
    ServerMessage::Pong { timestamp, server_time: now_millis() }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Clients share a major version with the server.
fn is_compatible(client_version: &str, server_version: &str) -> bool {
    client_version.split('.').next() == server_version.split('.').next()
}

/// State shared by the accept loop, connection tasks and the cleanup loop.
struct ServerContext {
    config: ServerConfig,
    auth: AuthConfig,
    ledger: Mutex<SharedLedger>,
    sessions: SessionManager,
}

impl ServerContext {
    /// Apply a request and deliver the events it produced.
    async fn handle_request(&self, caller: Address, msg: ClientMessage) -> ServerMessage {
        let (reply, events) = {
            let mut shared = self.ledger.lock().await;
            let reply = execute_request(&mut shared.ledger, caller, msg);
            (reply, shared.take_new_events())
        };
        self.dispatch_events(&events).await;
        reply
    }

    /// Update wait clocks and forward events to connected players.
    async fn dispatch_events(&self, events: &[GameEvent]) {
        let now = Instant::now();
        for event in events {
            match &event.data {
                GameEventData::PlayerRegistered { player, .. } => {
                    self.sessions.mark_waiting(*player, now).await;
                }
                GameEventData::PlayerWithdrawn { player, .. } => {
                    self.sessions.clear_waiting(player).await;
                }
                GameEventData::QuestionAssigned { members, .. } => {
                    for member in members {
                        self.sessions.clear_waiting(member).await;
                    }
                }
                GameEventData::ModuleRevoked { released_players, .. } => {
                    for player in released_players {
                        self.sessions.clear_waiting(player).await;
                    }
                }
                _ => {}
            }

            for recipient in event_recipients(&event.data) {
                if let Some(sender) = self.sessions.sender_for(&recipient).await {
                    let _ = sender.send(ServerMessage::Event(event.clone())).await;
                }
            }
        }
    }

    /// Withdraw players whose lobby did not fill in time.
    async fn evict_expired(&self, now: Instant) -> Vec<Address> {
        let expired = self
            .sessions
            .expired_waiting(now, self.config.lobby_wait_timeout)
            .await;
        let mut evicted = Vec::new();

        for player in expired {
            let (result, events) = {
                let mut shared = self.ledger.lock().await;
                let result = match shared.ledger.player_status(&player) {
                    PlayerStatus::Waiting { .. } => Some(shared.ledger.evict_waiting(player)),
                    _ => None,
                };
                (result, shared.take_new_events())
            };
            self.sessions.clear_waiting(&player).await;

            match result {
                Some(Ok(lobby)) => {
                    info!("Player {} timed out of {}", player.short(), lobby);
                    if let Some(sender) = self.sessions.sender_for(&player).await {
                        let _ = sender.send(ServerMessage::Withdrawn { lobby }).await;
                    }
                    evicted.push(player);
                }
                Some(Err(e)) => warn!("Failed to evict {}: {}", player.short(), e),
                None => {}
            }
            self.dispatch_events(&events).await;
        }

        evicted
    }

    /// Authenticate a connection.
    async fn handle_auth(&self, session_id: &SessionId, auth: AuthRequest) -> AuthResult {
        let failed = |code: ErrorCode, error: String| AuthResult {
            success: false,
            session_id: None,
            address: None,
            error: Some(error),
            error_code: Some(code),
            server_version: self.config.version.clone(),
        };

        if !is_compatible(&auth.client_version, &self.config.version) {
            return failed(ErrorCode::VersionMismatch, format!(
                "Client version {} is not compatible with {}",
                auth.client_version, self.config.version
            ));
        }

        if !self.auth.is_configured() {
            warn!("Auth not configured, trusting claimed address");
        }
        let address = match resolve_address(&auth.token, auth.address, &self.auth) {
            Ok(address) => address,
            Err(e) => return failed(ErrorCode::AuthFailed, e.to_string()),
        };

        if let Err(e) = self.sessions.authenticate(session_id, address).await {
            return failed(ErrorCode::AuthFailed, e.to_string());
        }

        debug!("Session {} authenticated as {}", hex::encode(&session_id[..4]), address.short());
        AuthResult {
            success: true,
            session_id: Some(hex::encode(&session_id[..8])),
            address: Some(address),
            error: None,
            error_code: None,
            server_version: self.config.version.clone(),
        }
    }

    /// Route one client message.
    async fn handle_client_message(
        &self,
        session_id: &SessionId,
        msg: ClientMessage,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let reply = match msg {
            ClientMessage::Auth(auth) => ServerMessage::AuthResult(self.handle_auth(session_id, auth).await),
            ClientMessage::Ping { timestamp } => pong(timestamp),
            other => match self.sessions.address_of(session_id).await {
                Some(caller) => self.handle_request(caller, other).await,
                None => ServerMessage::Error(ServerError::new(
                    ErrorCode::NotAuthenticated,
                    "Must authenticate first",
                )),
            },
        };
        let _ = sender.send(reply).await;
    }
}

/// The game server.
pub struct GameServer {
    ctx: Arc<ServerContext>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server around a ledger.
    pub fn new(config: ServerConfig, auth: AuthConfig, ledger: GameLedger) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let sessions = SessionManager::new(config.max_connections);

        Self {
            ctx: Arc::new(ServerContext {
                config,
                auth,
                ledger: Mutex::new(SharedLedger::new(ledger)),
                sessions,
            }),
            shutdown_tx,
        }
    }

    /// Run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.ctx.config.bind_addr).await?;
        info!("Game server listening on {}", self.ctx.config.bind_addr);

        for module in self.ctx.ledger.lock().await.ledger().unsound_modules() {
            warn!("Module {} runs a development verifier, anyone can mint accepted proofs", module);
        }

        let cleanup_ctx = self.ctx.clone();
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_ctx).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.ctx.sessions.session_count().await >= self.ctx.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let ctx = self.ctx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            let session_id = match ctx.sessions.open(msg_tx.clone()).await {
                Ok(id) => id,
                Err(e) => {
                    warn!("Rejecting {}: {}", addr, e);
                    let _ = ws_sender.send(Message::Close(None)).await;
                    return;
                }
            };

            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            loop {
                tokio::select! {
                    msg = timeout(ctx.config.idle_timeout, ws_receiver.next()) => {
                        let msg = match msg {
                            Ok(msg) => msg,
                            Err(_) => {
                                info!("Client {} idle, disconnecting", addr);
                                break;
                            }
                        };
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        ctx.handle_client_message(&session_id, client_msg, &msg_tx).await;
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                                            ErrorCode::InvalidInput,
                                            "Invalid message format",
                                        ))).await;
                                    }
                                }
                            }
                            Some(Ok(Message::Binary(data))) => {
                                // Binary frames carry a bincode AnswerRequest
                                match AnswerRequest::from_bytes(&data) {
                                    Ok(req) => {
                                        ctx.handle_client_message(
                                            &session_id,
                                            ClientMessage::AnswerQuestion(req),
                                            &msg_tx,
                                        ).await;
                                    }
                                    Err(e) => debug!("Invalid binary frame from {}: {}", addr, e),
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            sender_task.abort();
            if let Some(address) = ctx.sessions.close(&session_id).await {
                debug!("Released address {}", address.short());
            }
            info!("Client {} cleaned up", addr);
        });
    }

    /// Periodically withdraw players stuck in unfilled lobbies.
    async fn run_cleanup_loop(ctx: Arc<ServerContext>) {
        let mut interval = interval(ctx.config.cleanup_interval);

        loop {
            interval.tick().await;
            let evicted = ctx.evict_expired(Instant::now()).await;
            if !evicted.is_empty() {
                info!("Evicted {} waiting players", evicted.len());
            }
        }
    }

    /// Apply a request as `caller`, exactly as a connected client would.
    pub async fn handle_request(&self, caller: Address, msg: ClientMessage) -> ServerMessage {
        self.ctx.handle_request(caller, msg).await
    }

    /// Run one eviction pass as of `now`.
    pub async fn evict_expired(&self, now: Instant) -> Vec<Address> {
        self.ctx.evict_expired(now).await
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.ctx.sessions.session_count().await
    }

    /// Players with a running wait clock.
    pub async fn waiting_count(&self) -> usize {
        self.ctx.sessions.waiting_count().await
    }

    /// Player state in the shared ledger.
    pub async fn player_status(&self, player: &Address) -> PlayerStatus {
        self.ctx.ledger.lock().await.ledger().player_status(player)
    }

    /// Digest of the shared ledger.
    pub async fn state_digest(&self) -> Digest {
        self.ctx.ledger.lock().await.ledger().state_digest()
    }
}
