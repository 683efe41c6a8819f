//! Client Session Management
//!
//! Tracks connected clients, the address each one authenticated as, and how
//! long registered players have been waiting for their lobby to fill.
//! Nothing here touches game state; the ledger remains the only authority.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};

use crate::core::identity::Address;
use crate::network::protocol::ServerMessage;

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// A connected client.
#[derive(Debug, Clone)]
pub struct ClientSession {
    /// Session ID.
    pub id: SessionId,
    /// Address bound at authentication.
    pub address: Option<Address>,
    /// Connection time.
    pub connected_at: Instant,
    sender: mpsc::Sender<ServerMessage>,
}

impl ClientSession {
    fn new(id: SessionId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            address: None,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Has the client authenticated?
    pub fn is_authenticated(&self) -> bool {
        self.address.is_some()
    }

    /// Outbound channel to the client's socket task.
    pub fn sender(&self) -> &mpsc::Sender<ServerMessage> {
        &self.sender
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Connection limit reached.
    #[error("Server is full")]
    ServerFull,
    /// Session not found.
    #[error("Unknown session")]
    UnknownSession,
    /// Another connection already acts as this address.
    #[error("Address {0} is already connected")]
    AddressInUse(Address),
}

/// Manages client sessions.
pub struct SessionManager {
    /// Connected clients.
    sessions: RwLock<BTreeMap<SessionId, ClientSession>>,
    /// Address to session mapping.
    addresses: RwLock<BTreeMap<Address, SessionId>>,
    /// Players waiting in an unfilled lobby, with the time they started.
    waiting: RwLock<BTreeMap<Address, Instant>>,
    /// Connection limit.
    max_sessions: usize,
}

impl SessionManager {
    /// Create new session manager.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            addresses: RwLock::new(BTreeMap::new()),
            waiting: RwLock::new(BTreeMap::new()),
            max_sessions,
        }
    }

    /// Open a session for a new connection.
    pub async fn open(&self, sender: mpsc::Sender<ServerMessage>) -> Result<SessionId, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return Err(SessionError::ServerFull);
        }
        let id = uuid::Uuid::new_v4().into_bytes();
        sessions.insert(id, ClientSession::new(id, sender));
        Ok(id)
    }

    /// Bind a session to an address.
    ///
    /// Re-authenticating as the same address is a no-op; switching address
    /// releases the old binding.
    pub async fn authenticate(&self, id: &SessionId, address: Address) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let mut addresses = self.addresses.write().await;

        let session = sessions.get_mut(id).ok_or(SessionError::UnknownSession)?;
        match addresses.get(&address) {
            Some(owner) if owner != id => return Err(SessionError::AddressInUse(address)),
            _ => {}
        }

        if let Some(previous) = session.address.replace(address) {
            if previous != address {
                addresses.remove(&previous);
            }
        }
        addresses.insert(address, *id);
        Ok(())
    }

    /// Get a copy of a session.
    pub async fn get(&self, id: &SessionId) -> Option<ClientSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Address a session acts as.
    pub async fn address_of(&self, id: &SessionId) -> Option<Address> {
        self.sessions.read().await.get(id).and_then(|s| s.address)
    }

    /// Outbound channel for an address, if it is connected.
    pub async fn sender_for(&self, address: &Address) -> Option<mpsc::Sender<ServerMessage>> {
        let sessions = self.sessions.read().await;
        let addresses = self.addresses.read().await;
        addresses
            .get(address)
            .and_then(|id| sessions.get(id))
            .map(|s| s.sender.clone())
    }

    /// Close a session, returning the address it was bound to.
    pub async fn close(&self, id: &SessionId) -> Option<Address> {
        let mut sessions = self.sessions.write().await;
        let mut addresses = self.addresses.write().await;

        let address = sessions.remove(id)?.address?;
        if addresses.get(&address) == Some(id) {
            addresses.remove(&address);
        }
        Some(address)
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    // =========================================================================
    // WAITING TRACKER
    // =========================================================================

    /// Start the wait clock for a player. An existing clock keeps running.
    pub async fn mark_waiting(&self, player: Address, since: Instant) {
        self.waiting.write().await.entry(player).or_insert(since);
    }

    /// Stop the wait clock for a player.
    pub async fn clear_waiting(&self, player: &Address) {
        self.waiting.write().await.remove(player);
    }

    /// Players whose clock has exceeded `timeout`, in address order.
    pub async fn expired_waiting(&self, now: Instant, timeout: Duration) -> Vec<Address> {
        self.waiting
            .read()
            .await
            .iter()
            .filter(|(_, since)| now.saturating_duration_since(**since) >= timeout)
            .map(|(player, _)| *player)
            .collect()
    }

    /// Number of players with a running clock.
    pub async fn waiting_count(&self) -> usize {
        self.waiting.read().await.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(1000)
    }
}
