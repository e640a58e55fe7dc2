//! Collaboration management for real-time multi-user editing.
//!
//! Bridges a [`Board`] backed by a [`LoroStore`] and the relay protocol in
//! [`crate::sync`]. The manager never touches a socket: outgoing messages
//! are queued as JSON strings and drained with
//! [`CollaborationManager::take_outgoing`], incoming ones are passed to
//! [`CollaborationManager::handle_message`].

use crate::crdt::{LoroStore, VersionVector};
use crate::document::Board;
use crate::presence::ConnectionId;
use crate::store::StoreResult;
use crate::sync::{ClientMessage, ConnectionState, ServerMessage, SyncEvent, base64_decode, base64_encode};
use log::{debug, info, warn};

/// Manages room membership and document/presence sync for one board.
pub struct CollaborationManager {
    state: ConnectionState,
    /// Room we are in, kept across disconnects so we can rejoin.
    current_room: Option<String>,
    /// Our id as assigned by the relay.
    connection_id: Option<ConnectionId>,
    /// Document version last sent to (or received from) the room.
    last_synced: VersionVector,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
}

impl CollaborationManager {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            current_room: None,
            connection_id: None,
            last_synced: VersionVector::default(),
            outgoing: Vec::new(),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    pub fn current_room(&self) -> Option<&str> {
        self.current_room.as_deref()
    }

    pub fn is_in_room(&self) -> bool {
        self.current_room.is_some() && self.state == ConnectionState::Connected
    }

    fn queue(&mut self, msg: &ClientMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.outgoing.push(json),
            Err(e) => warn!("Failed to encode outgoing message: {}", e),
        }
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    // --- Room/Connection Management ---

    /// The socket is opening.
    pub fn on_connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// The socket is open. Rejoins the previous room, if any; full state
    /// and presence are re-sent once the relay confirms.
    pub fn on_connected(&mut self) {
        self.state = ConnectionState::Connected;
        if let Some(room) = self.current_room.clone() {
            info!("Reconnected, rejoining room {}", room);
            self.queue(&ClientMessage::Join { room });
        }
    }

    /// The socket closed. Remote presence is stale and is dropped.
    pub fn on_disconnected(&mut self, board: &mut Board<LoroStore>) {
        self.state = ConnectionState::Disconnected;
        self.connection_id = None;
        board.presence_mut().clear_others();
        board.invalidate();
    }

    pub fn on_error(&mut self, message: &str) {
        warn!("Connection error: {}", message);
        self.state = ConnectionState::Error;
    }

    /// Request to join a room. Queues the join message.
    pub fn join_room(&mut self, room: &str) {
        self.current_room = Some(room.to_string());
        self.queue(&ClientMessage::Join { room: room.to_string() });
    }

    /// Leave the current room and forget everyone else's presence.
    pub fn leave_room(&mut self, board: &mut Board<LoroStore>) {
        if let Some(room) = self.current_room.take() {
            info!("Leaving room {}", room);
            self.queue(&ClientMessage::Leave);
            board.presence_mut().clear_others();
            board.invalidate();
        }
    }

    // --- Outgoing sync ---

    /// Queue document updates committed since the last sync, and own
    /// presence if it changed. Call after handling local input.
    pub fn flush(&mut self, board: &mut Board<LoroStore>) -> StoreResult<()> {
        if !self.is_in_room() {
            return Ok(());
        }
        self.flush_updates(board)?;
        if board.presence_mut().take_dirty() {
            self.broadcast_presence(board);
        }
        Ok(())
    }

    fn flush_updates(&mut self, board: &Board<LoroStore>) -> StoreResult<()> {
        let version = board.store().version();
        if version == self.last_synced {
            return Ok(());
        }
        let updates = board.store().export_updates(&self.last_synced)?;
        debug!("Sync: sending {} bytes of updates", updates.len());
        self.queue(&ClientMessage::Sync {
            data: base64_encode(&updates),
        });
        self.last_synced = version;
        Ok(())
    }

    /// Queue the full document state.
    pub fn broadcast_sync(&mut self, board: &Board<LoroStore>) -> StoreResult<()> {
        let snapshot = board.store().export_snapshot()?;
        self.queue(&ClientMessage::Sync {
            data: base64_encode(&snapshot),
        });
        self.last_synced = board.store().version();
        Ok(())
    }

    pub fn broadcast_presence(&mut self, board: &Board<LoroStore>) {
        let presence = board.presence().me().clone();
        self.queue(&ClientMessage::Presence { presence });
    }

    // --- Incoming Message Handling ---

    /// Handle an incoming relay message.
    /// Returns a SyncEvent describing what happened.
    pub fn handle_message(&mut self, board: &mut Board<LoroStore>, json: &str) -> Option<SyncEvent> {
        let msg: ServerMessage = match serde_json::from_str(json) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Ignoring malformed relay message: {}", e);
                return None;
            }
        };

        match msg {
            ServerMessage::Joined {
                room,
                connection_id,
                peer_count,
                initial_sync,
            } => {
                info!("Joined room {} as {} with {} peers", room, connection_id, peer_count);
                self.state = ConnectionState::Connected;
                self.current_room = Some(room.clone());
                self.connection_id = Some(connection_id);

                if let Some(data) = initial_sync {
                    self.import(board, &data);
                }
                // The room may have missed anything edited while we were away.
                if let Err(e) = self.broadcast_sync(board) {
                    warn!("Failed to export snapshot: {}", e);
                }
                self.broadcast_presence(board);
                Some(SyncEvent::JoinedRoom {
                    room,
                    connection_id,
                    peer_count,
                })
            }
            ServerMessage::PeerJoined { connection_id } => {
                info!("Peer {} joined", connection_id);
                self.broadcast_presence(board);
                Some(SyncEvent::PeerJoined { connection_id })
            }
            ServerMessage::PeerLeft { connection_id } => {
                info!("Peer {} left", connection_id);
                board.presence_mut().remove(connection_id);
                board.invalidate();
                Some(SyncEvent::PeerLeft { connection_id })
            }
            ServerMessage::Sync { from, data } => {
                if let Err(e) = self.flush_updates(board) {
                    warn!("Failed to export local updates: {}", e);
                }
                let bytes = self.import(board, &data)?;
                Some(SyncEvent::SyncReceived { from, bytes })
            }
            ServerMessage::Presence {
                connection_id,
                presence,
            } => {
                if self.connection_id == Some(connection_id) {
                    return None;
                }
                board.presence_mut().apply_remote(connection_id, presence);
                board.invalidate();
                Some(SyncEvent::PresenceReceived { connection_id })
            }
            ServerMessage::Error { message } => {
                warn!("Relay error: {}", message);
                Some(SyncEvent::Error { message })
            }
        }
    }

    /// Merge base64 update bytes into the board. Returns the decoded size.
    fn import(&mut self, board: &mut Board<LoroStore>, data: &str) -> Option<usize> {
        let Some(bytes) = base64_decode(data) else {
            warn!("Ignoring undecodable sync payload");
            return None;
        };
        if let Err(e) = board.store_mut().import(&bytes) {
            warn!("Failed to import remote updates: {}", e);
            return None;
        }
        self.last_synced = board.store().version();
        board.invalidate();

        // Repairs are local commits past `last_synced`, so the next flush sends them.
        match board.reconcile() {
            Ok(0) => {}
            Ok(removed) => warn!("Repaired merged document, removed {} entries", removed),
            Err(e) => warn!("Failed to repair merged document: {}", e),
        }
        debug!("Sync: imported {} bytes", bytes.len());
        Some(bytes.len())
    }
}

impl Default for CollaborationManager {
    fn default() -> Self {
        Self::new()
    }
}
