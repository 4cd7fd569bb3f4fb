use std::collections::HashMap;
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::{mpsc, RwLock};

use crate::catalog::CodeBlockStore;
use crate::error::SyncError;

use super::protocol::{ClientEvent, ServerEvent, SNAPSHOT_SENDER};
use super::room::{Departure, Role, RoomRegistry, SessionId};

/// Coordination service for all rooms. Owns the registry and a table of
/// per-session outboxes; the transport layer drains the outboxes and
/// serializes events onto the wire.
pub struct RoomServer {
    registry: RoomRegistry,
    store: Arc<CodeBlockStore>,
    sessions: RwLock<HashMap<SessionId, mpsc::UnboundedSender<ServerEvent>>>,
}

impl RoomServer {
    pub fn new(store: Arc<CodeBlockStore>) -> Self {
        Self {
            registry: RoomRegistry::new(),
            store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Generate a transport connection identifier. Unique per connection,
    /// unstable across reconnects.
    fn generate_session_id() -> SessionId {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect()
    }

    /// Register a new connection and hand its outbox receiver to the
    /// transport.
    pub async fn register_session(&self) -> (SessionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let session_id = Self::generate_session_id();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.clone(), tx);
        tracing::info!(session_id = %session_id, "Session registered");

        (session_id, rx)
    }

    /// Dispatch one decoded client event
    pub async fn handle_event(&self, session_id: &str, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom { room } => self.handle_join(session_id, &room).await,
            ClientEvent::CodeChange { room, code, sender } => {
                self.handle_code_change(session_id, &room, code, &sender).await
            }
            ClientEvent::LeaveRoom => self.handle_leave(session_id).await,
        }
    }

    /// Join a session into a room. Rooms are backed by catalog
    /// definitions; an unknown identifier is rejected with a
    /// `room_not_found` signal to the joiner only and no membership side
    /// effects.
    pub async fn handle_join(&self, session_id: &str, room_id: &str) {
        let Some(block) = self.store.get(room_id) else {
            tracing::warn!(
                session_id = %session_id,
                room_id = %room_id,
                "Join rejected, no code block definition"
            );
            self.send_to(
                session_id,
                ServerEvent::RoomNotFound {
                    message: SyncError::RoomNotFound(room_id.to_string()).to_string(),
                },
            )
            .await;
            return;
        };

        self.registry
            .create_or_get_room(room_id, &block.code, block.solution.as_deref())
            .await;

        match self.registry.join(room_id, session_id).await {
            Ok(outcome) => {
                self.send_to(
                    session_id,
                    ServerEvent::RoleAssigned {
                        is_mentor: outcome.role == Role::Mentor,
                    },
                )
                .await;

                // Bring the joiner up to date with the room's current
                // state. The snapshot sender never matches a session id,
                // so the client applies it like any remote edit.
                if let Some((code, solved)) = self.registry.snapshot(room_id).await {
                    self.send_to(
                        session_id,
                        ServerEvent::CodeUpdate {
                            code,
                            is_solved: solved,
                            sender: SNAPSHOT_SENDER.to_string(),
                        },
                    )
                    .await;
                }

                let members = self.registry.members(room_id).await;
                self.broadcast(
                    &members,
                    ServerEvent::RoomUpdate {
                        student_count: outcome.student_count,
                    },
                )
                .await;
            }
            Err(e) => {
                // lost a race with room teardown
                tracing::warn!(
                    session_id = %session_id,
                    room_id = %room_id,
                    error = %e,
                    "Join failed"
                );
                self.send_to(
                    session_id,
                    ServerEvent::Error {
                        message: e.to_string(),
                    },
                )
                .await;
            }
        }
    }

    /// Apply a code edit and fan the new state out to every member of the
    /// room, the sender included; receivers suppress their own echo by
    /// comparing the payload's sender against their identity. Role is not
    /// checked here: mentor-only writes are a presentation-layer
    /// convention.
    pub async fn handle_code_change(
        &self,
        session_id: &str,
        room_id: &str,
        code: String,
        sender: &str,
    ) {
        if sender != session_id {
            self.send_to(
                session_id,
                ServerEvent::Error {
                    message: "sender does not match session identity".to_string(),
                },
            )
            .await;
            return;
        }

        if !self.registry.is_member(room_id, session_id).await {
            tracing::warn!(
                session_id = %session_id,
                room_id = %room_id,
                "Rejected code change from non-member"
            );
            self.send_to(
                session_id,
                ServerEvent::Error {
                    message: SyncError::NotAMember(
                        session_id.to_string(),
                        room_id.to_string(),
                    )
                    .to_string(),
                },
            )
            .await;
            return;
        }

        match self.registry.set_code(room_id, code.clone()).await {
            Ok(is_solved) => {
                let members = self.registry.members(room_id).await;
                self.broadcast(
                    &members,
                    ServerEvent::CodeUpdate {
                        code,
                        is_solved,
                        sender: sender.to_string(),
                    },
                )
                .await;
            }
            Err(e) => {
                // room torn down between the membership check and the write
                self.send_to(
                    session_id,
                    ServerEvent::Error {
                        message: e.to_string(),
                    },
                )
                .await;
            }
        }
    }

    /// Remove a session from its room, notifying the others. A mentor
    /// departure dissolves the room and redirects everyone out; a student
    /// departure shrinks the count.
    pub async fn handle_leave(&self, session_id: &str) {
        if let Some(departure) = self.registry.remove_participant(session_id).await {
            self.fan_out_departure(&departure).await;
        }
    }

    /// Transport disconnect: same cleanup as an explicit leave, then the
    /// outbox goes away. Not a user-visible error.
    pub async fn handle_disconnect(&self, session_id: &str) {
        self.handle_leave(session_id).await;

        let mut sessions = self.sessions.write().await;
        if sessions.remove(session_id).is_some() {
            tracing::info!(session_id = %session_id, "Session disconnected");
        }
    }

    async fn fan_out_departure(&self, departure: &Departure) {
        match departure.role {
            Role::Mentor => {
                tracing::info!(
                    room_id = %departure.room_id,
                    remaining = departure.remaining.len(),
                    "Mentor left, room dissolved"
                );
                self.broadcast(&departure.remaining, ServerEvent::MentorLeft)
                    .await;
            }
            Role::Student => {
                self.broadcast(
                    &departure.remaining,
                    ServerEvent::RoomUpdate {
                        student_count: departure.student_count,
                    },
                )
                .await;
            }
        }
    }

    /// Queue an event for one session. Errors are reported to the
    /// originating client only, never broadcast.
    pub async fn send_to(&self, session_id: &str, event: ServerEvent) {
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(outbox) => {
                if outbox.send(event).is_err() {
                    tracing::debug!(session_id = %session_id, "Outbox closed, dropping event");
                }
            }
            None => {
                tracing::debug!(session_id = %session_id, "No such session, dropping event");
            }
        }
    }

    async fn broadcast(&self, members: &[SessionId], event: ServerEvent) {
        for member in members {
            self.send_to(member, event.clone()).await;
        }
    }
}
