use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::error::{Result, SyncError};

pub type RoomId = String;
pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mentor,
    Student,
}

/// A live collaboration room: one shared code value, its solved state, and
/// the participants observing it.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub code: String,
    solution: Option<String>,
    pub solved: bool,
    pub mentor: Option<SessionId>,
    pub members: Vec<SessionId>,
}

impl Room {
    fn new(id: RoomId, initial_code: String, solution: Option<String>) -> Self {
        let mut room = Self {
            id,
            code: initial_code,
            solution,
            solved: false,
            mentor: None,
            members: Vec::new(),
        };
        room.recompute_solved();
        room
    }

    /// The solved flag is a pure function of the current code; never
    /// settable from outside.
    fn recompute_solved(&mut self) {
        self.solved = match &self.solution {
            Some(solution) => self.code.trim() == solution.trim(),
            None => false,
        };
    }

    pub fn student_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| self.mentor.as_deref() != Some(m.as_str()))
            .count()
    }

    fn role_of(&self, session_id: &str) -> Option<Role> {
        if !self.members.iter().any(|m| m == session_id) {
            return None;
        }
        if self.mentor.as_deref() == Some(session_id) {
            Some(Role::Mentor)
        } else {
            Some(Role::Student)
        }
    }
}

/// Result of a successful join
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub role: Role,
    pub student_count: usize,
}

/// Result of removing a participant from its room
#[derive(Debug, Clone)]
pub struct Departure {
    pub room_id: RoomId,
    pub role: Role,
    /// Members still in the room after the removal (empty when the room
    /// dissolved with no one left to notify)
    pub remaining: Vec<SessionId>,
    pub student_count: usize,
    pub room_dissolved: bool,
}

/// Source of truth for all rooms. The outer map lock covers lookup and
/// insertion only; every mutation of a room's state goes through that
/// room's own Mutex, so edits to one room serialize while distinct rooms
/// proceed in parallel.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<Room>>>>,
    /// session -> room reverse index, for disconnect cleanup
    memberships: RwLock<HashMap<SessionId, RoomId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            memberships: RwLock::new(HashMap::new()),
        }
    }

    /// Idempotent: repeated calls for the same identifier return the same
    /// room and never reset its code once established.
    pub async fn create_or_get_room(
        &self,
        room_id: &str,
        initial_code: &str,
        solution: Option<&str>,
    ) -> Arc<Mutex<Room>> {
        {
            let rooms = self.rooms.read().await;
            if let Some(room) = rooms.get(room_id) {
                return room.clone();
            }
        }

        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                tracing::info!(room_id = %room_id, "Creating room");
                Arc::new(Mutex::new(Room::new(
                    room_id.to_string(),
                    initial_code.to_string(),
                    solution.map(String::from),
                )))
            })
            .clone()
    }

    pub async fn get_room(&self, room_id: &str) -> Option<Arc<Mutex<Room>>> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).cloned()
    }

    pub async fn room_exists(&self, room_id: &str) -> bool {
        let rooms = self.rooms.read().await;
        rooms.contains_key(room_id)
    }

    /// Add a participant to a room. The first joiner becomes the mentor,
    /// everyone after a student; roles are assigned once and never
    /// re-evaluated. Joining a room one is already in is a no-op that
    /// reports the existing role.
    pub async fn join(&self, room_id: &str, session_id: &str) -> Result<JoinOutcome> {
        let room = self
            .get_room(room_id)
            .await
            .ok_or_else(|| SyncError::RoomNotFound(room_id.to_string()))?;

        let outcome = {
            let mut room = room.lock().await;

            if let Some(role) = room.role_of(session_id) {
                tracing::debug!(
                    session_id = %session_id,
                    room_id = %room_id,
                    "Duplicate join ignored"
                );
                return Ok(JoinOutcome {
                    role,
                    student_count: room.student_count(),
                });
            }

            let role = if room.mentor.is_none() {
                room.mentor = Some(session_id.to_string());
                Role::Mentor
            } else {
                Role::Student
            };
            room.members.push(session_id.to_string());

            tracing::info!(
                session_id = %session_id,
                room_id = %room_id,
                role = ?role,
                "Participant joined room"
            );

            JoinOutcome {
                role,
                student_count: room.student_count(),
            }
        };

        let mut memberships = self.memberships.write().await;
        memberships.insert(session_id.to_string(), room_id.to_string());

        Ok(outcome)
    }

    /// Overwrite the room's code (last-write-wins, no merge) and recompute
    /// the solved flag. Returns the new solved state.
    pub async fn set_code(&self, room_id: &str, code: String) -> Result<bool> {
        let room = self
            .get_room(room_id)
            .await
            .ok_or_else(|| SyncError::RoomNotFound(room_id.to_string()))?;

        let mut room = room.lock().await;
        room.code = code;
        room.recompute_solved();
        tracing::debug!(room_id = %room.id, solved = room.solved, "Room code overwritten");
        Ok(room.solved)
    }

    pub async fn is_member(&self, room_id: &str, session_id: &str) -> bool {
        match self.get_room(room_id).await {
            Some(room) => room.lock().await.role_of(session_id).is_some(),
            None => false,
        }
    }

    /// Current code and solved state, for bringing a fresh joiner up to date
    pub async fn snapshot(&self, room_id: &str) -> Option<(String, bool)> {
        let room = self.get_room(room_id).await?;
        let room = room.lock().await;
        Some((room.code.clone(), room.solved))
    }

    pub async fn members(&self, room_id: &str) -> Vec<SessionId> {
        match self.get_room(room_id).await {
            Some(room) => room.lock().await.members.clone(),
            None => Vec::new(),
        }
    }

    /// Remove a participant from its room. A mentor departure dissolves
    /// the room entirely (remaining students are reported for
    /// notification); a student departure just shrinks the member set.
    /// Returns None if the session was in no room.
    pub async fn remove_participant(&self, session_id: &str) -> Option<Departure> {
        let room_id = {
            let mut memberships = self.memberships.write().await;
            memberships.remove(session_id)?
        };

        let room = {
            let rooms = self.rooms.read().await;
            rooms.get(&room_id).cloned()
        }?;

        let (role, remaining, student_count, room_dissolved) = {
            let mut room = room.lock().await;
            let role = room.role_of(session_id)?;
            room.members.retain(|m| m != session_id);
            let remaining = room.members.clone();

            match role {
                Role::Mentor => {
                    room.mentor = None;
                    (role, remaining, 0, true)
                }
                Role::Student => {
                    let student_count = room.student_count();
                    (role, remaining, student_count, room.members.is_empty())
                }
            }
        };

        if room_dissolved {
            tracing::info!(
                room_id = %room_id,
                session_id = %session_id,
                role = ?role,
                "Room dissolved"
            );
            let mut rooms = self.rooms.write().await;
            rooms.remove(&room_id);
            drop(rooms);

            let mut memberships = self.memberships.write().await;
            for member in &remaining {
                memberships.remove(member);
            }
        } else {
            tracing::info!(
                session_id = %session_id,
                room_id = %room_id,
                "Student left room"
            );
        }

        Some(Departure {
            room_id,
            role,
            remaining,
            student_count,
            room_dissolved,
        })
    }
}
