use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::Instant;
use warp::http::StatusCode;
use warp::Filter;

use crate::error::SyncError;
use crate::sync::{decode_client_event, RoomServer, ServerEvent};

/// Fallback transport substrate for clients behind intermediaries that
/// break persistent streams. Same event surface as the WebSocket route,
/// carried over plain HTTP requests: a handshake mints the session, GET
/// long-polls the outbox, POST submits one client event.
pub struct PollGateway {
    server: Arc<RoomServer>,
    sessions: RwLock<HashMap<String, Arc<PollSession>>>,
    poll_wait: Duration,
    liveness_timeout: Duration,
}

struct PollSession {
    outbox: Mutex<mpsc::UnboundedReceiver<ServerEvent>>,
    last_seen: Mutex<Instant>,
}

pub enum SubmitOutcome {
    Accepted,
    Rejected(String),
    UnknownSession,
}

impl PollGateway {
    pub fn new(server: Arc<RoomServer>, poll_wait: Duration, liveness_timeout: Duration) -> Self {
        Self {
            server,
            sessions: RwLock::new(HashMap::new()),
            poll_wait,
            liveness_timeout,
        }
    }

    /// Handshake: register a session and return its identity. The
    /// response body plays the role the `connected` event plays on the
    /// streaming substrate.
    pub async fn connect(&self) -> String {
        let (session_id, outbox) = self.server.register_session().await;
        let session = Arc::new(PollSession {
            outbox: Mutex::new(outbox),
            last_seen: Mutex::new(Instant::now()),
        });

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.clone(), session);
        tracing::info!(session_id = %session_id, "Polling session connected");

        session_id
    }

    async fn touch(&self, session_id: &str) -> Option<Arc<PollSession>> {
        let session = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).cloned()
        }?;
        *session.last_seen.lock().await = Instant::now();
        Some(session)
    }

    /// Drain queued events, waiting up to `poll_wait` for the first one.
    /// An empty batch means the long poll timed out; the client polls
    /// again. Returns None for unknown sessions.
    pub async fn poll(&self, session_id: &str) -> Option<Vec<ServerEvent>> {
        let session = self.touch(session_id).await?;
        let mut outbox = session.outbox.lock().await;

        let mut events = Vec::new();
        match tokio::time::timeout(self.poll_wait, outbox.recv()).await {
            Ok(Some(event)) => {
                events.push(event);
                while let Ok(event) = outbox.try_recv() {
                    events.push(event);
                }
            }
            // channel closed server-side; the reaper will finish cleanup
            Ok(None) => {}
            // long-poll timeout, nothing queued
            Err(_) => {}
        }

        Some(events)
    }

    /// Submit one client event for dispatch
    pub async fn submit(&self, session_id: &str, body: &str) -> SubmitOutcome {
        if self.touch(session_id).await.is_none() {
            return SubmitOutcome::UnknownSession;
        }

        match decode_client_event(body) {
            Ok(event) => {
                self.server.handle_event(session_id, event).await;
                SubmitOutcome::Accepted
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Rejected malformed polling submission"
                );
                SubmitOutcome::Rejected(e.to_string())
            }
        }
    }

    /// Explicit disconnect. Returns false for unknown sessions.
    pub async fn disconnect(&self, session_id: &str) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(session_id).is_some()
        };
        if removed {
            self.server.handle_disconnect(session_id).await;
        }
        removed
    }

    /// Safety net against half-open clients: polling carries no
    /// disconnect notification, so sessions idle beyond the liveness
    /// timeout get the same cleanup a disconnect would trigger.
    pub fn spawn_reaper(self: Arc<Self>) {
        tokio::spawn(async move {
            let period = (self.liveness_timeout / 4).max(Duration::from_secs(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let mut expired = Vec::new();
                {
                    let sessions = self.sessions.read().await;
                    for (session_id, session) in sessions.iter() {
                        let last_seen = *session.last_seen.lock().await;
                        if last_seen.elapsed() > self.liveness_timeout {
                            expired.push(session_id.clone());
                        }
                    }
                }

                for session_id in expired {
                    tracing::warn!(session_id = %session_id, "Polling session timed out");
                    self.disconnect(&session_id).await;
                }
            }
        });
    }
}

/// Polling transport routes: POST /poll (handshake), GET /poll/{session}
/// (long-poll), POST /poll/{session} (submit), DELETE /poll/{session}
pub fn poll_routes(
    gateway: Arc<PollGateway>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let connect = warp::path("poll")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_gateway(gateway.clone()))
        .and_then(|gateway: Arc<PollGateway>| async move {
            let session_id = gateway.connect().await;
            Ok::<_, warp::Rejection>(warp::reply::json(
                &serde_json::json!({ "sessionId": session_id }),
            ))
        });

    let poll = warp::path("poll")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_gateway(gateway.clone()))
        .and_then(|session_id: String, gateway: Arc<PollGateway>| async move {
            let reply = match gateway.poll(&session_id).await {
                Some(events) => {
                    warp::reply::with_status(warp::reply::json(&events), StatusCode::OK)
                }
                None => warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({
                        "error": SyncError::SessionNotFound(session_id).to_string()
                    })),
                    StatusCode::NOT_FOUND,
                ),
            };
            Ok::<_, warp::Rejection>(reply)
        });

    let submit = warp::path("poll")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(64 * 1024))
        .and(warp::body::bytes())
        .and(with_gateway(gateway.clone()))
        .and_then(
            |session_id: String, body: bytes::Bytes, gateway: Arc<PollGateway>| async move {
                let text = String::from_utf8_lossy(&body);
                let reply = match gateway.submit(&session_id, &text).await {
                    SubmitOutcome::Accepted => warp::reply::with_status(
                        warp::reply::json(&serde_json::json!({ "status": "accepted" })),
                        StatusCode::OK,
                    ),
                    SubmitOutcome::Rejected(message) => warp::reply::with_status(
                        warp::reply::json(&serde_json::json!({ "error": message })),
                        StatusCode::BAD_REQUEST,
                    ),
                    SubmitOutcome::UnknownSession => warp::reply::with_status(
                        warp::reply::json(&serde_json::json!({
                            "error": SyncError::SessionNotFound(session_id).to_string()
                        })),
                        StatusCode::NOT_FOUND,
                    ),
                };
                Ok::<_, warp::Rejection>(reply)
            },
        );

    let disconnect = warp::path("poll")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_gateway(gateway))
        .and_then(|session_id: String, gateway: Arc<PollGateway>| async move {
            let reply = if gateway.disconnect(&session_id).await {
                warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({ "status": "disconnected" })),
                    StatusCode::OK,
                )
            } else {
                warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({
                        "error": SyncError::SessionNotFound(session_id).to_string()
                    })),
                    StatusCode::NOT_FOUND,
                )
            };
            Ok::<_, warp::Rejection>(reply)
        });

    connect.or(poll).or(submit).or(disconnect)
}

fn with_gateway(
    gateway: Arc<PollGateway>,
) -> impl Filter<Extract = (Arc<PollGateway>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || gateway.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CodeBlockStore;

    fn test_gateway(poll_wait: Duration, liveness: Duration) -> Arc<PollGateway> {
        let store = Arc::new(CodeBlockStore::from_config(None).unwrap());
        let server = Arc::new(RoomServer::new(store));
        Arc::new(PollGateway::new(server, poll_wait, liveness))
    }

    #[tokio::test]
    async fn test_connect_submit_poll_flow() {
        let gateway = test_gateway(Duration::from_millis(200), Duration::from_secs(60));
        let session_id = gateway.connect().await;

        let outcome = gateway
            .submit(
                &session_id,
                r#"{"type":"join_room","room":"async-function"}"#,
            )
            .await;
        assert!(matches!(outcome, SubmitOutcome::Accepted));

        let events = gateway.poll(&session_id).await.unwrap();
        assert_eq!(
            events[0],
            ServerEvent::RoleAssigned { is_mentor: true }
        );
        // snapshot and membership count follow in the same batch
        assert!(events
            .iter()
            .any(|e| matches!(e, ServerEvent::RoomUpdate { student_count: 0 })));
    }

    #[tokio::test]
    async fn test_poll_times_out_empty() {
        let gateway = test_gateway(Duration::from_millis(50), Duration::from_secs(60));
        let session_id = gateway.connect().await;

        let events = gateway.poll(&session_id).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let gateway = test_gateway(Duration::from_millis(50), Duration::from_secs(60));

        assert!(gateway.poll("ghost").await.is_none());
        assert!(matches!(
            gateway.submit("ghost", r#"{"type":"leave_room"}"#).await,
            SubmitOutcome::UnknownSession
        ));
        assert!(!gateway.disconnect("ghost").await);
    }

    #[tokio::test]
    async fn test_malformed_submission_rejected() {
        let gateway = test_gateway(Duration::from_millis(50), Duration::from_secs(60));
        let session_id = gateway.connect().await;

        let outcome = gateway.submit(&session_id, "not json").await;
        assert!(matches!(outcome, SubmitOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn test_disconnect_runs_leave_cleanup() {
        let gateway = test_gateway(Duration::from_millis(100), Duration::from_secs(60));

        let mentor = gateway.connect().await;
        let student = gateway.connect().await;
        gateway
            .submit(&mentor, r#"{"type":"join_room","room":"array-methods"}"#)
            .await;
        gateway
            .submit(&student, r#"{"type":"join_room","room":"array-methods"}"#)
            .await;
        gateway.poll(&student).await.unwrap();

        assert!(gateway.disconnect(&mentor).await);

        let events = gateway.poll(&student).await.unwrap();
        assert!(events.contains(&ServerEvent::MentorLeft));
    }
}
