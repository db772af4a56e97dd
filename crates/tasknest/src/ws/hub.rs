//! Connection hub: session registry and event dispatch.
//!
//! The registry map is owned by exactly one coordinating task that consumes
//! a queue of register/deregister/broadcast commands, so registration order
//! is the order of submission and no reader loop ever touches the map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{Envelope, EventKind};
use super::session::{SessionHandle, OUTBOUND_BUFFER_SIZE};
use crate::tasks::{StoreTask, Task, UpdateTask};
use crate::user::{User, UserError, UserRepository};

/// Size of the registry command queue.
const REGISTRY_BUFFER_SIZE: usize = 64;

/// Commands consumed by the registry-owner task.
enum RegistryCommand {
    Register(SessionHandle),
    Deregister {
        username: String,
        session_id: u64,
    },
    Broadcast {
        event: Envelope,
        from_username: String,
    },
    ActiveUsers(oneshot::Sender<Vec<String>>),
}

/// Hub for all live sessions.
///
/// Owns the registry-owner task (started on construction, stopped by
/// [`ConnectionHub::shutdown`]) and dispatches decoded events to the task
/// actions. Broadcast skips the originating user and is best-effort per
/// peer.
pub struct ConnectionHub {
    registry_tx: mpsc::Sender<RegistryCommand>,
    store: StoreTask,
    update: UpdateTask,
    users: UserRepository,
    next_session_id: AtomicU64,
    shutdown: CancellationToken,
}

impl ConnectionHub {
    /// Create the hub and start its registry-owner task.
    pub fn new(store: StoreTask, update: UpdateTask, users: UserRepository) -> Self {
        let (registry_tx, registry_rx) = mpsc::channel(REGISTRY_BUFFER_SIZE);
        let shutdown = CancellationToken::new();
        tokio::spawn(run_registry(registry_rx, shutdown.clone()));

        Self {
            registry_tx,
            store,
            update,
            users,
            next_session_id: AtomicU64::new(1),
            shutdown,
        }
    }

    /// Stop the registry-owner task and close every registered session.
    ///
    /// In-flight session loops are not interrupted beyond their sockets
    /// closing; each terminates on its own read error.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Resolve the user a new connection claims to be.
    pub async fn resolve_user(&self, username: &str) -> Result<User, UserError> {
        self.users.find_by_username(username).await
    }

    /// Register a new session for `user`.
    ///
    /// An existing session for the same username is closed and replaced.
    /// Returns the handle the connection loops should run under.
    pub async fn register(&self, user: User, outbound: mpsc::Sender<Envelope>) -> SessionHandle {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = SessionHandle::new(id, user, outbound);
        self.submit(RegistryCommand::Register(session.clone())).await;
        session
    }

    /// Remove a session from the registry.
    ///
    /// A no-op when the registered session for that username is no longer
    /// this one, so a stale removal from a superseded session cannot evict
    /// its replacement.
    pub async fn deregister(&self, session: &SessionHandle) {
        self.submit(RegistryCommand::Deregister {
            username: session.username().to_string(),
            session_id: session.id(),
        })
        .await;
    }

    /// Fan an event out to every registered session except the originator's.
    pub async fn broadcast_from(&self, origin: &SessionHandle, event: Envelope) {
        self.submit(RegistryCommand::Broadcast {
            event,
            from_username: origin.username().to_string(),
        })
        .await;
    }

    /// Usernames with a currently registered session.
    pub async fn active_users(&self) -> Vec<String> {
        let (tx, rx) = oneshot::channel();
        self.submit(RegistryCommand::ActiveUsers(tx)).await;
        rx.await.unwrap_or_default()
    }

    /// Dispatch one raw inbound text frame from `session`.
    ///
    /// Decode failures drop the frame and keep the session alive. Domain
    /// failures are replied only to the originating session; successful
    /// mutations are broadcast to everyone else.
    pub async fn handle_message(&self, session: &SessionHandle, raw: &str) {
        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(username = %session.username(), %err, "dropping undecodable frame");
                return;
            }
        };

        match envelope.kind {
            EventKind::TaskCreated => {
                let payload = match envelope.task_created() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(username = %session.username(), %err, "bad task_created payload");
                        return;
                    }
                };

                let task = Task {
                    id: payload.id,
                    title: payload.title,
                    created_by: payload.created_by,
                    completed: false,
                    completed_by: None,
                    parent_id: payload.parent_id,
                    cost: payload.cost,
                    total_cost: payload.cost,
                };

                match self.store.run(task).await {
                    Ok(()) => self.broadcast_from(session, envelope).await,
                    Err(err) => {
                        warn!(username = %session.username(), %err, "failed to store task");
                        session.send(Envelope::store_error(err.to_string())).await;
                    }
                }
            }
            EventKind::TaskUpdated => {
                let payload = match envelope.task_updated() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(username = %session.username(), %err, "bad task_updated payload");
                        return;
                    }
                };

                let task = Task {
                    id: payload.id,
                    title: payload.title,
                    created_by: session.user().id,
                    completed: payload.completed,
                    completed_by: None,
                    parent_id: None,
                    cost: payload.cost,
                    total_cost: payload.cost,
                };

                match self.update.run(task, session.user().id).await {
                    Ok(()) => self.broadcast_from(session, envelope).await,
                    Err(err) => {
                        warn!(username = %session.username(), %err, "failed to update task");
                        session.send(Envelope::store_error(err.to_string())).await;
                    }
                }
            }
            EventKind::Ping => {
                debug!(username = %session.username(), "ping");
                session.send(Envelope::pong()).await;
            }
            EventKind::Pong => {}
            EventKind::TaskStoreError | EventKind::Unknown => {
                warn!(username = %session.username(), kind = ?envelope.kind, "ignoring event");
            }
        }
    }

    /// Default per-session outbound queue capacity.
    pub fn outbound_buffer() -> usize {
        OUTBOUND_BUFFER_SIZE
    }

    async fn submit(&self, command: RegistryCommand) {
        if self.registry_tx.send(command).await.is_err() {
            warn!("session registry is not running");
        }
    }
}

/// The registry-owner loop. Exclusive owner of the session map.
async fn run_registry(mut rx: mpsc::Receiver<RegistryCommand>, shutdown: CancellationToken) {
    let mut sessions: HashMap<String, SessionHandle> = HashMap::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            command = rx.recv() => {
                let Some(command) = command else { break };
                match command {
                    RegistryCommand::Register(session) => {
                        info!(username = %session.username(), session_id = session.id(), "registering session");
                        if let Some(old) = sessions.insert(session.username().to_string(), session) {
                            info!(username = %old.username(), session_id = old.id(), "superseding session");
                            old.close();
                        }
                    }
                    RegistryCommand::Deregister { username, session_id } => {
                        match sessions.get(&username) {
                            Some(current) if current.id() == session_id => {
                                info!(%username, session_id, "deregistering session");
                                sessions.remove(&username);
                            }
                            _ => debug!(%username, session_id, "ignoring stale deregistration"),
                        }
                    }
                    RegistryCommand::Broadcast { event, from_username } => {
                        for (username, session) in &sessions {
                            if *username == from_username {
                                continue;
                            }
                            debug!(username = %username, "broadcasting event");
                            session.try_send(event.clone());
                        }
                    }
                    RegistryCommand::ActiveUsers(reply) => {
                        let _ = reply.send(sessions.keys().cloned().collect());
                    }
                }
            }
        }
    }

    for session in sessions.values() {
        session.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::tasks::TaskRepository;
    use serde_json::json;
    use uuid::Uuid;

    async fn test_hub() -> (ConnectionHub, UserRepository, TaskRepository) {
        let db = Database::in_memory().await.unwrap();
        let tasks = TaskRepository::new(db.pool().clone());
        let users = UserRepository::new(db.pool().clone());
        let hub = ConnectionHub::new(
            StoreTask::new(tasks.clone(), users.clone()),
            UpdateTask::new(tasks.clone()),
            users.clone(),
        );
        (hub, users, tasks)
    }

    async fn connect(
        hub: &ConnectionHub,
        users: &UserRepository,
        username: &str,
    ) -> (SessionHandle, mpsc::Receiver<Envelope>) {
        let user = users.find_or_create(username).await.unwrap();
        let (tx, rx) = mpsc::channel(ConnectionHub::outbound_buffer());
        let session = hub.register(user, tx).await;
        (session, rx)
    }

    fn task_created_frame(id: Uuid, user_id: i64, cost: i64) -> String {
        json!({
            "type": "task_created",
            "data": {
                "id": id,
                "title": "shared task",
                "created_by": user_id,
                "cost": cost,
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_second_registration_supersedes_first() {
        let (hub, users, _tasks) = test_hub().await;

        let (first, _rx1) = connect(&hub, &users, "alice").await;
        let (second, _rx2) = connect(&hub, &users, "alice").await;

        // Force the registry to drain both registrations.
        let active = hub.active_users().await;
        assert_eq!(active, vec!["alice".to_string()]);
        assert!(first.is_closed());
        assert!(!second.is_closed());
    }

    #[tokio::test]
    async fn test_stale_deregistration_keeps_new_session() {
        let (hub, users, _tasks) = test_hub().await;

        let (first, _rx1) = connect(&hub, &users, "alice").await;
        let (_second, _rx2) = connect(&hub, &users, "alice").await;

        // The superseded session reports its own removal late.
        hub.deregister(&first).await;

        assert_eq!(hub.active_users().await, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn test_deregistration_removes_current_session() {
        let (hub, users, _tasks) = test_hub().await;

        let (session, _rx) = connect(&hub, &users, "alice").await;
        hub.deregister(&session).await;

        assert!(hub.active_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_task_created_broadcasts_to_peers_only() {
        let (hub, users, tasks) = test_hub().await;

        let (alice, mut alice_rx) = connect(&hub, &users, "alice").await;
        let (_bob, mut bob_rx) = connect(&hub, &users, "bob").await;

        let task_id = Uuid::new_v4();
        let frame = task_created_frame(task_id, alice.user().id, 5);
        hub.handle_message(&alice, &frame).await;

        // Bob sees the original envelope.
        let event = bob_rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::TaskCreated);
        assert_eq!(event.task_created().unwrap().id, task_id);

        // Alice gets no echo.
        assert!(alice_rx.try_recv().is_err());

        // And the task is persisted.
        assert!(tasks.find(task_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_store_replies_to_sender_only() {
        let (hub, users, _tasks) = test_hub().await;

        let (alice, mut alice_rx) = connect(&hub, &users, "alice").await;
        let (_bob, mut bob_rx) = connect(&hub, &users, "bob").await;

        // Unknown creating user: the store action rejects it.
        let frame = task_created_frame(Uuid::new_v4(), 9999, 5);
        hub.handle_message(&alice, &frame).await;

        let event = alice_rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::TaskStoreError);
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ping_yields_one_pong_and_no_broadcast() {
        let (hub, users, _tasks) = test_hub().await;

        let (alice, mut alice_rx) = connect(&hub, &users, "alice").await;
        let (_bob, mut bob_rx) = connect(&hub, &users, "bob").await;

        hub.handle_message(&alice, r#"{"type": "ping"}"#).await;

        let event = alice_rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Pong);
        assert!(alice_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped_quietly() {
        let (hub, users, _tasks) = test_hub().await;

        let (alice, mut alice_rx) = connect(&hub, &users, "alice").await;
        let (_bob, mut bob_rx) = connect(&hub, &users, "bob").await;

        hub.handle_message(&alice, "not json at all").await;
        hub.handle_message(&alice, r#"{"type": "task_created", "data": {"id": 3}}"#)
            .await;

        assert!(!alice.is_closed());
        assert!(alice_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_event_is_ignored() {
        let (hub, users, _tasks) = test_hub().await;

        let (alice, mut alice_rx) = connect(&hub, &users, "alice").await;
        hub.handle_message(&alice, r#"{"type": "emoji_reaction", "data": {}}"#)
            .await;

        assert!(!alice.is_closed());
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_task_updated_broadcasts_on_success() {
        let (hub, users, _tasks) = test_hub().await;

        let (alice, _alice_rx) = connect(&hub, &users, "alice").await;
        let (_bob, mut bob_rx) = connect(&hub, &users, "bob").await;

        let task_id = Uuid::new_v4();
        let create = task_created_frame(task_id, alice.user().id, 2);
        hub.handle_message(&alice, &create).await;
        let _ = bob_rx.recv().await;

        let update = json!({
            "type": "task_updated",
            "data": {
                "id": task_id,
                "title": "shared task",
                "completed": true,
                "cost": 2,
            }
        })
        .to_string();
        hub.handle_message(&alice, &update).await;

        let event = bob_rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::TaskUpdated);
        assert!(event.task_updated().unwrap().completed);
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions() {
        let (hub, users, _tasks) = test_hub().await;

        let (session, _rx) = connect(&hub, &users, "alice").await;
        // Make sure registration has been consumed before stopping.
        let _ = hub.active_users().await;

        hub.shutdown();
        session.closed().await;
    }
}
