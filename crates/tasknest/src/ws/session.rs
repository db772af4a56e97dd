//! Live session handles.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::events::Envelope;
use crate::user::User;

/// Size of a session's outbound queue.
pub(super) const OUTBOUND_BUFFER_SIZE: usize = 64;

/// Handle to one user's live connection.
///
/// The handle does not own the socket. Outbound traffic goes through the
/// `outbound` queue, drained by the single writer task attached to the
/// socket; cancelling the token tells both connection loops to shut down.
/// The `id` is unique per process so a stale deregistration from a
/// superseded session can be told apart from the current one.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: u64,
    user: User,
    outbound: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub(super) fn new(id: u64, user: User, outbound: mpsc::Sender<Envelope>) -> Self {
        Self {
            id,
            user,
            outbound,
            cancel: CancellationToken::new(),
        }
    }

    /// Unique id of this session.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The authenticated user behind this session.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// The session's username (registry key).
    pub fn username(&self) -> &str {
        &self.user.username
    }

    /// Queue an event for this session, waiting for buffer space.
    ///
    /// Used for direct replies from the session's own dispatch path.
    pub async fn send(&self, event: Envelope) {
        if self.outbound.send(event).await.is_err() {
            warn!(username = %self.user.username, "session outbound queue is gone");
        }
    }

    /// Queue an event without waiting; drops the event when the peer's
    /// buffer is full or its writer is gone. Used by the fan-out so one
    /// slow peer cannot stall delivery to the others.
    pub fn try_send(&self, event: Envelope) -> bool {
        match self.outbound.try_send(event) {
            Ok(()) => true,
            Err(err) => {
                warn!(username = %self.user.username, %err, "dropping event for session");
                false
            }
        }
    }

    /// Ask the session's loops to stop and its socket to close. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the session is closed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }
}
