//! Session invalidation broadcast.
//!
//! Raised when the server rejects the session (401/403). Every usecase
//! subscribes when it is created and clears its cached state when the signal
//! arrives, so a single expired session wipes the state of every feature.
//!
//! ```text
//!   Usecase A ── 401 ──► SessionSignal::invalidate()
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!         Usecase A       Usecase B       any observer
//!         (reset)         (reset)         (subscribe())
//! ```

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Payload-free invalidation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInvalidated;

/// Sending half of the invalidation broadcast. Clones share the channel.
#[derive(Debug, Clone)]
pub struct SessionSignal {
    sender: broadcast::Sender<SessionInvalidated>,
}

impl SessionSignal {
    /// Create a signal buffering up to `capacity` undelivered events per
    /// subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Broadcast an invalidation. Returns the number of subscribers reached.
    pub fn invalidate(&self) -> usize {
        metrics::counter!("fetchkit_session_invalidations_total").increment(1);
        let reached = self.sender.send(SessionInvalidated).unwrap_or(0);
        tracing::info!(subscribers = reached, "Session invalidated");
        reached
    }

    /// Subscribe to future invalidations.
    #[must_use]
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SESSION_CAPACITY)
    }
}

/// Receiving half held by one subscriber. Dropping it unsubscribes.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: broadcast::Receiver<SessionInvalidated>,
}

impl SessionSubscription {
    /// Drain pending events without waiting. Returns whether any invalidation
    /// arrived since the previous call.
    ///
    /// Lagging counts as an arrival: events were sent even if some were
    /// overwritten.
    pub fn take_pending(&mut self) -> bool {
        let mut pending = false;
        loop {
            match self.receiver.try_recv() {
                Ok(SessionInvalidated) | Err(TryRecvError::Lagged(_)) => pending = true,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return pending,
            }
        }
    }

    /// Wait for the next invalidation. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<SessionInvalidated> {
        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(_)) => Some(SessionInvalidated),
            Err(RecvError::Closed) => None,
        }
    }
}
