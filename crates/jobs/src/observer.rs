// crates/jobs/src/observer.rs
//! Subscriber handles attached to a job.
//!
//! An observer is the sending half of an unbounded channel of serialized
//! frames. Sends never block. Dropping the sender is how a job closes an
//! observer: the receiving side sees the channel end.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::types::JobUpdate;

/// Sending half handed to a job when an observer attaches.
pub type ObserverTx = mpsc::UnboundedSender<String>;

/// Receiving half held by the transport.
pub type ObserverRx = mpsc::UnboundedReceiver<String>;

/// Create a fresh observer channel.
pub fn channel() -> (ObserverTx, ObserverRx) {
    mpsc::unbounded_channel()
}

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an attached observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

pub(crate) struct Observer {
    pub(crate) id: ObserverId,
    tx: ObserverTx,
}

impl Observer {
    pub(crate) fn new(id: ObserverId, tx: ObserverTx) -> Self {
        Self { id, tx }
    }

    /// Returns false when the receiving side is gone.
    pub(crate) fn send(&self, text: &str) -> bool {
        self.tx.send(text.to_owned()).is_ok()
    }
}

/// Serialize `update` once and push it to every observer.
///
/// Observers whose channel is closed are dropped from the set; the rest
/// still receive the message.
pub(crate) fn broadcast(observers: &mut Vec<Observer>, job_id: &str, update: &JobUpdate) {
    if observers.is_empty() {
        return;
    }
    let text = match update.to_text() {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Failed to serialize job update");
            return;
        }
    };
    observers.retain(|observer| {
        let delivered = observer.send(&text);
        if !delivered {
            tracing::debug!(
                job_id = %job_id,
                observer_id = observer.id.as_u64(),
                "Observer channel closed, dropping observer"
            );
        }
        delivered
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;

    fn status_update() -> JobUpdate {
        JobUpdate::Status {
            task: None,
            timestamp: chrono::Utc::now(),
            status: JobStatus::InProgress,
        }
    }

    #[test]
    fn test_observer_ids_are_unique() {
        let a = ObserverId::next();
        let b = ObserverId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_broadcast_reaches_all_observers() {
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        let mut observers = vec![
            Observer::new(ObserverId::next(), tx1),
            Observer::new(ObserverId::next(), tx2),
        ];

        broadcast(&mut observers, "job-1", &status_update());

        assert_eq!(observers.len(), 2);
        assert!(rx1.try_recv().unwrap().contains("\"in-progress\""));
        assert!(rx2.try_recv().unwrap().contains("\"in-progress\""));
    }

    #[test]
    fn test_broadcast_drops_closed_observer_only() {
        let (tx1, rx1) = channel();
        let (tx2, mut rx2) = channel();
        let mut observers = vec![
            Observer::new(ObserverId::next(), tx1),
            Observer::new(ObserverId::next(), tx2),
        ];
        drop(rx1);

        broadcast(&mut observers, "job-1", &status_update());

        assert_eq!(observers.len(), 1);
        assert!(rx2.try_recv().is_ok());
    }
}
