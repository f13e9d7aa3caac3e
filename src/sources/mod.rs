use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::position::{Fix, FixRequest, PositionError};

mod replay;
mod simulated;

pub use replay::CsvReplaySource;
pub use simulated::SimulatedSource;

/// What a continuous position stream delivers. A failed fix does not end the
/// stream; the subscriber decides what to do with the error and the source
/// keeps trying.
#[derive(Clone, Debug)]
pub enum SourceEvent {
    Fix(Fix),
    Error(PositionError),
}

/// Cancellation token for an active position stream.
///
/// `cancel` is idempotent and safe to call on a stream that already ended or
/// was never started. Producers check the flag before every emit, so no fix
/// is delivered after `cancel` returns.
#[derive(Clone, Debug)]
pub struct SubscriptionHandle {
    id: Uuid,
    cancelled: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    fn new() -> Self {
        SubscriptionHandle {
            id: Uuid::new_v4(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// An active position stream: the event receiver plus the handle that stops
/// it. The handle is exclusively owned by whoever started the stream.
pub struct Subscription {
    pub events: mpsc::UnboundedReceiver<SourceEvent>,
    pub handle: SubscriptionHandle,
}

/// A positioning capability: one-shot reads and continuous streams of fixes.
pub trait PositionSource: Send + Sync {
    /// One-shot read. Callers pass `FixRequest::one_shot()` (10 s timeout,
    /// always-fresh) unless they have a reason not to.
    fn current_position(
        &self,
        request: &FixRequest,
    ) -> impl Future<Output = Result<Fix, PositionError>> + Send;

    /// Start a continuous stream of fixes. The system tracks a single
    /// device, so only one subscription is active per source: subscribing
    /// again cancels the previous stream first.
    fn subscribe(&self, request: &FixRequest) -> Subscription;
}

/// Bookkeeping shared by the source implementations to enforce the
/// single-subscription rule (last writer wins).
#[derive(Default)]
pub struct ActiveSubscription(Mutex<Option<SubscriptionHandle>>);

impl ActiveSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever stream was active and hand out the channel for a new
    /// one. The producer task keeps the sender; the subscriber gets the
    /// receiver and the handle.
    pub fn begin(&self) -> (mpsc::UnboundedSender<SourceEvent>, Subscription) {
        let mut active = self.0.lock().unwrap();
        if let Some(previous) = active.take() {
            previous.cancel();
        }
        let handle = SubscriptionHandle::new();
        *active = Some(handle.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Subscription { events: rx, handle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent() {
        let handle = SubscriptionHandle::new();
        assert!(!handle.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn beginning_a_new_subscription_cancels_the_previous_one() {
        let active = ActiveSubscription::new();
        let (_tx1, sub1) = active.begin();
        let (_tx2, sub2) = active.begin();
        assert!(sub1.handle.is_cancelled());
        assert!(!sub2.handle.is_cancelled());
        assert_ne!(sub1.handle.id(), sub2.handle.id());
    }
}
