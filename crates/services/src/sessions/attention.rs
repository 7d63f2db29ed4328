use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use proctor_core::integrity::AttentionSignal;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Identifies one subscriber of an [`AttentionSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host environment that reports the assessment surface being hidden or
/// losing focus.
pub trait AttentionSource: Send + Sync {
    fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<AttentionSignal>);

    /// Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Live subscription owned by a session. Dropping it unsubscribes.
pub struct AttentionSubscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<AttentionSignal>,
    source: Arc<dyn AttentionSource>,
}

impl AttentionSubscription {
    #[must_use]
    pub fn open(source: Arc<dyn AttentionSource>) -> Self {
        let (id, receiver) = source.subscribe();
        debug!(subscription = %id, "attention subscription opened");
        Self {
            id,
            receiver,
            source,
        }
    }

    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next queued signal, without waiting.
    pub fn try_next(&mut self) -> Option<AttentionSignal> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the next signal. `None` once the source has dropped the sender.
    pub async fn next(&mut self) -> Option<AttentionSignal> {
        self.receiver.recv().await
    }
}

impl fmt::Debug for AttentionSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttentionSubscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for AttentionSubscription {
    fn drop(&mut self) {
        self.source.unsubscribe(self.id);
        debug!(subscription = %self.id, "attention subscription closed");
    }
}

/// In-process source fed by [`ChannelAttentionSource::emit`]. Used by the
/// terminal runner and by tests.
#[derive(Default)]
pub struct ChannelAttentionSource {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<AttentionSignal>>>,
}

impl ChannelAttentionSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadcast a signal; returns how many subscribers received it.
    pub fn emit(&self, signal: AttentionSignal) -> usize {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            warn!("attention subscriber table poisoned");
            return 0;
        };
        subscribers.retain(|_, sender| sender.send(signal).is_ok());
        subscribers.len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map_or(0, |s| s.len())
    }
}

impl AttentionSource for ChannelAttentionSource {
    fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<AttentionSignal>) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => {
                subscribers.insert(id, sender);
            }
            Err(_) => warn!("attention subscriber table poisoned"),
        }
        (id, receiver)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_every_subscriber() {
        let source = Arc::new(ChannelAttentionSource::new());
        let mut a = AttentionSubscription::open(source.clone());
        let mut b = AttentionSubscription::open(source.clone());
        assert_ne!(a.id(), b.id());

        assert_eq!(source.emit(AttentionSignal::FocusLost), 2);
        assert_eq!(a.try_next(), Some(AttentionSignal::FocusLost));
        assert_eq!(b.try_next(), Some(AttentionSignal::FocusLost));
        assert_eq!(a.try_next(), None);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let source = Arc::new(ChannelAttentionSource::new());
        let sub = AttentionSubscription::open(source.clone());
        assert_eq!(source.subscriber_count(), 1);
        drop(sub);
        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(source.emit(AttentionSignal::SurfaceHidden), 0);
    }

    #[tokio::test]
    async fn next_waits_for_a_signal() {
        let source = Arc::new(ChannelAttentionSource::new());
        let mut sub = AttentionSubscription::open(source.clone());
        let emitter = source.clone();
        tokio::spawn(async move {
            emitter.emit(AttentionSignal::SurfaceHidden);
        });
        assert_eq!(sub.next().await, Some(AttentionSignal::SurfaceHidden));
    }
}
