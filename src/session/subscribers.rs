//! Subscriber registry
//!
//! Observers are notified in registration order. A failing or panicking
//! observer is logged and skipped; the rest are still notified.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::warn;

use super::state::SessionSnapshot;
use crate::metrics::METRICS;

/// Callback owned by the session manager
pub trait StateSubscriber: Send {
    fn on_transition(&mut self, snapshot: &SessionSnapshot) -> anyhow::Result<()>;
}

impl<F> StateSubscriber for F
where
    F: FnMut(&SessionSnapshot) -> anyhow::Result<()> + Send,
{
    fn on_transition(&mut self, snapshot: &SessionSnapshot) -> anyhow::Result<()> {
        self(snapshot)
    }
}

/// Shared observer the session manager only holds weakly.
///
/// Once the last strong reference is dropped the registration lapses on
/// the next notification.
pub trait StateObserver: Send + Sync {
    fn on_transition(&self, snapshot: &SessionSnapshot) -> anyhow::Result<()>;
}

/// Returned by subscribe; pass to unsubscribe to stop notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl std::fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

enum Entry {
    Owned(Box<dyn StateSubscriber>),
    Weak(Weak<dyn StateObserver>),
}

/// Ordered set of subscribers
#[derive(Default)]
pub struct SubscriberRegistry {
    entries: Vec<(SubscriptionHandle, Entry)>,
    next_id: u64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an owned callback
    pub fn subscribe(&mut self, subscriber: Box<dyn StateSubscriber>) -> SubscriptionHandle {
        self.push(Entry::Owned(subscriber))
    }

    /// Register a weakly held observer
    pub fn observe(&mut self, observer: &Arc<dyn StateObserver>) -> SubscriptionHandle {
        self.push(Entry::Weak(Arc::downgrade(observer)))
    }

    /// Remove a registration; returns false if the handle was unknown
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(h, _)| *h != handle);
        self.entries.len() != before
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deliver a snapshot to every subscriber
    pub fn notify(&mut self, snapshot: &SessionSnapshot) {
        // Lapsed weak observers are dropped here
        self.entries.retain(|(_, entry)| match entry {
            Entry::Owned(_) => true,
            Entry::Weak(weak) => weak.strong_count() > 0,
        });

        for (handle, entry) in self.entries.iter_mut() {
            let result = catch_unwind(AssertUnwindSafe(|| match entry {
                Entry::Owned(subscriber) => subscriber.on_transition(snapshot),
                Entry::Weak(weak) => match weak.upgrade() {
                    Some(observer) => observer.on_transition(snapshot),
                    None => Ok(()),
                },
            }));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    METRICS.subscriber_failed();
                    warn!(subscriber = %handle, error = %e, "Subscriber returned an error");
                }
                Err(panic) => {
                    METRICS.subscriber_failed();
                    warn!(
                        subscriber = %handle,
                        panic = panic_message(&*panic),
                        "Subscriber panicked"
                    );
                }
            }
        }
    }

    fn push(&mut self, entry: Entry) -> SubscriptionHandle {
        self.next_id += 1;
        let handle = SubscriptionHandle(self.next_id);
        self.entries.push((handle, entry));
        handle
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
