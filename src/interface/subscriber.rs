// src/interface/subscriber.rs
// Push-stream handles for sensor input. The host keeps a Subscription per stream
// and pushes samples into it from whatever thread its platform callbacks run on.
// Unsubscribing is synchronous: once `unsubscribe` returns, no further sample
// reaches the sink.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receiver side of a sample stream
pub trait SampleSink<T>: Send + Sync {
    fn deliver(&self, sample: T);
}

/// Handle through which the host pushes samples of one stream
pub struct Subscription<T> {
    sink: Arc<dyn SampleSink<T>>,
    active: Arc<AtomicBool>,
}

impl<T> Subscription<T> {
    /// Binds a sink to an activity flag shared with the owner, which may revoke
    /// the subscription by clearing the flag
    pub fn new(sink: Arc<dyn SampleSink<T>>, active: Arc<AtomicBool>) -> Self {
        Subscription { sink, active }
    }

    /// Delivers a sample. Returns false (sample dropped) once unsubscribed.
    pub fn push(&self, sample: T) -> bool {
        if !self.is_active() {
            return false;
        }
        self.sink.deliver(sample);
        true
    }

    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Subscription {
            sink: Arc::clone(&self.sink),
            active: Arc::clone(&self.active),
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
