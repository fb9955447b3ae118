use std::sync::{
    mpsc::{self, Receiver, Sender},
    Mutex, PoisonError,
};

use crate::MirrorEvent;

/// Trait for consuming events.
///
/// Each frontend provides its own implementation.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: MirrorEvent);
}

/// Channel-based event sink.
///
/// Sends events through a standard mpsc channel. The receiver end
/// can be polled by any consumer (progress renderer, test harness, etc.).
pub struct ChannelSink {
    sender: Sender<MirrorEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<MirrorEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender,
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: MirrorEvent) {
        let _ = self.sender.send(event);
    }
}

/// No-op event sink for tests or headless operation.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: MirrorEvent) {}
}

/// Collector sink that stores all events for inspection.
///
/// Useful in tests to verify that expected events were emitted.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<MirrorEvent>>,
}

impl CollectorSink {
    pub fn events(&self) -> Vec<MirrorEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectorSink {
    fn emit(&self, event: MirrorEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
