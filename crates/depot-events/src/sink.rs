use std::sync::{
    mpsc::{self, Receiver, Sender},
    Mutex,
};

use crate::DepotEvent;

/// Trait for consuming events.
///
/// Each caller provides its own implementation.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DepotEvent);
}

/// Channel-based event sink.
///
/// Sends events through a standard mpsc channel. The receiver end
/// can be polled by any consumer (API layer, test harness, etc.).
pub struct ChannelSink {
    sender: Mutex<Sender<DepotEvent>>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<DepotEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Mutex::new(sender),
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: DepotEvent) {
        if let Ok(sender) = self.sender.lock() {
            let _ = sender.send(event);
        }
    }
}

/// No-op event sink for headless operation.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: DepotEvent) {}
}

/// Collector sink that stores all events for inspection.
///
/// Useful in tests to verify that expected events were emitted.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<DepotEvent>>,
}

impl CollectorSink {
    pub fn events(&self) -> Vec<DepotEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectorSink {
    fn emit(&self, event: DepotEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
