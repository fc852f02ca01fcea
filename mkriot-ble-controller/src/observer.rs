//! Callback surface consumed by whatever drives the UI

use std::fmt;

use mkriot_proto::{Channel, Value};
use tokio::sync::mpsc;

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusLevel {
    #[default]
    Muted,
    Ok,
    Warn,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatusLevel::Muted => "muted",
            StatusLevel::Ok => "ok",
            StatusLevel::Warn => "warn",
        })
    }
}

/// Receives connection and telemetry updates from a [`crate::Central`].
///
/// Callbacks run on the task that produced the update and must not block.
pub trait Observer: Send + Sync + 'static {
    fn on_connected(&self, _connected: bool) {}

    fn on_status(&self, _text: &str, _level: StatusLevel) {}

    fn on_disconnected(&self) {}

    fn on_value(&self, _channel: Channel, _value: &Value) {}
}

/// Ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Observer callbacks as messages
#[derive(Debug, Clone, PartialEq)]
pub enum CentralEvent {
    Connected(bool),
    Status { text: String, level: StatusLevel },
    Disconnected,
    Value { channel: Channel, value: Value },
}

/// Forwards every callback over an unbounded channel
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<CentralEvent>,
}

/// Create an observer and the receiving end of its events
pub fn event_channel() -> (EventSender, mpsc::UnboundedReceiver<CentralEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

impl EventSender {
    fn send(&self, event: CentralEvent) {
        // receiver gone means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

impl Observer for EventSender {
    fn on_connected(&self, connected: bool) {
        self.send(CentralEvent::Connected(connected));
    }

    fn on_status(&self, text: &str, level: StatusLevel) {
        self.send(CentralEvent::Status {
            text: text.to_string(),
            level,
        });
    }

    fn on_disconnected(&self) {
        self.send(CentralEvent::Disconnected);
    }

    fn on_value(&self, channel: Channel, value: &Value) {
        self.send(CentralEvent::Value {
            channel,
            value: value.clone(),
        });
    }
}
