//! Events emitted by the notification listener.
//!
//! The listener is a background task with its own controller connection;
//! it communicates with the consuming layer through a bounded
//! `tokio::sync::mpsc` channel of these events. The host application owns
//! the restart-on-crash policy: after a `Disconnected` event the task has
//! ended and a new listener must be started.

use crate::types::WireMessage;

/// An event from the notification listener task.
#[derive(Debug, Clone)]
pub enum ListenerEvent {
    /// The listener connection authenticated and the read loop started.
    Connected,

    /// One complete unsolicited status push from the controller.
    ///
    /// The payload carries `{id, channel, ...changedFields}`; a push can
    /// race a polled status update on the command connection, so consumers
    /// should apply whichever arrives last and only emit downstream change
    /// events when the value actually differs from cached state.
    Notification(WireMessage),

    /// No notification arrived within the silence timeout.
    ///
    /// The listener has already pinged its own connection; consumers use
    /// this tick to keep the separate command connection alive as well.
    Silence,

    /// The listener connection failed and the task has terminated.
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Status;

    #[test]
    fn events_are_cloneable() {
        let ev = ListenerEvent::Notification(WireMessage {
            command: 20,
            status: Status::Notification,
            data: None,
        });
        let copy = ev.clone();
        assert!(matches!(copy, ListenerEvent::Notification(_)));
    }
}
