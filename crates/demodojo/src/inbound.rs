use demodojo_core::{Envelope, Outbound};

use tokio::sync::oneshot;

/// Work item for the message router.
#[derive(Debug)]
pub enum Inbound {
    /// Raw text frame from a surface, decoded by the coordinator.
    Frame {
        /// JSON envelope as received.
        text: String,
        /// Where the ack goes, if the sender waits for one.
        reply: Option<oneshot::Sender<Outbound>>,
    },
    /// Envelope built in-process (host events, timers, HTTP queries).
    Envelope {
        /// The envelope.
        envelope: Envelope,
        /// Where the ack goes, if the sender waits for one.
        reply: Option<oneshot::Sender<Outbound>>,
    },
}

impl Inbound {
    /// Fire-and-forget envelope.
    pub fn event(envelope: Envelope) -> Self {
        Inbound::Envelope {
            envelope,
            reply: None,
        }
    }

    /// Envelope whose ack is delivered on the returned receiver.
    pub fn request(envelope: Envelope) -> (Self, oneshot::Receiver<Outbound>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        (
            Inbound::Envelope {
                envelope,
                reply: Some(reply_tx),
            },
            reply_rx,
        )
    }

    /// Text frame whose ack is delivered on the returned receiver.
    pub fn frame(text: String) -> (Self, oneshot::Receiver<Outbound>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        (
            Inbound::Frame {
                text,
                reply: Some(reply_tx),
            },
            reply_rx,
        )
    }
}
