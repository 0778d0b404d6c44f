mod envelope;
mod outbound;

pub use {
    envelope::{Envelope, Message},
    outbound::{Ack, AckStatus, Outbound},
};
