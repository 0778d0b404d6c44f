use crate::{CorrelationId, CoreError, ErrorCategory, SessionSnapshot};

use serde::{Deserialize, Serialize};

/// Result of handling one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AckStatus {
    /// The session changed.
    Applied,
    /// Accepted without effect (duplicate, late, or read-only).
    Noop,
    /// Refused; the session is unaffected.
    Rejected {
        /// Why.
        category: ErrorCategory,
        /// User-facing text for the category.
        message: String,
    },
}

impl AckStatus {
    /// Rejection for `error`.
    pub fn rejected(error: &CoreError) -> Self {
        let category = error.category();
        AckStatus::Rejected {
            category,
            message: category.user_message().to_string(),
        }
    }

    /// Returns `true` for [`AckStatus::Rejected`].
    pub fn is_rejected(&self) -> bool {
        matches!(self, AckStatus::Rejected { .. })
    }
}

/// Explicit acknowledgement sent for every envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    /// Correlation id of the envelope, when it could be read.
    pub correlation_id: Option<CorrelationId>,
    /// Outcome.
    pub status: AckStatus,
}

/// Frames sent from the Coordinator's host to Command Surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outbound {
    /// Reply to one envelope, with the state it left behind.
    Ack {
        /// The acknowledgement.
        ack: Ack,
        /// Session state after handling.
        snapshot: SessionSnapshot,
    },
    /// Broadcast after a state mutation.
    Snapshot {
        /// Session state after the mutation.
        snapshot: SessionSnapshot,
    },
}
