use crate::{
    Ack, AckStatus, CaptureTarget, CoreError, CorrelationId, Envelope, ErrorCategory, Message,
    Outbound, SessionSnapshot, SourceDescriptor,
};

use super::support::t0;

/// WHAT: A START frame decodes into a typed envelope
/// WHY: Surfaces speak JSON; the coordinator handles a tagged union
#[test]
#[allow(clippy::unwrap_used)]
fn given_start_frame_when_decoded_then_typed_message() {
    // Given: A START frame as a surface would send it
    let frame = r#"{
        "correlationId": "6d0f3f5c-8a55-4b8e-8f0e-3f2b1b2c4d5e",
        "message": {
            "type": "START",
            "payload": {
                "source": {"sourceId": "s-1", "target": {"kind": "tab", "tabId": 42}},
                "audioEnabled": true,
                "countdownSeconds": 3
            }
        }
    }"#;

    // When: Decoded
    let envelope = Envelope::decode(frame).unwrap();

    // Then: Fields land where expected
    assert!(envelope.session_id.is_none());
    assert_eq!(
        envelope.message,
        Message::Start {
            source: SourceDescriptor::new("s-1", CaptureTarget::Tab { tab_id: 42 }),
            audio_enabled: true,
            countdown_seconds: Some(3),
        }
    );
}

/// WHAT: Payload-free commands decode without a payload key
/// WHY: PAUSE, STOP and friends carry no data
#[test]
#[allow(clippy::unwrap_used)]
fn given_pause_frame_without_payload_when_decoded_then_pause() {
    // Given: A PAUSE frame addressed to a session
    let frame = r#"{"correlationId":"6d0f3f5c-8a55-4b8e-8f0e-3f2b1b2c4d5e",
        "sessionId":"0b9f6c1e-2f7a-4c3d-9e8b-7a6b5c4d3e2f",
        "message":{"type":"PAUSE"}}"#;

    // When: Decoded
    let envelope = Envelope::decode(frame).unwrap();

    // Then: PAUSE with the session id
    assert_eq!(envelope.message, Message::Pause);
    assert!(envelope.session_id.is_some());
}

/// WHAT: Unknown message types are rejected explicitly
/// WHY: Silently ignoring an unknown command hides client bugs
#[test]
fn given_unknown_type_when_decoded_then_malformed_with_correlation_hint() {
    // Given: A frame with an unknown type
    let frame = r#"{"correlationId":"6d0f3f5c-8a55-4b8e-8f0e-3f2b1b2c4d5e","message":{"type":"REWIND"}}"#;

    // When: Decoded
    let result = Envelope::decode(frame);

    // Then: MalformedMessage, but the correlation id is still recoverable
    let error = result.err();
    assert!(matches!(error, Some(CoreError::MalformedMessage { .. })));
    assert_eq!(
        error.map(|e| e.category()),
        Some(ErrorCategory::MalformedMessage)
    );
    assert!(Envelope::correlation_hint(frame).is_some());
}

/// WHAT: Acks serialize with an outcome tag and the user-facing message
/// WHY: Surfaces render the category text, never the raw error
#[test]
#[allow(clippy::unwrap_used)]
fn given_rejected_ack_when_encoded_then_outcome_and_category() {
    // Given: A rejection ack
    let ack = Ack {
        correlation_id: Some(CorrelationId::new()),
        status: AckStatus::Rejected {
            category: ErrorCategory::SessionActive,
            message: ErrorCategory::SessionActive.user_message().to_string(),
        },
    };
    let frame = Outbound::Ack {
        ack,
        snapshot: SessionSnapshot::idle(t0()),
    };

    // When: Encoded
    let value = serde_json::to_value(&frame).unwrap();

    // Then: Tagged as expected
    assert_eq!(value["kind"], "ack");
    assert_eq!(value["ack"]["status"]["outcome"], "rejected");
    assert_eq!(value["ack"]["status"]["category"], "session_active");
    assert_eq!(value["snapshot"]["state"], serde_json::to_value(crate::SessionState::Idle).unwrap());
}
