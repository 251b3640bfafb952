//! Inbound push-channel frames: JSON objects discriminated by a `type`
//! field. Malformed or unknown frames are decode errors for the caller to
//! log and drop — a bad frame never tears down the channel.

use serde::{Deserialize, Serialize};

use crate::types::{ArrivalBatch, MessageSummary};

/// A decoded inbound frame from the push endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushFrame {
    /// Handshake confirmation; no state change beyond confirming open.
    Connected,
    /// New mail arrived. `count` is authoritative; ids and summaries may be
    /// truncated or absent.
    #[serde(rename_all = "camelCase")]
    NewMessages {
        email_address: String,
        count: u32,
        #[serde(default)]
        message_ids: Vec<String>,
        #[serde(default)]
        emails: Vec<MessageSummary>,
    },
    /// Server-reported error, surfaced to the caller. Does not drive the
    /// connection state machine by itself.
    Error { message: String },
}

impl PushFrame {
    /// Decode a text frame. Unknown `type` values and malformed JSON both
    /// surface as errors.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Convert a `new_messages` frame into an arrival batch; `None` for the
    /// other kinds.
    pub fn into_batch(self) -> Option<ArrivalBatch> {
        match self {
            Self::NewMessages {
                email_address,
                count,
                message_ids,
                emails,
            } => Some(ArrivalBatch {
                email_address,
                count,
                message_ids,
                emails,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_connected() {
        let frame = PushFrame::decode(r#"{"type":"connected"}"#).unwrap();
        assert_eq!(frame, PushFrame::Connected);
        assert!(frame.into_batch().is_none());
    }

    #[test]
    fn decode_new_messages_full() {
        let json = r#"{
            "type": "new_messages",
            "emailAddress": "ada@example.com",
            "count": 2,
            "messageIds": ["m1", "m2"],
            "emails": [{
                "id": "m1",
                "subject": "hello",
                "fromName": "Bob",
                "fromAddress": "bob@example.com",
                "preview": "hey",
                "badges": [],
                "receivedAt": "2026-03-01T10:00:00Z"
            }]
        }"#;
        let batch = PushFrame::decode(json).unwrap().into_batch().unwrap();
        assert_eq!(batch.count, 2);
        assert_eq!(batch.message_ids.len(), 2);
        // Summaries may be truncated relative to ids.
        assert_eq!(batch.emails.len(), 1);
        assert_eq!(batch.emails[0].subject, "hello");
    }

    #[test]
    fn decode_new_messages_count_only() {
        let json = r#"{"type":"new_messages","emailAddress":"a@b.c","count":7}"#;
        let batch = PushFrame::decode(json).unwrap().into_batch().unwrap();
        assert_eq!(batch.count, 7);
        assert!(batch.message_ids.is_empty());
        assert!(batch.emails.is_empty());
    }

    #[test]
    fn decode_error_frame() {
        let frame = PushFrame::decode(r#"{"type":"error","message":"boom"}"#).unwrap();
        assert_eq!(
            frame,
            PushFrame::Error {
                message: "boom".into()
            }
        );
    }

    #[test]
    fn unknown_kind_is_decode_error() {
        assert!(PushFrame::decode(r#"{"type":"resync","count":1}"#).is_err());
    }

    #[test]
    fn malformed_json_is_decode_error() {
        assert!(PushFrame::decode("not json").is_err());
    }
}
