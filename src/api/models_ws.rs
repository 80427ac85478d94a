use serde::{Deserialize, Serialize};

use crate::session::{SessionEvent, SessionView};

/// Frames a session page sends over `/ws/session`.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WsClientMessage {
    Start,
    /// Sends `content`, or the input buffer when `content` is empty.
    Message {
        #[serde(default)]
        content: String,
    },
    /// Typed text replacing the input buffer.
    Input { content: String },
    /// Interim speech recognition result.
    Transcript { content: String },
    /// Base64 camera still.
    Frame { content: String },
    Mic { enabled: bool },
    Camera { enabled: bool },
    End {
        #[serde(default)]
        confirmed: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct WsError {
    pub r#type: &'static str,
    pub content: String,
}

impl WsError {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            r#type: "error",
            content: content.into(),
        }
    }
}

/// Full session state, sent after start and device toggles.
#[derive(Debug, Serialize)]
pub struct WsSnapshot {
    pub r#type: &'static str,
    #[serde(flatten)]
    pub view: SessionView,
}

impl From<SessionView> for WsSnapshot {
    fn from(view: SessionView) -> Self {
        Self { r#type: "view", view }
    }
}

/// Direct answer to one client frame, besides the session event stream.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WsReply {
    View(WsSnapshot),
    Error(WsError),
    Event(SessionEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_client_frames() {
        let msg: WsClientMessage = serde_json::from_str(r#"{"type":"message","content":"hi"}"#).unwrap();
        assert_eq!(msg, WsClientMessage::Message { content: "hi".into() });

        let msg: WsClientMessage = serde_json::from_str(r#"{"type":"mic","enabled":false}"#).unwrap();
        assert_eq!(msg, WsClientMessage::Mic { enabled: false });

        let msg: WsClientMessage = serde_json::from_str(r#"{"type":"end"}"#).unwrap();
        assert_eq!(msg, WsClientMessage::End { confirmed: false });

        assert!(serde_json::from_str::<WsClientMessage>(r#"{"type":"dance"}"#).is_err());
    }
}
