//! Interactive therapy sessions.

pub mod runner;

pub use runner::{PendingReply, ReplyOutcome, SessionDeps, SessionLoop};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::emotion::EmotionSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => f.write_str("user"),
            Sender::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// `"sender: text"`, the form stored in transcripts and sent as context.
    pub fn render(&self) -> String {
        format!("{}: {}", self.sender, self.text)
    }
}

/// Changes pushed to whoever is displaying the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionEvent {
    Transcript { messages: Vec<Message> },
    Emotion { label: String, confidence: u8 },
    Input { content: String },
    Status { content: String },
}

impl From<EmotionSample> for SessionEvent {
    fn from(sample: EmotionSample) -> Self {
        SessionEvent::Emotion {
            label: sample.label,
            confidence: sample.confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: Option<Uuid>,
    pub active: bool,
    pub transcript: Vec<Message>,
    pub emotion: Option<EmotionSample>,
    pub input: String,
    pub camera_on: bool,
    pub mic_on: bool,
}
