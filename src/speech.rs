//! Speech-to-text plumbing.
//!
//! Recognition happens on the client; the server only sees the interim
//! transcript it produces. A [`Transcriber`] exposes that text as a watch
//! channel plus start/stop/reset controls.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::debug;

use crate::emotion::DeviceError;

pub trait Transcriber: Send + Sync {
    fn start(&self) -> Result<(), DeviceError>;
    fn stop(&self) -> Result<(), DeviceError>;
    /// Clears the in-progress transcript.
    fn reset(&self);
    fn is_listening(&self) -> bool;
    fn subscribe(&self) -> watch::Receiver<String>;
}

/// Transcriber fed by an outside recognizer, such as a browser pushing
/// interim results over the session socket.
pub struct ChannelTranscriber {
    text: watch::Sender<String>,
    listening: AtomicBool,
}

impl Default for ChannelTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTranscriber {
    pub fn new() -> Self {
        let (text, _) = watch::channel(String::new());
        Self {
            text,
            listening: AtomicBool::new(false),
        }
    }

    /// Publishes interim text. Dropped while not listening.
    pub fn feed(&self, interim: &str) -> bool {
        if !self.is_listening() {
            debug!("ignoring transcript while stopped");
            return false;
        }
        self.text.send_replace(interim.to_string());
        true
    }
}

impl Transcriber for ChannelTranscriber {
    fn start(&self) -> Result<(), DeviceError> {
        self.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), DeviceError> {
        self.listening.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn reset(&self) {
        self.text.send_replace(String::new());
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> watch::Receiver<String> {
        self.text.subscribe()
    }
}
