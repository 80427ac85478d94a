pub mod middleware;
pub mod models;
pub mod models_ws;
pub mod routes;
pub mod websocket;

use std::sync::{Arc, Mutex};

use crate::auth::AuthService;
use crate::config::SessionConfig;
use crate::emotion::EmotionDetector;
use crate::profile::ProfileEditor;
use crate::responder::ResponseGenerator;
use crate::store::SessionStore;

/// Shared by every request handler.
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub store: Arc<dyn SessionStore>,
    pub responder: Arc<dyn ResponseGenerator>,
    pub detector: Option<Arc<dyn EmotionDetector>>,
    pub session: SessionConfig,
    /// Profile editor of the signed-in user, loaded on first use.
    pub profile: Mutex<Option<ProfileEditor>>,
}

impl AppState {
    pub fn new(
        auth: Arc<AuthService>,
        store: Arc<dyn SessionStore>,
        responder: Arc<dyn ResponseGenerator>,
        detector: Option<Arc<dyn EmotionDetector>>,
        session: SessionConfig,
    ) -> Self {
        Self {
            auth,
            store,
            responder,
            detector,
            session,
            profile: Mutex::new(None),
        }
    }
}
