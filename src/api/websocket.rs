use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_ws::{Closed, Message};
use futures_util::StreamExt as _;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

use crate::api::models_ws::{WsClientMessage, WsError, WsReply, WsSnapshot};
use crate::api::AppState;
use crate::auth::AuthService;
use crate::emotion::{Frame, LatestFrame};
use crate::session::{SessionDeps, SessionEvent, SessionLoop};
use crate::speech::ChannelTranscriber;

pub const END_PROMPT: &str = "Are you sure you want to end this therapy session?";

/// One connection's session plus the devices the browser feeds.
pub struct SessionChannel {
    session: SessionLoop,
    transcriber: Arc<ChannelTranscriber>,
    frames: Arc<LatestFrame>,
    auth: Arc<AuthService>,
}

impl SessionChannel {
    pub fn new(state: &AppState) -> Self {
        let transcriber = Arc::new(ChannelTranscriber::new());
        let frames = Arc::new(LatestFrame::new());
        let deps = SessionDeps {
            responder: state.responder.clone(),
            store: state.store.clone(),
            detector: state.detector.clone(),
            frames: frames.clone(),
            transcriber: transcriber.clone(),
        };
        Self {
            session: SessionLoop::new(deps, state.session.clone()),
            transcriber,
            frames,
            auth: state.auth.clone(),
        }
    }

    pub fn session(&self) -> &SessionLoop {
        &self.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    /// Applies one client frame. Anything else the client sees arrives on
    /// the event stream.
    pub async fn handle(&self, cmd: WsClientMessage) -> Option<WsReply> {
        match cmd {
            WsClientMessage::Start => {
                let Some(user) = self.auth.current_user() else {
                    return Some(WsReply::Error(WsError::new("Not signed in")));
                };
                self.session.start(&user.id);
                Some(self.view())
            }
            WsClientMessage::Message { content } => {
                // Only an absent body falls back to the input buffer
                if content.is_empty() {
                    self.session.submit();
                } else {
                    self.session.send(&content);
                }
                None
            }
            WsClientMessage::Input { content } => {
                self.session.set_input(&content);
                None
            }
            WsClientMessage::Transcript { content } => {
                self.transcriber.feed(&content);
                None
            }
            WsClientMessage::Frame { content } => match Frame::from_base64(&content) {
                Ok(frame) => {
                    self.frames.publish(frame);
                    None
                }
                Err(e) => Some(WsReply::Error(WsError::new(e.to_string()))),
            },
            WsClientMessage::Mic { enabled } => {
                self.session.set_mic(enabled);
                Some(self.view())
            }
            WsClientMessage::Camera { enabled } => {
                self.session.set_camera(enabled);
                if !enabled {
                    self.frames.clear();
                }
                Some(self.view())
            }
            WsClientMessage::End { confirmed } => {
                if !confirmed {
                    return Some(WsReply::Event(SessionEvent::Status {
                        content: END_PROMPT.to_string(),
                    }));
                }
                self.session.end(true).await;
                None
            }
        }
    }

    /// Ends a session left running by a dropped connection so its record
    /// gets an end time.
    pub async fn close(&self) {
        if self.session.is_active() {
            self.session.end(true).await;
        }
    }

    fn view(&self) -> WsReply {
        WsReply::View(WsSnapshot::from(self.session.view()))
    }
}

#[get("/ws/session")]
pub async fn ws_session(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (response, mut ws, mut msg_stream) = actix_ws::handle(&req, body)?;

    let channel = SessionChannel::new(&state);
    let mut events = channel.subscribe();

    info!("WebSocket session channel opened");

    actix_web::rt::spawn(async move {
        let mut close_reason = None;
        loop {
            tokio::select! {
                msg = msg_stream.next() => {
                    let Some(Ok(msg)) = msg else { break };
                    match msg {
                        Message::Ping(bytes) => {
                            if ws.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Text(text) => {
                            let reply = match serde_json::from_str::<WsClientMessage>(&text) {
                                Ok(cmd) => channel.handle(cmd).await,
                                Err(e) => Some(WsReply::Error(WsError::new(format!("invalid message: {}", e)))),
                            };
                            if let Some(reply) = reply {
                                if send_json(&mut ws, &reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Message::Close(reason) => {
                            close_reason = reason;
                            break;
                        }
                        _ => {}
                    }
                }
                event = events.recv() => {
                    let event = match event {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "session channel lagging, resending transcript");
                            SessionEvent::Transcript { messages: channel.session().transcript() }
                        }
                        Err(RecvError::Closed) => break,
                    };
                    if send_json(&mut ws, &event).await.is_err() {
                        break;
                    }
                }
            }
        }

        channel.close().await;
        let _ = ws.close(close_reason).await;
        info!("WebSocket session channel closed");
    });

    Ok(response)
}

async fn send_json<T: Serialize>(ws: &mut actix_ws::Session, payload: &T) -> Result<(), Closed> {
    match serde_json::to_string(payload) {
        Ok(text) => ws.text(text).await,
        Err(e) => {
            error!("Failed to encode websocket payload: {}", e);
            Ok(())
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(ws_session);
}
