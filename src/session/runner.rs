use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Message, Sender, SessionEvent, SessionView};
use crate::config::SessionConfig;
use crate::db::SessionRecord;
use crate::emotion::{spawn_detection, EmotionDetector, EmotionSample, FrameSource};
use crate::responder::ResponseGenerator;
use crate::speech::Transcriber;
use crate::store::SessionStore;

/// External collaborators of a session.
#[derive(Clone)]
pub struct SessionDeps {
    pub responder: Arc<dyn ResponseGenerator>,
    pub store: Arc<dyn SessionStore>,
    /// `None` disables emotion detection entirely.
    pub detector: Option<Arc<dyn EmotionDetector>>,
    pub frames: Arc<dyn FrameSource>,
    pub transcriber: Arc<dyn Transcriber>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Applied(Message),
    /// A newer reply was applied first, or the session ended meanwhile.
    Stale,
    /// Generation failed; logged and dropped.
    Failed,
}

/// A reply request in flight. The user message is already in the transcript.
pub struct PendingReply {
    pub seq: u64,
    pub message: Message,
    handle: JoinHandle<ReplyOutcome>,
}

impl PendingReply {
    pub async fn outcome(self) -> ReplyOutcome {
        self.handle.await.unwrap_or(ReplyOutcome::Failed)
    }
}

struct Active {
    id: Uuid,
    user_id: String,
    started_at: DateTime<Utc>,
    next_seq: u64,
    last_applied: u64,
    detection: Option<CancellationToken>,
    speech: Option<CancellationToken>,
}

#[derive(Default)]
struct LoopState {
    active: Option<Active>,
    transcript: Vec<Message>,
    input: String,
    emotion: Option<EmotionSample>,
    /// Distinct labels seen this session, in order of first detection.
    emotions_seen: Vec<String>,
    camera_on: bool,
    mic_on: bool,
}

impl LoopState {
    fn is_current(&self, session_id: Uuid) -> bool {
        self.active.as_ref().map(|a| a.id) == Some(session_id)
    }

    fn record(&self) -> Option<SessionRecord> {
        let active = self.active.as_ref()?;
        Some(SessionRecord {
            id: active.id,
            user_id: active.user_id.clone(),
            start_time: active.started_at,
            end_time: None,
            emotions: self.emotions_seen.clone(),
            transcript: self.transcript.iter().map(Message::render).collect(),
            summary: None,
        })
    }
}

/// Which session's record already exists in the store. Locked around every
/// save so snapshots reach the store in the order they were taken.
#[derive(Default)]
struct Persisted {
    session_id: Option<Uuid>,
}

/// Drives one session at a time: greeting, detection, speech merge, reply
/// exchange, persistence and teardown.
pub struct SessionLoop {
    deps: SessionDeps,
    config: SessionConfig,
    state: Arc<Mutex<LoopState>>,
    persisted: Arc<tokio::sync::Mutex<Persisted>>,
    events: broadcast::Sender<SessionEvent>,
}

fn lock(state: &Mutex<LoopState>) -> MutexGuard<'_, LoopState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionLoop {
    pub fn new(deps: SessionDeps, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        let state = LoopState {
            camera_on: config.camera_enabled,
            mic_on: config.mic_enabled,
            ..Default::default()
        };
        Self {
            deps,
            config,
            state: Arc::new(Mutex::new(state)),
            persisted: Arc::new(tokio::sync::Mutex::new(Persisted::default())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn view(&self) -> SessionView {
        let state = lock(&self.state);
        SessionView {
            session_id: state.active.as_ref().map(|a| a.id),
            active: state.active.is_some(),
            transcript: state.transcript.clone(),
            emotion: state.emotion.clone(),
            input: state.input.clone(),
            camera_on: state.camera_on,
            mic_on: state.mic_on,
        }
    }

    pub fn transcript(&self) -> Vec<Message> {
        lock(&self.state).transcript.clone()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).active.is_some()
    }

    pub fn set_input(&self, text: &str) {
        lock(&self.state).input = text.to_string();
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn emit_transcript(&self, state: &LoopState) {
        self.emit(SessionEvent::Transcript {
            messages: state.transcript.clone(),
        });
    }

    /// Begins a session for `user_id`. Returns the running session's id if one
    /// is already active.
    pub fn start(&self, user_id: &str) -> Uuid {
        let mut state = lock(&self.state);
        if let Some(active) = &state.active {
            return active.id;
        }

        let id = Uuid::new_v4();
        state.active = Some(Active {
            id,
            user_id: user_id.to_string(),
            started_at: Utc::now(),
            next_seq: 0,
            last_applied: 0,
            detection: None,
            speech: None,
        });
        state.transcript = vec![Message::new(Sender::Assistant, self.config.greeting.clone())];
        state.input.clear();
        state.emotion = None;
        state.emotions_seen.clear();
        info!(session_id = %id, user_id, "session started");

        if state.mic_on {
            self.start_listening(&mut state);
        }
        if state.camera_on {
            self.start_detection(&mut state);
        }
        self.emit_transcript(&state);
        id
    }

    fn start_listening(&self, state: &mut LoopState) {
        let Some(active) = state.active.as_mut() else {
            return;
        };
        if active.speech.is_some() {
            return;
        }
        if let Err(e) = self.deps.transcriber.start() {
            warn!(session_id = %active.id, "speech transcription unavailable: {}", e);
            return;
        }

        let cancel = CancellationToken::new();
        active.speech = Some(cancel.clone());

        let session_id = active.id;
        let mut rx = self.deps.transcriber.subscribe();
        let shared = self.state.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let text = rx.borrow_and_update().clone();
                        if text.is_empty() {
                            continue;
                        }
                        let mut state = lock(&shared);
                        if !state.is_current(session_id) {
                            break;
                        }
                        state.input = text.clone();
                        let _ = events.send(SessionEvent::Input { content: text });
                    }
                }
            }
            debug!(%session_id, "speech merge stopped");
        });
    }

    fn stop_listening(&self, state: &mut LoopState) {
        if let Some(cancel) = state.active.as_mut().and_then(|a| a.speech.take()) {
            cancel.cancel();
        }
        if let Err(e) = self.deps.transcriber.stop() {
            warn!("failed to stop speech transcription: {}", e);
        }
    }

    fn start_detection(&self, state: &mut LoopState) {
        let Some(detector) = self.deps.detector.clone() else {
            return;
        };
        let Some(active) = state.active.as_mut() else {
            return;
        };
        if active.detection.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        active.detection = Some(cancel.clone());

        let session_id = active.id;
        let shared = self.state.clone();
        let events = self.events.clone();
        spawn_detection(
            session_id,
            detector,
            self.deps.frames.clone(),
            Duration::from_millis(self.config.detection_interval_ms.max(1)),
            cancel,
            Arc::new(move |sample: EmotionSample| {
                let mut state = lock(&shared);
                if !state.is_current(session_id) || !state.camera_on {
                    return;
                }
                if !state.emotions_seen.contains(&sample.label) {
                    state.emotions_seen.push(sample.label.clone());
                }
                state.emotion = Some(sample.clone());
                let _ = events.send(sample.into());
            }),
        );
    }

    fn stop_detection(&self, state: &mut LoopState) {
        if let Some(cancel) = state.active.as_mut().and_then(|a| a.detection.take()) {
            cancel.cancel();
        }
    }

    /// Turning the microphone back on resumes listening; the transcript is
    /// left untouched either way.
    pub fn set_mic(&self, on: bool) {
        let mut state = lock(&self.state);
        state.mic_on = on;
        if state.active.is_none() {
            return;
        }
        if on {
            self.start_listening(&mut state);
        } else {
            self.stop_listening(&mut state);
        }
    }

    pub fn set_camera(&self, on: bool) {
        let mut state = lock(&self.state);
        state.camera_on = on;
        if state.active.is_none() {
            return;
        }
        if on {
            self.start_detection(&mut state);
        } else {
            self.stop_detection(&mut state);
        }
    }

    /// Sends whatever is in the input buffer.
    pub fn submit(&self) -> Option<PendingReply> {
        let text = lock(&self.state).input.clone();
        self.send(&text)
    }

    /// Appends the user message right away and requests a reply in the
    /// background. Blank text, or no active session, is a no-op.
    pub fn send(&self, text: &str) -> Option<PendingReply> {
        if text.trim().is_empty() {
            return None;
        }

        let mut state = lock(&self.state);
        let window = self.config.history_window;
        let history: Vec<String> = state
            .transcript
            .iter()
            .skip(state.transcript.len().saturating_sub(window))
            .map(Message::render)
            .collect();
        let emotion = state.emotion.as_ref().map(|e| e.label.clone());

        let active = state.active.as_mut()?;
        active.next_seq += 1;
        let seq = active.next_seq;
        let session_id = active.id;

        let message = Message::new(Sender::User, text);
        state.transcript.push(message.clone());
        state.input.clear();
        self.deps.transcriber.reset();
        self.emit_transcript(&state);
        drop(state);

        debug!(%session_id, seq, "requesting reply");
        let task = ReplyTask {
            session_id,
            seq,
            text: text.to_string(),
            emotion,
            history,
            deps: self.deps.clone(),
            state: self.state.clone(),
            persisted: self.persisted.clone(),
            events: self.events.clone(),
        };
        let handle = tokio::spawn(task.run());

        Some(PendingReply { seq, message, handle })
    }

    /// Ends the session once the user has confirmed. Writes the terminal
    /// record, then clears transcript and emotion state. Returns the final
    /// record when one was written.
    pub async fn end(&self, confirmed: bool) -> Option<SessionRecord> {
        if !confirmed {
            return None;
        }

        // Taken first so no in-flight save can land after the terminal one
        let mut persisted = self.persisted.lock().await;

        let final_record = {
            let mut state = lock(&self.state);
            state.active.as_ref()?;
            self.stop_detection(&mut state);
            self.stop_listening(&mut state);

            let has_exchange = state.transcript.iter().any(|m| m.sender == Sender::User);
            let record = state.record().map(|mut r| {
                r.end_time = Some(Utc::now());
                r
            });

            let id = state.active.take().map(|a| a.id);
            state.transcript.clear();
            state.input.clear();
            state.emotion = None;
            state.emotions_seen.clear();
            self.emit_transcript(&state);
            self.emit(SessionEvent::Status {
                content: "ended".to_string(),
            });
            info!(session_id = ?id, "session ended");

            record.filter(|_| has_exchange)
        };

        store_record(&self.deps, &mut persisted, final_record?).await
    }
}

struct ReplyTask {
    session_id: Uuid,
    seq: u64,
    text: String,
    emotion: Option<String>,
    history: Vec<String>,
    deps: SessionDeps,
    state: Arc<Mutex<LoopState>>,
    persisted: Arc<tokio::sync::Mutex<Persisted>>,
    events: broadcast::Sender<SessionEvent>,
}

impl ReplyTask {
    async fn run(self) -> ReplyOutcome {
        let session_id = self.session_id;
        let reply = match self
            .deps
            .responder
            .generate(&self.text, self.emotion.as_deref(), &self.history)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(%session_id, seq = self.seq, "Error generating response: {}", e);
                return ReplyOutcome::Failed;
            }
        };

        let message = {
            let mut state = lock(&self.state);
            let Some(active) = state.active.as_mut().filter(|a| a.id == session_id) else {
                debug!(%session_id, seq = self.seq, "session gone, dropping reply");
                return ReplyOutcome::Stale;
            };
            if self.seq <= active.last_applied {
                warn!(%session_id, seq = self.seq, latest = active.last_applied, "discarding stale reply");
                return ReplyOutcome::Stale;
            }
            active.last_applied = self.seq;

            let message = Message::new(Sender::Assistant, reply);
            state.transcript.push(message.clone());
            let _ = self.events.send(SessionEvent::Transcript {
                messages: state.transcript.clone(),
            });
            message
        };

        save_latest(&self.deps, &self.persisted, &self.state, session_id).await;
        ReplyOutcome::Applied(message)
    }
}

/// Saves the transcript as it stands once the store is free, unless the
/// session has ended in the meantime.
async fn save_latest(
    deps: &SessionDeps,
    persisted: &tokio::sync::Mutex<Persisted>,
    state: &Mutex<LoopState>,
    session_id: Uuid,
) -> Option<SessionRecord> {
    let mut persisted = persisted.lock().await;
    let record = {
        let state = lock(state);
        if !state.is_current(session_id) {
            return None;
        }
        state.record()?
    };
    store_record(deps, &mut persisted, record).await
}

/// Inserts the first record for a session and updates it afterwards.
/// Failures are logged, never retried.
async fn store_record(
    deps: &SessionDeps,
    persisted: &mut Persisted,
    record: SessionRecord,
) -> Option<SessionRecord> {
    let session_id = record.id;

    let result = if persisted.session_id == Some(session_id) {
        deps.store.update(&record).await
    } else {
        deps.store.insert(&record).await
    };

    match result {
        Ok(stored) => {
            persisted.session_id = Some(session_id);
            debug!(%session_id, lines = stored.transcript.len(), "session saved");
            Some(stored)
        }
        Err(e) => {
            error!(%session_id, "Error saving session: {}", e);
            None
        }
    }
}
