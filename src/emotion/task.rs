use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{EmotionDetector, EmotionSample, FrameSource};

pub type SampleSink = Arc<dyn Fn(EmotionSample) + Send + Sync>;

/// Runs one detection per tick until `cancel` fires. Each sample is handed to
/// `sink` as-is, so the latest tick always wins.
pub fn spawn_detection(
    session_id: Uuid,
    detector: Arc<dyn EmotionDetector>,
    frames: Arc<dyn FrameSource>,
    interval: Duration,
    cancel: CancellationToken,
    sink: SampleSink,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // A slow detector delays the next tick rather than bursting to catch up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%session_id, "detection loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(frame) = frames.latest() else {
                        continue;
                    };

                    let result = tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = detector.detect(&frame) => result,
                    };

                    match result {
                        Ok(Some(sample)) => sink(sample),
                        Ok(None) => {}
                        Err(e) => warn!(%session_id, "emotion detection failed: {}", e),
                    }
                }
            }
        }
    })
}
