use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::{dominant_expression, EmotionSample};

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device unavailable: {0}")]
    Unavailable(String),
    #[error("detector failure: {0}")]
    Detector(String),
}

/// An encoded still image captured from the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(pub Vec<u8>);

impl Frame {
    pub fn from_base64(data: &str) -> Result<Self, DeviceError> {
        // Accept data URLs as produced by canvas.toDataURL()
        let payload = match data.split_once(";base64,") {
            Some((_, rest)) => rest,
            None => data,
        };
        STANDARD
            .decode(payload.trim())
            .map(Frame)
            .map_err(|e| DeviceError::Detector(format!("bad frame encoding: {}", e)))
    }
}

#[async_trait]
pub trait EmotionDetector: Send + Sync {
    /// `Ok(None)` means no face was found in the frame.
    async fn detect(&self, frame: &Frame) -> Result<Option<EmotionSample>, DeviceError>;
}

pub trait FrameSource: Send + Sync {
    fn latest(&self) -> Option<Frame>;
}

/// Frame slot overwritten by whoever owns the camera.
#[derive(Default, Clone)]
pub struct LatestFrame {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Frame) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(frame);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

impl FrameSource for LatestFrame {
    fn latest(&self) -> Option<Frame> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    #[serde(default, deserialize_with = "ordered_scores")]
    expressions: Option<Vec<(String, f64)>>,
}

/// Reads the score object as pairs in the order the detector sent them.
fn ordered_scores<'de, D>(deserializer: D) -> Result<Option<Vec<(String, f64)>>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ScoresVisitor;

    impl<'de> Visitor<'de> for ScoresVisitor {
        type Value = Option<Vec<(String, f64)>>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of expression scores or null")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
            deserializer.deserialize_map(self)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut scores = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, f64>()? {
                scores.push(entry);
            }
            Ok(Some(scores))
        }
    }

    deserializer.deserialize_option(ScoresVisitor)
}

/// Posts frames to a face-analysis service that answers with per-expression
/// scores, e.g. `{"expressions": {"happy": 0.91, "neutral": 0.07}}`.
pub struct HttpEmotionDetector {
    client: Client,
    url: String,
}

impl HttpEmotionDetector {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

fn sample_from_response(body: DetectionResponse) -> Option<EmotionSample> {
    let expressions = body.expressions?;
    dominant_expression(expressions.iter().map(|(label, score)| (label.as_str(), *score)))
}

#[async_trait]
impl EmotionDetector for HttpEmotionDetector {
    async fn detect(&self, frame: &Frame) -> Result<Option<EmotionSample>, DeviceError> {
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "image/jpeg")
            .body(frame.0.clone())
            .send()
            .await
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DeviceError::Detector(format!("detector returned {}", response.status())));
        }

        let body: DetectionResponse = response
            .json()
            .await
            .map_err(|e| DeviceError::Detector(e.to_string()))?;

        Ok(sample_from_response(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_and_data_url_frames() {
        let encoded = STANDARD.encode([1u8, 2, 3]);
        assert_eq!(Frame::from_base64(&encoded).unwrap(), Frame(vec![1, 2, 3]));

        let data_url = format!("data:image/jpeg;base64,{}", encoded);
        assert_eq!(Frame::from_base64(&data_url).unwrap(), Frame(vec![1, 2, 3]));

        assert!(Frame::from_base64("not base64 !!").is_err());
    }

    #[test]
    fn latest_frame_overwrites() {
        let frames = LatestFrame::new();
        assert!(frames.latest().is_none());
        frames.publish(Frame(vec![1]));
        frames.publish(Frame(vec![2]));
        assert_eq!(frames.latest(), Some(Frame(vec![2])));
        frames.clear();
        assert!(frames.latest().is_none());
    }

    #[test]
    fn response_without_face_has_no_sample() {
        let body: DetectionResponse = serde_json::from_str(r#"{"expressions": null}"#).unwrap();
        assert!(sample_from_response(body).is_none());

        let body: DetectionResponse =
            serde_json::from_str(r#"{"expressions": {"happy": 0.3, "sad": 0.64}}"#).unwrap();
        let sample = sample_from_response(body).unwrap();
        assert_eq!(sample.label, "sad");
        assert_eq!(sample.confidence, 64);
    }

    #[test]
    fn tied_scores_follow_detector_order() {
        let body: DetectionResponse =
            serde_json::from_str(r#"{"expressions": {"sad": 0.5, "angry": 0.5, "happy": 0.1}}"#).unwrap();
        assert_eq!(sample_from_response(body).unwrap().label, "angry");

        let body: DetectionResponse =
            serde_json::from_str(r#"{"expressions": {"surprised": 0.5, "fearful": 0.5}}"#).unwrap();
        assert_eq!(sample_from_response(body).unwrap().label, "fearful");

        let body: DetectionResponse = serde_json::from_str("{}").unwrap();
        assert!(body.expressions.is_none());
    }
}
