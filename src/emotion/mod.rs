//! Facial emotion detection.
//!
//! Detection itself is delegated to an external face-analysis model; this
//! module owns the reduction of its expression scores to a single sample,
//! the display metadata for a label, and the fixed-rate detection task
//! that feeds a running session.

pub mod detector;
pub mod task;

pub use detector::{DeviceError, EmotionDetector, Frame, FrameSource, HttpEmotionDetector, LatestFrame};
pub use task::spawn_detection;

use serde::{Deserialize, Serialize};

/// One detection result. Replaced on every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionSample {
    pub label: String,
    /// 0..=100
    pub confidence: u8,
}

/// Picks the highest-scoring expression. Scores are probabilities in [0, 1].
/// On a tie the later expression wins.
pub fn dominant_expression<'a, I>(scores: I) -> Option<EmotionSample>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    scores
        .into_iter()
        .filter(|(_, score)| score.is_finite())
        .fold(None::<(&str, f64)>, |best, (label, score)| match best {
            Some((_, top)) if top > score => best,
            _ => Some((label, score)),
        })
        .map(|(label, score)| EmotionSample {
            label: label.to_string(),
            confidence: (score.clamp(0.0, 1.0) * 100.0).round() as u8,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Indicator {
    pub icon: &'static str,
    pub color: &'static str,
}

pub fn indicator(label: &str) -> Indicator {
    let (icon, color) = match label.to_lowercase().as_str() {
        "happy" => ("😊", "yellow"),
        "sad" => ("😢", "blue"),
        "angry" => ("😠", "red"),
        "surprised" => ("😮", "purple"),
        "fearful" => ("😨", "orange"),
        "neutral" => ("😐", "gray"),
        _ => ("❓", "gray"),
    };
    Indicator { icon, color }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_picks_max_and_rounds() {
        let sample = dominant_expression([("neutral", 0.2), ("happy", 0.876), ("sad", 0.1)]).unwrap();
        assert_eq!(sample.label, "happy");
        assert_eq!(sample.confidence, 88);
    }

    #[test]
    fn ties_go_to_the_later_expression() {
        let sample = dominant_expression([("sad", 0.5), ("angry", 0.5)]).unwrap();
        assert_eq!(sample.label, "angry");

        let sample = dominant_expression([("happy", 0.4), ("sad", 0.4), ("neutral", 0.1)]).unwrap();
        assert_eq!(sample.label, "sad");
    }

    #[test]
    fn no_scores_no_sample() {
        assert!(dominant_expression(Vec::<(&str, f64)>::new()).is_none());
        assert!(dominant_expression([("happy", f64::NAN)]).is_none());
    }

    #[test]
    fn indicator_is_case_insensitive_with_fallback() {
        assert_eq!(indicator("Happy").icon, "😊");
        assert_eq!(indicator("fearful").color, "orange");
        assert_eq!(indicator("disgusted"), Indicator { icon: "❓", color: "gray" });
    }
}
