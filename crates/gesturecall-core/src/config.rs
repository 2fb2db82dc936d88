use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::GestureCallError;
use crate::labels::Vocabulary;

/// Room joined when the requested room name is blank.
pub const DEFAULT_ROOM: &str = "test";

// MARK: - ClassifierConfig

/// Thresholding and label table for the gesture classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum peak probability accepted as a gesture (inclusive).
    #[serde(alias = "confidenceThreshold")]
    pub confidence_threshold: f32,
    pub labels: Vocabulary,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            labels: Vocabulary::default(),
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), GestureCallError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(GestureCallError::invalid_config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        Ok(())
    }
}

// MARK: - BroadcastPolicy

/// When the local label is pushed to the other participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastPolicy {
    /// Only when the label differs from the last one sent.
    #[default]
    #[serde(alias = "onChange")]
    OnChange,
    /// After every processed frame.
    #[serde(alias = "everyFrame")]
    EveryFrame,
}

// MARK: - SessionConfig

/// Call session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub room: String,
    #[serde(alias = "displayName")]
    pub display_name: Option<String>,
    /// Minimum spacing between frames handed to the classifier.
    #[serde(alias = "predictionIntervalMs")]
    pub prediction_interval_ms: u64,
    pub broadcast: BroadcastPolicy,
    #[serde(alias = "joinTimeoutMs")]
    pub join_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room: DEFAULT_ROOM.to_owned(),
            display_name: None,
            prediction_interval_ms: 500,
            broadcast: BroadcastPolicy::OnChange,
            join_timeout_ms: 10_000,
        }
    }
}

impl SessionConfig {
    /// Room name with surrounding whitespace removed, or [`DEFAULT_ROOM`].
    pub fn room_name(&self) -> String {
        match self.room.trim() {
            "" => {
                debug!("Blank room name, using '{}'", DEFAULT_ROOM);
                DEFAULT_ROOM.to_owned()
            }
            room => room.to_owned(),
        }
    }

    pub fn prediction_interval(&self) -> Duration {
        Duration::from_millis(self.prediction_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), GestureCallError> {
        if self.join_timeout_ms == 0 {
            return Err(GestureCallError::invalid_config("join_timeout_ms must be non-zero"));
        }
        Ok(())
    }
}

// MARK: - DetectorConfig

/// Options handed to the external hand-landmark detector and camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    #[serde(alias = "maxNumHands")]
    pub max_num_hands: u8,
    #[serde(alias = "modelComplexity")]
    pub model_complexity: u8,
    #[serde(alias = "minDetectionConfidence")]
    pub min_detection_confidence: f32,
    #[serde(alias = "minTrackingConfidence")]
    pub min_tracking_confidence: f32,
    #[serde(alias = "captureWidth")]
    pub capture_width: u32,
    #[serde(alias = "captureHeight")]
    pub capture_height: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_num_hands: 2,
            model_complexity: 1,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
            capture_width: 640,
            capture_height: 480,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), GestureCallError> {
        if !(1..=crate::types::MAX_HANDS as u8).contains(&self.max_num_hands) {
            return Err(GestureCallError::invalid_config(format!(
                "max_num_hands must be 1 or 2, got {}",
                self.max_num_hands
            )));
        }
        if self.model_complexity > 1 {
            return Err(GestureCallError::invalid_config(format!(
                "model_complexity must be 0 or 1, got {}",
                self.model_complexity
            )));
        }
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GestureCallError::invalid_config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(GestureCallError::invalid_config("capture size must be non-zero"));
        }
        Ok(())
    }
}

// MARK: - GestureCallConfig

/// Complete configuration, as read from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureCallConfig {
    pub classifier: ClassifierConfig,
    pub session: SessionConfig,
    pub detector: DetectorConfig,
}

impl GestureCallConfig {
    pub fn from_json(json: &str) -> Result<Self, GestureCallError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GestureCallError::invalid_config(e.to_string()))?;
        config.validate()?;
        debug!(
            "Config loaded: threshold={} labels={} room='{}'",
            config.classifier.confidence_threshold,
            config.classifier.labels.len(),
            config.session.room_name()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GestureCallError> {
        self.classifier.validate()?;
        self.session.validate()?;
        self.detector.validate()
    }
}
