use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::FrameError;

/// Landmarks the detector reports per hand.
pub const LANDMARKS_PER_HAND: usize = 21;

/// Hand slots considered per frame. Extra detections are ignored.
pub const MAX_HANDS: usize = 2;

// MARK: - Landmark

/// A single hand keypoint in camera-normalised coordinates [0.0, 1.0].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

// MARK: - Hand

/// One detected hand: exactly 21 landmarks in detector order (wrist first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Landmark>", into = "Vec<Landmark>")]
pub struct Hand {
    landmarks: [Landmark; LANDMARKS_PER_HAND],
}

impl Hand {
    pub fn new(landmarks: [Landmark; LANDMARKS_PER_HAND]) -> Self {
        Self { landmarks }
    }

    pub fn landmarks(&self) -> &[Landmark; LANDMARKS_PER_HAND] {
        &self.landmarks
    }
}

impl TryFrom<Vec<Landmark>> for Hand {
    type Error = FrameError;

    fn try_from(points: Vec<Landmark>) -> Result<Self, Self::Error> {
        let count = points.len();
        let landmarks: [Landmark; LANDMARKS_PER_HAND] = points
            .try_into()
            .map_err(|_| FrameError::InvalidHand { count })?;
        Ok(Self { landmarks })
    }
}

impl From<Hand> for Vec<Landmark> {
    fn from(hand: Hand) -> Self {
        hand.landmarks.to_vec()
    }
}

// MARK: - LandmarkFrame

/// Detector output for one sampled camera frame.
///
/// Mirrors the detector's `multiHandLandmarks` result. Not retained after
/// classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    #[serde(
        rename = "multiHandLandmarks",
        alias = "multi_hand_landmarks",
        alias = "hands",
        default
    )]
    hands: Vec<Hand>,
}

impl LandmarkFrame {
    pub fn new(hands: Vec<Hand>) -> Self {
        Self { hands }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Detected hands, capped at [`MAX_HANDS`].
    pub fn hands(&self) -> &[Hand] {
        &self.hands[..self.hands.len().min(MAX_HANDS)]
    }

    pub fn hand_count(&self) -> usize {
        self.hands().len()
    }
}

// MARK: - ParticipantId

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for the local participant.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// MARK: - Participant

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    #[serde(alias = "displayName")]
    pub name: String,
}

impl Participant {
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(n: usize) -> Vec<serde_json::Value> {
        (0..n)
            .map(|i| serde_json::json!({"x": i as f32 / 100.0, "y": 0.5, "z": -0.01}))
            .collect()
    }

    #[test]
    fn deserializes_detector_result() {
        let json = serde_json::json!({ "multiHandLandmarks": [points(21), points(21)] });
        let frame: LandmarkFrame = serde_json::from_value(json).expect("valid frame");
        assert_eq!(frame.hand_count(), 2);
        assert_eq!(frame.hands()[0].landmarks()[3].x, 0.03);
    }

    #[test]
    fn missing_hands_field_is_empty_frame() {
        let frame: LandmarkFrame = serde_json::from_str("{}").expect("valid empty frame");
        assert_eq!(frame.hand_count(), 0);
    }

    #[test]
    fn rejects_hand_with_wrong_landmark_count() {
        let json = serde_json::json!({ "multiHandLandmarks": [points(20)] });
        let err = serde_json::from_value::<LandmarkFrame>(json).unwrap_err();
        assert!(err.to_string().contains("exactly 21 landmarks"), "{err}");
    }

    #[test]
    fn caps_hands_at_two() {
        let hand = Hand::new([Landmark::new(0.1, 0.2, 0.3); LANDMARKS_PER_HAND]);
        let frame = LandmarkFrame::new(vec![hand.clone(), hand.clone(), hand]);
        assert_eq!(frame.hand_count(), MAX_HANDS);
    }

    #[test]
    fn generated_participant_ids_differ() {
        assert_ne!(ParticipantId::generate(), ParticipantId::generate());
    }
}
