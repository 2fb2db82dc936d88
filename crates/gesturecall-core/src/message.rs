//! Gesture message exchanged between call participants.

use serde::{Deserialize, Serialize};

use crate::labels::GestureLabel;

/// Payload sent over the room's reliable, ordered data channel.
///
/// Wire form: `{"type":"gesture","gesture":"A"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureMessage {
    Gesture { gesture: GestureLabel },
}

impl GestureMessage {
    pub fn gesture(label: GestureLabel) -> Self {
        Self::Gesture { gesture: label }
    }

    pub fn label(&self) -> &GestureLabel {
        match self {
            Self::Gesture { gesture } => gesture,
        }
    }
}
