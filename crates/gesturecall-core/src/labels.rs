//! Gesture label vocabulary.
//!
//! Index order matches the classification model's output order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::GestureCallError;

/// Text shown (and sent) when no gesture passes the confidence threshold.
pub const NO_GESTURE: &str = "No gesture";

/// Vocabulary the bundled sign model was trained on.
pub const DEFAULT_LABELS: [&str; 22] = [
    "1L", "1R", "2L", "2R", "3L", "3R",
    "4L", "4R", "5R", "6L", "6R", "7L", "7R",
    "8L", "8R", "9L", "9R", "A", "B", "C", "D", "L",
];

// MARK: - GestureLabel

/// Per-frame classification outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GestureLabel {
    /// A symbol from the vocabulary.
    Sign(String),
    NoGesture,
}

impl GestureLabel {
    pub fn sign(label: impl Into<String>) -> Self {
        Self::Sign(label.into())
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::Sign(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Sign(label) => label,
            Self::NoGesture => NO_GESTURE,
        }
    }
}

impl Default for GestureLabel {
    fn default() -> Self {
        Self::NoGesture
    }
}

impl From<String> for GestureLabel {
    fn from(label: String) -> Self {
        if label == NO_GESTURE {
            Self::NoGesture
        } else {
            Self::Sign(label)
        }
    }
}

impl From<GestureLabel> for String {
    fn from(label: GestureLabel) -> Self {
        match label {
            GestureLabel::Sign(label) => label,
            GestureLabel::NoGesture => NO_GESTURE.to_owned(),
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// MARK: - Vocabulary

/// Closed, ordered label table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    labels: Vec<String>,
}

impl Vocabulary {
    pub fn new(labels: Vec<String>) -> Result<Self, GestureCallError> {
        if labels.is_empty() {
            return Err(GestureCallError::invalid_config("label vocabulary is empty"));
        }
        for (i, label) in labels.iter().enumerate() {
            if label.is_empty() || label == NO_GESTURE {
                return Err(GestureCallError::invalid_config(format!(
                    "label #{i} {label:?} is reserved or empty"
                )));
            }
            if labels[..i].contains(label) {
                return Err(GestureCallError::invalid_config(format!(
                    "duplicate label {label:?}"
                )));
            }
        }
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label at model output index `index`.
    pub fn label(&self, index: usize) -> Option<GestureLabel> {
        self.labels.get(index).map(|l| GestureLabel::Sign(l.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|l| (*l).to_owned()).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for Vocabulary {
    type Error = GestureCallError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(labels)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.labels
    }
}
