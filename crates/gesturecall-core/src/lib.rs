pub mod config;
pub mod errors;
pub mod labels;
pub mod message;
pub mod types;

pub use config::{BroadcastPolicy, ClassifierConfig, DetectorConfig, GestureCallConfig, SessionConfig};
pub use errors::{FrameError, GestureCallError, ModelError, TransportError};
pub use labels::{GestureLabel, Vocabulary, DEFAULT_LABELS, NO_GESTURE};
pub use message::GestureMessage;
pub use types::*;
