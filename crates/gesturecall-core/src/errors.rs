use thiserror::Error;

#[derive(Error, Debug)]
pub enum GestureCallError {
    #[error("Configuration invalid: {reason}")]
    ConfigurationInvalid { reason: String },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GestureCallError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::ConfigurationInvalid { reason: reason.into() }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Hand must have exactly 21 landmarks, got {count}")]
    InvalidHand { count: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Failed to load model: {reason}")]
    LoadFailed { reason: String },

    #[error("Inference failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("Model returned {actual} probabilities, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Join rejected by room: {reason}")]
    JoinRejected { reason: String },

    #[error("Send failed: {reason}")]
    SendFailed { reason: String },

    #[error("Message too large: {len} bytes (max {max})")]
    MessageTooLarge { len: usize, max: usize },

    #[error("Timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
