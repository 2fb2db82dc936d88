use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use gesturecall_classifier::GestureModel;
use gesturecall_core::{GestureLabel, LandmarkFrame, ModelError};
use gesturecall_transport::RoomEvent;

/// Everything the session event loop reacts to.
pub enum SessionEvent {
    /// Detector output for one camera frame, stamped on arrival.
    Frame { frame: LandmarkFrame, at: Instant },
    /// Leave the call.
    Leave,
    /// Background model load finished.
    ModelLoaded(Result<Arc<dyn GestureModel>, ModelError>),
    /// Background inference for frame `seq` finished.
    Inference { seq: u64, result: Result<GestureLabel, ModelError> },
    Room(RoomEvent),
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame { frame, .. } => write!(f, "Frame({} hands)", frame.hand_count()),
            Self::Leave => write!(f, "Leave"),
            Self::ModelLoaded(Ok(_)) => write!(f, "ModelLoaded(ok)"),
            Self::ModelLoaded(Err(e)) => write!(f, "ModelLoaded({e})"),
            Self::Inference { seq, result } => write!(f, "Inference(#{seq}, {result:?})"),
            Self::Room(event) => write!(f, "Room({event:?})"),
        }
    }
}
