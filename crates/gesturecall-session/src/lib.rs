//! gesturecall-session: one call, one event loop.
//!
//! ```text
//! detector ──Frame──►┐
//! caller ────Leave──►│
//! model task ────────┤──► CallSession::run ──► CallView (labels, status)
//! inference tasks ───┤                     └─► MessageChannel (broadcast)
//! room ──RoomEvent──►┘
//! ```

mod events;
mod participants;
mod session;
mod throttle;
mod view;

pub use events::SessionEvent;
pub use participants::{ParticipantEntry, ParticipantSet};
pub use session::{CallSession, SessionHandle, SessionSummary, FRAME_QUEUE_CAPACITY};
pub use throttle::FrameThrottle;
pub use view::{CallView, ChannelView, ViewUpdate, LOCAL_DISPLAY_NAME};
