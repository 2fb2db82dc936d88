//! gesturecall-transport: room messaging seam.
//!
//! The call's reliable, ordered data channel is provided by whatever RTC
//! stack hosts the room. This crate defines the two traits the session
//! talks to and ships two adapters:
//!
//! ```text
//! CallSession ── MessageChannel ──► RelayWriter  ── TLS:7900 (pinned) ──► room relay
//!             ◄─ RoomEvent ──────── recv_loop    ◄──────────────
//!
//! CallSession ── MessageChannel ──► MemoryChannel ─► MemoryRoom (in-process)
//! ```

pub mod framing;
pub mod memory;
pub mod relay;

use std::sync::Arc;

use async_trait::async_trait;
use gesturecall_core::{GestureMessage, Participant, ParticipantId, TransportError};
use tokio::sync::mpsc;

pub use memory::{MemoryChannel, MemoryRoom};
pub use relay::{RelayClient, RelayConnector, RelayWriter, TofuCertVerifier};

/// Default TLS port of the room relay.
pub const RELAY_PORT: u16 = 7900;

/// Capacity of the inbound room event queue.
pub const ROOM_EVENT_CAPACITY: usize = 256;

// MARK: - MessageChannel trait

/// Outbound half of a room's reliable, ordered data channel.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Broadcast `message` to every other participant.
    async fn send(&self, message: &GestureMessage) -> Result<(), TransportError>;

    /// Leave the room. Further sends fail with `ConnectionClosed`.
    async fn close(&self) -> Result<(), TransportError>;
}

// MARK: - RoomEvent

/// Inbound notification from the room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    PeerJoined(Participant),
    PeerLeft(ParticipantId),
    Message { from: ParticipantId, message: GestureMessage },
    /// The room connection ended; no further events follow.
    Closed,
}

// MARK: - RoomConnector trait

/// Joins a room on behalf of the local participant.
#[async_trait]
pub trait RoomConnector: Send + Sync {
    async fn connect(&self, room: &str, local: &Participant) -> Result<RoomLink, TransportError>;
}

/// A joined room.
pub struct RoomLink {
    pub channel: Arc<dyn MessageChannel>,
    pub events: mpsc::Receiver<RoomEvent>,
    /// Participants already present, excluding the local one.
    pub participants: Vec<Participant>,
}
