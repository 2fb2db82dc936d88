//! In-process room: every member's messages are delivered, in send order,
//! to every other member of the same room.
//!
//! Delivery waits for queue space instead of dropping events, so a member
//! that stops draining its events holds up senders in that room.
//!
//! Used for single-machine replays and for session tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use gesturecall_core::{GestureMessage, Participant, ParticipantId, TransportError};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{MessageChannel, RoomConnector, RoomEvent, RoomLink, ROOM_EVENT_CAPACITY};

struct Member {
    participant: Participant,
    tx: mpsc::Sender<RoomEvent>,
}

type Rooms = HashMap<String, Vec<Member>>;

/// Event queues of the members an event is addressed to.
type Recipients = Vec<(ParticipantId, mpsc::Sender<RoomEvent>)>;

/// Shared handle to a set of in-process rooms. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryRoom {
    rooms: Arc<Mutex<Rooms>>,
}

impl MemoryRoom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Participants currently in `room`.
    pub fn members(&self, room: &str) -> Vec<Participant> {
        self.lock()
            .get(room)
            .map(|members| members.iter().map(|m| m.participant.clone()).collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Rooms> {
        // A panic while holding the lock cannot leave the member table
        // half-updated, so a poisoned lock is still usable.
        self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every member of `members` except `except`. Taken under the lock,
    /// delivered after it is released.
    fn recipients(members: &[Member], except: &ParticipantId) -> Recipients {
        members
            .iter()
            .filter(|m| &m.participant.id != except)
            .map(|m| (m.participant.id.clone(), m.tx.clone()))
            .collect()
    }

    /// Deliver `event` to each recipient, waiting while a queue is full.
    async fn deliver(recipients: Recipients, event: RoomEvent) {
        for (id, tx) in recipients {
            if tx.send(event.clone()).await.is_err() {
                debug!("{} stopped listening; event not delivered", id);
            }
        }
    }
}

#[async_trait]
impl RoomConnector for MemoryRoom {
    async fn connect(&self, room: &str, local: &Participant) -> Result<RoomLink, TransportError> {
        let (tx, events) = mpsc::channel(ROOM_EVENT_CAPACITY);
        let (participants, recipients) = {
            let mut rooms = self.lock();
            let members = rooms.entry(room.to_owned()).or_default();
            if members.iter().any(|m| m.participant.id == local.id) {
                return Err(TransportError::JoinRejected {
                    reason: format!("{} is already in room {room}", local.id),
                });
            }
            let participants: Vec<Participant> =
                members.iter().map(|m| m.participant.clone()).collect();
            let recipients = Self::recipients(members, &local.id);
            members.push(Member { participant: local.clone(), tx });
            info!("{} joined memory room {} ({} members)", local.id, room, members.len());
            (participants, recipients)
        };
        Self::deliver(recipients, RoomEvent::PeerJoined(local.clone())).await;

        let channel = MemoryChannel {
            room: self.clone(),
            room_name: room.to_owned(),
            id: local.id.clone(),
            closed: AtomicBool::new(false),
        };
        Ok(RoomLink { channel: Arc::new(channel), events, participants })
    }
}

/// One member's outbound handle into a [`MemoryRoom`].
pub struct MemoryChannel {
    room: MemoryRoom,
    room_name: String,
    id: ParticipantId,
    closed: AtomicBool,
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn send(&self, message: &GestureMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        let recipients = {
            let rooms = self.room.lock();
            let members = rooms.get(&self.room_name).ok_or(TransportError::ConnectionClosed)?;
            MemoryRoom::recipients(members, &self.id)
        };
        let event = RoomEvent::Message { from: self.id.clone(), message: message.clone() };
        MemoryRoom::deliver(recipients, event).await;
        debug!("{} sent {:?}", self.id, message);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let recipients = {
            let mut rooms = self.room.lock();
            match rooms.get_mut(&self.room_name) {
                Some(members) => {
                    members.retain(|m| m.participant.id != self.id);
                    let recipients = MemoryRoom::recipients(members, &self.id);
                    if members.is_empty() {
                        rooms.remove(&self.room_name);
                    }
                    recipients
                }
                None => Vec::new(),
            }
        };
        MemoryRoom::deliver(recipients, RoomEvent::PeerLeft(self.id.clone())).await;
        info!("{} left memory room {}", self.id, self.room_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use gesturecall_core::GestureLabel;

    fn participant(id: &str) -> Participant {
        Participant::new(ParticipantId::new(id), id.to_uppercase())
    }

    #[tokio::test]
    async fn members_see_each_other() {
        let hub = MemoryRoom::new();
        let mut a = hub.connect("r", &participant("a")).await.unwrap();
        let b = hub.connect("r", &participant("b")).await.unwrap();

        assert!(a.participants.is_empty());
        assert_eq!(b.participants, vec![participant("a")]);
        assert_eq!(a.events.recv().await, Some(RoomEvent::PeerJoined(participant("b"))));
        assert_eq!(hub.members("r").len(), 2);
    }

    #[tokio::test]
    async fn messages_reach_others_in_order() {
        let hub = MemoryRoom::new();
        let a = hub.connect("r", &participant("a")).await.unwrap();
        let mut b = hub.connect("r", &participant("b")).await.unwrap();

        for label in ["A", "B", "C"] {
            a.channel.send(&GestureMessage::gesture(GestureLabel::sign(label))).await.unwrap();
        }
        for label in ["A", "B", "C"] {
            assert_eq!(
                b.events.recv().await,
                Some(RoomEvent::Message {
                    from: ParticipantId::new("a"),
                    message: GestureMessage::gesture(GestureLabel::sign(label)),
                })
            );
        }
    }

    #[tokio::test]
    async fn sends_beyond_queue_capacity_are_all_delivered() {
        let hub = MemoryRoom::new();
        let a = hub.connect("r", &participant("a")).await.unwrap();
        let mut b = hub.connect("r", &participant("b")).await.unwrap();
        let total = ROOM_EVENT_CAPACITY + 44;

        let sender = tokio::spawn(async move {
            for i in 0..total {
                let label = GestureLabel::sign(format!("S{i}"));
                a.channel.send(&GestureMessage::gesture(label)).await.unwrap();
            }
            a
        });

        for i in 0..total {
            match b.events.recv().await {
                Some(RoomEvent::Message { from, message }) => {
                    assert_eq!(from, ParticipantId::new("a"));
                    assert_eq!(message.label(), &GestureLabel::sign(format!("S{i}")));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        let _a = sender.await.unwrap();
        assert!(b.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_holds_the_sender_until_drained() {
        let hub = MemoryRoom::new();
        let a = hub.connect("r", &participant("a")).await.unwrap();
        let mut b = hub.connect("r", &participant("b")).await.unwrap();
        let msg = GestureMessage::gesture(GestureLabel::sign("A"));

        for _ in 0..ROOM_EVENT_CAPACITY {
            a.channel.send(&msg).await.unwrap();
        }
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), a.channel.send(&msg)).await;
        assert!(blocked.is_err(), "send must wait for queue space");

        assert!(b.events.recv().await.is_some());
        tokio::time::timeout(Duration::from_secs(1), a.channel.send(&msg))
            .await
            .expect("send completes once space frees up")
            .unwrap();

        let mut delivered = 0;
        while b.events.try_recv().is_ok() {
            delivered += 1;
        }
        assert_eq!(delivered, ROOM_EVENT_CAPACITY);
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let hub = MemoryRoom::new();
        let a = hub.connect("one", &participant("a")).await.unwrap();
        let mut b = hub.connect("two", &participant("b")).await.unwrap();
        a.channel.send(&GestureMessage::gesture(GestureLabel::sign("A"))).await.unwrap();
        assert!(b.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_notifies_peers_and_blocks_sends() {
        let hub = MemoryRoom::new();
        let a = hub.connect("r", &participant("a")).await.unwrap();
        let mut b = hub.connect("r", &participant("b")).await.unwrap();

        a.channel.close().await.unwrap();
        assert_eq!(b.events.recv().await, Some(RoomEvent::PeerLeft(ParticipantId::new("a"))));
        assert!(matches!(
            a.channel.send(&GestureMessage::gesture(GestureLabel::NoGesture)).await,
            Err(TransportError::ConnectionClosed)
        ));
        assert_eq!(hub.members("r"), vec![participant("b")]);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let hub = MemoryRoom::new();
        let _a = hub.connect("r", &participant("a")).await.unwrap();
        assert!(matches!(
            hub.connect("r", &participant("a")).await,
            Err(TransportError::JoinRejected { .. })
        ));
    }
}
