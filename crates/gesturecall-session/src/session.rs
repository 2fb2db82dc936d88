//! `CallSession`: the context object for one joined call.
//!
//! Created by [`CallSession::join`], driven by [`CallSession::run`], torn
//! down when the loop exits. All session state lives here and is only
//! touched from the loop task.
//!
//! # Overlap policy
//!
//! Frames may arrive faster than inference completes. Each classified
//! frame gets a sequence number; a result older than the newest label
//! already applied is dropped.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use gesturecall_classifier::{Classification, GestureClassifier, GestureModel, ModelLoader};
use gesturecall_core::{
    BroadcastPolicy, ClassifierConfig, GestureCallError, GestureLabel, GestureMessage, LandmarkFrame,
    ModelError, Participant, ParticipantId, SessionConfig, TransportError,
};
use gesturecall_transport::{MessageChannel, RoomConnector, RoomEvent};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::events::SessionEvent;
use crate::participants::ParticipantSet;
use crate::throttle::FrameThrottle;
use crate::view::{CallView, LOCAL_DISPLAY_NAME};

/// Pending detector frames before new ones are dropped.
pub const FRAME_QUEUE_CAPACITY: usize = 8;

/// Default display name announced to the room.
const DEFAULT_PARTICIPANT_NAME: &str = "Guest";

// ── Summary ───────────────────────────────────────────────────────────────────

/// Counters reported when the session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames_received: u64,
    /// Dropped by the prediction interval.
    pub frames_throttled: u64,
    /// Dropped because the model was still loading.
    pub frames_not_ready: u64,
    pub inferences_started: u64,
    pub inference_failures: u64,
    /// Results discarded because a newer label was already shown.
    pub stale_results: u64,
    /// Local labels applied to the view.
    pub labels_shown: u64,
    pub broadcasts_sent: u64,
    pub broadcast_failures: u64,
    pub messages_received: u64,
}

// ── SessionHandle ─────────────────────────────────────────────────────────────

/// Caller side of a running session: feeds frames and requests leave.
///
/// Dropping every handle also ends the session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Queue a detector frame stamped now. Returns false if it was dropped.
    pub fn submit_frame(&self, frame: LandmarkFrame) -> bool {
        self.submit_frame_at(frame, Instant::now())
    }

    /// Queue a detector frame with an explicit arrival time.
    pub fn submit_frame_at(&self, frame: LandmarkFrame, at: Instant) -> bool {
        match self.tx.try_send(SessionEvent::Frame { frame, at }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Frame queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub async fn leave(&self) {
        let _ = self.tx.send(SessionEvent::Leave).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── CallSession ───────────────────────────────────────────────────────────────

pub struct CallSession {
    room: String,
    local: Participant,
    broadcast: BroadcastPolicy,
    classifier: GestureClassifier,
    throttle: FrameThrottle,
    participants: ParticipantSet,
    /// Last label handed to the channel (sent or failed).
    last_broadcast: Option<GestureLabel>,
    next_seq: u64,
    applied_seq: u64,
    channel: Arc<dyn MessageChannel>,
    room_events: mpsc::Receiver<RoomEvent>,
    commands: mpsc::Receiver<SessionEvent>,
    internal_tx: mpsc::UnboundedSender<SessionEvent>,
    internal_rx: mpsc::UnboundedReceiver<SessionEvent>,
    view: Box<dyn CallView>,
    stats: SessionSummary,
}

impl CallSession {
    /// Join a call.
    ///
    /// 1. start loading the model in the background
    /// 2. connect to the room
    /// 3. populate the participant set
    ///
    /// Only a failed room connection is fatal; a failed model load is
    /// reported later from the event loop and the call continues without
    /// local recognition.
    pub async fn join(
        config: SessionConfig,
        classifier_config: ClassifierConfig,
        loader: Arc<dyn ModelLoader>,
        connector: &dyn RoomConnector,
        mut view: Box<dyn CallView>,
    ) -> Result<(Self, SessionHandle), GestureCallError> {
        config.validate()?;
        classifier_config.validate()?;
        let room = config.room_name();
        let local = Participant::new(
            ParticipantId::generate(),
            config.display_name.clone().unwrap_or_else(|| DEFAULT_PARTICIPANT_NAME.to_owned()),
        );

        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        view.set_status("Loading model...");
        let load_tx = internal_tx.clone();
        tokio::spawn(async move {
            let result = loader.load().await;
            let _ = load_tx.send(SessionEvent::ModelLoaded(result));
        });

        view.set_status(&format!("Joining {room}..."));
        info!("Joining room '{}' as {} ({})", room, local.id, local.name);
        let timeout = config.join_timeout();
        let link = match tokio::time::timeout(timeout, connector.connect(&room, &local)).await {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                view.show_error("Failed to join", &e.to_string());
                error!("Failed to join '{}': {}", room, e);
                return Err(e.into());
            }
            Err(_) => {
                let e = TransportError::Timeout { ms: timeout.as_millis() as u64 };
                view.show_error("Failed to join", &e.to_string());
                error!("Failed to join '{}': {}", room, e);
                return Err(e.into());
            }
        };

        let mut participants = ParticipantSet::new();
        participants.insert(&local);
        view.participant_joined(&local.id, LOCAL_DISPLAY_NAME);
        for peer in link.participants.iter().filter(|p| p.id != local.id) {
            if participants.insert(peer) {
                view.participant_joined(&peer.id, &peer.name);
            }
        }
        view.participant_count(participants.len());
        view.set_status(&format!("In call: {room}"));
        info!("In call '{}' with {} participant(s)", room, participants.len());

        let (tx, commands) = mpsc::channel(FRAME_QUEUE_CAPACITY);
        let session = Self {
            room,
            local,
            broadcast: config.broadcast,
            classifier: GestureClassifier::new(classifier_config),
            throttle: FrameThrottle::new(config.prediction_interval()),
            participants,
            last_broadcast: None,
            next_seq: 0,
            applied_seq: 0,
            channel: link.channel,
            room_events: link.events,
            commands,
            internal_tx,
            internal_rx,
            view,
            stats: SessionSummary::default(),
        };
        Ok((session, SessionHandle { tx }))
    }

    pub fn local(&self) -> &Participant {
        &self.local
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn participants(&self) -> &ParticipantSet {
        &self.participants
    }

    /// Drive the session until leave, room closure, or every handle is
    /// dropped. Returns the session counters.
    pub async fn run(mut self) -> SessionSummary {
        let exit_reason = loop {
            // Finished background work first, so results never queue
            // behind a burst of frames.
            let event = tokio::select! {
                biased;
                Some(event) = self.internal_rx.recv() => event,
                event = self.room_events.recv() => {
                    SessionEvent::Room(event.unwrap_or(RoomEvent::Closed))
                }
                event = self.commands.recv() => event.unwrap_or(SessionEvent::Leave),
            };
            if let ControlFlow::Break(reason) = self.handle_event(event).await {
                break reason;
            }
        };
        self.leave(exit_reason).await
    }

    async fn handle_event(&mut self, event: SessionEvent) -> ControlFlow<&'static str> {
        match event {
            SessionEvent::Frame { frame, at } => self.on_frame(frame, at).await,
            SessionEvent::Leave => return ControlFlow::Break("left"),
            SessionEvent::ModelLoaded(result) => self.on_model_loaded(result),
            SessionEvent::Inference { seq, result } => self.on_inference(seq, result).await,
            SessionEvent::Room(RoomEvent::Closed) => return ControlFlow::Break("room_closed"),
            SessionEvent::Room(event) => self.on_room_event(event).await,
        }
        ControlFlow::Continue(())
    }

    // ── Local recognition ─────────────────────────────────────────────────────

    async fn on_frame(&mut self, frame: LandmarkFrame, at: Instant) {
        self.stats.frames_received += 1;
        if self.stats.frames_received % 300 == 0 {
            info!(
                "Stats: frames={} throttled={} inferences={} failures={} broadcasts={}",
                self.stats.frames_received,
                self.stats.frames_throttled,
                self.stats.inferences_started,
                self.stats.inference_failures,
                self.stats.broadcasts_sent
            );
        }

        if !self.throttle.admit(at) {
            self.stats.frames_throttled += 1;
            return;
        }

        match self.classifier.begin(&frame) {
            None => {
                self.stats.frames_not_ready += 1;
            }
            Some(Classification::Immediate(label)) => {
                self.next_seq += 1;
                let seq = self.next_seq;
                self.apply_local_label(seq, label).await;
            }
            Some(Classification::Pending(job)) => {
                self.next_seq += 1;
                let seq = self.next_seq;
                self.stats.inferences_started += 1;
                let tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    let result = job.run().await;
                    let _ = tx.send(SessionEvent::Inference { seq, result });
                });
            }
        }
    }

    fn on_model_loaded(&mut self, result: Result<Arc<dyn GestureModel>, ModelError>) {
        match result {
            Ok(model) => {
                self.classifier.set_model(model);
                self.view.model_loaded();
                info!("Gesture model loaded, recognition active");
            }
            Err(e) => {
                self.view.show_error("Model load failed", &e.to_string());
                error!("Model load failed: {}", e);
            }
        }
    }

    async fn on_inference(&mut self, seq: u64, result: Result<GestureLabel, ModelError>) {
        if seq <= self.applied_seq {
            self.stats.stale_results += 1;
            debug!("Dropping stale result #{} (newest applied #{})", seq, self.applied_seq);
            return;
        }
        match result {
            Ok(label) => self.apply_local_label(seq, label).await,
            Err(e) => {
                self.stats.inference_failures += 1;
                warn!("Inference #{} failed: {}", seq, e);
            }
        }
    }

    async fn apply_local_label(&mut self, seq: u64, label: GestureLabel) {
        self.applied_seq = seq;
        self.participants.set_label(&self.local.id, label.clone());
        self.view.show_label(&self.local.id, &label);
        self.stats.labels_shown += 1;

        let changed = self.last_broadcast.as_ref() != Some(&label);
        if self.broadcast == BroadcastPolicy::EveryFrame || changed {
            self.last_broadcast = Some(label.clone());
            self.send_label(label).await;
        }
    }

    async fn send_label(&mut self, label: GestureLabel) {
        match self.channel.send(&GestureMessage::gesture(label)).await {
            Ok(()) => self.stats.broadcasts_sent += 1,
            Err(e) => {
                self.stats.broadcast_failures += 1;
                warn!("Gesture broadcast failed: {}", e);
            }
        }
    }

    // ── Room ──────────────────────────────────────────────────────────────────

    async fn on_room_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::PeerJoined(peer) => {
                if peer.id == self.local.id || !self.participants.insert(&peer) {
                    return;
                }
                info!("{} ({}) joined", peer.name, peer.id);
                self.view.participant_joined(&peer.id, &peer.name);
                self.view.participant_count(self.participants.len());
                // Newcomers only hear changes; give them the current sign.
                if let Some(label) = self.last_broadcast.clone().filter(GestureLabel::is_recognized) {
                    self.send_label(label).await;
                }
            }
            RoomEvent::PeerLeft(id) => {
                if self.participants.remove(&id) {
                    info!("{} left", id);
                    self.view.participant_left(&id);
                    self.view.participant_count(self.participants.len());
                }
            }
            RoomEvent::Message { from, message } => {
                if from == self.local.id {
                    return;
                }
                let label = message.label().clone();
                if self.participants.set_label(&from, label.clone()) {
                    self.stats.messages_received += 1;
                    self.view.show_label(&from, &label);
                } else {
                    debug!("Gesture from unknown participant {} ignored", from);
                }
            }
            RoomEvent::Closed => {}
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────────

    async fn leave(mut self, reason: &str) -> SessionSummary {
        info!("Leaving '{}' ({})", self.room, reason);
        if let Err(e) = self.channel.close().await {
            self.view.show_error("Failed to leave", &e.to_string());
            warn!("Failed to leave cleanly: {}", e);
        }
        self.participants.clear();
        self.view.clear();
        self.view.participant_count(0);
        self.view.set_status("Left call");

        let s = &self.stats;
        info!(
            "Session complete ({}). frames={} throttled={} not_ready={} inferences={} \
             failures={} stale={} labels={} broadcasts={} send_failures={} inbound={}",
            reason,
            s.frames_received,
            s.frames_throttled,
            s.frames_not_ready,
            s.inferences_started,
            s.inference_failures,
            s.stale_results,
            s.labels_shown,
            s.broadcasts_sent,
            s.broadcast_failures,
            s.messages_received
        );
        self.stats
    }
}
