use gesturecall_core::{GestureLabel, ParticipantId};
use tokio::sync::mpsc;

/// Name shown for the local participant's tile.
pub const LOCAL_DISPLAY_NAME: &str = "You";

// MARK: - CallView trait

/// UI surface of a call. Called from the session event loop only.
pub trait CallView: Send {
    fn set_status(&mut self, status: &str);

    /// Non-fatal error worth showing to the user.
    fn show_error(&mut self, context: &str, detail: &str);

    fn participant_joined(&mut self, id: &ParticipantId, name: &str);

    fn participant_left(&mut self, id: &ParticipantId);

    fn participant_count(&mut self, count: usize);

    fn show_label(&mut self, id: &ParticipantId, label: &GestureLabel);

    /// Local recognition became available.
    fn model_loaded(&mut self) {}

    /// Remove every participant tile.
    fn clear(&mut self);
}

// MARK: - ChannelView

/// One [`CallView`] call, as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    Status(String),
    Error { context: String, detail: String },
    ParticipantJoined { id: ParticipantId, name: String },
    ParticipantLeft(ParticipantId),
    ParticipantCount(usize),
    Label { id: ParticipantId, label: GestureLabel },
    ModelLoaded,
    Cleared,
}

/// Forwards every view call over a channel, for UIs living on another
/// thread or task.
pub struct ChannelView {
    tx: mpsc::UnboundedSender<ViewUpdate>,
}

impl ChannelView {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ViewUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, update: ViewUpdate) {
        // UI gone: nothing left to update.
        let _ = self.tx.send(update);
    }
}

impl CallView for ChannelView {
    fn set_status(&mut self, status: &str) {
        self.push(ViewUpdate::Status(status.to_owned()));
    }

    fn show_error(&mut self, context: &str, detail: &str) {
        self.push(ViewUpdate::Error { context: context.to_owned(), detail: detail.to_owned() });
    }

    fn participant_joined(&mut self, id: &ParticipantId, name: &str) {
        self.push(ViewUpdate::ParticipantJoined { id: id.clone(), name: name.to_owned() });
    }

    fn participant_left(&mut self, id: &ParticipantId) {
        self.push(ViewUpdate::ParticipantLeft(id.clone()));
    }

    fn participant_count(&mut self, count: usize) {
        self.push(ViewUpdate::ParticipantCount(count));
    }

    fn show_label(&mut self, id: &ParticipantId, label: &GestureLabel) {
        self.push(ViewUpdate::Label { id: id.clone(), label: label.clone() });
    }

    fn model_loaded(&mut self) {
        self.push(ViewUpdate::ModelLoaded);
    }

    fn clear(&mut self) {
        self.push(ViewUpdate::Cleared);
    }
}
