use std::collections::HashMap;

use gesturecall_core::{GestureLabel, ParticipantId};
use gesturecall_session::CallView;
use tracing::{error, info};

/// Call view that renders into the log.
#[derive(Debug, Default)]
pub struct LogView {
    names: HashMap<ParticipantId, String>,
}

impl LogView {
    fn name<'a>(&'a self, id: &'a ParticipantId) -> &'a str {
        self.names.get(id).map(String::as_str).unwrap_or(id.as_str())
    }
}

impl CallView for LogView {
    fn set_status(&mut self, status: &str) {
        info!("[status] {status}");
    }

    fn show_error(&mut self, context: &str, detail: &str) {
        error!("[error] {context}: {detail}");
    }

    fn participant_joined(&mut self, id: &ParticipantId, name: &str) {
        info!("[tile] + {name} ({id})");
        self.names.insert(id.clone(), name.to_owned());
    }

    fn participant_left(&mut self, id: &ParticipantId) {
        info!("[tile] - {}", self.name(id));
        self.names.remove(id);
    }

    fn participant_count(&mut self, count: usize) {
        info!("[call] {count} participant(s)");
    }

    fn show_label(&mut self, id: &ParticipantId, label: &GestureLabel) {
        info!("[label] {}: {label}", self.name(id));
    }

    fn model_loaded(&mut self) {
        info!("[model] ready");
    }

    fn clear(&mut self) {
        self.names.clear();
    }
}
