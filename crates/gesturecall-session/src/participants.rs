use std::collections::BTreeMap;

use gesturecall_core::{GestureLabel, Participant, ParticipantId};

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantEntry {
    pub name: String,
    /// Latest label shown for this participant.
    pub label: GestureLabel,
}

/// Participants in the call (local one included) and their current labels.
#[derive(Debug, Default)]
pub struct ParticipantSet {
    entries: BTreeMap<ParticipantId, ParticipantEntry>,
}

impl ParticipantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `participant`. Returns false if already present.
    pub fn insert(&mut self, participant: &Participant) -> bool {
        if self.entries.contains_key(&participant.id) {
            return false;
        }
        self.entries.insert(
            participant.id.clone(),
            ParticipantEntry { name: participant.name.clone(), label: GestureLabel::NoGesture },
        );
        true
    }

    pub fn remove(&mut self, id: &ParticipantId) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Update a known participant's label. Returns false for unknown ids.
    pub fn set_label(&mut self, id: &ParticipantId, label: GestureLabel) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.label = label;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&ParticipantEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str) -> Participant {
        Participant::new(ParticipantId::new(id), format!("User {id}"))
    }

    #[test]
    fn tracks_membership_and_labels() {
        let mut set = ParticipantSet::new();
        assert!(set.insert(&p("a")));
        assert!(!set.insert(&p("a")));
        assert!(set.insert(&p("b")));
        assert_eq!(set.len(), 2);

        let a = ParticipantId::new("a");
        assert_eq!(set.get(&a).map(|e| &e.label), Some(&GestureLabel::NoGesture));
        assert!(set.set_label(&a, GestureLabel::sign("5R")));
        assert_eq!(set.get(&a).map(|e| e.label.as_str()), Some("5R"));

        assert!(!set.set_label(&ParticipantId::new("zz"), GestureLabel::sign("A")));
        assert!(set.remove(&a));
        assert!(!set.remove(&a));
        assert_eq!(set.len(), 1);

        set.clear();
        assert!(set.is_empty());
    }
}
