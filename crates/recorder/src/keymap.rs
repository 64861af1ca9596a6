//! Keyboard bindings for annotation triggers.

use ethogram_common::config::AnnotationDefaults;
use ethogram_model::BehaviorId;

/// What a key press asks the recorder to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Activate the behavior with this id.
    Behavior(BehaviorId),
    /// Discard the most recent open selection.
    Undo,
    /// Delete marks covering the playback cursor.
    DeleteAtCursor,
}

/// Maps characters to triggers. Matching ignores case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    behavior_keys: Vec<char>,
    undo_key: char,
    delete_key: char,
}

impl Keymap {
    pub fn from_config(config: &AnnotationDefaults) -> Self {
        Self {
            behavior_keys: config
                .trigger_keys
                .chars()
                .map(|c| c.to_ascii_lowercase())
                .collect(),
            undo_key: config.undo_key.to_ascii_lowercase(),
            delete_key: config.delete_key.to_ascii_lowercase(),
        }
    }

    /// Number of behaviors reachable from the keyboard.
    pub fn capacity(&self) -> usize {
        self.behavior_keys.len()
    }

    pub fn resolve(&self, key: char) -> Option<Trigger> {
        let key = key.to_ascii_lowercase();
        if key == self.undo_key {
            return Some(Trigger::Undo);
        }
        if key == self.delete_key {
            return Some(Trigger::DeleteAtCursor);
        }
        self.behavior_keys
            .iter()
            .position(|c| *c == key)
            .map(Trigger::Behavior)
    }

    /// Key bound to a behavior id.
    pub fn key_for(&self, id: BehaviorId) -> Option<char> {
        self.behavior_keys.get(id).copied()
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::from_config(&AnnotationDefaults::default())
    }
}
