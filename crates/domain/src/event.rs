//! Event — an entity's state changed on the platform.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::time::LocalTime;

/// A state change notification delivered through the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChanged {
    pub entity_id: EntityId,
    /// `None` when the entity did not exist before.
    pub old_state: Option<String>,
    /// `None` when the entity was removed.
    pub new_state: Option<String>,
    pub changed_at: LocalTime,
}

impl StateChanged {
    /// Whether the state text actually changed.
    #[must_use]
    pub fn is_change(&self) -> bool {
        self.old_state != self.new_state
    }
}

impl fmt::Display for StateChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |state: &Option<String>| state.clone().unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{}: {} -> {}",
            self.entity_id,
            show(&self.old_state),
            show(&self.new_state)
        )
    }
}
