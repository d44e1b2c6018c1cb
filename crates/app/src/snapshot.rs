//! Per-pass snapshot of the entity states a room reads.
//!
//! All lookups of a resolution pass are fetched up front so every rule sees
//! the same view, even when the platform changes mid-pass.

use std::collections::HashMap;

use thermo_domain::error::StateUnavailable;
use thermo_domain::expr::StateLookup;
use thermo_domain::id::EntityId;
use thermo_domain::time::LocalTime;

use crate::ports::StateStore;

/// State texts the platform uses for "no usable value".
const UNAVAILABLE_STATES: [&str; 2] = ["unavailable", "unknown"];

/// Read-only states captured at the start of a pass.
#[derive(Debug, Clone)]
pub struct Snapshot {
    states: HashMap<EntityId, String>,
    now: LocalTime,
}

impl Snapshot {
    /// Fetch `entities` from `store`.
    ///
    /// Entities that are unknown, `unavailable` or `unknown` are left out and
    /// read as [`StateUnavailable`].
    pub async fn capture<'a, S>(
        store: &S,
        entities: impl IntoIterator<Item = &'a EntityId>,
        now: LocalTime,
    ) -> Self
    where
        S: StateStore + ?Sized,
    {
        let mut states = HashMap::new();
        for entity_id in entities {
            if states.contains_key(entity_id) {
                continue;
            }
            match store.get_state(entity_id).await {
                Some(state) if !UNAVAILABLE_STATES.contains(&state.as_str()) => {
                    states.insert(entity_id.clone(), state);
                }
                _ => {
                    tracing::trace!(entity_id = %entity_id, "state unavailable");
                }
            }
        }
        Self { states, now }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl StateLookup for Snapshot {
    fn state(&self, entity_id: &str) -> Result<&str, StateUnavailable> {
        self.states
            .get(entity_id)
            .map(String::as_str)
            .ok_or_else(|| StateUnavailable {
                entity_id: EntityId::new(entity_id),
            })
    }

    fn now(&self) -> LocalTime {
        self.now
    }
}
