//! JSON repository for [`ScaleState`] records over any [`SharedStore`].

use std::sync::Arc;

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::SharedStore;
use crate::types::ScaleState;

/// Loads and saves per-process [`ScaleState`] records.
///
/// Records are keyed by a caller-supplied process identity (typically
/// `"{app}:{process}"`). A missing record loads as the all-zero default,
/// so state is implicitly created on first read. Writes are plain
/// last-writer-wins; reconciliation happens in [`ScaleState::adopt_newer`]
/// on the reading side.
#[derive(Clone)]
pub struct StateRepository {
    store: Arc<dyn SharedStore>,
}

impl StateRepository {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    fn key(id: &str) -> String {
        format!("ebbtide/scale-state/{id}")
    }

    /// Load the record for `id`, defaulting when absent.
    pub fn load(&self, id: &str) -> StoreResult<ScaleState> {
        match self.store.get(&Self::key(id))? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| StoreError::Deserialize(e.to_string())),
            None => Ok(ScaleState::default()),
        }
    }

    /// Persist the record for `id`.
    pub fn save(&self, id: &str, state: &ScaleState) -> StoreResult<()> {
        let raw =
            serde_json::to_string(state).map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.store.set(&Self::key(id), &raw)?;
        debug!(%id, count = state.count, quieting = state.quieting(), "scale state saved");
        Ok(())
    }

    /// Remove the record for `id`. Returns `true` if one existed.
    pub fn clear(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(&Self::key(id))
    }
}
