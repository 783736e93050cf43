use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

/// The model currently held by the native engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModel {
    /// Name the model was requested by
    pub name: String,
    /// Absolute path handed to the native engine
    pub path: PathBuf,
    /// When the native load finished
    pub loaded_at: DateTime<Utc>,
    /// Whether the load had to copy the file out of the assets
    pub copied_from_assets: bool,
}

/// Model reference shared between callers and the worker.
///
/// Only the worker sets or clears `loaded`. Callers bump `pending_loads` when
/// they queue a load so that a generate submitted right behind it is queued
/// instead of failing fast.
#[derive(Debug, Default)]
pub(crate) struct ModelState {
    pub loaded: Option<LoadedModel>,
    pub pending_loads: usize,
}

pub(crate) type SharedState = Arc<RwLock<ModelState>>;

// The state is a plain record with no cross-field invariant a panic could
// break halfway, so a poisoned lock is still safe to use.
pub(crate) fn read_state(state: &SharedState) -> RwLockReadGuard<'_, ModelState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_state(state: &SharedState) -> RwLockWriteGuard<'_, ModelState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}
