//! # Bridge
//!
//! Adapts the blocking native contract to a promise-style asynchronous API.
//!
//! ## Key Components
//!
//! - `LlamaBridge`: public handle; submits jobs and hands back promises
//! - `Promise`: future settled by the worker, or already settled on fast-fail
//! - worker: the single thread that owns the native engine and runs every job
//!
//! ## Model state
//!
//! The loaded-model record sits behind an `RwLock` shared by callers and the
//! worker. Only the worker changes which model is loaded; callers read it for
//! the fast-fail check in `generate_text` and for status queries.

mod bridge;
mod error;
mod promise;
mod state;
mod worker;

pub use bridge::LlamaBridge;
pub use error::{BridgeError, ErrorCode};
pub use promise::Promise;
pub use state::LoadedModel;
pub use worker::{LOAD_SUCCESS, NOTHING_TO_UNLOAD, UNLOAD_SUCCESS};
