//! Bridge exposing a single asynchronous photogrammetry reconstruction session
//! to foreign callers.
//!
//! The C surface lives in [`api::ffi`]: `run_session`, `stop_session`,
//! `is_completed`, `get_progress` and `get_eta`. Embedders working in Rust can
//! drive [`engine::manager::SessionManager`] directly.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod state;

pub use api::ffi::{install_engine, install_exporter};
pub use engine::manager::{SessionManager, StartedSession, StopOutcome};
pub use error::{EngineError, SessionError};
pub use state::SharedState;
