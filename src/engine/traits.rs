use std::path::Path;
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::error::EngineError;

use super::events::{EventStream, Request};

/// A freshly constructed engine session: its event stream plus the control
/// surface used to issue requests and cancel.
pub struct Session {
    pub events: EventStream,
    pub control: Arc<dyn SessionControl>,
}

/// Control surface of a running session.
pub trait SessionControl: Send + Sync {
    /// Queue requests for processing. Results arrive on the event stream.
    fn process(&self, requests: Vec<Request>) -> Result<(), EngineError>;

    /// Ask the engine to stop. Must not block; the engine answers with a
    /// `ProcessingCancelled` event.
    fn cancel(&self);
}

/// The external reconstruction engine.
///
/// `create_session` is called from within the bridge's tokio runtime, so
/// implementations may spawn tasks.
pub trait ReconstructionEngine: Send + Sync {
    fn is_supported(&self) -> bool;

    fn create_session(&self, input: &Path, config: &SessionConfig) -> Result<Session, EngineError>;
}

/// Engine used until a host installs a real one. Reports no support.
pub struct UnsupportedEngine;

impl ReconstructionEngine for UnsupportedEngine {
    fn is_supported(&self) -> bool {
        false
    }

    fn create_session(&self, _input: &Path, _config: &SessionConfig) -> Result<Session, EngineError> {
        Err(EngineError::Rejected(
            "no reconstruction engine installed".to_string(),
        ))
    }
}
