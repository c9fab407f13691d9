// Scripted engine: replays a fixed event sequence, honouring cancellation.
//
// Used by the integration tests and by hosts that want to exercise the C
// surface without a real reconstruction backend.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::events::{EventSender, Request, SessionEvent};
use super::traits::{ReconstructionEngine, Session, SessionControl};
use crate::config::SessionConfig;
use crate::error::EngineError;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub enum ScriptStep {
    Emit(SessionEvent),
    Pause(Duration),
    /// Write these bytes to the model request's target path.
    WriteArtifact(Vec<u8>),
    /// Block until cancelled, like a job that never finishes on its own.
    WaitForCancel,
}

#[derive(Clone)]
pub struct ScriptedEngine {
    supported: bool,
    construction_error: Option<String>,
    script: Vec<ScriptStep>,
    cancels: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Request>>>,
    configs: Arc<Mutex<Vec<SessionConfig>>>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            supported: true,
            construction_error: None,
            script,
            cancels: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            configs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(Vec::new())
        }
    }

    /// Fail every `create_session` call with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            construction_error: Some(reason.into()),
            ..Self::new(Vec::new())
        }
    }

    /// Number of cancel calls that reached the engine.
    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Requests issued to sessions of this engine, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Configurations sessions were created with, in order.
    pub fn configs(&self) -> Vec<SessionConfig> {
        self.configs.lock().clone()
    }
}

impl ReconstructionEngine for ScriptedEngine {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create_session(&self, input: &Path, config: &SessionConfig) -> Result<Session, EngineError> {
        if let Some(reason) = &self.construction_error {
            return Err(EngineError::Rejected(reason.clone()));
        }
        if !input.is_dir() {
            return Err(EngineError::InvalidInput(input.to_path_buf()));
        }
        self.configs.lock().push(config.clone());

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let control = ScriptedControl {
            script: self.script.clone(),
            sender: Mutex::new(Some(tx)),
            token: CancellationToken::new(),
            cancels: Arc::clone(&self.cancels),
            requests: Arc::clone(&self.requests),
        };

        Ok(Session {
            events: rx,
            control: Arc::new(control),
        })
    }
}

struct ScriptedControl {
    script: Vec<ScriptStep>,
    sender: Mutex<Option<EventSender>>,
    token: CancellationToken,
    cancels: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl SessionControl for ScriptedControl {
    fn process(&self, requests: Vec<Request>) -> Result<(), EngineError> {
        let tx = self
            .sender
            .lock()
            .take()
            .ok_or_else(|| EngineError::Rejected("session is already processing".into()))?;

        let target = requests
            .iter()
            .map(|r| match r {
                Request::ModelFile { url, .. } => url.clone(),
            })
            .last();
        self.requests.lock().extend(requests);

        let script = self.script.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            replay(script, tx, token, target).await;
        });
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();

        // Not processing yet: nobody else will report the cancellation.
        if let Some(tx) = self.sender.lock().take() {
            if tx.try_send(SessionEvent::ProcessingCancelled).is_err() {
                warn!("scripted session dropped cancellation event");
            }
        }
    }
}

async fn replay(
    script: Vec<ScriptStep>,
    tx: EventSender,
    token: CancellationToken,
    target: Option<PathBuf>,
) {
    for step in script {
        if token.is_cancelled() {
            let _ = tx.send(SessionEvent::ProcessingCancelled).await;
            return;
        }

        match step {
            ScriptStep::Emit(event) => {
                if tx.send(event).await.is_err() {
                    debug!("scripted session receiver dropped");
                    return;
                }
            }
            ScriptStep::Pause(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {}
                    _ = token.cancelled() => {
                        let _ = tx.send(SessionEvent::ProcessingCancelled).await;
                        return;
                    }
                }
            }
            ScriptStep::WriteArtifact(bytes) => match &target {
                Some(path) => {
                    if let Err(e) = tokio::fs::write(path, bytes).await {
                        warn!("scripted session failed to write {}: {}", path.display(), e);
                    }
                }
                None => warn!("scripted session has no model request to write"),
            },
            ScriptStep::WaitForCancel => {
                token.cancelled().await;
                let _ = tx.send(SessionEvent::ProcessingCancelled).await;
                return;
            }
        }
    }
}
