// Session orchestration: start, stop and poll the single reconstruction session.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::event_loop::{EventLoop, LoopOutcome};
use super::events::Request;
use super::session::{ActiveSlot, SessionHandle, SessionId, Slot};
use super::traits::{ReconstructionEngine, Session};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::export::{AssetExporter, ExportStep};
use crate::state::SharedState;

/// Called with errors that end a session abnormally (e.g. an unrecognized
/// engine event). The C surface installs a handler that exits the process.
pub type FatalHandler = Arc<dyn Fn(&SessionError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Requested,
    NoActiveSession,
}

/// A session accepted by [`SessionManager::start`].
pub struct StartedSession {
    pub id: SessionId,
    /// The event loop task. Resolves when the session reaches a terminal state.
    pub task: JoinHandle<Result<LoopOutcome>>,
}

pub struct SessionManager {
    engine: Arc<dyn ReconstructionEngine>,
    export: ExportStep,
    config: SessionConfig,
    state: Arc<SharedState>,
    active: ActiveSlot,
    runtime: Handle,
    on_fatal: FatalHandler,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new(
        engine: Arc<dyn ReconstructionEngine>,
        exporter: Arc<dyn AssetExporter>,
        runtime: Handle,
    ) -> Self {
        let config = SessionConfig::default();
        Self {
            engine,
            export: ExportStep::new(exporter, config.export_name.clone()),
            config,
            state: Arc::new(SharedState::new()),
            active: Arc::new(Mutex::new(Slot::Idle)),
            runtime,
            on_fatal: Arc::new(|e: &SessionError| error!("session failed: {}", e)),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.export = ExportStep::new(self.export.exporter(), config.export_name.clone());
        self.config = config;
        self
    }

    /// Publish into an existing state instead of a private one.
    pub fn with_state(mut self, state: Arc<SharedState>) -> Self {
        self.state = state;
        self
    }

    pub fn with_fatal_handler(mut self, on_fatal: FatalHandler) -> Self {
        self.on_fatal = on_fatal;
        self
    }

    /// Start a reconstruction of the images in `images_path`.
    ///
    /// Returns once the event loop is spawned and the model request issued;
    /// the session itself completes asynchronously.
    pub fn start(&self, images_path: impl AsRef<Path>) -> Result<StartedSession> {
        let images_path = images_path.as_ref();
        let _guard = self.runtime.enter();

        {
            let mut slot = self.active.lock();
            if !slot.is_idle() {
                return Err(SessionError::AlreadyActive);
            }
            if !self.engine.is_supported() {
                return Err(SessionError::Unsupported);
            }
            *slot = Slot::Starting {
                cancel_pending: false,
            };
        }

        // Construction runs unlocked so stop and the polls never wait on the engine.
        let session = match self.construct(images_path) {
            Ok(session) => session,
            Err(e) => {
                *self.active.lock() = Slot::Idle;
                return Err(e);
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(SessionHandle::new(
            id,
            images_path.to_path_buf(),
            session.control,
        ));
        let events = session.events;
        let cancel_pending = {
            let mut slot = self.active.lock();
            let pending = matches!(
                *slot,
                Slot::Starting {
                    cancel_pending: true
                }
            );
            *slot = Slot::Active(Arc::clone(&handle));
            pending
        };

        let artifact = images_path.join(&self.config.artifact_name);
        let event_loop = EventLoop::new(
            handle.id(),
            Arc::clone(&self.state),
            Arc::clone(&self.active),
            self.export.clone(),
            artifact.clone(),
            images_path.join(&self.config.export_dir),
            handle.started_at(),
        );

        let on_fatal = Arc::clone(&self.on_fatal);
        let task = self.runtime.spawn(async move {
            let result = event_loop.run(events).await;
            match &result {
                Ok(outcome) => debug!("event loop finished: {:?}", outcome),
                Err(e) => on_fatal(e),
            }
            result
        });

        let request = Request::ModelFile {
            url: artifact,
            detail: self.config.detail,
        };
        info!("using request: {}", request);
        if let Err(e) = handle.control().process(vec![request]) {
            error!("error issuing request for session {}: {}", handle.id(), e);
        }

        if cancel_pending {
            info!("session {} was stopped while starting", handle.id());
            handle.request_cancel();
        }

        Ok(StartedSession {
            id: handle.id(),
            task,
        })
    }

    /// Ask the active session to cancel. Returns immediately; the state reset
    /// happens when the event loop sees the cancellation event.
    /// A session still under construction is cancelled as soon as it is
    /// published.
    pub fn stop(&self) -> StopOutcome {
        let mut slot = self.active.lock();
        match &mut *slot {
            Slot::Active(handle) => {
                let handle = Arc::clone(handle);
                self.runtime.spawn(async move {
                    handle.request_cancel();
                });
                StopOutcome::Requested
            }
            Slot::Starting { cancel_pending } => {
                debug!("session still starting, deferring cancel");
                *cancel_pending = true;
                StopOutcome::Requested
            }
            Slot::Idle => {
                warn!("no active session to stop");
                StopOutcome::NoActiveSession
            }
        }
    }

    /// True from the moment `start` reserves the slot until the session
    /// reaches a terminal state.
    pub fn is_active(&self) -> bool {
        !self.active.lock().is_idle()
    }

    /// Id of the published session. `None` while a start is still constructing.
    pub fn active_session(&self) -> Option<SessionId> {
        self.active.lock().handle().map(|h| h.id())
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state.completed()
    }

    pub fn progress(&self) -> f64 {
        self.state.progress()
    }

    pub fn eta(&self) -> f64 {
        self.state.eta()
    }

    fn construct(&self, images_path: &Path) -> Result<Session> {
        info!("using input images folder: {}", images_path.display());
        self.remove_stale_artifact(images_path);

        debug!("using configuration: {:?}", self.config);
        let session = self
            .engine
            .create_session(images_path, &self.config)
            .map_err(SessionError::Construction)?;
        info!("created reconstruction session");
        Ok(session)
    }

    fn remove_stale_artifact(&self, images_path: &Path) {
        let stale = images_path.join(&self.config.artifact_name);
        match std::fs::remove_file(&stale) {
            Ok(()) => debug!("removed stale artifact {}", stale.display()),
            Err(e) => debug!("no stale artifact removed at {}: {}", stale.display(), e),
        }
    }
}
