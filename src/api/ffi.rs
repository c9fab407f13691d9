// C ABI entry points backed by a process-wide runtime and session manager.

use std::ffi::{c_char, CStr};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::runtime::{Builder, Runtime};
use tracing::{error, info, warn};

use super::init::init_logging;
use crate::config::FATAL_EXIT_CODE;
use crate::engine::manager::SessionManager;
use crate::engine::traits::{ReconstructionEngine, UnsupportedEngine};
use crate::error::SessionError;
use crate::export::{AssetExporter, CopyExporter};
use crate::state::SharedState;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
static MANAGER: OnceLock<SessionManager> = OnceLock::new();
static STATE: OnceLock<Arc<SharedState>> = OnceLock::new();

static ENGINE: Mutex<Option<Arc<dyn ReconstructionEngine>>> = Mutex::new(None);
static EXPORTER: Mutex<Option<Arc<dyn AssetExporter>>> = Mutex::new(None);

/// Install the reconstruction engine used by [`run_session`].
///
/// Returns `false` once the first session has been started; the manager is
/// built then and keeps the engine it saw.
pub fn install_engine(engine: Arc<dyn ReconstructionEngine>) -> bool {
    if MANAGER.get().is_some() {
        return false;
    }
    *ENGINE.lock() = Some(engine);
    true
}

/// Install the exporter run after a successful session. Same rules as
/// [`install_engine`].
pub fn install_exporter(exporter: Arc<dyn AssetExporter>) -> bool {
    if MANAGER.get().is_some() {
        return false;
    }
    *EXPORTER.lock() = Some(exporter);
    true
}

fn shared_state() -> &'static Arc<SharedState> {
    STATE.get_or_init(|| Arc::new(SharedState::new()))
}

fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        match Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("pgm-session")
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                error!("failed to start session runtime: {}", e);
                std::process::exit(FATAL_EXIT_CODE)
            }
        }
    })
}

fn manager() -> &'static SessionManager {
    MANAGER.get_or_init(|| {
        let engine = ENGINE
            .lock()
            .clone()
            .unwrap_or_else(|| Arc::new(UnsupportedEngine));
        let exporter = EXPORTER
            .lock()
            .clone()
            .unwrap_or_else(|| Arc::new(CopyExporter));

        SessionManager::new(engine, exporter, runtime().handle().clone())
            .with_state(Arc::clone(shared_state()))
            .with_fatal_handler(Arc::new(|e: &SessionError| {
                fatal(e);
            }))
    })
}

fn fatal(e: &SessionError) -> ! {
    error!("{}", e);
    std::process::exit(FATAL_EXIT_CODE)
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn path_from_c(ptr: *const c_char) -> Result<PathBuf, SessionError> {
    if ptr.is_null() {
        return Err(SessionError::InvalidPath("null pointer".to_string()));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(PathBuf::from)
        .map_err(|e| SessionError::InvalidPath(e.to_string()))
}

/// Start reconstructing the images in `images_path`.
///
/// Exits the process when reconstruction is unsupported or the session cannot
/// be constructed.
///
/// # Safety
/// `images_path` must be null or point to a NUL-terminated string that stays
/// valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn run_session(images_path: *const c_char) {
    init_logging();

    let started = path_from_c(images_path).and_then(|path| {
        let started = manager().start(&path)?;
        info!("session {} started for {}", started.id, path.display());
        Ok(started)
    });

    match started {
        Ok(_) => {}
        Err(e) if e.is_fatal() => fatal(&e),
        Err(e) => error!("cannot start session: {}", e),
    }
}

/// Request cancellation of the active session. No-op when none is active.
#[no_mangle]
pub extern "C" fn stop_session() {
    init_logging();
    match MANAGER.get() {
        Some(manager) => {
            manager.stop();
        }
        None => warn!("no active session to stop"),
    }
}

#[no_mangle]
pub extern "C" fn is_completed() -> bool {
    shared_state().completed()
}

#[no_mangle]
pub extern "C" fn get_progress() -> f64 {
    shared_state().progress()
}

#[no_mangle]
pub extern "C" fn get_eta() -> f64 {
    shared_state().eta()
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;

    use super::*;

    #[test]
    fn test_path_from_c() {
        let raw = CString::new("pgm/reconstruction").unwrap();
        let path = unsafe { path_from_c(raw.as_ptr()) }.unwrap();
        assert_eq!(path, PathBuf::from("pgm/reconstruction"));

        let err = unsafe { path_from_c(std::ptr::null()) }.unwrap_err();
        assert!(matches!(err, SessionError::InvalidPath(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_polls_and_stop_before_any_session() {
        stop_session();
        assert!(!is_completed());
        assert_eq!(get_progress(), 0.0);
        assert_eq!(get_eta(), 0.0);
    }
}
