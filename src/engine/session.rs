// Handle to the single active reconstruction session.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::traits::SessionControl;

pub type SessionId = u64;

/// What the manager's single session slot currently holds.
pub enum Slot {
    Idle,
    /// A `start` is constructing the session outside the lock. A `stop` seen
    /// meanwhile is recorded here and applied once the handle is published.
    Starting { cancel_pending: bool },
    Active(Arc<SessionHandle>),
}

impl Slot {
    pub fn is_idle(&self) -> bool {
        matches!(self, Slot::Idle)
    }

    pub fn handle(&self) -> Option<&Arc<SessionHandle>> {
        match self {
            Slot::Active(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Slot shared by the manager and the event loop. Only held for short
/// critical sections, never across engine calls.
pub type ActiveSlot = Arc<Mutex<Slot>>;

pub struct SessionHandle {
    id: SessionId,
    images_path: PathBuf,
    control: Arc<dyn SessionControl>,
    cancel_requested: AtomicBool,
    started_at: Instant,
}

impl SessionHandle {
    pub fn new(id: SessionId, images_path: PathBuf, control: Arc<dyn SessionControl>) -> Self {
        Self {
            id,
            images_path,
            control,
            cancel_requested: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn control(&self) -> &Arc<dyn SessionControl> {
        &self.control
    }

    /// Signal cancellation to the engine. Only the first call reaches the
    /// engine; later calls are no-ops.
    pub fn request_cancel(&self) {
        if self.cancel_requested.swap(true, Ordering::AcqRel) {
            debug!("session {} already asked to cancel", self.id);
            return;
        }
        self.control.cancel();
        warn!(
            "reconstruction session {} for {} was requested to cancel",
            self.id,
            self.images_path.display()
        );
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }
}

/// Clear the slot if it still holds session `id`. Returns whether it did.
pub fn retire(slot: &ActiveSlot, id: SessionId) -> bool {
    let mut active = slot.lock();
    if active.handle().map(|h| h.id()) != Some(id) {
        return false;
    }
    *active = Slot::Idle;
    debug!("session {} retired", id);
    true
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::engine::events::Request;
    use crate::error::EngineError;

    #[derive(Default)]
    struct CountingControl {
        cancels: AtomicUsize,
    }

    impl SessionControl for CountingControl {
        fn process(&self, _requests: Vec<Request>) -> Result<(), EngineError> {
            Ok(())
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_request_cancel_is_idempotent() {
        let control = Arc::new(CountingControl::default());
        let handle = SessionHandle::new(1, PathBuf::from("imgs"), control.clone());
        assert!(!handle.cancel_requested());

        handle.request_cancel();
        handle.request_cancel();

        assert!(handle.cancel_requested());
        assert_eq!(control.cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retire_only_matching_session() {
        let control = Arc::new(CountingControl::default());
        let slot: ActiveSlot = Arc::new(Mutex::new(Slot::Active(Arc::new(SessionHandle::new(
            7,
            PathBuf::from("imgs"),
            control,
        )))));

        assert!(!retire(&slot, 6));
        assert_eq!(slot.lock().handle().map(|h| h.id()), Some(7));

        assert!(retire(&slot, 7));
        assert!(slot.lock().is_idle());
        assert!(!retire(&slot, 7));
    }

    #[test]
    fn test_retire_leaves_starting_slot_alone() {
        let slot: ActiveSlot = Arc::new(Mutex::new(Slot::Starting {
            cancel_pending: true,
        }));

        assert!(!retire(&slot, 1));
        assert!(matches!(
            *slot.lock(),
            Slot::Starting {
                cancel_pending: true
            }
        ));
    }
}
