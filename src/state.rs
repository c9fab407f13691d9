// Poll-visible session state: three scalars, each behind its own lock.

use parking_lot::Mutex;

/// Scalars read by the foreign caller while a session runs.
///
/// Each value has its own lock; a reader may see `completed == true` next to
/// a stale `progress`. Never hold more than one of these locks at a time.
pub struct SharedState {
    completed: Mutex<bool>,
    progress: Mutex<f64>,
    eta: Mutex<f64>,
}

/// Point-in-time read of all three scalars, taken one lock after another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub completed: bool,
    pub progress: f64,
    pub eta: f64,
}

impl SharedState {
    pub const fn new() -> Self {
        Self {
            completed: Mutex::new(false),
            progress: Mutex::new(0.0),
            eta: Mutex::new(0.0),
        }
    }

    pub fn completed(&self) -> bool {
        *self.completed.lock()
    }

    pub fn progress(&self) -> f64 {
        *self.progress.lock()
    }

    pub fn eta(&self) -> f64 {
        *self.eta.lock()
    }

    pub fn set_completed(&self, value: bool) {
        *self.completed.lock() = value;
    }

    pub fn set_progress(&self, value: f64) {
        *self.progress.lock() = value;
    }

    pub fn set_eta(&self, value: f64) {
        *self.eta.lock() = value;
    }

    /// Apply the cancellation reset: progress 0, eta 0, not completed.
    pub fn reset(&self) {
        self.set_progress(0.0);
        self.set_eta(0.0);
        self.set_completed(false);
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            completed: self.completed(),
            progress: self.progress(),
            eta: self.eta(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_defaults_before_any_session() {
        let state = SharedState::new();
        assert!(!state.completed());
        assert_eq!(state.progress(), 0.0);
        assert_eq!(state.eta(), 0.0);
    }

    #[test]
    fn test_reads_are_stable() {
        let state = SharedState::new();
        state.set_progress(0.42);
        state.set_eta(17.5);
        for _ in 0..10 {
            assert_eq!(state.progress(), 0.42);
            assert_eq!(state.eta(), 17.5);
            assert!(!state.completed());
        }
    }

    #[test]
    fn test_reset() {
        let state = SharedState::new();
        state.set_progress(0.9);
        state.set_eta(-1.0);
        state.set_completed(true);
        state.reset();
        assert_eq!(
            state.snapshot(),
            StateSnapshot {
                completed: false,
                progress: 0.0,
                eta: 0.0
            }
        );
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let state = Arc::new(SharedState::new());
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    for step in 0..1000 {
                        state.set_progress(step as f64 / 1000.0);
                        state.set_eta(i as f64);
                    }
                })
            })
            .collect();

        let reader = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for _ in 0..1000 {
                    let p = state.progress();
                    assert!((0.0..1.0).contains(&p));
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(state.progress(), 0.999);
    }
}
