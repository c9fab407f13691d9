// Session event loop: drains one session's output stream and drives SharedState.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::events::{EventStream, RequestResult, SessionEvent};
use super::session::{retire, ActiveSlot, SessionId};
use crate::config::ETA_UNKNOWN;
use crate::error::{Result, SessionError};
use crate::export::ExportStep;
use crate::state::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Completed,
    Cancelled,
}

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// `ProcessingComplete` was handled; `exported` tells whether the export
    /// step succeeded.
    Completed { exported: bool },
    Cancelled,
    /// The engine closed the stream without a terminal event.
    StreamEnded,
}

pub struct EventLoop {
    session_id: SessionId,
    state: Arc<SharedState>,
    slot: ActiveSlot,
    export: ExportStep,
    artifact: PathBuf,
    export_dir: PathBuf,
    started_at: Instant,
    phase: LoopState,
}

impl EventLoop {
    pub fn new(
        session_id: SessionId,
        state: Arc<SharedState>,
        slot: ActiveSlot,
        export: ExportStep,
        artifact: PathBuf,
        export_dir: PathBuf,
        started_at: Instant,
    ) -> Self {
        Self {
            session_id,
            state,
            slot,
            export,
            artifact,
            export_dir,
            started_at,
            phase: LoopState::Running,
        }
    }

    /// Consume `events` in order until a terminal event. The stream is not
    /// drained past it.
    pub async fn run(mut self, mut events: EventStream) -> Result<LoopOutcome> {
        while let Some(event) = events.recv().await {
            if let Some(outcome) = self.handle(event).await? {
                return Ok(outcome);
            }
        }

        warn!(
            "session {} output stream ended without a terminal event",
            self.session_id
        );
        retire(&self.slot, self.session_id);
        Ok(LoopOutcome::StreamEnded)
    }

    /// Apply one event. Returns `Some` once the session reached a terminal state.
    async fn handle(&mut self, event: SessionEvent) -> Result<Option<LoopOutcome>> {
        match event {
            SessionEvent::RequestProgress { fraction, .. } => {
                self.state.set_progress(fraction);
                debug!("progress = {}", format_percent(fraction));
            }
            SessionEvent::RequestProgressInfo {
                estimated_remaining,
                ..
            } => {
                self.state.set_eta(estimated_remaining.unwrap_or(ETA_UNKNOWN));
                match estimated_remaining {
                    Some(secs) => debug!("estimated time remaining = {:.2}s", secs),
                    None => debug!("estimated time remaining = unknown"),
                }
            }
            SessionEvent::InputComplete => {
                info!("data ingestion is complete, beginning processing");
            }
            SessionEvent::RequestError { request, error } => {
                info!("request {} had an error: {}", request, error);
            }
            SessionEvent::RequestComplete { request, result } => {
                info!("request complete: {}", request);
                match result {
                    RequestResult::ModelFile { url } => {
                        debug!("model file available at {}", url.display());
                    }
                    RequestResult::Other { description } => {
                        warn!("unexpected request result: {}", description);
                    }
                }
            }
            SessionEvent::InvalidSample { id, reason } => {
                warn!("invalid sample id={} reason=\"{}\"", id, reason);
            }
            SessionEvent::SkippedSample { id } => {
                warn!("sample id={} was skipped by processing", id);
            }
            SessionEvent::AutomaticDownsampling => {
                warn!("automatic downsampling was applied");
            }
            SessionEvent::StitchingIncomplete => {
                warn!("received stitching incomplete message");
            }
            SessionEvent::ProcessingComplete => {
                return Ok(Some(self.complete().await));
            }
            SessionEvent::ProcessingCancelled => {
                warn!("processing was cancelled");
                retire(&self.slot, self.session_id);
                self.state.reset();
                self.finish(LoopState::Cancelled);
                return Ok(Some(LoopOutcome::Cancelled));
            }
            SessionEvent::Unrecognized { description } => {
                retire(&self.slot, self.session_id);
                return Err(SessionError::UnrecognizedEvent(description));
            }
        }
        Ok(None)
    }

    /// Export first, then publish completion, so `completed` implies the
    /// export was attempted and the slot is free. Export failure does not
    /// change the outcome.
    async fn complete(&mut self) -> LoopOutcome {
        info!(
            "processing is complete, time taken {}",
            format_elapsed(self.started_at.elapsed())
        );

        let exported = match self.export.run(&self.artifact, &self.export_dir).await {
            Ok(_) => true,
            Err(e) => {
                error!("error while exporting: {}", e);
                false
            }
        };

        retire(&self.slot, self.session_id);
        self.state.set_completed(true);
        self.finish(LoopState::Completed);
        LoopOutcome::Completed { exported }
    }

    fn finish(&mut self, phase: LoopState) {
        self.phase = phase;
        info!(
            "session {} {:?}: {:?}",
            self.session_id,
            self.phase,
            self.state.snapshot()
        );
    }
}

fn format_percent(fraction: f64) -> String {
    format!("{:05.2}%", fraction * 100.0)
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
