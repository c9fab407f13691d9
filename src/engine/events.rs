// Engine output events and the requests they refer to.

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::config::Detail;

/// Ordered stream of events produced by one session.
pub type EventStream = mpsc::Receiver<SessionEvent>;

/// Sending side of an [`EventStream`], held by engine implementations.
pub type EventSender = mpsc::Sender<SessionEvent>;

/// Identifier of an input sample (one image in the folder).
pub type SampleId = u64;

/// Work item issued to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Produce a model file at `url` with the given level of detail.
    ModelFile { url: PathBuf, detail: Detail },
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::ModelFile { url, detail } => {
                write!(f, "modelFile(url={}, detail={:?})", url.display(), detail)
            }
        }
    }
}

/// Payload of a completed request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestResult {
    ModelFile { url: PathBuf },
    Other { description: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// All samples were ingested; processing begins.
    InputComplete,
    RequestProgress { request: Request, fraction: f64 },
    /// Estimated seconds remaining, `None` when the engine has no estimate.
    RequestProgressInfo {
        request: Request,
        estimated_remaining: Option<f64>,
    },
    RequestComplete {
        request: Request,
        result: RequestResult,
    },
    RequestError { request: Request, error: String },
    InvalidSample { id: SampleId, reason: String },
    SkippedSample { id: SampleId },
    AutomaticDownsampling,
    StitchingIncomplete,
    ProcessingComplete,
    ProcessingCancelled,
    /// Output the engine adapter could not map onto a known variant.
    Unrecognized { description: String },
}

impl SessionEvent {
    /// Terminal events end the event loop and retire the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::ProcessingComplete | SessionEvent::ProcessingCancelled
        )
    }
}
