use std::any::Any;
use std::io;

use crate::engine::EngineState;

/// Failures of a search run.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The engine is single-use; `run` was called again.
    #[error("search engine already used (state: {state:?}); create a fresh engine")]
    DoubleRun { state: EngineState },

    /// A worker thread terminated abnormally.
    #[error("worker for {unit} failed: {reason}")]
    WorkerFailure { unit: String, reason: String },

    /// The OS refused to start a worker thread.
    #[error("could not spawn worker for {unit}: {source}")]
    Spawn {
        unit: String,
        #[source]
        source: io::Error,
    },

    /// A report sink failed to write.
    #[error("failed to emit results: {0}")]
    Output(#[from] io::Error),
}

impl SearchError {
    pub(crate) fn worker_failure(unit: String, payload: Box<dyn Any + Send>) -> Self {
        let reason = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "worker panicked".to_string()
        };
        SearchError::WorkerFailure { unit, reason }
    }
}
