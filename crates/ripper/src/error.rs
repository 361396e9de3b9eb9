use std::path::PathBuf;
use thiserror::Error;

/// Malformed values found while reading a scan report
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Duration did not have the `HH:MM:SS[.mmm]` shape
    #[error("invalid duration {text:?}: expected HH:MM:SS or HH:MM:SS.mmm")]
    Duration { text: String },
}

/// Failures reported by the encoder adapter
#[derive(Debug, Error)]
pub enum EncoderError {
    /// The encoder itself received an interrupt signal (user pressed Ctrl-C)
    #[error("encoder was interrupted")]
    Interrupted,

    /// The encoder ran but exited unsuccessfully
    #[error("encoder exited with code {code:?} for {input}: {stderr_tail}")]
    Failed {
        input: PathBuf,
        code: Option<i32>,
        stderr_tail: String,
    },

    /// The encoder binary could not be started or its output not read
    #[error("failed to run encoder {bin}: {source}")]
    Spawn {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Run-level failures surfaced by the worker pool
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The run was aborted by an interrupt; remaining rip jobs were discarded
    #[error("run interrupted, {discarded} queued job(s) discarded")]
    Interrupted { discarded: usize },

    /// A worker thread panicked
    #[error("{worker} worker panicked")]
    WorkerPanicked { worker: &'static str },

    /// A worker thread could not be spawned
    #[error("failed to spawn {worker} worker: {source}")]
    Spawn {
        worker: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Problems turning a resolved plan into encoder arguments
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    /// A preset option names a handler that does not exist
    #[error("unknown option handler {handler:?} for {key}")]
    UnknownHandler { key: String, handler: String },

    /// A handler has no value for this job (e.g. bitrate never resolved)
    #[error("no {handler} value available for {key}")]
    MissingValue { key: String, handler: String },
}
