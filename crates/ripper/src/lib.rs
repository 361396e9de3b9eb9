pub mod batch;
pub mod calc;
pub mod config;
pub mod error;
pub mod handbrake;
pub mod job;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod queue;
pub mod resume;
pub mod scan;
pub mod select;
pub mod stream;

pub use batch::{Batch, RunSummary};
pub use config::{PreferenceSet, RipConfig};
pub use error::{EncoderError, JobError, ParseError, PipelineError};
pub use handbrake::{Encoder, HandBrakeCli};
pub use job::{EncodeJob, EncoderOption, JobBuilder, JobStatus, PendingJob};
pub use parser::{ScanParser, ScanResult};
pub use pipeline::{Pipeline, PipelineContext, Progress, ProgressSink, RunStats};
pub use prompt::{NonInteractive, Prompter, StdinPrompter};
pub use resume::ResumeList;
pub use select::{select_tracks, SelectionResult};
pub use stream::{AudioStream, Stream, SubtitleStream, VideoStream};
