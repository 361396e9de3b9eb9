use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use crate::calc::compute_bitrate_with;
use crate::config::RipConfig;
use crate::error::{EncoderError, PipelineError};
use crate::handbrake::Encoder;
use crate::job::{output_path, EncodeJob, JobBuilder, JobStatus, PendingJob};
use crate::parser::ScanParser;
use crate::pipeline::{Pipeline, PipelineContext, ProgressSink};
use crate::prompt::Prompter;
use crate::resume::ResumeList;
use crate::select::select_tracks;

/// Outcome of a whole batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub inputs: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub aborted: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed: chrono::Duration,
}

impl RunSummary {
    pub fn log(&self) {
        let secs = self.elapsed.num_seconds();
        info!(
            "📊 {} input(s): {} completed, {} failed, {} skipped, {} aborted in {}h{:02}m{:02}s",
            self.inputs,
            self.completed,
            self.failed,
            self.skipped,
            self.aborted,
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        );
    }
}

/// What the driver does with one scanned input
#[derive(Debug)]
enum Prepared {
    Rip(EncodeJob),
    Question(PendingJob),
    Skip(String),
}

/// Drives one run: scan and select on the calling thread, encode on the workers
pub struct Batch {
    config: RipConfig,
    encoder: Arc<dyn Encoder>,
    prompter: Box<dyn Prompter>,
    parser: ScanParser,
    ctx: Arc<PipelineContext>,
    dest: Option<PathBuf>,
    resume_path: Option<PathBuf>,
    progress: Option<ProgressSink>,
}

impl Batch {
    pub fn new(config: RipConfig, encoder: Arc<dyn Encoder>, prompter: Box<dyn Prompter>) -> Result<Self> {
        let parser = ScanParser::new().context("Failed to compile scan patterns")?;
        let builder = JobBuilder::new(config.options.clone(), config.preference_set());
        Ok(Batch {
            config,
            encoder,
            prompter,
            parser,
            ctx: Arc::new(PipelineContext::new(builder, None)),
            dest: None,
            resume_path: None,
            progress: None,
        })
    }

    /// Write outputs into `dest` instead of next to the inputs
    pub fn with_dest(mut self, dest: Option<PathBuf>) -> Self {
        self.dest = dest;
        self
    }

    /// Track unfinished inputs in a resume list at `path`
    pub fn with_resume(mut self, path: Option<PathBuf>) -> Self {
        self.resume_path = path;
        self
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Shared run state, e.g. for aborting from a signal handler
    pub fn context(&self) -> Arc<PipelineContext> {
        self.ctx.clone()
    }

    pub fn run(self, inputs: Vec<PathBuf>) -> Result<RunSummary, PipelineError> {
        let started_at = Utc::now();
        let Batch { config, encoder, prompter, parser, ctx, dest, resume_path, progress } = self;

        if let Some(path) = &resume_path {
            match ResumeList::snapshot(path, inputs.clone()) {
                Ok(list) => ctx.attach_resume(list),
                Err(e) => warn!("Resume list disabled: {:#}", e),
            }
        }

        let pipeline = Pipeline::start(ctx.clone(), encoder.clone(), prompter, progress)?;
        let mut failed = 0usize;
        let mut skipped = 0usize;

        for input in &inputs {
            if ctx.is_finished() {
                break;
            }
            info!("🔍 Scanning {}", input.display());

            let report = match encoder.scan(input) {
                Ok(report) => report,
                Err(EncoderError::Interrupted) => {
                    warn!("Scan of {} interrupted", input.display());
                    ctx.abort();
                    break;
                }
                Err(e) => {
                    error!("Failed to scan {}: {}", input.display(), e);
                    failed += 1;
                    continue;
                }
            };

            match prepare(&config, &parser, ctx.builder(), dest.as_deref(), input, &report) {
                Ok(Prepared::Rip(job)) => {
                    pipeline.submit_rip(job);
                }
                Ok(Prepared::Question(pending)) => {
                    pipeline.submit_question(pending);
                }
                Ok(Prepared::Skip(reason)) => {
                    warn!("⏭️  Skipping {}: {}", input.display(), reason);
                    skipped += 1;
                }
                Err(e) => {
                    error!("Failed to prepare {}: {:#}", input.display(), e);
                    failed += 1;
                }
            }
        }

        let stats = pipeline.join()?;
        let summary = RunSummary {
            inputs: inputs.len(),
            completed: stats.completed,
            failed: stats.failed + failed,
            skipped: stats.skipped + skipped,
            aborted: stats.aborted,
            started_at,
            elapsed: Utc::now() - started_at,
        };
        summary.log();
        Ok(summary)
    }
}

/// Parse a scan report and decide whether the input can go straight to the encoder
fn prepare(
    config: &RipConfig,
    parser: &ScanParser,
    builder: &JobBuilder,
    dest: Option<&Path>,
    input: &Path,
    report: &str,
) -> Result<Prepared> {
    let scan = parser
        .parse(report)
        .with_context(|| format!("Failed to parse scan report of {}", input.display()))?;

    for stream in scan.streams() {
        debug!(
            "{}: track {} ({}){}",
            input.display(),
            stream.position(),
            stream.language().unwrap_or("und"),
            if stream.is_default() { " default" } else { "" }
        );
    }

    if scan.title.is_none() {
        return Ok(Prepared::Skip(format!(
            "no title of at least {}s found",
            config.min_duration_secs
        )));
    }

    let prefs = builder.preferences();
    let selection = select_tracks(&scan, prefs);
    if selection.audio.is_empty() {
        warn!("No preferred audio track in {}", input.display());
    }

    let (width, height) = scan.geometry();
    let bitrate = compute_bitrate_with(config.bpf_strategy, width, height, scan.frame_rate, config.bpf);
    info!(
        "{}: title {}, {}s, {:?}x{:?} @ {:?} fps -> {:?} kbps",
        input.display(),
        scan.title.as_deref().unwrap_or("?"),
        scan.duration.unwrap_or(0),
        width,
        height,
        scan.frame_rate,
        bitrate
    );

    let mut pending = PendingJob {
        input: input.to_path_buf(),
        output: output_path(input, dest),
        title: scan.title.clone(),
        selection,
        bitrate,
        subtitle_files: Vec::new(),
        geometry: (width, height),
        status: JobStatus::Resolved,
    };

    if pending.needs_questions(prefs) {
        pending.status = JobStatus::PendingQuestions;
        return Ok(Prepared::Question(pending));
    }

    let job = builder
        .build(&pending)
        .with_context(|| format!("Failed to build encoder arguments for {}", input.display()))?;
    Ok(Prepared::Rip(job))
}
