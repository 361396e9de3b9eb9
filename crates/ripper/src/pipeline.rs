use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use humansize::{format_size, DECIMAL};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use crate::error::{EncoderError, PipelineError};
use crate::handbrake::Encoder;
use crate::job::{EncodeJob, JobBuilder, JobStatus, PendingJob};
use crate::prompt::Prompter;
use crate::queue::{JobQueue, Pop};
use crate::resume::ResumeList;

/// How long a worker waits on its queue before re-checking the finished flag
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Rip worker notifications; the job passed alongside carries the current status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress<'a> {
    /// The encoder is about to start on the job
    Started,
    /// One progress fragment printed by the encoder
    Update(&'a str),
    /// The job left the encoder, completed or not
    Finished,
}

/// Receives progress notifications for the job being ripped
pub type ProgressSink = Box<dyn FnMut(&EncodeJob, Progress<'_>) + Send>;

/// Job counts at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub completed: usize,
    pub failed: usize,
    /// Inputs dropped before encoding (no bitrate, unusable preset)
    pub skipped: usize,
    /// Jobs discarded or cut short by an interrupt
    pub aborted: usize,
}

/// State shared by the driver and both workers for one run
pub struct PipelineContext {
    questions: JobQueue<PendingJob>,
    rips: JobQueue<EncodeJob>,
    finished: AtomicBool,
    interrupted: AtomicBool,
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    aborted: AtomicUsize,
    resume: Mutex<Option<ResumeList>>,
    builder: JobBuilder,
}

impl PipelineContext {
    pub fn new(builder: JobBuilder, resume: Option<ResumeList>) -> Self {
        PipelineContext {
            questions: JobQueue::new(),
            rips: JobQueue::new(),
            finished: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            aborted: AtomicUsize::new(0),
            resume: Mutex::new(resume),
            builder,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn builder(&self) -> &JobBuilder {
        &self.builder
    }

    /// Start removing finished inputs from `list`
    pub fn attach_resume(&self, list: ResumeList) {
        *self.resume.lock() = Some(list);
    }

    /// Stop the run: no new work starts and everything still queued is discarded
    pub fn abort(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.finished.store(true, Ordering::SeqCst);
        let rips = self.rips.drain_and_close().len();
        let questions = self.questions.drain_and_close().len();
        if rips + questions > 0 {
            warn!("Interrupted, discarding {} queued job(s)", rips + questions);
        }
        self.aborted.fetch_add(rips + questions, Ordering::SeqCst);
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            aborted: self.aborted.load(Ordering::SeqCst),
        }
    }

    pub fn pending_rips(&self) -> usize {
        self.rips.len()
    }

    pub fn pending_questions(&self) -> usize {
        self.questions.len()
    }

    /// Hand a built job to the rip worker; counted as aborted if the run is over
    fn enqueue_rip(&self, mut job: EncodeJob) -> bool {
        if self.is_finished() {
            self.aborted.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        job.status = JobStatus::QueuedForRip;
        match self.rips.push(job) {
            Ok(()) => true,
            Err(_) => {
                self.aborted.fetch_add(1, Ordering::SeqCst);
                false
            }
        }
    }

    /// Take a popped job for encoding unless an abort slipped in since the pop
    fn claim(&self, mut job: EncodeJob) -> Option<EncodeJob> {
        if self.is_finished() {
            debug!("Run finished, not starting {}", job.input.display());
            self.aborted.fetch_add(1, Ordering::SeqCst);
            return None;
        }
        job.status = JobStatus::Ripping;
        Some(job)
    }

    fn mark_done(&self, job: &EncodeJob) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        if let Some(list) = self.resume.lock().as_mut() {
            if let Err(e) = list.remove(&job.input) {
                warn!("Failed to update resume list: {:#}", e);
            }
        }
    }
}

/// The two long-lived workers of a run
pub struct Pipeline {
    ctx: Arc<PipelineContext>,
    question_worker: JoinHandle<()>,
    rip_worker: JoinHandle<()>,
}

impl Pipeline {
    pub fn start(
        ctx: Arc<PipelineContext>,
        encoder: Arc<dyn Encoder>,
        prompter: Box<dyn Prompter>,
        progress: Option<ProgressSink>,
    ) -> Result<Self, PipelineError> {
        let rip_worker = {
            let worker_ctx = ctx.clone();
            thread::Builder::new()
                .name("rip-worker".to_string())
                .spawn(move || run_rips(&worker_ctx, encoder.as_ref(), progress))
                .map_err(|source| PipelineError::Spawn { worker: "rip", source })?
        };

        let question_worker = {
            let worker_ctx = ctx.clone();
            let spawned = thread::Builder::new()
                .name("question-worker".to_string())
                .spawn(move || run_questions(&worker_ctx, prompter));
            match spawned {
                Ok(handle) => handle,
                Err(source) => {
                    // Let the rip worker see a closed queue and exit
                    ctx.rips.close();
                    let _ = rip_worker.join();
                    return Err(PipelineError::Spawn { worker: "question", source });
                }
            }
        };

        Ok(Pipeline { ctx, question_worker, rip_worker })
    }

    /// Queue an input that still needs answers
    pub fn submit_question(&self, mut pending: PendingJob) -> bool {
        if self.ctx.is_finished() {
            return false;
        }
        pending.status = JobStatus::PendingQuestions;
        self.ctx.questions.push(pending).is_ok()
    }

    /// Queue a fully resolved job
    pub fn submit_rip(&self, job: EncodeJob) -> bool {
        self.ctx.enqueue_rip(job)
    }

    /// Wait for both workers: questions first, then the rips they produced
    pub fn join(self) -> Result<RunStats, PipelineError> {
        self.ctx.questions.close();
        let questions = self.question_worker.join();
        self.ctx.rips.close();
        let rips = self.rip_worker.join();

        questions.map_err(|_| PipelineError::WorkerPanicked { worker: "question" })?;
        rips.map_err(|_| PipelineError::WorkerPanicked { worker: "rip" })?;

        let stats = self.ctx.stats();
        if self.ctx.is_interrupted() {
            return Err(PipelineError::Interrupted { discarded: stats.aborted });
        }
        Ok(stats)
    }
}

fn run_questions(ctx: &PipelineContext, mut prompter: Box<dyn Prompter>) {
    while !ctx.is_finished() {
        let mut pending = match ctx.questions.pop_timeout(POLL_INTERVAL) {
            Pop::Item(pending) => pending,
            Pop::Timeout => continue,
            Pop::Closed => break,
        };
        debug!("Resolving questions for {}", pending.input.display());

        if pending.needs_bitrate() {
            match prompter.ask_bitrate(&pending.input, pending.geometry) {
                Ok(Some(kbps)) => pending.bitrate = Some(kbps),
                Ok(None) => {
                    info!("⏭️  Skipping {}: no bitrate", pending.input.display());
                    ctx.skipped.fetch_add(1, Ordering::SeqCst);
                    continue;
                }
                Err(e) => {
                    error!("Question failed for {}: {:#}", pending.input.display(), e);
                    ctx.failed.fetch_add(1, Ordering::SeqCst);
                    continue;
                }
            }
        }

        if pending.needs_subtitles(ctx.builder.preferences()) {
            match prompter.ask_subtitle_files(&pending.input) {
                Ok(files) => pending.subtitle_files = files,
                Err(e) => {
                    error!("Question failed for {}: {:#}", pending.input.display(), e);
                    ctx.failed.fetch_add(1, Ordering::SeqCst);
                    continue;
                }
            }
        }
        pending.status = JobStatus::Resolved;

        match ctx.builder.build(&pending) {
            Ok(job) => {
                ctx.enqueue_rip(job);
            }
            Err(e) => {
                error!("Cannot build job for {}: {}", pending.input.display(), e);
                ctx.skipped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
    debug!("Question worker stopped");
}

fn notify(progress: &mut Option<ProgressSink>, job: &EncodeJob, event: Progress<'_>) {
    match progress.as_mut() {
        Some(sink) => sink(job, event),
        None => trace!("{}: {:?} {:?}", job.input.display(), job.status, event),
    }
}

fn run_rips(ctx: &PipelineContext, encoder: &dyn Encoder, mut progress: Option<ProgressSink>) {
    while !ctx.is_finished() {
        let popped = match ctx.rips.pop_timeout(POLL_INTERVAL) {
            Pop::Item(job) => job,
            Pop::Timeout => continue,
            Pop::Closed => break,
        };
        let Some(mut job) = ctx.claim(popped) else {
            break;
        };
        notify(&mut progress, &job, Progress::Started);

        let result = {
            let current = &job;
            let progress = &mut progress;
            let mut report = |fragment: &str| notify(progress, current, Progress::Update(fragment));
            encoder.encode(current, &mut report)
        };

        let interrupted = matches!(result, Err(EncoderError::Interrupted));
        match result {
            Ok(_) => {
                job.status = JobStatus::Completed;
                match std::fs::metadata(&job.output) {
                    Ok(meta) => info!("✅ Finished {} ({})", job.output.display(), format_size(meta.len(), DECIMAL)),
                    Err(_) => info!("✅ Finished {}", job.output.display()),
                }
                ctx.mark_done(&job);
            }
            Err(EncoderError::Interrupted) => {
                job.status = JobStatus::Aborted;
                warn!("Encoder interrupted while ripping {}", job.input.display());
                ctx.aborted.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                job.status = JobStatus::Failed;
                error!("❌ Rip failed for {}: {}", job.input.display(), e);
                ctx.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
        notify(&mut progress, &job, Progress::Finished);

        if interrupted {
            ctx.abort();
            break;
        }
    }
    debug!("Rip worker stopped");
}
