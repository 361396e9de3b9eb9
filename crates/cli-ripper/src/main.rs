use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use ripper::{
    scan, Batch, EncodeJob, HandBrakeCli, NonInteractive, PipelineError, Progress, ProgressSink,
    Prompter, ResumeList, RipConfig, StdinPrompter,
};

/// Exit code of a run stopped by Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

/// Batch HandBrakeCLI ripper
#[derive(Parser, Debug)]
#[command(name = "rippy", author, version, about, long_about = None)]
struct Args {
    /// Folder where ripped files will be stored (default: next to each input)
    #[arg(short, long)]
    dest: Option<PathBuf>,

    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also rip the inputs left unfinished by a previous run
    #[arg(long)]
    resume: bool,

    /// Never ask questions; use the configured fallback bitrate or skip
    #[arg(long)]
    no_prompt: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Files or folders to rip, folders are walked recursively
    files: Vec<PathBuf>,
}

/// Stderr writer that hides the progress bars while it prints
#[derive(Clone)]
struct Terminal(MultiProgress);

impl Write for Terminal {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// One spinner per encode, showing the latest HandBrakeCLI progress line
fn progress_display(multi: MultiProgress) -> ProgressSink {
    let mut current: Option<ProgressBar> = None;
    Box::new(move |job: &EncodeJob, event: Progress<'_>| match event {
        Progress::Started => {
            let spinner = multi.add(ProgressBar::new_spinner());
            match ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {wide_msg}") {
                Ok(style) => spinner.set_style(style),
                Err(e) => debug!("Default spinner style kept: {}", e),
            }
            let name = job.input.file_name().unwrap_or(job.input.as_os_str());
            spinner.set_prefix(name.to_string_lossy().into_owned());
            spinner.enable_steady_tick(Duration::from_millis(100));
            current = Some(spinner);
        }
        Progress::Update(fragment) => {
            if let Some(spinner) = &current {
                spinner.set_message(fragment.to_string());
            }
        }
        Progress::Finished => {
            if let Some(spinner) = current.take() {
                spinner.finish_and_clear();
            }
        }
    })
}

fn main() {
    let args = Args::parse();
    let multi = MultiProgress::new();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .target(env_logger::Target::Pipe(Box::new(Terminal(multi.clone()))))
        .init();

    match run(args, multi) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if let Some(PipelineError::Interrupted { discarded }) = e.downcast_ref::<PipelineError>() {
                warn!("🛑 Interrupted, {} job(s) not ripped", discarded);
                std::process::exit(EXIT_INTERRUPTED);
            }
            log::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: Args, multi: MultiProgress) -> Result<i32> {
    let cfg = RipConfig::load_config(args.config.as_deref()).context("Failed to load configuration")?;
    debug!("Configuration: {:?}", cfg);

    if let Some(dest) = &args.dest {
        std::fs::create_dir_all(dest)
            .with_context(|| format!("Failed to create destination folder: {}", dest.display()))?;
    }

    let resume_path = cfg.resume_path();
    let mut inputs = Vec::new();
    if args.resume {
        match &resume_path {
            Some(path) => {
                let list = ResumeList::load(path)?;
                info!("Resuming {} unfinished input(s) from {}", list.entries().len(), path.display());
                inputs.extend(list.entries().iter().cloned());
            }
            None => warn!("No config directory, nothing to resume"),
        }
    }
    for input in scan::discover_inputs(&args.files, &cfg.extensions)? {
        if !inputs.contains(&input) {
            inputs.push(input);
        }
    }
    if inputs.is_empty() {
        bail!("nothing to rip: give files or folders, or --resume");
    }
    info!("{} input(s) to rip", inputs.len());

    let encoder = Arc::new(HandBrakeCli::new(cfg.handbrake_bin.clone(), cfg.min_duration_secs, cfg.title));
    let prompter: Box<dyn Prompter> = if args.no_prompt {
        Box::new(NonInteractive { fallback_bitrate: cfg.fallback_bitrate })
    } else {
        Box::new(StdinPrompter::stdin(Terminal(multi.clone())))
    };

    let batch = Batch::new(cfg, encoder, prompter)?
        .with_dest(args.dest)
        .with_resume(resume_path)
        .with_progress(progress_display(multi));

    // HandBrakeCLI shares our process group and sees the same SIGINT;
    // a second Ctrl-C leaves without waiting for the workers.
    let ctx = batch.context();
    let pressed = AtomicBool::new(false);
    ctrlc::set_handler(move || {
        if pressed.swap(true, Ordering::SeqCst) {
            std::process::exit(EXIT_INTERRUPTED);
        }
        warn!("Ctrl-C received, stopping after the current step");
        ctx.abort();
    })
    .context("Failed to install Ctrl-C handler")?;

    let summary = batch.run(inputs)?;
    info!("Run started at {} is done", summary.started_at.format("%Y-%m-%d %H:%M:%S"));

    Ok(if summary.failed > 0 { 1 } else { 0 })
}
