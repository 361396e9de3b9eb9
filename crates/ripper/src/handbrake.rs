use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use log::{debug, info, warn};
use crate::error::EncoderError;
use crate::job::EncodeJob;

/// Marker HandBrakeCLI prints when it catches SIGINT
const INTERRUPT_MARKER: &str = "Signal 2 received";

/// Number of stderr lines kept in failure reports
const STDERR_TAIL_LINES: usize = 20;

/// Encoder invocation seam; `HandBrakeCli` in production, mocks in tests
pub trait Encoder: Send + Sync {
    /// Run the encoder in scan mode and return its diagnostic text
    fn scan(&self, input: &Path) -> Result<String, EncoderError>;

    /// Encode one job, feeding every progress fragment to `progress`.
    /// Returns the diagnostic text on success.
    fn encode(&self, job: &EncodeJob, progress: &mut dyn FnMut(&str)) -> Result<String, EncoderError>;
}

/// HandBrakeCLI subprocess adapter
#[derive(Debug, Clone)]
pub struct HandBrakeCli {
    pub bin: PathBuf,
    /// Shortest title considered by `--scan`, in seconds
    pub min_duration: u64,
    pub title: Option<u32>,
}

impl HandBrakeCli {
    pub fn new(bin: PathBuf, min_duration: u64, title: Option<u32>) -> Self {
        HandBrakeCli { bin, min_duration, title }
    }

    fn scan_args(&self, input: &Path) -> Vec<String> {
        let mut args = vec![
            "--input".to_string(),
            input.display().to_string(),
            "--scan".to_string(),
            "--min-duration".to_string(),
            self.min_duration.to_string(),
        ];
        if let Some(title) = self.title {
            args.push("--title".to_string());
            args.push(title.to_string());
        }
        args
    }

    fn spawn_error(&self, source: std::io::Error) -> EncoderError {
        EncoderError::Spawn { bin: self.bin.clone(), source }
    }
}

impl Encoder for HandBrakeCli {
    fn scan(&self, input: &Path) -> Result<String, EncoderError> {
        let args = self.scan_args(input);
        debug!("Running: {} {}", self.bin.display(), args.join(" "));

        let output = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        // The scan report goes to stderr
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        check_exit(input, output.status, stderr)
    }

    fn encode(&self, job: &EncodeJob, progress: &mut dyn FnMut(&str)) -> Result<String, EncoderError> {
        let args = job.args();
        info!("🎬 Encoding {} -> {}", job.input.display(), job.output.display());
        debug!("Running: {} {}", self.bin.display(), args.join(" "));

        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stderr = child.stderr.take();
        let stderr_handle = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf);
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        if let Some(stdout) = child.stdout.take() {
            if let Err(e) = forward_progress(stdout, progress) {
                return Err(stop_encoder(child, stderr_handle, &job.input, e));
            }
        }

        let status = child.wait().map_err(|e| self.spawn_error(e))?;
        let stderr = stderr_handle.join().unwrap_or_default();

        check_exit(&job.input, status, stderr)
    }
}

/// Kill and reap an encoder whose progress stream broke, so no encode outlives its job
fn stop_encoder(mut child: Child, stderr: JoinHandle<String>, input: &Path, cause: std::io::Error) -> EncoderError {
    warn!("Lost progress stream of {}, stopping encoder: {}", input.display(), cause);
    let _ = child.kill();
    let code = child.wait().ok().and_then(|status| status.code());
    let stderr = stderr.join().unwrap_or_default();
    EncoderError::Failed {
        input: input.to_path_buf(),
        code,
        stderr_tail: format!("reading progress failed: {}\n{}", cause, stderr_tail(&stderr)),
    }
}

/// Split a progress stream on carriage returns and newlines
fn forward_progress<R: Read>(stream: R, progress: &mut dyn FnMut(&str)) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut segment = Vec::new();
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            break;
        }
        let len = available.len();
        for &byte in available {
            if byte == b'\r' || byte == b'\n' {
                emit(&mut segment, progress);
            } else {
                segment.push(byte);
            }
        }
        reader.consume(len);
    }
    emit(&mut segment, progress);
    Ok(())
}

fn emit(segment: &mut Vec<u8>, progress: &mut dyn FnMut(&str)) {
    let text = String::from_utf8_lossy(segment);
    let text = text.trim();
    if !text.is_empty() {
        progress(text);
    }
    segment.clear();
}

#[cfg(unix)]
fn killed_by_sigint(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(2)
}

#[cfg(not(unix))]
fn killed_by_sigint(_status: &ExitStatus) -> bool {
    false
}

fn check_exit(input: &Path, status: ExitStatus, stderr: String) -> Result<String, EncoderError> {
    classify(input, status.success(), status.code(), killed_by_sigint(&status), stderr)
}

/// Map an encoder run to its outcome; an interrupt wins over the exit code
fn classify(
    input: &Path,
    success: bool,
    code: Option<i32>,
    sigint: bool,
    stderr: String,
) -> Result<String, EncoderError> {
    if sigint || stderr.contains(INTERRUPT_MARKER) {
        return Err(EncoderError::Interrupted);
    }
    if !success {
        return Err(EncoderError::Failed {
            input: input.to_path_buf(),
            code,
            stderr_tail: stderr_tail(&stderr),
        });
    }
    Ok(stderr)
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
