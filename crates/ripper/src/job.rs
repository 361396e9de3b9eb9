use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::config::{PreferenceSet, PresetOption};
use crate::error::JobError;
use crate::select::SelectionResult;

/// Handler name resolving to the per-job video bitrate (kbps)
pub const BITRATE_HANDLER: &str = "bitrate";

/// Where a job is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting for the user to supply missing values
    PendingQuestions,
    /// Every value known, arguments not built yet
    Resolved,
    QueuedForRip,
    Ripping,
    Completed,
    /// Encoder failed for this job only
    Failed,
    /// Dropped because the run was interrupted
    Aborted,
}

/// A single encoder flag with an optional value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderOption {
    pub flag: String,
    pub value: Option<String>,
}

impl EncoderOption {
    pub fn new(flag: &str, value: Option<String>) -> Self {
        EncoderOption { flag: flag.to_string(), value }
    }

    /// Command-line form: bare keys become `--key` (or `-k` for single letters)
    pub fn to_args(&self) -> Vec<String> {
        let flag = if self.flag.starts_with('-') {
            self.flag.clone()
        } else if self.flag.chars().count() == 1 {
            format!("-{}", self.flag)
        } else {
            format!("--{}", self.flag)
        };

        match &self.value {
            Some(value) => vec![flag, value.clone()],
            None => vec![flag],
        }
    }
}

/// An input whose tracks are chosen but which may still miss user-supplied values
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub title: Option<String>,
    pub selection: SelectionResult,
    /// Video bitrate in kbps, `None` until computed or answered
    pub bitrate: Option<u32>,
    /// External subtitle files added by the user
    pub subtitle_files: Vec<PathBuf>,
    /// Geometry shown to the user when asking for a bitrate
    pub geometry: (Option<u32>, Option<u32>),
    pub status: JobStatus,
}

impl PendingJob {
    pub fn needs_bitrate(&self) -> bool {
        self.bitrate.is_none()
    }

    /// Subtitles were wanted but none of the preferred languages was found
    pub fn needs_subtitles(&self, prefs: &PreferenceSet) -> bool {
        !prefs.subtitle_languages.is_empty()
            && self.selection.subtitles.is_empty()
            && self.subtitle_files.is_empty()
    }

    pub fn needs_questions(&self, prefs: &PreferenceSet) -> bool {
        self.needs_bitrate() || self.needs_subtitles(prefs)
    }
}

/// Fully resolved encode, consumed once by the rip worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeJob {
    pub id: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: Vec<EncoderOption>,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
}

impl EncodeJob {
    pub fn new(input: PathBuf, output: PathBuf, options: Vec<EncoderOption>) -> Self {
        EncodeJob {
            id: Uuid::new_v4().to_string(),
            input,
            output,
            options,
            created_at: Utc::now(),
            status: JobStatus::Resolved,
        }
    }

    /// Full argument list for the encoder, input and output first
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--input".to_string(),
            self.input.display().to_string(),
            "--output".to_string(),
            self.output.display().to_string(),
        ];
        args.extend(self.options.iter().flat_map(EncoderOption::to_args));
        args
    }
}

/// Turns pending jobs into encoder option lists using the preset
#[derive(Debug, Clone)]
pub struct JobBuilder {
    options: Vec<PresetOption>,
    prefs: PreferenceSet,
}

impl JobBuilder {
    pub fn new(options: Vec<PresetOption>, prefs: PreferenceSet) -> Self {
        JobBuilder { options, prefs }
    }

    pub fn preferences(&self) -> &PreferenceSet {
        &self.prefs
    }

    /// Resolve preset handlers and append title, track and subtitle-file options
    pub fn build(&self, pending: &PendingJob) -> Result<EncodeJob, JobError> {
        let mut options = Vec::with_capacity(self.options.len() + 4);

        if let Some(title) = &pending.title {
            options.push(EncoderOption::new("title", Some(title.clone())));
        }

        for option in &self.options {
            let value = match option.handler.as_deref() {
                Some(BITRATE_HANDLER) => Some(
                    pending
                        .bitrate
                        .ok_or_else(|| JobError::MissingValue {
                            key: option.key.clone(),
                            handler: BITRATE_HANDLER.to_string(),
                        })?
                        .to_string(),
                ),
                Some(other) => {
                    return Err(JobError::UnknownHandler {
                        key: option.key.clone(),
                        handler: other.to_string(),
                    })
                }
                None => option.value.clone(),
            };
            options.push(EncoderOption::new(&option.key, value));
        }

        // Track numbers go through exactly as the scan printed them
        let audio: Vec<String> = pending
            .selection
            .audio_in_preference_order(&self.prefs)
            .map(|a| a.position.to_string())
            .collect();
        if !audio.is_empty() {
            options.push(EncoderOption::new("audio", Some(audio.join(","))));
        }

        let subtitles: Vec<String> = pending
            .selection
            .subtitles
            .iter()
            .map(|s| s.position.to_string())
            .collect();
        if !subtitles.is_empty() {
            options.push(EncoderOption::new("subtitle", Some(subtitles.join(","))));
        }

        if !pending.subtitle_files.is_empty() {
            let files: Vec<String> = pending
                .subtitle_files
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            options.push(EncoderOption::new("srt-file", Some(files.join(","))));
        }

        Ok(EncodeJob::new(pending.input.clone(), pending.output.clone(), options))
    }
}

/// Output file for an input: `<stem>.mkv` in `dest` (or next to the input),
/// `<stem>.rip.mkv` when that would be the input itself.
pub fn output_path(input: &Path, dest: Option<&Path>) -> PathBuf {
    let dir = dest
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    // Blu-ray folders keep their whole name, dots included
    let name = if input.is_dir() { input.file_name() } else { input.file_stem() };
    let stem = name
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    let candidate = dir.join(format!("{}.mkv", stem));
    if candidate == input {
        dir.join(format!("{}.rip.mkv", stem))
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{AudioStream, SubtitleStream};

    fn prefs() -> PreferenceSet {
        PreferenceSet {
            audio_languages: vec!["fre".to_string(), "eng".to_string()],
            audio_codecs: vec!["dts".to_string()],
            subtitle_languages: vec!["fre".to_string()],
        }
    }

    fn audio(position: u32, language: &str) -> AudioStream {
        AudioStream {
            position,
            language: Some(language.to_string()),
            codec: "dts".to_string(),
            channels: None,
            sample_rate: None,
            bitrate: None,
            default: false,
        }
    }

    fn pending(bitrate: Option<u32>) -> PendingJob {
        let mut selection = SelectionResult::default();
        selection.audio.insert("eng".to_string(), audio(1, "eng"));
        selection.audio.insert("fre".to_string(), audio(3, "fre"));
        selection.subtitles.push(SubtitleStream {
            position: 5,
            language: Some("fre".to_string()),
            forced: false,
            encoding: None,
        });

        PendingJob {
            input: PathBuf::from("/in/movie.mkv"),
            output: PathBuf::from("/out/movie.mkv"),
            title: Some("1".to_string()),
            selection,
            bitrate,
            subtitle_files: vec![],
            geometry: (Some(1920), Some(1080)),
            status: JobStatus::Resolved,
        }
    }

    #[test]
    fn test_build_arguments() {
        let builder = JobBuilder::new(
            vec![
                PresetOption::valued("encoder", "x264"),
                PresetOption::handled("vb", BITRATE_HANDLER),
                PresetOption::flag("two-pass"),
                PresetOption::valued("-E", "copy"),
            ],
            prefs(),
        );
        let job = builder.build(&pending(Some(3782))).unwrap();

        assert_eq!(
            job.args(),
            vec![
                "--input", "/in/movie.mkv", "--output", "/out/movie.mkv",
                "--title", "1",
                "--encoder", "x264",
                "--vb", "3782",
                "--two-pass",
                "-E", "copy",
                "--audio", "3,1",
                "--subtitle", "5",
            ]
        );
        assert_eq!(job.status, JobStatus::Resolved);
        assert!(!job.id.is_empty());
    }

    #[test]
    fn test_missing_bitrate_is_an_error() {
        let builder = JobBuilder::new(vec![PresetOption::handled("vb", BITRATE_HANDLER)], prefs());
        let err = builder.build(&pending(None)).unwrap_err();
        assert_eq!(
            err,
            JobError::MissingValue { key: "vb".to_string(), handler: "bitrate".to_string() }
        );
    }

    #[test]
    fn test_unknown_handler() {
        let builder = JobBuilder::new(vec![PresetOption::handled("crop", "autocrop")], prefs());
        assert!(matches!(builder.build(&pending(Some(1))), Err(JobError::UnknownHandler { .. })));
    }

    #[test]
    fn test_subtitle_files_and_questions() {
        let prefs = prefs();
        let mut job = pending(Some(1000));
        job.selection.subtitles.clear();
        assert!(job.needs_subtitles(&prefs));
        assert!(job.needs_questions(&prefs));

        job.subtitle_files = vec![PathBuf::from("/subs/a.srt"), PathBuf::from("/subs/b.srt")];
        assert!(!job.needs_questions(&prefs));

        let built = JobBuilder::new(vec![], prefs).build(&job).unwrap();
        let args = built.args();
        assert_eq!(&args[args.len() - 2..], &["--srt-file", "/subs/a.srt,/subs/b.srt"]);
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("/media/a/Heat.mkv"), Some(Path::new("/rips"))),
            PathBuf::from("/rips/Heat.mkv")
        );
        assert_eq!(
            output_path(Path::new("/media/a/Heat.mkv"), None),
            PathBuf::from("/media/a/Heat.rip.mkv")
        );
        assert_eq!(
            output_path(Path::new("/media/discs/HEAT_DISC"), None),
            PathBuf::from("/media/discs/HEAT_DISC.mkv")
        );
    }

    #[test]
    fn test_disc_folder_with_dot_keeps_full_name() {
        let root = tempfile::tempdir().unwrap();
        let disc = root.path().join("Movie.2019");
        std::fs::create_dir(&disc).unwrap();
        assert_eq!(output_path(&disc, None), root.path().join("Movie.2019.mkv"));
        assert_eq!(
            output_path(&disc, Some(Path::new("/rips"))),
            PathBuf::from("/rips/Movie.2019.mkv")
        );
        // A plain file with the same shape still loses its extension
        assert_eq!(
            output_path(Path::new("/media/a/Movie.2019"), Some(Path::new("/rips"))),
            PathBuf::from("/rips/Movie.mkv")
        );
    }

    #[test]
    fn test_repeated_language_gives_one_audio_track() {
        let prefs = PreferenceSet {
            audio_languages: vec!["eng".to_string(), "eng".to_string(), "ENG".to_string()],
            audio_codecs: vec![],
            subtitle_languages: vec![],
        };
        let builder = JobBuilder::new(vec![], prefs);
        let mut job = pending(None);
        job.selection.subtitles.clear();
        let job = builder.build(&job).unwrap();
        assert_eq!(
            job.args(),
            vec!["--input", "/in/movie.mkv", "--output", "/out/movie.mkv", "--title", "1", "--audio", "1"]
        );
    }
}
