use regex::{Captures, Regex};
use serde::Serialize;
use log::{debug, trace};
use crate::calc::duration_to_seconds;
use crate::error::ParseError;
use crate::stream::{text, AudioStream, Stream, SubtitleStream, VideoStream};

/// Indentation at which HandBrake prints list items (`    + 1, English ...`).
/// Anything shallower is a title-level attribute.
const ITEM_INDENT: usize = 4;

/// Structured inventory of one scanned input
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ScanResult {
    /// Whole seconds, fractional part discarded
    pub duration: Option<u64>,
    /// First title block of the report
    pub title: Option<String>,
    pub video: Option<VideoStream>,
    /// Title-level frame rate, or the video stream's one when the title gives none
    pub frame_rate: Option<f64>,
    pub audio: Vec<AudioStream>,
    pub subtitles: Vec<SubtitleStream>,
}

impl ScanResult {
    /// Width and height of the video stream, if one was found
    pub fn geometry(&self) -> (Option<u32>, Option<u32>) {
        match &self.video {
            Some(v) => (Some(v.width), Some(v.height)),
            None => (None, None),
        }
    }

    /// All tracks in report order: video first, then audio, then subtitles
    pub fn streams(&self) -> Vec<Stream> {
        self.video
            .iter()
            .cloned()
            .map(Stream::from)
            .chain(self.audio.iter().cloned().map(Stream::from))
            .chain(self.subtitles.iter().cloned().map(Stream::from))
            .collect()
    }
}

/// One way of reading a line: a pattern and the function turning its captures into a value
struct Strategy<T> {
    name: &'static str,
    pattern: Regex,
    extract: fn(&Captures<'_>) -> Option<T>,
}

impl<T> Strategy<T> {
    fn new(name: &'static str, pattern: &str, extract: fn(&Captures<'_>) -> Option<T>) -> Result<Self, regex::Error> {
        Ok(Strategy {
            name,
            pattern: Regex::new(pattern)?,
            extract,
        })
    }

    fn apply(&self, line: &str) -> Option<T> {
        self.pattern.captures(line).and_then(|caps| (self.extract)(&caps))
    }
}

/// Try each strategy in order, first success wins
fn first_match<T>(strategies: &[Strategy<T>], line: &str) -> Option<T> {
    strategies.iter().find_map(|s| {
        let value = s.apply(line);
        if value.is_some() {
            trace!("matched {} line: {}", s.name, line.trim());
        }
        value
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Audio,
    Subtitle,
}

/// Line-classifying parser for HandBrakeCLI scan reports.
///
/// A parser only holds compiled patterns, so one instance can be reused for any
/// number of reports and from several threads.
pub struct ScanParser {
    title_start: Regex,
    audio_header: Regex,
    subtitle_header: Regex,
    size: Regex,
    duration: Regex,
    audio: Vec<Strategy<AudioStream>>,
    subtitles: Vec<Strategy<SubtitleStream>>,
    video: Vec<Strategy<VideoStream>>,
}

impl ScanParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(ScanParser {
            title_start: Regex::new(r"^\+ title (?P<id>\d+):")?,
            audio_header: Regex::new(r"^\s*\+ audio tracks:")?,
            subtitle_header: Regex::new(r"^\s*\+ subtitle tracks:")?,
            size: Regex::new(
                r"^\s*\+ size: (?P<width>\d+)x(?P<height>\d+).*?(?:, (?P<fps>\d+(?:\.\d+)?) fps)?\s*$",
            )?,
            duration: Regex::new(r"(?i)duration:\s*(?P<duration>\d+:\d{2}:\d{2}(?:\.\d+)?)")?,
            audio: vec![
                // + 1, English (AC3) (5.1 ch) (iso639-2: eng), 48000Hz, 448000bps
                Strategy::new(
                    "audio/parenthetical",
                    r"^\s+\+ (?P<position>\d+), (?P<description>[^(]+?) \((?P<codec>[^)]+)\) \((?P<channels>[^)]+?)(?: ch)?\)(?: \((?P<default>default)\))?(?: \([^)]*\))*? \(iso639-2: (?P<language>[a-z]{3})\)(?:, (?P<frequency>\d+)Hz)?(?:, (?P<bitrate>\d+)bps)?\s*$",
                    AudioStream::from_captures,
                )?,
                // + 1, English (TrueHD) (iso639-2: eng), 48000Hz
                Strategy::new(
                    "audio/loose",
                    r"^\s+\+ (?P<position>\d+), (?P<description>[^(]+?) \((?P<codec>[^)]+)\).*?\(iso639-2: (?P<language>[a-z]{3})\)(?:, (?P<frequency>\d+)Hz)?",
                    AudioStream::from_captures,
                )?,
                // + 1, eng, ac3, 5.1 ch, 48000Hz, 448000bps
                Strategy::new(
                    "audio/tokens",
                    r"^\s+\+ (?P<position>\d+),\s*(?P<language>[a-z]{3}),\s*(?P<codec>[\w\-\.]+)(?:,\s*(?P<channels>[\d\.]+)\s*ch)?(?:,\s*(?P<frequency>\d+)\s*Hz)?(?:,\s*(?P<bitrate>\d+)\s*bps)?(?:\s*\((?P<default>default)\))?",
                    AudioStream::from_captures,
                )?,
            ],
            subtitles: vec![
                // + 1, English (iso639-2: eng) (Text)(SSA)
                Strategy::new(
                    "subtitle/parenthetical",
                    r"^\s+\+ (?P<position>\d+), (?P<description>.*?)\s*\(iso639-2: (?P<language>[a-z]{3})\)(?:\s*\((?:Text|Bitmap)\))?(?:\s*\((?P<encoding>[^)]+)\))?\s*$",
                    SubtitleStream::from_captures,
                )?,
                // + 1, English (iso639-2: eng) (Bitmap)(VOBSUB) [forced only]
                Strategy::new(
                    "subtitle/loose",
                    r"^\s+\+ (?P<position>\d+), (?P<description>.*?)\s*\(iso639-2: (?P<language>[a-z]{3})\)(?:.*?(?P<forced>(?i:forced)))?",
                    SubtitleStream::from_captures,
                )?,
                // + 1, fre, UTF-8, forced
                Strategy::new(
                    "subtitle/tokens",
                    r"^\s+\+ (?P<position>\d+),\s*(?P<language>[a-z]{3})\b(?:,\s*(?P<encoding>[\w\-]+))?(?:.*?(?P<forced>(?i:forced)))?",
                    SubtitleStream::from_captures,
                )?,
            ],
            video: vec![
                // Stream #0.0(eng): Video: h264 (High), yuv420p, 1920x1080 [PAR 1:1 DAR 16:9], 23.98 fps, 23.98 tbr, 1k tbn, 47.95 tbc (default)
                Strategy::new(
                    "video/full",
                    r"Stream #\d+[.:](?P<position>\d+)(?:\[[^\]]*\])?(?:\((?P<language>[a-z]{3})\))?: Video: (?P<codec>\w+)(?: \([^)]*\))*, .*?(?P<width>\d{2,5})x(?P<height>\d{2,5}).*?, (?P<fps>\d+(?:\.\d+)?) fps,.*? tbc(?: \((?P<default>default)\))?",
                    VideoStream::from_captures,
                )?,
                // Newer dumps drop tbc and may wrap pixel format details in parentheses
                Strategy::new(
                    "video/loose",
                    r"Stream #\d+[.:](?P<position>\d+)(?:\[[^\]]*\])?(?:\((?P<language>[a-z]{3})\))?: Video: (?P<codec>\w+).*?(?P<width>\d{2,5})x(?P<height>\d{2,5})(?:.*?(?P<fps>\d+(?:\.\d+)?) fps)?(?:.*?(?P<default>\(default\)))?",
                    VideoStream::from_captures,
                )?,
            ],
        })
    }

    /// Parse one scan report.
    ///
    /// Only the first title block is read; a second `+ title` line ends parsing.
    /// Lines matching no known shape are skipped.
    pub fn parse(&self, report: &str) -> Result<ScanResult, ParseError> {
        let mut result = ScanResult::default();
        let mut block = Block::None;
        let mut in_title = false;
        let mut skipped = 0usize;

        for line in report.lines() {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(caps) = self.title_start.captures(line) {
                if in_title {
                    debug!("second title block found, keeping title {:?} only", result.title);
                    break;
                }
                in_title = true;
                block = Block::None;
                result.title = text(&caps, "id");
                continue;
            }

            // Video description is not nested under a labelled block
            if line.contains("Video:") {
                match first_match(&self.video, line) {
                    Some(video) if result.video.is_none() => {
                        if result.frame_rate.is_none() {
                            result.frame_rate = video.fps;
                        }
                        result.video = Some(video);
                    }
                    Some(_) => {}
                    None => skipped += 1,
                }
                continue;
            }

            let indent = line.len() - line.trim_start().len();

            if line.to_ascii_lowercase().contains("duration:") {
                if in_title && indent < ITEM_INDENT {
                    block = Block::None;
                }
                match self.duration.captures(line) {
                    Some(caps) => result.duration = Some(duration_to_seconds(&caps["duration"])?),
                    None => {
                        trace!("unreadable duration line: {}", line.trim());
                        skipped += 1;
                    }
                }
                continue;
            }

            if !in_title {
                continue;
            }

            if indent < ITEM_INDENT {
                block = if self.audio_header.is_match(line) {
                    Block::Audio
                } else if self.subtitle_header.is_match(line) {
                    Block::Subtitle
                } else {
                    Block::None
                };

                if let Some(caps) = self.size.captures(line) {
                    if let Some(fps) = caps.name("fps").and_then(|m| m.as_str().parse::<f64>().ok()) {
                        result.frame_rate = Some(fps);
                    }
                }
                continue;
            }

            match block {
                Block::Audio => match first_match(&self.audio, line) {
                    Some(audio) => result.audio.push(audio),
                    None => skipped += 1,
                },
                Block::Subtitle => match first_match(&self.subtitles, line) {
                    Some(subtitle) => result.subtitles.push(subtitle),
                    None => skipped += 1,
                },
                Block::None => {}
            }
        }

        debug!(
            "scan parsed: title={:?} duration={:?} video={} audio={} subtitles={} skipped={}",
            result.title,
            result.duration,
            result.video.is_some(),
            result.audio.len(),
            result.subtitles.len(),
            skipped
        );
        Ok(result)
    }
}
