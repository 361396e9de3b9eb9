use regex::Captures;
use serde::Serialize;

/// Audio track as listed in a scan report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioStream {
    /// Track index exactly as printed by the encoder
    pub position: u32,
    pub language: Option<String>,
    pub codec: String,
    /// Channel layout, e.g. `5.1` or `Dolby Surround`
    pub channels: Option<String>,
    /// Sample rate in Hz
    pub sample_rate: Option<u32>,
    /// Bitrate in bits per second
    pub bitrate: Option<u64>,
    pub default: bool,
}

/// Video track description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoStream {
    pub position: u32,
    pub language: Option<String>,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Frames per second, absent when the line did not carry one
    pub fps: Option<f64>,
    pub default: bool,
}

/// Subtitle track as listed in a scan report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleStream {
    pub position: u32,
    pub language: Option<String>,
    pub forced: bool,
    /// Text encoding or subtitle format (`UTF-8`, `SSA`, `PGS`...)
    pub encoding: Option<String>,
}

/// Any track of an input container
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Stream {
    Audio(AudioStream),
    Video(VideoStream),
    Subtitle(SubtitleStream),
}

impl Stream {
    pub fn language(&self) -> Option<&str> {
        match self {
            Stream::Audio(a) => a.language.as_deref(),
            Stream::Video(v) => v.language.as_deref(),
            Stream::Subtitle(s) => s.language.as_deref(),
        }
    }

    pub fn position(&self) -> u32 {
        match self {
            Stream::Audio(a) => a.position,
            Stream::Video(v) => v.position,
            Stream::Subtitle(s) => s.position,
        }
    }

    /// Subtitle tracks carry no default flag, only a forced one
    pub fn is_default(&self) -> bool {
        match self {
            Stream::Audio(a) => a.default,
            Stream::Video(v) => v.default,
            Stream::Subtitle(_) => false,
        }
    }
}

impl From<AudioStream> for Stream {
    fn from(stream: AudioStream) -> Self {
        Stream::Audio(stream)
    }
}

impl From<VideoStream> for Stream {
    fn from(stream: VideoStream) -> Self {
        Stream::Video(stream)
    }
}

impl From<SubtitleStream> for Stream {
    fn from(stream: SubtitleStream) -> Self {
        Stream::Subtitle(stream)
    }
}

/// Named capture as an owned string, `None` when the group did not take part
pub(crate) fn text(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, name: &str) -> Option<T> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

fn flag(caps: &Captures<'_>, name: &str) -> bool {
    caps.name(name).is_some()
}

fn language(caps: &Captures<'_>) -> Option<String> {
    text(caps, "language").map(|l| l.to_lowercase())
}

impl AudioStream {
    /// Build from a matched audio line; `None` when a mandatory field is unusable
    pub fn from_captures(caps: &Captures<'_>) -> Option<Self> {
        Some(AudioStream {
            position: number(caps, "position")?,
            language: language(caps),
            codec: text(caps, "codec")?.to_lowercase(),
            channels: text(caps, "channels"),
            sample_rate: number(caps, "frequency"),
            bitrate: number(caps, "bitrate"),
            default: flag(caps, "default"),
        })
    }
}

impl VideoStream {
    pub fn from_captures(caps: &Captures<'_>) -> Option<Self> {
        Some(VideoStream {
            position: number(caps, "position")?,
            language: language(caps),
            codec: text(caps, "codec")?.to_lowercase(),
            width: number(caps, "width")?,
            height: number(caps, "height")?,
            fps: number::<f64>(caps, "fps").filter(|f| *f > 0.0),
            default: flag(caps, "default"),
        })
    }
}

impl SubtitleStream {
    pub fn from_captures(caps: &Captures<'_>) -> Option<Self> {
        let forced = flag(caps, "forced")
            || text(caps, "description")
                .map(|d| d.to_lowercase().contains("forced"))
                .unwrap_or(false);

        Some(SubtitleStream {
            position: number(caps, "position")?,
            language: language(caps),
            forced,
            encoding: text(caps, "encoding"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_absent_groups_are_none() {
        let re = Regex::new(
            r"^(?P<position>\d+) (?P<codec>\w+)(?: (?P<language>[a-z]{3}))?(?: (?P<frequency>\d+)Hz)?(?: (?P<default>default))?$",
        )
        .unwrap();
        let caps = re.captures("3 AC3").unwrap();
        let audio = AudioStream::from_captures(&caps).unwrap();
        assert_eq!(audio.position, 3);
        assert_eq!(audio.codec, "ac3");
        assert_eq!(audio.language, None);
        assert_eq!(audio.sample_rate, None);
        assert_eq!(audio.bitrate, None);
        assert!(!audio.default);

        let caps = re.captures("1 dts eng 48000Hz default").unwrap();
        let audio = AudioStream::from_captures(&caps).unwrap();
        assert_eq!(audio.language.as_deref(), Some("eng"));
        assert_eq!(audio.sample_rate, Some(48000));
        assert!(audio.default);
    }

    #[test]
    fn test_stream_accessors() {
        let stream: Stream = SubtitleStream {
            position: 4,
            language: Some("fre".to_string()),
            forced: true,
            encoding: None,
        }
        .into();
        assert_eq!(stream.position(), 4);
        assert_eq!(stream.language(), Some("fre"));
        assert!(!stream.is_default());

        let stream: Stream = VideoStream {
            position: 0,
            language: None,
            codec: "h264".to_string(),
            width: 1920,
            height: 1080,
            fps: Some(23.976),
            default: true,
        }
        .into();
        assert_eq!(stream.language(), None);
        assert!(stream.is_default());
    }
}
