use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use crate::calc::BpfStrategy;

/// Preference keys understood in the `preferences` table
pub const AUDIO_LANGUAGE: &str = "audio-language";
pub const AUDIO_CODEC: &str = "audio-codec";
pub const SUBTITLE_LANGUAGE: &str = "subtitle-language";

/// Separator for list-valued preferences
const LIST_SEPARATOR: char = ',';

/// One encoder option of a preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetOption {
    /// Encoder flag, with or without leading dashes (`encoder`, `--vb`, `-e`)
    pub key: String,
    /// Fixed value; absent for presence-only flags
    #[serde(default)]
    pub value: Option<String>,
    /// Name of a per-job computed value used instead of `value` (e.g. `bitrate`)
    #[serde(default)]
    pub handler: Option<String>,
}

impl PresetOption {
    pub fn flag(key: &str) -> Self {
        PresetOption { key: key.to_string(), value: None, handler: None }
    }

    pub fn valued(key: &str, value: &str) -> Self {
        PresetOption { key: key.to_string(), value: Some(value.to_string()), handler: None }
    }

    pub fn handled(key: &str, handler: &str) -> Self {
        PresetOption { key: key.to_string(), value: None, handler: Some(handler.to_string()) }
    }
}

/// Configuration for a batch run: encoder location, preset and track preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RipConfig {
    /// HandBrakeCLI binary
    pub handbrake_bin: PathBuf,
    /// Titles shorter than this are ignored by the scan
    pub min_duration_secs: u64,
    /// Explicit title to scan and encode; HandBrake's default when absent
    pub title: Option<u32>,
    /// File extensions picked up when walking directories
    pub extensions: Vec<String>,
    /// How bits per pixel-frame is derived when `bpf` is not fixed
    pub bpf_strategy: BpfStrategy,
    /// Fixed bits per pixel-frame overriding the strategy
    pub bpf: Option<f64>,
    /// Bitrate (kbps) used by non-interactive runs when geometry is unknown
    pub fallback_bitrate: Option<u32>,
    /// Comma-separated preference lists keyed by `audio-language`, `audio-codec`, `subtitle-language`
    pub preferences: BTreeMap<String, String>,
    /// Encoder options applied to every job
    pub options: Vec<PresetOption>,
    /// Resume list location; defaults to the per-user config directory
    pub resume_file: Option<PathBuf>,
}

impl Default for RipConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl RipConfig {
    /// Default preset: x264 two-pass at a geometry-derived bitrate, audio passed through
    pub fn default_config() -> Self {
        let mut preferences = BTreeMap::new();
        preferences.insert(AUDIO_LANGUAGE.to_string(), "eng".to_string());
        preferences.insert(AUDIO_CODEC.to_string(), "dts,ac3,aac".to_string());
        preferences.insert(SUBTITLE_LANGUAGE.to_string(), "eng".to_string());

        Self {
            handbrake_bin: PathBuf::from("HandBrakeCLI"),
            min_duration_secs: 600,
            title: None,
            extensions: vec!["mkv".to_string()],
            bpf_strategy: BpfStrategy::Continuous,
            bpf: None,
            fallback_bitrate: None,
            preferences,
            options: vec![
                PresetOption::valued("format", "av_mkv"),
                PresetOption::valued("encoder", "x264"),
                PresetOption::valued("encoder-preset", "slow"),
                PresetOption::handled("vb", "bitrate"),
                PresetOption::flag("two-pass"),
                PresetOption::flag("turbo"),
                PresetOption::valued("aencoder", "copy"),
                PresetOption::flag("markers"),
            ],
            resume_file: None,
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                config = if config_path.extension().and_then(|s| s.to_str()) == Some("json") {
                    serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?
                } else {
                    toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?
                };
            } else {
                warn!("Config file not found, using defaults: {}", config_path.display());
            }
        }

        Ok(config)
    }

    /// Split the preference table into ordered lists
    pub fn preference_set(&self) -> PreferenceSet {
        for key in self.preferences.keys() {
            if ![AUDIO_LANGUAGE, AUDIO_CODEC, SUBTITLE_LANGUAGE].contains(&key.as_str()) {
                warn!("Ignoring unknown preference: {}", key);
            }
        }
        PreferenceSet::from_map(&self.preferences)
    }

    /// Where the resume list lives
    pub fn resume_path(&self) -> Option<PathBuf> {
        self.resume_file
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join("rippy").join("resume.txt")))
    }
}

/// Ordered track preferences; lower index means higher priority
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceSet {
    pub audio_languages: Vec<String>,
    pub audio_codecs: Vec<String>,
    pub subtitle_languages: Vec<String>,
}

impl PreferenceSet {
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let list = |key: &str| map.get(key).map(|v| split_list(v)).unwrap_or_default();
        PreferenceSet {
            audio_languages: list(AUDIO_LANGUAGE),
            audio_codecs: list(AUDIO_CODEC),
            subtitle_languages: list(SUBTITLE_LANGUAGE),
        }
    }

    /// Rank of a codec in the preference list, `None` when it is not listed
    pub fn codec_rank(&self, codec: &str) -> Option<usize> {
        self.audio_codecs.iter().position(|c| c.eq_ignore_ascii_case(codec))
    }
}

/// Comma separated list, blanks dropped; a repeated entry keeps its first position
fn split_list(value: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in value.split(LIST_SEPARATOR).map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|seen| seen.eq_ignore_ascii_case(item)) {
            items.push(item.to_string());
        }
    }
    items
}
