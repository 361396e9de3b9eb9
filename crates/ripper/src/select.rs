use std::collections::BTreeMap;
use log::debug;
use crate::config::PreferenceSet;
use crate::parser::ScanResult;
use crate::stream::{AudioStream, SubtitleStream};

/// Tracks kept for one input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionResult {
    /// Chosen audio track per preferred language, keyed as written in the preferences
    pub audio: BTreeMap<String, AudioStream>,
    /// Matching subtitle tracks in report order
    pub subtitles: Vec<SubtitleStream>,
}

impl SelectionResult {
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty() && self.subtitles.is_empty()
    }

    /// Chosen audio tracks ordered by language preference
    pub fn audio_in_preference_order<'a>(&'a self, prefs: &'a PreferenceSet) -> impl Iterator<Item = &'a AudioStream> + 'a {
        let languages = &prefs.audio_languages;
        languages
            .iter()
            .enumerate()
            .filter(move |(i, lang)| !languages[..*i].iter().any(|seen| seen.eq_ignore_ascii_case(lang)))
            .filter_map(move |(_, lang)| self.audio.get(lang))
    }
}

/// Sort key for a codec: listed codecs by rank, unlisted ones after all of them
fn codec_priority(prefs: &PreferenceSet, codec: &str) -> usize {
    prefs.codec_rank(codec).unwrap_or(usize::MAX)
}

/// Pick audio and subtitle tracks matching the preferences.
///
/// One audio track per preferred language: the candidate with the best codec rank
/// wins, a codec missing from the list never beats a listed one, and equal ranks
/// keep the first track in the report. Every subtitle track whose language is
/// preferred is kept.
pub fn select_tracks(scan: &ScanResult, prefs: &PreferenceSet) -> SelectionResult {
    let mut audio: BTreeMap<String, AudioStream> = BTreeMap::new();

    for stream in &scan.audio {
        let Some(language) = stream.language.as_deref() else {
            continue;
        };
        let Some(slot) = prefs
            .audio_languages
            .iter()
            .find(|pref| pref.eq_ignore_ascii_case(language))
        else {
            continue;
        };

        let better = match audio.get(slot) {
            Some(current) => codec_priority(prefs, &stream.codec) < codec_priority(prefs, &current.codec),
            None => true,
        };
        if better {
            audio.insert(slot.clone(), stream.clone());
        }
    }

    let subtitles: Vec<SubtitleStream> = scan
        .subtitles
        .iter()
        .filter(|s| {
            s.language
                .as_deref()
                .map(|lang| prefs.subtitle_languages.iter().any(|pref| pref == lang))
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    debug!(
        "selected audio {:?}, subtitles {:?}",
        audio.iter().map(|(lang, s)| (lang.as_str(), s.position)).collect::<Vec<_>>(),
        subtitles.iter().map(|s| s.position).collect::<Vec<_>>()
    );

    SelectionResult { audio, subtitles }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn audio(position: u32, language: &str, codec: &str) -> AudioStream {
        AudioStream {
            position,
            language: Some(language.to_string()),
            codec: codec.to_string(),
            channels: None,
            sample_rate: None,
            bitrate: None,
            default: false,
        }
    }

    fn subtitle(position: u32, language: &str) -> SubtitleStream {
        SubtitleStream {
            position,
            language: Some(language.to_string()),
            forced: false,
            encoding: None,
        }
    }

    fn prefs(languages: &[&str], codecs: &[&str], subtitles: &[&str]) -> PreferenceSet {
        let owned = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        PreferenceSet {
            audio_languages: owned(languages),
            audio_codecs: owned(codecs),
            subtitle_languages: owned(subtitles),
        }
    }

    #[test]
    fn test_codec_rank_breaks_ties_in_any_order() {
        let prefs = prefs(&["eng"], &["ac3", "dts"], &[]);
        for streams in [
            vec![audio(1, "eng", "dts"), audio(2, "eng", "ac3")],
            vec![audio(2, "eng", "ac3"), audio(1, "eng", "dts")],
        ] {
            let scan = ScanResult { audio: streams, ..Default::default() };
            let selection = select_tracks(&scan, &prefs);
            assert_eq!(selection.audio.len(), 1);
            assert_eq!(selection.audio["eng"].codec, "ac3");
            assert_eq!(selection.audio["eng"].position, 2);
        }
    }

    #[test]
    fn test_unlisted_codec_never_preferred() {
        let prefs = prefs(&["eng"], &["dts"], &[]);
        let scan = ScanResult {
            audio: vec![audio(1, "eng", "aac"), audio(2, "eng", "dts"), audio(3, "eng", "flac")],
            ..Default::default()
        };
        assert_eq!(select_tracks(&scan, &prefs).audio["eng"].position, 2);

        // Nothing listed: the first track stays
        let scan = ScanResult {
            audio: vec![audio(4, "eng", "aac"), audio(5, "eng", "flac")],
            ..Default::default()
        };
        assert_eq!(select_tracks(&scan, &prefs).audio["eng"].position, 4);
    }

    #[test]
    fn test_equal_rank_keeps_first() {
        let prefs = prefs(&["fre"], &["ac3"], &[]);
        let scan = ScanResult {
            audio: vec![audio(3, "fre", "ac3"), audio(4, "fre", "ac3")],
            ..Default::default()
        };
        assert_eq!(select_tracks(&scan, &prefs).audio["fre"].position, 3);
    }

    #[test]
    fn test_audio_language_is_case_insensitive() {
        let prefs = prefs(&["ENG", "fre"], &[], &[]);
        let scan = ScanResult {
            audio: vec![audio(1, "eng", "ac3"), audio(2, "ger", "ac3"), audio(3, "fre", "ac3")],
            ..Default::default()
        };
        let selection = select_tracks(&scan, &prefs);
        assert_eq!(selection.audio.len(), 2);
        assert_eq!(selection.audio["ENG"].position, 1);
        let ordered: Vec<u32> = selection.audio_in_preference_order(&prefs).map(|a| a.position).collect();
        assert_eq!(ordered, vec![1, 3]);
    }

    #[test]
    fn test_subtitles_all_kept_and_absent_is_empty() {
        let prefs_fre = prefs(&[], &[], &["fre"]);
        let scan = ScanResult {
            subtitles: vec![subtitle(1, "eng"), subtitle(2, "ger")],
            ..Default::default()
        };
        let selection = select_tracks(&scan, &prefs_fre);
        assert!(selection.subtitles.is_empty());
        assert!(selection.is_empty());

        let prefs_eng = prefs(&[], &[], &["eng"]);
        let scan = ScanResult {
            subtitles: vec![subtitle(1, "eng"), subtitle(2, "fre"), subtitle(3, "eng")],
            ..Default::default()
        };
        let positions: Vec<u32> = select_tracks(&scan, &prefs_eng).subtitles.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![1, 3]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The chosen track per language always has the best rank among that language's tracks
        #[test]
        fn test_selected_codec_has_best_rank(
            codecs in proptest::collection::vec(prop_oneof![
                Just("ac3"), Just("dts"), Just("aac"), Just("truehd"),
            ], 1..8),
        ) {
            let prefs = prefs(&["eng"], &["truehd", "dts", "ac3"], &[]);
            let streams: Vec<AudioStream> = codecs
                .iter()
                .enumerate()
                .map(|(i, c)| audio(i as u32 + 1, "eng", c))
                .collect();
            let scan = ScanResult { audio: streams.clone(), ..Default::default() };

            let chosen = &select_tracks(&scan, &prefs).audio["eng"];
            let best = streams.iter().map(|s| codec_priority(&prefs, &s.codec)).min().unwrap();
            prop_assert_eq!(codec_priority(&prefs, &chosen.codec), best);

            let first_best = streams.iter().find(|s| codec_priority(&prefs, &s.codec) == best).unwrap();
            prop_assert_eq!(chosen.position, first_best.position);
        }
    }
}
