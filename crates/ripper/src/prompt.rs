use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use log::warn;

/// Source of answers for values the scan could not provide
pub trait Prompter: Send {
    /// Bitrate in kbps for an input whose geometry gave none; `None` skips the input
    fn ask_bitrate(&mut self, input: &Path, geometry: (Option<u32>, Option<u32>)) -> Result<Option<u32>>;

    /// External subtitle files for an input lacking a preferred subtitle track
    fn ask_subtitle_files(&mut self, input: &Path) -> Result<Vec<PathBuf>>;
}

/// Line-oriented questions on any reader/writer pair
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

/// Terminal prompter reading answers from stdin; questions go to `W`, usually stderr
pub type StdinPrompter<W> = LinePrompter<io::BufReader<io::Stdin>, W>;

impl<W: Write> StdinPrompter<W> {
    pub fn stdin(output: W) -> Self {
        LinePrompter::new(io::BufReader::new(io::stdin()), output)
    }
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        LinePrompter { input, output }
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{} ", question).context("Failed to write prompt")?;
        self.output.flush().context("Failed to flush prompt")?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("Failed to read answer")?;
        if read == 0 {
            bail!("input closed while waiting for an answer");
        }
        Ok(line.trim().to_string())
    }

    fn ask_yes_no(&mut self, question: &str) -> Result<bool> {
        let answer = self.ask(&format!("{} [y/N]", question))?;
        Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
    }
}

impl<R: BufRead + Send, W: Write + Send> Prompter for LinePrompter<R, W> {
    fn ask_bitrate(&mut self, input: &Path, geometry: (Option<u32>, Option<u32>)) -> Result<Option<u32>> {
        let dims = match geometry {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            _ => "unknown size".to_string(),
        };
        loop {
            let answer = self.ask(&format!(
                "{} ({}): bitrate can't be calculated, enter one in kbps (empty to skip):",
                input.display(),
                dims
            ))?;
            if answer.is_empty() {
                return Ok(None);
            }
            match answer.parse::<u32>() {
                Ok(kbps) if kbps > 0 => return Ok(Some(kbps)),
                _ => writeln!(self.output, "Not a positive number: {}", answer).context("Failed to write prompt")?,
            }
        }
    }

    fn ask_subtitle_files(&mut self, input: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut question = format!("{}: would you like to add a subtitle track?", input.display());

        while self.ask_yes_no(&question)? {
            let answer = self.ask("Path of subtitles file:")?;
            let path = PathBuf::from(&answer);
            if answer.is_empty() {
                continue;
            }
            if path.is_file() {
                files.push(path);
            } else {
                writeln!(self.output, "No such file: {}", path.display()).context("Failed to write prompt")?;
            }
            question = "Would you like to add another subtitle track?".to_string();
        }
        Ok(files)
    }
}

/// Answers without asking, for unattended runs
#[derive(Debug, Clone, Default)]
pub struct NonInteractive {
    pub fallback_bitrate: Option<u32>,
}

impl Prompter for NonInteractive {
    fn ask_bitrate(&mut self, input: &Path, _geometry: (Option<u32>, Option<u32>)) -> Result<Option<u32>> {
        if self.fallback_bitrate.is_none() {
            warn!("No bitrate for {} and no fallback configured, skipping", input.display());
        }
        Ok(self.fallback_bitrate)
    }

    fn ask_subtitle_files(&mut self, _input: &Path) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(answers: &str) -> LinePrompter<Cursor<Vec<u8>>, Vec<u8>> {
        LinePrompter::new(Cursor::new(answers.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_bitrate_retries_until_valid() {
        let mut p = prompter("abc\n0\n2500\n");
        let kbps = p.ask_bitrate(Path::new("/m/a.mkv"), (Some(720), None)).unwrap();
        assert_eq!(kbps, Some(2500));
        let shown = String::from_utf8(p.output).unwrap();
        assert!(shown.contains("unknown size"));
        assert!(shown.contains("Not a positive number: abc"));
    }

    #[test]
    fn test_empty_bitrate_skips() {
        let mut p = prompter("\n");
        assert_eq!(p.ask_bitrate(Path::new("/m/a.mkv"), (Some(1920), Some(1080))).unwrap(), None);
    }

    #[test]
    fn test_closed_input_is_an_error() {
        let mut p = prompter("");
        assert!(p.ask_bitrate(Path::new("/m/a.mkv"), (None, None)).is_err());
    }

    #[test]
    fn test_subtitle_files_asked_repeatedly() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.srt");
        let second = dir.path().join("b.srt");
        std::fs::write(&first, "1\n").unwrap();
        std::fs::write(&second, "1\n").unwrap();

        let answers = format!(
            "y\n{}\ny\n/does/not/exist.srt\ny\n{}\nn\n",
            first.display(),
            second.display()
        );
        let mut p = prompter(&answers);
        let files = p.ask_subtitle_files(Path::new("/m/a.mkv")).unwrap();
        assert_eq!(files, vec![first, second]);

        let shown = String::from_utf8(p.output).unwrap();
        assert!(shown.contains("add another subtitle track"));
    }

    #[test]
    fn test_non_interactive_uses_fallback() {
        let mut p = NonInteractive { fallback_bitrate: Some(3000) };
        assert_eq!(p.ask_bitrate(Path::new("/m/a.mkv"), (None, None)).unwrap(), Some(3000));
        assert!(p.ask_subtitle_files(Path::new("/m/a.mkv")).unwrap().is_empty());
        assert_eq!(NonInteractive::default().ask_bitrate(Path::new("/m/a.mkv"), (None, None)).unwrap(), None);
    }
}
