use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::debug;
use tempfile::NamedTempFile;

/// Inputs not yet encoded, one absolute path per line.
///
/// Every write replaces the whole file through a temporary file in the same
/// directory followed by a rename, so a crash leaves either the old or the new
/// list and never a truncated one.
#[derive(Debug)]
pub struct ResumeList {
    path: PathBuf,
    entries: Vec<PathBuf>,
}

impl ResumeList {
    /// Read the list at `path`; an absent file is an empty list
    pub fn load(path: &Path) -> Result<Self> {
        let entries = match fs::read_to_string(path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(PathBuf::from)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read resume list: {}", path.display()))
            }
        };
        Ok(ResumeList { path: path.to_path_buf(), entries })
    }

    /// Replace the list with `entries` and write it out
    pub fn snapshot(path: &Path, entries: Vec<PathBuf>) -> Result<Self> {
        let list = ResumeList { path: path.to_path_buf(), entries };
        list.save()?;
        Ok(list)
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop a finished input; the file disappears once nothing is left
    pub fn remove(&mut self, input: &Path) -> Result<bool> {
        let before = self.entries.len();
        self.entries.retain(|e| e != input);
        if self.entries.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> Result<()> {
        if self.entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e)
                    .with_context(|| format!("Failed to remove resume list: {}", self.path.display())),
            };
        }

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        for entry in &self.entries {
            writeln!(tmp, "{}", entry.display())
                .with_context(|| format!("Failed to write resume list: {}", self.path.display()))?;
        }
        tmp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to sync resume list: {}", self.path.display()))?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace resume list: {}", self.path.display()))?;

        debug!("Resume list now holds {} entries", self.entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let list = ResumeList::load(&dir.path().join("resume.txt")).unwrap();
        assert!(list.entries().is_empty());
    }

    #[test]
    fn test_round_trip_after_completion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("resume.txt");
        let inputs = vec![
            PathBuf::from("/media/a.mkv"),
            PathBuf::from("/media/b.mkv"),
            PathBuf::from("/media/disc"),
        ];

        let mut list = ResumeList::snapshot(&path, inputs.clone()).unwrap();
        assert!(list.remove(Path::new("/media/b.mkv")).unwrap());
        assert!(!list.remove(Path::new("/media/unknown.mkv")).unwrap());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "/media/a.mkv\n/media/disc\n");

        let reloaded = ResumeList::load(&path).unwrap();
        assert_eq!(reloaded.entries(), &[inputs[0].clone(), inputs[2].clone()]);

        // No stray temporary files next to the list
        let names: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_emptied_list_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.txt");
        let mut list = ResumeList::snapshot(&path, vec![PathBuf::from("/media/a.mkv")]).unwrap();
        assert!(path.exists());
        list.remove(Path::new("/media/a.mkv")).unwrap();
        assert!(!path.exists());
        assert!(ResumeList::load(&path).unwrap().entries().is_empty());
    }
}
