use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use walkdir::WalkDir;

/// Directory marking a Blu-ray folder structure
const BLURAY_MARKER: &str = "BDMV";

/// Expand command-line arguments into inputs.
///
/// Files are taken as given. Directories are walked recursively for files with
/// one of `extensions` (case-insensitive) and for Blu-ray folders, which are
/// yielded as the folder itself. Every path comes back absolute.
pub fn discover_inputs(args: &[PathBuf], extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();

    for arg in args {
        let path = absolute(arg)?;
        if !path.is_dir() {
            if !path.exists() {
                warn!("Input does not exist: {}", path.display());
            }
            inputs.push(path);
            continue;
        }

        info!("Scanning directory: {}", path.display());
        let before = inputs.len();
        for entry in WalkDir::new(&path).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Error reading directory entry: {}", e);
                    continue;
                }
            };
            let entry_path = entry.path();

            if entry.file_type().is_dir() {
                if entry_path.join(BLURAY_MARKER).is_dir() {
                    debug!("Found Blu-ray folder: {}", entry_path.display());
                    inputs.push(entry_path.to_path_buf());
                }
                continue;
            }

            if has_extension(entry_path, extensions) {
                debug!("Found input file: {}", entry_path.display());
                inputs.push(entry_path.to_path_buf());
            }
        }
        info!("Found {} input(s) in {}", inputs.len() - before, path.display());
    }

    Ok(inputs)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_walks_directories_for_files_and_bluray_folders() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("shows/season1")).unwrap();
        fs::create_dir_all(root.join("discs/MOVIE/BDMV/STREAM")).unwrap();
        fs::write(root.join("shows/season1/e01.mkv"), "").unwrap();
        fs::write(root.join("shows/season1/e02.MKV"), "").unwrap();
        fs::write(root.join("shows/season1/notes.txt"), "").unwrap();
        fs::write(root.join("discs/MOVIE/BDMV/STREAM/00001.m2ts"), "").unwrap();

        let inputs = discover_inputs(&[root.to_path_buf()], &["mkv".to_string()]).unwrap();
        assert_eq!(
            inputs,
            vec![
                root.join("discs/MOVIE"),
                root.join("shows/season1/e01.mkv"),
                root.join("shows/season1/e02.MKV"),
            ]
        );
    }

    #[test]
    fn test_files_pass_through_and_become_absolute() {
        let inputs = discover_inputs(&[PathBuf::from("missing-file.mkv")], &["mkv".to_string()]).unwrap();
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].is_absolute());
        assert!(inputs[0].ends_with("missing-file.mkv"));
    }
}
