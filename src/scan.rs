use crate::constants::DEFAULT_EXTENSIONS;
use crate::error::{Result, UploadError};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Normalizes user supplied extensions to lowercase without the leading dot.
///
/// `".JPG"`, `"jpg"` and `"Jpg"` all become `"jpg"`. Empty entries are dropped.
pub fn normalize_extensions<S: AsRef<str>>(extensions: &[S]) -> Vec<String> {
    let mut normalized: Vec<String> = extensions
        .iter()
        .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();
    normalized.dedup();
    normalized
}

pub fn default_extensions() -> Vec<String> {
    normalize_extensions(DEFAULT_EXTENSIONS)
}

pub fn has_matching_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            extensions.iter().any(|wanted| *wanted == ext_lower)
        })
        .unwrap_or(false)
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with('.')
}

/// Collects candidate files from `dir` whose extension matches, sorted by path.
///
/// Every file with a matching extension is a candidate, dotfiles included.
/// Subdirectories are only entered when `recursive` is set, and hidden
/// subdirectories are never entered.
pub fn collect_image_files(
    dir: &Path,
    extensions: &[String],
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(UploadError::DirectoryNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(UploadError::NotADirectory(dir.to_path_buf()));
    }

    let walker = if recursive {
        WalkDir::new(dir)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut image_files = Vec::new();
    for entry in walker
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden_dir(e))
    {
        let entry = entry?;
        let path = entry.path();

        if entry.file_type().is_file() && has_matching_extension(path, extensions) {
            image_files.push(path.to_path_buf());
        }
    }

    image_files.sort();
    Ok(image_files)
}
