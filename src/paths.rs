use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A per-identifier stage file discovered in a directory.
#[derive(Clone, Debug)]
pub struct StageFile {
    pub identifier: String,
    pub path: PathBuf,
}

/// List `*.<ext>` files directly under `dir` (no recursion), sorted by name.
/// A missing directory yields an empty list.
pub fn list_files_with_ext(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if !dir.is_dir() {
        return out;
    }
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let Ok(ent) = entry else { continue };
        if !ent.file_type().is_file() {
            continue;
        }
        let matches = ent
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(ext))
            .unwrap_or(false);
        if matches {
            out.push(ent.path().to_path_buf());
        }
    }
    out.sort();
    out
}

/// Per-identifier `.txt` files of one stage directory.
pub fn discover_stage_files(dir: &Path) -> Vec<StageFile> {
    list_files_with_ext(dir, "txt")
        .into_iter()
        .filter_map(|path| {
            let identifier = crate::util::identifier_of(&path)?;
            Some(StageFile { identifier, path })
        })
        .collect()
}

/// `<dir>/<identifier>.txt`
pub fn output_path(dir: &Path, identifier: &str) -> PathBuf {
    dir.join(format!("{}.txt", identifier))
}

/// `<dir>/<identifier>.empty`
pub fn empty_marker_path(dir: &Path, identifier: &str) -> PathBuf {
    dir.join(format!("{}.empty", identifier))
}
