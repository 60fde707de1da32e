//! Discovery of monthly export files.

use serde::Serialize;
use sms_core::{InsightsError, InsightsResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One export file and the period tag derived from its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    /// File stem, e.g. `2024-01` for `2024-01.csv`.
    pub period: String,
}

impl SourceFile {
    pub fn from_path(path: PathBuf) -> InsightsResult<Self> {
        let period = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| InsightsError::source_read(path.display(), "file name has no usable stem"))?
            .to_string();
        Ok(Self { path, period })
    }
}

/// Find every file under `dir` matching `pattern`, in path order. Only
/// `pattern` is a glob; `dir` is matched literally.
pub fn discover(dir: impl AsRef<Path>, pattern: &str) -> InsightsResult<Vec<SourceFile>> {
    let dir = dir.as_ref();
    let full = Path::new(&glob::Pattern::escape(&dir.to_string_lossy())).join(pattern);
    let full = full.to_string_lossy();

    let entries = glob::glob(&full)
        .map_err(|e| InsightsError::Config(format!("invalid file pattern '{pattern}': {e}")))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| InsightsError::source_read(e.path().display(), e.error()))?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(InsightsError::NoSources {
            dir: dir.display().to_string(),
            pattern: pattern.to_string(),
        });
    }

    let files = paths
        .into_iter()
        .map(SourceFile::from_path)
        .collect::<InsightsResult<Vec<_>>>()?;
    debug!(count = files.len(), dir = %dir.display(), "Discovered source files");
    Ok(files)
}
