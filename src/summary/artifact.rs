//! Human-readable summary files written next to each source file.

use std::path::{Path, PathBuf};

/// Suffix appended to a source file name to form its artifact name.
pub const ARTIFACT_SUFFIX: &str = ".ai.txt";

/// Artifact path for `source`: `dir/name.ext` becomes `dir/name.ext.ai.txt`.
#[must_use]
pub fn artifact_path(source: &Path) -> PathBuf {
    let mut name = source
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(ARTIFACT_SUFFIX);
    source.with_file_name(name)
}

/// Whether `path` is a summary artifact rather than a source file.
#[must_use]
pub fn is_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(ARTIFACT_SUFFIX))
}

/// Render the artifact body.
#[must_use]
pub fn render_artifact(relative_path: &str, summary: &str) -> String {
    format!("File Path: {relative_path}\nSummary:\n{summary}\n")
}

/// Write the artifact for `source`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn write_artifact(
    source: &Path,
    relative_path: &str,
    summary: &str,
) -> crate::Result<PathBuf> {
    let path = artifact_path(source);
    tokio::fs::write(&path, render_artifact(relative_path, summary)).await?;
    Ok(path)
}

/// Remove the artifact for `source` if it exists.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub async fn remove_artifact(source: &Path) -> crate::Result<bool> {
    match tokio::fs::remove_file(artifact_path(source)).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
