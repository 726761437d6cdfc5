//! Output file collection
//!
//! The solver decides what it writes; we only report the regular files found
//! under the run's output directory, relative to it.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Relative paths of every regular file under `output_dir`.
///
/// A missing directory yields an empty list. Errors while walking an existing
/// directory are returned. Order is not meaningful.
pub async fn collect_output_files(output_dir: &Path) -> io::Result<Vec<String>> {
    let dir = output_dir.to_path_buf();
    tokio::task::spawn_blocking(move || walk_output_dir(&dir))
        .await
        .map_err(io::Error::other)?
}

fn walk_output_dir(output_dir: &Path) -> io::Result<Vec<String>> {
    if !output_dir.exists() {
        warn!("Output directory does not exist: {:?}", output_dir);
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(output_dir) {
        let entry = entry.map_err(|e| {
            warn!("Error collecting output files: {}", e);
            io::Error::from(e)
        })?;
        // Links count when they point at a regular file.
        if !entry.path().is_file() {
            continue;
        }
        let relative: PathBuf = entry
            .path()
            .strip_prefix(output_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| entry.path().to_path_buf());
        files.push(relative.to_string_lossy().into_owned());
    }

    debug!("Collected {} output file(s) from {:?}", files.len(), output_dir);
    Ok(files)
}
