//! Output folder layout and all-or-nothing file writes.

use crate::types::RoutingOutcome;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub const PRINT_MERGE_FILE: &str = "policies_for_printing.pdf";
pub const MANIFEST_FILE: &str = "email_manifest.json";
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Where a run puts its artifacts: `<root>/policies_with_email/` and
/// `<root>/policies_without_email/`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_for(&self, routing: RoutingOutcome) -> PathBuf {
        self.root.join(routing.folder_name())
    }

    /// Create both folders. With `clean`, PDFs left over from an earlier run
    /// are removed first so counts reflect this run only.
    pub fn prepare(&self, clean: bool) -> io::Result<()> {
        for routing in [RoutingOutcome::WithEmail, RoutingOutcome::WithoutEmail] {
            let dir = self.dir_for(routing);
            fs::create_dir_all(&dir)?;
            if clean {
                let stale = list_pdfs(&dir)?;
                for file in &stale {
                    fs::remove_file(file)?;
                }
                if !stale.is_empty() {
                    info!(dir = %dir.display(), removed = stale.len(), "cleaned old PDF files");
                }
            }
        }
        Ok(())
    }
}

/// `*.pdf` files directly inside `dir`, sorted by file name.
pub fn list_pdfs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if is_pdf && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Write to a temporary sibling then rename over the target, so a reader
/// never sees a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid output file name"))?;
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));
    if let Err(e) = fs::write(&temp_path, bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        e
    })
}
