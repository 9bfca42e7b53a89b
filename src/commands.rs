//! Command handlers shared by the CLI. Each returns a serializable outcome so
//! any front end can render it.

use crate::bundle::bundle_folder;
use crate::config::SplitterConfig;
use crate::error::{PdfError, Result};
use crate::output::{list_pdfs, write_atomic, OutputLayout, PRINT_MERGE_FILE};
use crate::pdf::merge_files;
use crate::services::processor;
use crate::types::{RoutingOutcome, RunSummary};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub output: String,
    pub merged: usize,
    pub pages: usize,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    pub routing: RoutingOutcome,
    pub zip: String,
    pub files: usize,
}

/// Split the source PDF into per-policy documents.
pub fn split(config: &SplitterConfig, pdf_path: &Path, dataset_path: &Path) -> Result<RunSummary> {
    processor::run_split(config, pdf_path, dataset_path)
}

/// Merge the no-email documents into one file for printing. Defaults to
/// `<output_dir>/policies_for_printing.pdf`.
pub fn merge_for_printing(config: &SplitterConfig, output: Option<&Path>) -> Result<MergeReport> {
    let layout = OutputLayout::new(&config.output_dir);
    let dir = layout.dir_for(RoutingOutcome::WithoutEmail);
    let files = list_pdfs(&dir)?;
    if files.is_empty() {
        return Err(PdfError::Merge(format!("No PDF files found in {}", dir.display())).into());
    }
    info!(dir = %dir.display(), files = files.len(), "merging policies for printing");

    let mut outcome = merge_files(&files)?;
    let target: PathBuf = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| layout.root().join(PRINT_MERGE_FILE));
    let mut bytes = Vec::new();
    outcome
        .document
        .save_to(&mut bytes)
        .map_err(|e| PdfError::Save(e.to_string()))?;
    write_atomic(&target, &bytes)?;
    info!(file = %target.display(), pages = outcome.page_count, "print merge written");

    Ok(MergeReport {
        output: target.to_string_lossy().to_string(),
        merged: outcome.merged.len(),
        pages: outcome.page_count,
        skipped: outcome
            .skipped
            .into_iter()
            .map(|(path, reason)| SkippedFile {
                file: path.to_string_lossy().to_string(),
                reason,
            })
            .collect(),
    })
}

/// Zip each routing folder into `<output_dir>/<folder>.zip`.
pub fn bundle(config: &SplitterConfig) -> Result<Vec<BundleEntry>> {
    let layout = OutputLayout::new(&config.output_dir);
    [RoutingOutcome::WithEmail, RoutingOutcome::WithoutEmail]
        .into_iter()
        .map(|routing| {
            let dir = layout.dir_for(routing);
            let zip = layout.root().join(format!("{}.zip", routing.folder_name()));
            let files = bundle_folder(&dir, &zip)?;
            Ok(BundleEntry {
                routing,
                zip: zip.to_string_lossy().to_string(),
                files,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::text_pdf_bytes;
    use crate::pdf::{LopdfSource, PdfSource};
    use std::fs;

    fn config(dir: &Path) -> SplitterConfig {
        SplitterConfig {
            output_dir: dir.to_path_buf(),
            ..SplitterConfig::default()
        }
    }

    #[test]
    fn merges_print_folder_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.prepare(false).unwrap();
        let print_dir = layout.dir_for(RoutingOutcome::WithoutEmail);
        fs::write(print_dir.join("b.pdf"), text_pdf_bytes(&["policy B"]).unwrap()).unwrap();
        fs::write(print_dir.join("a.pdf"), text_pdf_bytes(&["policy A", "policy A2"]).unwrap()).unwrap();
        fs::write(print_dir.join("c.pdf"), b"broken").unwrap();

        let report = merge_for_printing(&config(dir.path()), None).unwrap();
        assert_eq!(report.merged, 2);
        assert_eq!(report.pages, 3);
        assert_eq!(report.skipped.len(), 1);

        let merged = LopdfSource::load(&dir.path().join(PRINT_MERGE_FILE)).unwrap();
        assert_eq!(merged.page_count(), 3);
        assert!(merged.page_text(0).unwrap().contains("policy A"));
        assert!(merged.page_text(2).unwrap().contains("policy B"));
    }

    #[test]
    fn merge_without_files_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        OutputLayout::new(dir.path()).prepare(false).unwrap();
        assert!(merge_for_printing(&config(dir.path()), None).is_err());
    }

    #[test]
    fn bundles_both_folders() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.prepare(false).unwrap();
        fs::write(layout.dir_for(RoutingOutcome::WithEmail).join("29031933.pdf"), b"x").unwrap();

        let entries = bundle(&config(dir.path())).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].files, 1);
        assert_eq!(entries[1].files, 0);
        assert!(dir.path().join("policies_with_email.zip").exists());
        assert!(dir.path().join("policies_without_email.zip").exists());
    }
}
