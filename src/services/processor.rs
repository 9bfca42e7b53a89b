//! Split run: plan groups from the source document, then write one artifact
//! per group plus the run reports.

use crate::config::SplitterConfig;
use crate::error::{Error, PdfError, Result};
use crate::excel;
use crate::models::ReferenceDataset;
use crate::output::{write_atomic, OutputLayout, MANIFEST_FILE, SUMMARY_FILE};
use crate::pdf::{LopdfSource, PdfSource, PolicyDocument, SourceDocument};
use crate::services::assembler::assemble;
use crate::services::classifier::classify_document;
use crate::types::{
    EmailManifestEntry, EncryptionDirective, EncryptionStatus, GroupReport, GroupStatus, PolicyGroup,
    RoutingOutcome, RunSummary,
};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Pure outcome of classification and assembly. No artifacts written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub total_pages: usize,
    pub groups: Vec<PolicyGroup>,
    /// Pages without a token, in page order.
    pub unclassified_pages: Vec<usize>,
}

pub fn plan_run<S: PdfSource>(doc: &SourceDocument<S>, dataset: &ReferenceDataset) -> RunPlan {
    let pages = classify_document(doc);
    let unclassified_pages = pages
        .iter()
        .filter(|p| p.token.is_none())
        .map(|p| p.index)
        .collect();
    let groups = assemble(&pages, dataset);
    RunPlan {
        total_pages: doc.page_count(),
        groups,
        unclassified_pages,
    }
}

/// Build the artifact bytes for one group, encrypting when asked.
/// A failed encryption falls back to a freshly built plaintext document.
fn render_group<S: PdfSource>(
    source: &S,
    group: &PolicyGroup,
    encrypt_enabled: bool,
) -> std::result::Result<(Vec<u8>, EncryptionStatus), PdfError> {
    let mut doc = source.sub_document(&group.pages)?;
    let status = match &group.encryption {
        EncryptionDirective::NotApplicable => EncryptionStatus::NotApplicable,
        EncryptionDirective::MissingKey => EncryptionStatus::MissingKey,
        EncryptionDirective::Encrypt { .. } if !encrypt_enabled => {
            warn!(policy = %group.token, "encryption disabled, email-bound document written unencrypted");
            EncryptionStatus::Disabled
        }
        EncryptionDirective::Encrypt { password } => match doc.encrypt(password) {
            Ok(()) => EncryptionStatus::Encrypted,
            Err(e) => {
                warn!(policy = %group.token, error = %e, "encryption failed, writing unencrypted document");
                doc = source.sub_document(&group.pages)?;
                EncryptionStatus::Failed {
                    reason: e.to_string(),
                }
            }
        },
    };
    Ok((doc.to_bytes()?, status))
}

/// Write one group into its routing folder. Never fails the run.
pub fn emit_group<S: PdfSource>(
    source: &S,
    group: &PolicyGroup,
    layout: &OutputLayout,
    encrypt_enabled: bool,
) -> GroupReport {
    let file_name = group.file_name();
    let path = layout.dir_for(group.routing).join(&file_name);
    let (encryption, status) = match render_group(source, group, encrypt_enabled) {
        Ok((bytes, encryption)) => match write_atomic(&path, &bytes) {
            Ok(()) => (
                encryption,
                GroupStatus::Written {
                    path: path.to_string_lossy().to_string(),
                },
            ),
            Err(e) => {
                warn!(policy = %group.token, file = %path.display(), error = %e, "could not write policy document");
                (
                    EncryptionStatus::NotApplicable,
                    GroupStatus::Failed {
                        reason: format!("write failed: {}", e),
                    },
                )
            }
        },
        Err(e) => {
            warn!(policy = %group.token, error = %e, "could not build policy document");
            (
                EncryptionStatus::NotApplicable,
                GroupStatus::Failed {
                    reason: e.to_string(),
                },
            )
        }
    };
    GroupReport {
        policy: group.token.clone(),
        file_name,
        pages: group.pages.clone(),
        routing: group.routing,
        matched: group.is_matched(),
        matched_by: group.matched_by,
        email: group.record.as_ref().and_then(|r| r.email.clone()),
        encryption,
        status,
    }
}

/// Emit every group in plan order, continuing past per-group failures.
pub fn emit_artifacts<S: PdfSource>(
    source: &S,
    groups: &[PolicyGroup],
    layout: &OutputLayout,
    encrypt_enabled: bool,
) -> Vec<GroupReport> {
    let total = groups.len();
    groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            if i % 50 == 0 || i + 1 == total {
                info!("writing policy {}/{}: {}", i + 1, total, group.token);
            }
            emit_group(source, group, layout, encrypt_enabled)
        })
        .collect()
}

/// Written email-bound documents, for the email sender.
pub fn email_manifest(reports: &[GroupReport]) -> Vec<EmailManifestEntry> {
    reports
        .iter()
        .filter(|r| r.routing == RoutingOutcome::WithEmail && !r.is_failed())
        .filter_map(|r| {
            let recipient = r.email.clone()?;
            Some(EmailManifestEntry {
                policy: r.policy.clone(),
                recipient,
                file_name: r.file_name.clone(),
                encrypted: r.encryption == EncryptionStatus::Encrypted,
            })
        })
        .collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| Error::Report(e.to_string()))?;
    write_atomic(path, &bytes)?;
    Ok(())
}

/// Run the split on an already loaded source and dataset. Only preparing the
/// output folders can fail; everything after that is reported in the summary.
pub fn split_loaded<S: PdfSource>(
    config: &SplitterConfig,
    doc: &SourceDocument<S>,
    dataset: &ReferenceDataset,
    source_label: &str,
    dataset_label: &str,
) -> Result<RunSummary> {
    let layout = OutputLayout::new(&config.output_dir);
    layout.prepare(config.clean_output)?;

    let plan = plan_run(doc, dataset);
    info!(
        pages = plan.total_pages,
        policies = plan.groups.len(),
        unclassified = plan.unclassified_pages.len(),
        "source document scanned"
    );
    let reports = emit_artifacts(doc.source(), &plan.groups, &layout, config.encrypt);
    let summary = RunSummary::from_reports(
        source_label.to_string(),
        dataset_label.to_string(),
        plan.total_pages,
        plan.unclassified_pages,
        reports,
    );

    let summary_path = layout.root().join(SUMMARY_FILE);
    if let Err(e) = write_json(&summary_path, &summary) {
        warn!(file = %summary_path.display(), error = %e, "could not write run summary");
    }
    let manifest_path = layout.root().join(MANIFEST_FILE);
    if let Err(e) = write_json(&manifest_path, &email_manifest(&summary.groups)) {
        warn!(file = %manifest_path.display(), error = %e, "could not write email manifest");
    }
    let report = excel::report_path(layout.root(), chrono::Local::now());
    match excel::write_run_report(&report, &summary) {
        Ok(()) => info!(file = %report.display(), "run report written"),
        Err(e) => warn!(file = %report.display(), error = %e, "could not write run report"),
    }

    info!(
        total = summary.total_groups,
        with_email = summary.with_email,
        without_email = summary.without_email,
        unmatched = summary.unmatched,
        degraded = summary.degraded,
        failed = summary.failed,
        "split finished"
    );
    Ok(summary)
}

/// Load both inputs and run the split. Load failures abort before any output.
pub fn run_split(config: &SplitterConfig, pdf_path: &Path, dataset_path: &Path) -> Result<RunSummary> {
    let dataset = excel::load_reference_dataset(dataset_path, config.sheet.as_deref(), &config.columns)?;
    let source = LopdfSource::load(pdf_path)?;
    info!(file = %pdf_path.display(), pages = source.page_count(), "source PDF loaded");
    let doc = SourceDocument::new(source);
    split_loaded(
        config,
        &doc,
        &dataset,
        &pdf_path.to_string_lossy(),
        &dataset_path.to_string_lossy(),
    )
}
