use calamine::{open_workbook_auto, DataType, Reader};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::DatasetError;
use crate::models::{ColumnLayout, ReferenceDataset};
use crate::types::{GroupStatus, RunSummary};

/// A sheet read into memory: header row plus data rows as cell text.
#[derive(Debug, Clone)]
pub struct SheetData {
    pub sheet_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Get list of sheet names from workbook.
pub fn get_sheet_names(path: &Path) -> Result<Vec<String>, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }
    let workbook = open_workbook_auto(path).map_err(|e| DatasetError::Open(e.to_string()))?;
    Ok(workbook.sheet_names().to_vec())
}

/// Read a whole sheet (first sheet when `sheet_name` is `None`). Row 1 is the header.
/// The workbook is closed before returning.
pub fn read_sheet(path: &Path, sheet_name: Option<&str>) -> Result<SheetData, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }
    let mut workbook = open_workbook_auto(path).map_err(|e| DatasetError::Open(e.to_string()))?;
    let names = workbook.sheet_names().to_vec();
    let sheet_name = match sheet_name {
        Some(name) => {
            if !names.iter().any(|n| n == name) {
                return Err(DatasetError::SheetNotFound(format!(
                    "'{}' (available: {})",
                    name,
                    names.join(", ")
                )));
            }
            name.to_string()
        }
        None => names.first().cloned().ok_or(DatasetError::NoSheets)?,
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| DatasetError::Open(e.to_string()))?;

    let mut rows = range.rows().map(|row| {
        row.iter()
            .map(|c| c.as_string().unwrap_or_default())
            .collect::<Vec<String>>()
    });
    let headers = rows
        .next()
        .ok_or_else(|| DatasetError::Empty(sheet_name.clone()))?;
    let rows: Vec<Vec<String>> = rows
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .collect();
    Ok(SheetData {
        sheet_name,
        headers,
        rows,
    })
}

/// Load the policy reference dataset from a spreadsheet.
pub fn load_reference_dataset(
    path: &Path,
    sheet_name: Option<&str>,
    layout: &ColumnLayout,
) -> Result<ReferenceDataset, DatasetError> {
    let sheet = read_sheet(path, sheet_name)?;
    let dataset = ReferenceDataset::from_rows(&sheet.headers, &sheet.rows, layout);
    info!(
        sheet = %sheet.sheet_name,
        policies = dataset.len(),
        skipped = dataset.skipped_rows(),
        "Excel file loaded"
    );
    Ok(dataset)
}

/// Remove or replace characters that can corrupt Excel's sheet XML.
/// Drops control chars (except tab, newline, CR).
fn sanitize_cell(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            let u = c as u32;
            c == '\t' || c == '\n' || c == '\r' || !(u < 0x20 || u == 0x7F || u == 0xFFFE || u == 0xFFFF)
        })
        .collect()
}

/// Estimate column width from text length (char count × 1.2, clamped 10–50).
fn estimate_text_width(text: &str) -> f64 {
    let w = text.chars().count() as f64 * 1.2;
    w.clamp(10.0, 50.0)
}

const REPORT_HEADERS: &[&str] = &[
    "Policy",
    "File",
    "Pages",
    "Routing",
    "Matched",
    "Email",
    "Encryption",
    "Status",
];

/// Timestamped report path inside `dir` that does not exist yet.
pub fn report_path(dir: &Path, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    let stamp = now.format("%Y%m%d_%H%M%S");
    let mut p = dir.join(format!("policy_report_{}.xlsx", stamp));
    let mut counter = 2u32;
    while p.exists() {
        p = dir.join(format!("policy_report_{}_{}.xlsx", stamp, counter));
        counter += 1;
    }
    p
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_background_color(rust_xlsxwriter::Color::RGB(0x2563EB))
        .set_font_color(rust_xlsxwriter::Color::RGB(0xFFFFFF))
}

fn write_header(worksheet: &mut Worksheet, headers: &[&str]) -> Result<(), XlsxError> {
    let format = header_format();
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &format)?;
    }
    worksheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn report_rows(summary: &RunSummary) -> Vec<[String; 8]> {
    summary
        .groups
        .iter()
        .map(|g| {
            let pages = g
                .pages
                .iter()
                .map(|p| (p + 1).to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let status = match &g.status {
                GroupStatus::Written { .. } => "written".to_string(),
                GroupStatus::Failed { reason } => format!("failed: {}", reason),
            };
            [
                g.policy.to_string(),
                g.file_name.clone(),
                pages,
                g.routing.label().to_string(),
                if g.matched { "yes" } else { "no" }.to_string(),
                g.email.clone().unwrap_or_default(),
                g.encryption.label(),
                status,
            ]
        })
        .collect()
}

/// Write the operator workbook: one row per policy, a sheet of pages that
/// matched no policy, and the run totals.
pub fn write_run_report(path: &Path, summary: &RunSummary) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let text_format = Format::new().set_text_wrap();

    let rows = report_rows(summary);
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Policies")?;
    write_header(worksheet, REPORT_HEADERS)?;
    let mut widths: Vec<f64> = REPORT_HEADERS.iter().map(|h| estimate_text_width(h)).collect();
    for (row_idx, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            worksheet.write_string_with_format((row_idx + 1) as u32, col as u16, sanitize_cell(value), &text_format)?;
            widths[col] = widths[col].max(estimate_text_width(value));
        }
    }
    for (col, &w) in widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, w)?;
    }

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Unclassified pages")?;
    write_header(worksheet, &["Page"])?;
    for (i, page) in summary.unclassified_pages.iter().enumerate() {
        worksheet.write_number((i + 1) as u32, 0, (page + 1) as f64)?;
    }

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Totals")?;
    write_header(worksheet, &["Metric", "Count"])?;
    let totals = [
        ("Total policies", summary.total_groups),
        ("With email", summary.with_email),
        ("Without email", summary.without_email),
        ("Unmatched", summary.unmatched),
        ("Unencrypted warnings", summary.degraded),
        ("Failed", summary.failed),
        ("Source pages", summary.total_pages),
        ("Unclassified pages", summary.unclassified_pages.len()),
    ];
    for (i, (label, count)) in totals.iter().enumerate() {
        let row = (i + 1) as u32;
        worksheet.write_string(row, 0, *label)?;
        worksheet.write_number(row, 1, *count as f64)?;
    }
    worksheet.set_column_width(0, 24.0)?;

    workbook.save(path)?;
    Ok(())
}
