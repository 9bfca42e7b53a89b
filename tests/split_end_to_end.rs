use lopdf::Document;
use policy_splitter_lib::pdf::fixtures::text_pdf_bytes;
use policy_splitter_lib::types::EncryptionStatus;
use policy_splitter_lib::{run_split, LopdfSource, PdfSource, RoutingOutcome, SplitterConfig};
use rust_xlsxwriter::Workbook;
use std::path::Path;

fn write_source_pdf(path: &Path, pages: &[&str]) {
    std::fs::write(path, text_pdf_bytes(pages).unwrap()).unwrap();
}

fn write_dataset(path: &Path) {
    let rows: [[&str; 3]; 3] = [
        ["Policy No", "Owner 1 Email", "NIC"],
        ["29031933", "a@b.com", "X1"],
        ["0040700054316", "", ""],
    ];
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            sheet.write_string(r as u32, c as u16, *value).unwrap();
        }
    }
    workbook.save(path).unwrap();
}

#[test]
fn splits_routes_and_encrypts() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("merged.pdf");
    let dataset = dir.path().join("policies.xlsx");
    write_source_pdf(
        &pdf,
        &[
            "Policy No 29031933 schedule",
            "Policy No 00407/0054316",
            "Policy No 29031933 terms",
        ],
    );
    write_dataset(&dataset);

    let config = SplitterConfig {
        output_dir: dir.path().join("out"),
        ..SplitterConfig::default()
    };
    let summary = run_split(&config, &pdf, &dataset).unwrap();

    assert_eq!(summary.total_pages, 3);
    assert_eq!(summary.total_groups, 2);
    assert_eq!(summary.with_email, 1);
    assert_eq!(summary.without_email, 1);
    assert_eq!(summary.failed, 0);
    assert!(summary.unclassified_pages.is_empty());

    let email = &summary.groups[0];
    assert_eq!(email.policy.as_str(), "29031933");
    assert_eq!(email.pages, vec![0, 2]);
    assert_eq!(email.routing, RoutingOutcome::WithEmail);
    assert_eq!(email.encryption, EncryptionStatus::Encrypted);

    let print = &summary.groups[1];
    assert_eq!(print.file_name, "00407_0054316.pdf");
    assert_eq!(print.pages, vec![1]);
    assert_eq!(print.routing, RoutingOutcome::WithoutEmail);

    let out = dir.path().join("out");
    let mut encrypted = Document::load(out.join("policies_with_email").join("29031933.pdf")).unwrap();
    assert!(encrypted.is_encrypted());
    encrypted.decrypt("X1").unwrap();
    let decrypted = LopdfSource::from_document(encrypted);
    assert_eq!(decrypted.page_count(), 2);
    assert!(decrypted.page_text(0).unwrap().contains("schedule"));
    assert!(decrypted.page_text(1).unwrap().contains("terms"));

    let plain = LopdfSource::load(&out.join("policies_without_email").join("00407_0054316.pdf")).unwrap();
    assert_eq!(plain.page_count(), 1);
    assert!(plain.page_text(0).unwrap().contains("00407/0054316"));
}

#[test]
fn second_run_gives_the_same_result() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("merged.pdf");
    let dataset = dir.path().join("policies.xlsx");
    write_source_pdf(&pdf, &["29031933", "00407/0054316", "no policy here", "29031933"]);
    write_dataset(&dataset);
    let config = SplitterConfig {
        output_dir: dir.path().join("out"),
        ..SplitterConfig::default()
    };

    let first = run_split(&config, &pdf, &dataset).unwrap();
    let second = run_split(&config, &pdf, &dataset).unwrap();
    let shape = |s: &policy_splitter_lib::RunSummary| {
        s.groups
            .iter()
            .map(|g| (g.file_name.clone(), g.pages.clone(), g.routing))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&first), shape(&second));
    assert_eq!(first.unclassified_pages, vec![2]);
    assert_eq!(second.unclassified_pages, vec![2]);

    let files = std::fs::read_dir(dir.path().join("out").join("policies_with_email"))
        .unwrap()
        .count();
    assert_eq!(files, 1);
}

#[test]
fn missing_source_pdf_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("policies.xlsx");
    write_dataset(&dataset);
    let config = SplitterConfig {
        output_dir: dir.path().join("out"),
        ..SplitterConfig::default()
    };
    let err = run_split(&config, &dir.path().join("missing.pdf"), &dataset).unwrap_err();
    assert!(err.to_string().contains("File not found"));
    assert!(!dir.path().join("out").exists());
}
