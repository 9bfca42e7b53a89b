//! Zip bundles of a routing folder, for hand-off to the email sender or the print shop.

use crate::error::{Error, Result};
use crate::output::{list_pdfs, write_atomic};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Zip every PDF directly inside `dir` into `zip_path`, in file-name order.
/// Returns the number of files bundled.
pub fn bundle_folder(dir: &Path, zip_path: &Path) -> Result<usize> {
    let files = list_pdfs(dir)?;
    let mut zip_writer = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for file in &files {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Bundle(format!("Invalid file name: {}", file.display())))?;
        let data = fs::read(file)?;
        zip_writer
            .start_file(name, opts)
            .map_err(|e| Error::Bundle(format!("{}: {}", name, e)))?;
        zip_writer.write_all(&data)?;
    }
    let cursor = zip_writer.finish().map_err(|e| Error::Bundle(e.to_string()))?;
    write_atomic(zip_path, cursor.get_ref())?;
    info!(dir = %dir.display(), zip = %zip_path.display(), files = files.len(), "bundle written");
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::read::ZipArchive;

    #[test]
    fn bundles_pdfs_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("policies_with_email");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("29031933.pdf"), b"second").unwrap();
        fs::write(src.join("00407_0054316.pdf"), b"first").unwrap();
        fs::write(src.join("readme.txt"), b"ignored").unwrap();

        let zip_path = dir.path().join("policies_with_email.zip");
        assert_eq!(bundle_folder(&src, &zip_path).unwrap(), 2);

        let mut archive = ZipArchive::new(fs::File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "00407_0054316.pdf");
        let mut data = String::new();
        entry.read_to_string(&mut data).unwrap();
        assert_eq!(data, "first");
    }

    #[test]
    fn empty_folder_gives_empty_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("empty.zip");
        assert_eq!(bundle_folder(dir.path(), &zip_path).unwrap(), 0);
        assert!(zip_path.exists());
    }

    #[test]
    fn missing_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(bundle_folder(&dir.path().join("nope"), &dir.path().join("x.zip")).is_err());
    }
}
