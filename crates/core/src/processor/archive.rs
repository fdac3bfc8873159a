//! Zip archive helpers shared by the PDF and slideshow processors.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::error::ProcessorError;

/// A file extracted from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExtractedEntry {
    /// Entry name inside the archive.
    pub name: String,
    /// Location on disk.
    pub path: PathBuf,
}

/// Whether an entry name has one of `extensions` (lowercase, no dot).
pub(crate) fn has_extension(name: &str, extensions: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_junk_entry(name: &str) -> bool {
    name.starts_with("__MACOSX/")
        || name
            .rsplit('/')
            .next()
            .map(|file| file.starts_with("._") || file.is_empty())
            .unwrap_or(true)
}

/// Extracts the entries accepted by `accept` into `dest`, sorted by entry
/// name.
///
/// Directories, resource-fork junk and entries whose names would escape the
/// destination are skipped. Files are written under flattened, prefixed
/// names so nested duplicates cannot collide.
pub(crate) fn extract_matching(
    data: &[u8],
    dest: &Path,
    accept: impl Fn(&str) -> bool,
) -> Result<Vec<ExtractedEntry>, ProcessorError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let mut names: Vec<(usize, String)> = Vec::new();
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.is_dir() || entry.enclosed_name().is_none() {
            continue;
        }
        let name = entry.name().to_string();
        if is_junk_entry(&name) || !accept(&name) {
            continue;
        }
        names.push((index, name));
    }
    names.sort_by(|a, b| a.1.cmp(&b.1));

    let mut extracted = Vec::with_capacity(names.len());
    for (position, (index, name)) in names.into_iter().enumerate() {
        let mut entry = archive.by_index(index)?;
        let file_name = Path::new(&name)
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("entry-{}", position));
        let path = dest.join(format!("{:04}-{}", position, file_name));

        let mut out = File::create(&path)?;
        std::io::copy(&mut entry, &mut out)?;
        extracted.push(ExtractedEntry { name, path });
    }

    Ok(extracted)
}

/// Builds a deflated zip from `(entry name, file on disk)` pairs.
pub(crate) fn build_zip(entries: &[(String, PathBuf)]) -> Result<Vec<u8>, ProcessorError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, path) in entries {
        let mut content = Vec::new();
        File::open(path)?.read_to_end(&mut content)?;
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| ProcessorError::Task(format!("zip write failed: {}", e)))?;
        writer.write_all(&content)?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| ProcessorError::Task(format!("zip finalize failed: {}", e)))?;
    Ok(cursor.into_inner())
}
