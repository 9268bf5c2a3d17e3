use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, SourceFormat, parse_document};

/// Read and parse one source file.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected.
///
/// # Errors
///
/// Returns an error if the file cannot be read or exceeds [`DEFAULT_MAX_FILE_SIZE`].
pub async fn load_document(path: &Path) -> Result<Document, DocumentError> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.len() > DEFAULT_MAX_FILE_SIZE {
        return Err(DocumentError::FileTooLarge(meta.len()));
    }

    let bytes = tokio::fs::read(path).await?;
    let raw = String::from_utf8_lossy(&bytes);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let format = SourceFormat::from_path(path);

    let doc = parse_document(format, stem, &raw);
    tracing::debug!(
        path = %path.display(),
        ?format,
        blocks = doc.blocks.len(),
        "document loaded"
    );
    Ok(doc)
}

/// Files under `src` matching any of `patterns`, deduplicated and sorted.
///
/// Patterns are relative globs such as `**/*.md`. Invalid patterns are logged
/// and skipped.
#[must_use]
pub fn discover(src: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    for pattern in patterns {
        let full = src.join(pattern);
        let Some(full) = full.to_str() else {
            tracing::warn!(pattern, "non UTF-8 glob pattern skipped");
            continue;
        };
        match glob::glob(full) {
            Ok(paths) => {
                for entry in paths {
                    match entry {
                        Ok(path) if path.is_file() => {
                            found.insert(path);
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!("unreadable path during discovery: {e}"),
                    }
                }
            }
            Err(e) => tracing::warn!(pattern, "invalid glob pattern: {e}"),
        }
    }
    found.into_iter().collect()
}
