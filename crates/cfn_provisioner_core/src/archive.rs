use std::io::{Cursor, Read};

use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

/// Upper bound on the buffer reserved from an entry's declared size. The
/// header is untrusted; larger entries still grow while reading.
const MAX_PREALLOCATED_ENTRY_BYTES: u64 = 8 * 1024 * 1024;

/// A regular file decompressed from an archive, keyed by its path inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open archive: {0}")]
    Open(#[source] ZipError),
    #[error("failed to read archive entry {index}: {source}")]
    Entry {
        index: usize,
        #[source]
        source: ZipError,
    },
    #[error("failed to decompress {path}: {source}")]
    Decompress {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Decompresses every file entry in archive order. Directory entries carry no
/// content and are skipped.
pub fn extract_files(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(ArchiveError::Open)?;

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|source| ArchiveError::Entry { index, source })?;
        if file.is_dir() {
            continue;
        }

        let path = file.name().to_string();
        let capacity = file.size().min(MAX_PREALLOCATED_ENTRY_BYTES);
        let mut body = Vec::with_capacity(usize::try_from(capacity).unwrap_or_default());
        file.read_to_end(&mut body)
            .map_err(|source| ArchiveError::Decompress {
                path: path.clone(),
                source,
            })?;
        entries.push(ArchiveEntry { path, body });
    }

    Ok(entries)
}
