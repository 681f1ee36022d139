use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Result, SplitError};

/// File name used when the caller does not pick one.
pub const DEFAULT_ARCHIVE_NAME: &str = "processed_audio_files.zip";

/// Bundle `(name, bytes)` pairs into a flat zip archive held in memory.
///
/// Entries keep their order. Names must be unique and must not contain
/// directory separators.
pub fn package_archive<'a, I>(files: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut seen = HashSet::new();

    for (name, bytes) in files {
        if name.is_empty() || name.contains(['/', '\\']) || !seen.insert(name) {
            return Err(SplitError::InvalidArchiveEntry(name.to_owned()));
        }
        writer.start_file(name, options)?;
        writer.write_all(bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}
