use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::Result;

/// Persistence format for a collection's backing file.
///
/// Both backends hold the same JSON document; the zip backend wraps it in a
/// single-entry deflate-compressed archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Plain JSON file: `<name>.json`
    Json,

    /// Single-entry zip archive: `<name>.json.zip`
    Zip,
}

impl Backend {
    /// File extension appended to the collection name
    pub fn extension(&self) -> &'static str {
        match self {
            Backend::Json => "json",
            Backend::Zip => "json.zip",
        }
    }

    /// Read the full JSON document from the backing file
    ///
    /// Returns `None` if the backing file does not exist (a legitimate state
    /// for a collection that has never been saved). Any other failure —
    /// unreadable file, malformed archive — propagates as an error.
    pub fn read_document(&self, path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }

        match self {
            Backend::Json => {
                let document = fs::read_to_string(path)?;
                Ok(Some(document))
            }
            Backend::Zip => {
                let file = File::open(path)?;
                let mut archive = ZipArchive::new(file)?;

                // The format assumes a single entry; if the archive holds
                // more, the last entry wins.
                let mut document = None;
                for index in 0..archive.len() {
                    let mut entry = archive.by_index(index)?;
                    let mut contents = String::new();
                    entry.read_to_string(&mut contents)?;
                    document = Some(contents);
                }
                Ok(document)
            }
        }
    }

    /// Overwrite the backing file with the given JSON document
    ///
    /// Writes to a temporary sibling file, fsyncs, then renames over the
    /// target so a crash mid-write never leaves a truncated backing file.
    pub fn write_document(&self, path: &Path, entry_name: &str, document: &str) -> Result<()> {
        let tmp_path = tmp_path(path);

        match self {
            Backend::Json => {
                let mut file = File::create(&tmp_path)?;
                file.write_all(document.as_bytes())?;
                file.sync_all()?;
            }
            Backend::Zip => {
                let file = File::create(&tmp_path)?;
                let mut writer = ZipWriter::new(file);
                let options =
                    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                writer.start_file(entry_name, options)?;
                writer.write_all(document.as_bytes())?;
                let file = writer.finish()?;
                file.sync_all()?;
            }
        }

        // Atomic replace, then fsync the parent directory so the rename
        // itself is persisted
        fs::rename(&tmp_path, path)?;
        if let Some(parent) = path.parent() {
            File::open(parent)?.sync_all()?;
        }

        Ok(())
    }
}

/// Temporary sibling path used for atomic writes: `<target>.tmp`
fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}
