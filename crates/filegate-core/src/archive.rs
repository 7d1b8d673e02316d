//! Structural inspection of zip containers and zip-based office documents.
//!
//! Only entry names are looked at. Nothing is decompressed or extracted.

use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::LazyLock;

use filegate_util::filename::{extension_of, leaf_of};
use thiserror::Error;

use crate::extension::ExtensionTable;

pub const DEFAULT_MAX_ARCHIVE_ENTRIES: usize = 10_000;

/// Storage file of a VBA project inside OOXML documents.
const MACRO_PROJECT_FILE: &str = "vbaProject.bin";

/// Entry extensions that are never allowed inside an archive.
static BLOCKED_ARCHIVE_EXTENSIONS: LazyLock<BTreeSet<&'static str>> = LazyLock::new(|| {
    [
        // Windows executables and installers
        "exe", "com", "scr", "pif", "msi", "msp", "dll", "cpl", "sys",
        // Unix binaries and packages
        "so", "dylib", "deb", "rpm", "pkg", "dmg", "apk", "jar",
        // Shell and batch scripts
        "sh", "bash", "bat", "cmd", "ps1", "psm1",
        // Script engine files
        "js", "jse", "vbs", "vbe", "wsf", "wsh", "hta", "php", "lnk",
    ]
    .into_iter()
    .collect()
});

pub fn blocked_extensions() -> &'static BTreeSet<&'static str> {
    &BLOCKED_ARCHIVE_EXTENSIONS
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub extension: String,
}

impl ArchiveEntry {
    /// Trailing dots and spaces are dropped before the extension is taken,
    /// since Windows strips them on extraction (`evil.exe.` lands as `evil.exe`).
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let extension = extension_of(leaf_of(&path).trim_end_matches(['.', ' ']));
        Self { path, extension }
    }
}

/// Read-only listing of the entries in a container.
pub trait EntryLister {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError>;
}

/// Lists entry names from a zip central directory held in memory.
pub struct ZipEntryLister<'a> {
    bytes: &'a [u8],
}

impl<'a> ZipEntryLister<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl EntryLister for ZipEntryLister<'_> {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(self.bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)?;
            entries.push(ArchiveEntry::new(file.name()));
        }
        Ok(entries)
    }
}

/// Outcome of an archive inspection. `reason` is set iff `safe` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    pub safe: bool,
    pub reason: Option<String>,
}

impl ArchiveReport {
    fn clean() -> Self {
        Self {
            safe: true,
            reason: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveInspector {
    macro_capable: BTreeSet<String>,
    max_entries: usize,
}

impl ArchiveInspector {
    pub fn new(table: &ExtensionTable, max_entries: usize) -> Self {
        let macro_capable = table
            .iter()
            .filter(|(_, rule)| rule.macro_capable)
            .map(|(ext, _)| ext.to_string())
            .collect();
        Self {
            macro_capable,
            max_entries,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Inspect an in-memory zip container declared with extension `ext`.
    pub fn inspect(&self, bytes: &[u8], ext: &str) -> ArchiveReport {
        self.inspect_with(&mut ZipEntryLister::new(bytes), ext)
    }

    /// Inspect any container through its entry listing. The first entry that
    /// breaks a rule decides the report.
    pub fn inspect_with(&self, lister: &mut dyn EntryLister, ext: &str) -> ArchiveReport {
        let entries = match lister.entries() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("Archive could not be listed: {}", e);
                return ArchiveReport::rejected("archive structure could not be read");
            }
        };

        if entries.len() > self.max_entries {
            return ArchiveReport::rejected(format!(
                "archive has too many entries ({} > {})",
                entries.len(),
                self.max_entries
            ));
        }

        let macro_capable = self.macro_capable.contains(&ext.to_ascii_lowercase());

        for entry in &entries {
            if is_path_escape(&entry.path) {
                return ArchiveReport::rejected(format!(
                    "archive entry escapes extraction directory (zip slip): {}",
                    entry.path
                ));
            }

            if BLOCKED_ARCHIVE_EXTENSIONS.contains(entry.extension.as_str()) {
                return ArchiveReport::rejected(format!(
                    "archive contains blocked file type .{}: {}",
                    entry.extension, entry.path
                ));
            }

            if macro_capable && leaf_of(&entry.path).eq_ignore_ascii_case(MACRO_PROJECT_FILE) {
                return ArchiveReport::rejected(format!(
                    "document contains macros ({})",
                    entry.path
                ));
            }
        }

        ArchiveReport::clean()
    }
}

/// A `..` component under either separator, or an absolute path.
fn is_path_escape(path: &str) -> bool {
    let bytes = path.as_bytes();
    let rooted = path.starts_with(['/', '\\']);
    let drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    rooted || drive || path.split(['/', '\\']).any(|part| part == "..")
}
