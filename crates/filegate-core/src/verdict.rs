use filegate_util::filename::extension_of;
use serde::Serialize;

use crate::archive::{ArchiveInspector, DEFAULT_MAX_ARCHIVE_ENTRIES};
use crate::classifier::{ContentClassifier, DetectedType};
use crate::extension::ExtensionTable;
use crate::filename::{FilenameValidator, DEFAULT_MULTI_SUFFIX_ALLOWLIST};
use crate::text_scan::{TextScanner, DEFAULT_TEXT_SCAN_LIMIT};

pub const NO_FILE_REASON: &str = "no file supplied";

/// A submitted file as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub declared_size: u64,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            declared_size: bytes.len() as u64,
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    safe: bool,
    reasons: Vec<String>,
    detected_type: Option<DetectedType>,
}

impl Verdict {
    /// The only constructor: `safe` always follows from `reasons`.
    pub fn from_reasons(reasons: Vec<String>, detected_type: Option<DetectedType>) -> Self {
        Self {
            safe: reasons.is_empty(),
            reasons,
            detected_type,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::from_reasons(vec![reason.into()], None)
    }

    pub fn safe(&self) -> bool {
        self.safe
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn detected_type(&self) -> Option<&DetectedType> {
        self.detected_type.as_ref()
    }
}

/// Tunables of the gate. Tables themselves are static.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    pub multi_suffix_allowlist: Vec<String>,
    pub text_scan_limit: usize,
    pub max_archive_entries: usize,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            multi_suffix_allowlist: DEFAULT_MULTI_SUFFIX_ALLOWLIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            text_scan_limit: DEFAULT_TEXT_SCAN_LIMIT,
            max_archive_entries: DEFAULT_MAX_ARCHIVE_ENTRIES,
        }
    }
}

/// Runs every check over one upload and collects the reasons.
pub struct UploadGate {
    table: &'static ExtensionTable,
    filenames: FilenameValidator,
    classifier: ContentClassifier,
    text: TextScanner,
    archives: ArchiveInspector,
}

impl UploadGate {
    pub fn new(policy: &GatePolicy) -> Self {
        Self::with_classifier(policy, ContentClassifier::default())
    }

    pub fn with_classifier(policy: &GatePolicy, classifier: ContentClassifier) -> Self {
        let table = ExtensionTable::global();
        Self {
            table,
            filenames: FilenameValidator::new(&policy.multi_suffix_allowlist),
            classifier,
            text: TextScanner::new(policy.text_scan_limit),
            archives: ArchiveInspector::new(table, policy.max_archive_entries),
        }
    }

    pub fn table(&self) -> &ExtensionTable {
        self.table
    }

    pub fn filenames(&self) -> &FilenameValidator {
        &self.filenames
    }

    pub fn text_scanner(&self) -> &TextScanner {
        &self.text
    }

    pub fn archive_inspector(&self) -> &ArchiveInspector {
        &self.archives
    }

    pub fn evaluate(&self, file: Option<&UploadedFile>) -> Verdict {
        let Some(file) = file else {
            return Verdict::rejected(NO_FILE_REASON);
        };

        let ext = extension_of(&file.name);
        let mut reasons = self.filenames.validate(&file.name);

        let detected = self.classifier.classify(&file.bytes);
        reasons.extend(
            self.classifier
                .cross_check(self.table, &ext, detected.as_ref()),
        );

        if self.table.is_text_like(&ext) {
            reasons.extend(self.text.scan(&file.bytes));
        }

        if self.table.is_archive_like(&ext) {
            let report = self.archives.inspect(&file.bytes, &ext);
            if let Some(reason) = report.reason {
                reasons.push(reason);
            }
        }

        let verdict = Verdict::from_reasons(reasons, detected);
        let detected = verdict
            .detected_type()
            .map(|d| d.ext.as_str())
            .unwrap_or("unknown");
        if verdict.safe() {
            tracing::debug!(
                "Upload {:?} ({} bytes, {}) passed all checks",
                file.name,
                file.declared_size,
                detected
            );
        } else {
            tracing::warn!(
                "Upload {:?} ({} bytes, {}) rejected: {}",
                file.name,
                file.declared_size,
                detected,
                verdict.reasons().join("; ")
            );
        }
        verdict
    }
}

impl Default for UploadGate {
    fn default() -> Self {
        Self::new(&GatePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00,
    ];

    fn zip_with(names: &[&str]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for name in names {
            writer.start_file(*name, options).unwrap();
            writer.write_all(b"<xml/>").unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn missing_file_is_a_single_reason() {
        let verdict = UploadGate::default().evaluate(None);
        assert!(!verdict.safe());
        assert_eq!(verdict.reasons(), [NO_FILE_REASON.to_string()]);
        assert!(verdict.detected_type().is_none());
    }

    #[test]
    fn png_passes() {
        let verdict = UploadGate::default().evaluate(Some(&UploadedFile::new("photo.png", PNG)));
        assert!(verdict.safe(), "{:?}", verdict.reasons());
        assert!(verdict.reasons().is_empty());
        assert_eq!(verdict.detected_type().unwrap().ext, "png");
    }

    #[test]
    fn executable_renamed_to_txt_is_caught() {
        let mut bytes = b"MZ".to_vec();
        bytes.extend_from_slice(&[0x90, 0x00, 0x03, 0x00, 0x00, 0x00, 0x04, 0x00]);
        let verdict = UploadGate::default().evaluate(Some(&UploadedFile::new("invoice.txt", bytes)));
        assert!(!verdict.safe());
        assert!(verdict.reasons().iter().any(|r| r.contains("does not match")));
        assert_eq!(verdict.detected_type().unwrap().ext, "exe");
    }

    #[test]
    fn docx_with_macros_is_rejected() {
        let bytes = zip_with(&["[Content_Types].xml", "word/document.xml", "word/vbaProject.bin"]);
        let verdict = UploadGate::default().evaluate(Some(&UploadedFile::new("report.docx", bytes)));
        assert!(!verdict.safe());
        assert!(verdict.reasons().iter().any(|r| r.contains("macros")));
    }

    #[test]
    fn plain_docx_and_zip_pass() {
        let gate = UploadGate::default();
        let docx = zip_with(&["[Content_Types].xml", "_rels/.rels", "word/document.xml"]);
        let verdict = gate.evaluate(Some(&UploadedFile::new("report.docx", docx)));
        assert!(verdict.safe(), "{:?}", verdict.reasons());

        let zip = zip_with(&["notes.txt", "pictures/cat.png"]);
        assert!(gate.evaluate(Some(&UploadedFile::new("bundle.zip", zip))).safe());
    }

    #[test]
    fn reasons_accumulate_across_checks() {
        let verdict = UploadGate::default().evaluate(Some(&UploadedFile::new(
            "notes.txt.md",
            b"hello <iframe src=x></iframe>".to_vec(),
        )));
        assert!(!verdict.safe());
        assert!(verdict.reasons().iter().any(|r| r.contains("double extension")));
        assert!(verdict.reasons().iter().any(|r| r.contains("iframe")));
        assert_eq!(verdict.reasons()[0], "suspicious double extension");
    }

    #[test]
    fn clean_text_passes() {
        let file = UploadedFile::new("notes.md", b"# Notes\n\n- buy milk\n".to_vec());
        let verdict = UploadGate::default().evaluate(Some(&file));
        assert!(verdict.safe(), "{:?}", verdict.reasons());
        assert_eq!(verdict.detected_type().unwrap().ext, "txt");
    }

    #[test]
    fn markdown_opening_with_markup_passes() {
        let gate = UploadGate::default();
        for body in [
            &b"<!-- toc -->\n# Title\n"[..],
            &b"<p align=\"center\">\n  <b>filegate</b>\n</p>\n\n# Usage\n"[..],
            &b"<b>Note</b> read this first\n"[..],
        ] {
            let verdict = gate.evaluate(Some(&UploadedFile::new("README.md", body)));
            assert!(verdict.safe(), "{:?}", verdict.reasons());
        }

        let notes = UploadedFile::new("notes.txt", &b"<!-- draft -->\nplain notes\n"[..]);
        assert!(gate.evaluate(Some(&notes)).safe());
    }

    #[test]
    fn markup_in_markdown_is_still_scanned() {
        let file = UploadedFile::new("README.md", &b"<!-- x -->\n<script>alert(1)</script>\n"[..]);
        let verdict = UploadGate::default().evaluate(Some(&file));
        assert!(!verdict.safe());
        assert!(verdict.reasons().iter().any(|r| r.contains("script tag")));
    }

    #[test]
    fn undetermined_type_is_unsafe() {
        let file = UploadedFile::new("blob.png", vec![0x00, 0x01, 0x02, 0xFF]);
        let verdict = UploadGate::default().evaluate(Some(&file));
        assert_eq!(verdict.reasons(), ["file type could not be determined".to_string()]);
        assert!(verdict.detected_type().is_none());
    }

    #[test]
    fn corrupt_zip_fails_closed() {
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.extend_from_slice(&[0u8; 26]);
        let verdict = UploadGate::default().evaluate(Some(&UploadedFile::new("broken.zip", bytes)));
        assert!(!verdict.safe());
        assert!(verdict
            .reasons()
            .iter()
            .any(|r| r == "archive structure could not be read"));
    }

    #[test]
    fn allowlist_comes_from_policy() {
        let policy = GatePolicy {
            multi_suffix_allowlist: vec!["v2".into()],
            ..GatePolicy::default()
        };
        let file = UploadedFile::new("manual.v2.txt", b"plain words".to_vec());
        assert!(UploadGate::new(&policy).evaluate(Some(&file)).safe());
        assert!(!UploadGate::default().evaluate(Some(&file)).safe());
    }

    #[test]
    fn safe_tracks_reasons() {
        assert!(Verdict::from_reasons(Vec::new(), None).safe());
        assert!(!Verdict::from_reasons(vec!["x".into()], None).safe());
    }
}
