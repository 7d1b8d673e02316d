//! Magic-byte content classification.
//!
//! The true type of an upload comes from its bytes only. Sniffers run in
//! order and the first one that recognises the buffer wins.

use serde::Serialize;

use crate::extension::ExtensionTable;

/// Bytes inspected by the text fallback.
const TEXT_SNIFF_LIMIT: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedType {
    /// Short identifier compared against the extension table, e.g. `png`.
    pub ext: String,
    pub mime: String,
}

impl DetectedType {
    pub fn new(ext: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            ext: ext.into(),
            mime: mime.into(),
        }
    }
}

/// Something that can recognise a file format from its leading bytes.
pub trait Sniffer: Send + Sync {
    fn sniff(&self, bytes: &[u8]) -> Option<DetectedType>;
}

/// Native executable and bytecode headers, checked before anything else so
/// a renamed binary is always reported as what it is.
pub struct ExecutableSniffer;

const EXECUTABLE_SIGNATURES: &[(&[u8], &str, &str)] = &[
    (&[0x7F, 0x45, 0x4C, 0x46], "elf", "application/x-executable"),
    (&[0xFE, 0xED, 0xFA, 0xCE], "macho", "application/x-mach-binary"),
    (&[0xFE, 0xED, 0xFA, 0xCF], "macho", "application/x-mach-binary"),
    (&[0xCE, 0xFA, 0xED, 0xFE], "macho", "application/x-mach-binary"),
    (&[0xCF, 0xFA, 0xED, 0xFE], "macho", "application/x-mach-binary"),
    // Java class and universal Mach-O share this magic
    (&[0xCA, 0xFE, 0xBA, 0xBE], "class", "application/java-vm"),
    (&[0x00, 0x61, 0x73, 0x6D], "wasm", "application/wasm"),
    (b"MZ", "exe", "application/vnd.microsoft.portable-executable"),
];

impl Sniffer for ExecutableSniffer {
    fn sniff(&self, bytes: &[u8]) -> Option<DetectedType> {
        EXECUTABLE_SIGNATURES
            .iter()
            .find(|(magic, _, _)| bytes.starts_with(magic))
            .map(|(_, ext, mime)| DetectedType::new(*ext, *mime))
    }
}

/// Signature matching through the `infer` crate.
pub struct InferSniffer {
    infer: infer::Infer,
}

impl InferSniffer {
    pub fn new() -> Self {
        Self {
            infer: infer::Infer::new(),
        }
    }
}

impl Default for InferSniffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sniffer for InferSniffer {
    fn sniff(&self, bytes: &[u8]) -> Option<DetectedType> {
        self.infer
            .get(bytes)
            .map(|kind| DetectedType::new(kind.extension(), kind.mime_type()))
    }
}

/// Fallback for formats without a signature: a prefix that decodes as UTF-8
/// and holds no binary control bytes is plain text.
pub struct TextSniffer;

impl Sniffer for TextSniffer {
    fn sniff(&self, bytes: &[u8]) -> Option<DetectedType> {
        if bytes.is_empty() {
            return None;
        }
        let prefix = &bytes[..bytes.len().min(TEXT_SNIFF_LIMIT)];
        let text = match std::str::from_utf8(prefix) {
            Ok(text) => text,
            // A multi-byte character cut by the prefix limit is fine.
            Err(e) if e.error_len().is_none() => {
                std::str::from_utf8(&prefix[..e.valid_up_to()]).ok()?
            }
            Err(_) => return None,
        };
        let binary = text
            .chars()
            .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\x0c'));
        if binary {
            return None;
        }
        Some(DetectedType::new("txt", "text/plain"))
    }
}

/// Ordered chain of sniffers plus the extension cross-check.
pub struct ContentClassifier {
    sniffers: Vec<Box<dyn Sniffer>>,
}

impl ContentClassifier {
    pub fn new(sniffers: Vec<Box<dyn Sniffer>>) -> Self {
        Self { sniffers }
    }

    /// Append a sniffer after the existing ones.
    pub fn with_sniffer(mut self, sniffer: impl Sniffer + 'static) -> Self {
        self.sniffers.push(Box::new(sniffer));
        self
    }

    pub fn classify(&self, bytes: &[u8]) -> Option<DetectedType> {
        self.sniffers.iter().find_map(|s| s.sniff(bytes))
    }

    /// Reasons why `detected` is not acceptable for the declared extension.
    pub fn cross_check(
        &self,
        table: &ExtensionTable,
        ext: &str,
        detected: Option<&DetectedType>,
    ) -> Vec<String> {
        let Some(detected) = detected else {
            return vec!["file type could not be determined".into()];
        };

        match table.accepted_types(ext) {
            None if ext.is_empty() => vec![format!(
                "file has no extension (content detected as {})",
                detected.ext
            )],
            None => vec![format!(
                "extension '.{}' is not accepted (content detected as {})",
                ext, detected.ext
            )],
            Some(accepted) if !accepted.contains(detected.ext.as_str()) => {
                let expected: Vec<&str> = accepted.iter().copied().collect();
                vec![format!(
                    "extension '.{}' does not match content (detected {}, expected {})",
                    ext,
                    detected.ext,
                    expected.join(" or ")
                )]
            }
            Some(_) => Vec::new(),
        }
    }
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ExecutableSniffer),
            Box::new(InferSniffer::new()),
            Box::new(TextSniffer),
        ])
    }
}
