use filegate_util::filename::{has_portable_charset, is_leaf_name, MAX_FILENAME_LEN};

/// Suffix fragments that may legitimately sit in front of the final
/// extension (`backup.tar.gz`, `notes.bak.txt`).
pub const DEFAULT_MULTI_SUFFIX_ALLOWLIST: &[&str] = &["tar", "gz", "bak"];

/// Syntactic filename checks. Content is never looked at here.
#[derive(Debug, Clone)]
pub struct FilenameValidator {
    multi_suffix_allowlist: Vec<String>,
}

impl FilenameValidator {
    pub fn new<I, S>(multi_suffix_allowlist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            multi_suffix_allowlist: multi_suffix_allowlist
                .into_iter()
                .map(|s| s.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn multi_suffix_allowlist(&self) -> &[String] {
        &self.multi_suffix_allowlist
    }

    pub fn validate(&self, name: &str) -> Vec<String> {
        let mut reasons = Vec::new();

        if name.is_empty() || name.len() > MAX_FILENAME_LEN {
            reasons.push(format!(
                "invalid filename: length must be 1 to {} bytes",
                MAX_FILENAME_LEN
            ));
        } else if !is_leaf_name(name) || !has_portable_charset(name) {
            reasons.push("invalid filename: only A-Z, a-z, 0-9, '.', '_' and '-' are allowed".into());
        }

        if self.has_double_extension(name) {
            reasons.push("suspicious double extension".into());
        }

        reasons
    }

    /// More than two dot-separated labels where the second-to-last one is
    /// not an allowlisted fragment.
    pub fn has_double_extension(&self, name: &str) -> bool {
        let labels: Vec<&str> = name.split('.').collect();
        if labels.len() <= 2 {
            return false;
        }
        let inner = labels[labels.len() - 2].to_ascii_lowercase();
        !self.multi_suffix_allowlist.iter().any(|allowed| *allowed == inner)
    }
}

impl Default for FilenameValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MULTI_SUFFIX_ALLOWLIST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        let v = FilenameValidator::default();
        assert!(v.validate("photo.png").is_empty());
        assert!(v.validate("Quarterly_Report-2024.pdf").is_empty());
        assert!(v.validate("README").is_empty());
        assert!(v.validate(&"a".repeat(255)).is_empty());
    }

    #[test]
    fn rejects_bad_length() {
        let v = FilenameValidator::default();
        assert_eq!(v.validate("").len(), 1);
        assert!(!v.validate(&"a".repeat(256)).is_empty());
    }

    #[test]
    fn rejects_paths_and_control_bytes() {
        let v = FilenameValidator::default();
        assert!(!v.validate("../../etc/passwd").is_empty());
        assert!(!v.validate("dir\\file.txt").is_empty());
        assert!(!v.validate("file\0.txt").is_empty());
        assert!(!v.validate("my file.txt").is_empty());
        assert!(!v.validate("<script>.html").is_empty());
    }

    #[test]
    fn flags_double_extension() {
        let v = FilenameValidator::default();
        let reasons = v.validate("invoice.txt.exe");
        assert_eq!(reasons, vec!["suspicious double extension".to_string()]);
        assert!(v.has_double_extension("photo.png.js"));
    }

    #[test]
    fn allowlisted_fragments_pass() {
        let v = FilenameValidator::default();
        assert!(!v.has_double_extension("backup.tar.gz"));
        assert!(!v.has_double_extension("notes.BAK.txt"));
        assert!(!v.has_double_extension("one.two"));
    }

    #[test]
    fn allowlist_is_configurable() {
        let v = FilenameValidator::new(["v1", ".min"]);
        assert!(!v.has_double_extension("lib.v1.zip"));
        assert!(!v.has_double_extension("app.min.txt"));
        assert!(v.has_double_extension("backup.tar.gz"));
        assert_eq!(v.multi_suffix_allowlist(), ["v1".to_string(), "min".to_string()]);
    }
}
