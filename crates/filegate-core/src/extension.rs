use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use serde::Serialize;

/// Bumped whenever the extension table, blocked archive extensions or the
/// suspicious text patterns change.
pub const POLICY_VERSION: u32 = 1;

/// How the gate treats a file once its extension is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Binary,
    /// Scanned for suspicious text.
    Text,
    /// Opened and walked entry by entry.
    Archive,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtensionRule {
    pub accepted: BTreeSet<&'static str>,
    pub category: Category,
    /// Office container that may carry a VBA project.
    pub macro_capable: bool,
}

impl ExtensionRule {
    fn new(accepted: &[&'static str], category: Category) -> Self {
        Self {
            accepted: accepted.iter().copied().collect(),
            category,
            macro_capable: false,
        }
    }

    fn macros(mut self) -> Self {
        self.macro_capable = true;
        self
    }
}

/// Accepted extensions and the detected content types each one allows.
#[derive(Debug, Clone)]
pub struct ExtensionTable {
    rules: BTreeMap<&'static str, ExtensionRule>,
}

static DEFAULT_TABLE: LazyLock<ExtensionTable> = LazyLock::new(ExtensionTable::build_default);

impl ExtensionTable {
    /// Process-wide default table.
    pub fn global() -> &'static ExtensionTable {
        &DEFAULT_TABLE
    }

    fn build_default() -> Self {
        use Category::*;

        let jpeg = ExtensionRule::new(&["jpg", "jpeg"], Binary);
        let rules = [
            ("png", ExtensionRule::new(&["png"], Binary)),
            ("jpg", jpeg.clone()),
            ("jpeg", jpeg),
            ("gif", ExtensionRule::new(&["gif"], Binary)),
            ("pdf", ExtensionRule::new(&["pdf"], Binary)),
            // infer labels text opening with markup such as `<!--` or `<p>` as html
            ("txt", ExtensionRule::new(&["txt", "html"], Text)),
            ("md", ExtensionRule::new(&["txt", "md", "html"], Text)),
            ("html", ExtensionRule::new(&["html", "htm", "txt"], Text)),
            ("csv", ExtensionRule::new(&["txt", "csv"], Binary)),
            ("zip", ExtensionRule::new(&["zip"], Archive)),
            ("mp4", ExtensionRule::new(&["mp4", "m4v"], Binary)),
            ("webm", ExtensionRule::new(&["webm"], Binary)),
            ("docx", ExtensionRule::new(&["zip", "docx"], Archive).macros()),
            // infer reports templates as their document type
            ("dotx", ExtensionRule::new(&["zip", "docx", "dotx"], Archive).macros()),
            ("xlsx", ExtensionRule::new(&["zip", "xlsx"], Archive).macros()),
            ("pptx", ExtensionRule::new(&["zip", "pptx"], Archive).macros()),
        ];

        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// Rule registered for `ext`, looked up case-insensitively.
    pub fn rule(&self, ext: &str) -> Option<&ExtensionRule> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        self.rules.get(ext.as_str())
    }

    /// Content types permitted for a declared extension; `None` when the
    /// extension is not registered at all.
    pub fn accepted_types(&self, ext: &str) -> Option<&BTreeSet<&'static str>> {
        self.rule(ext).map(|rule| &rule.accepted)
    }

    pub fn is_text_like(&self, ext: &str) -> bool {
        self.rule(ext).is_some_and(|r| r.category == Category::Text)
    }

    pub fn is_archive_like(&self, ext: &str) -> bool {
        self.rule(ext).is_some_and(|r| r.category == Category::Archive)
    }

    pub fn is_macro_capable(&self, ext: &str) -> bool {
        self.rule(ext).is_some_and(|r| r.macro_capable)
    }

    /// All registered extensions in alphabetical order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ExtensionRule)> {
        self.rules.iter().map(|(ext, rule)| (*ext, rule))
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        Self::global().clone()
    }
}
