use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_TEXT_SCAN_LIMIT: usize = 4000;

/// Labelled, case-insensitive patterns hinting at script or code injection.
static SUSPICIOUS_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("script tag", r"(?i)<script\b"),
        ("eval call", r"(?i)\beval\s*\("),
        ("base64_decode call", r"(?i)\bbase64_decode\s*\("),
        ("php opener", r"(?i)<\?php"),
        (
            "inline event handler",
            r"(?i)\bon(error|load|click|mouseover|focus|blur|submit|change|keydown|keyup)\s*=",
        ),
        ("iframe tag", r"(?i)<iframe\b"),
        ("shell exec call", r"(?i)\b(system|shell_exec|passthru|popen|proc_open)\s*\("),
        ("shebang line", r"(?m)^#!"),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, Regex::new(pattern).expect("static pattern compiles")))
    .collect()
});

/// Labels of the built-in patterns, in scan order.
pub fn pattern_labels() -> impl Iterator<Item = &'static str> {
    SUSPICIOUS_PATTERNS.iter().map(|(label, _)| *label)
}

/// Heuristic scan over the head of a text-like upload.
#[derive(Debug, Clone)]
pub struct TextScanner {
    limit: usize,
}

impl TextScanner {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// One reason per matching pattern. Undecodable bytes are replaced, never
    /// an error.
    pub fn scan(&self, bytes: &[u8]) -> Vec<String> {
        let head = &bytes[..bytes.len().min(self.limit)];
        let text = String::from_utf8_lossy(head);

        SUSPICIOUS_PATTERNS
            .iter()
            .filter(|(_, regex)| regex.is_match(&text))
            .map(|(label, _)| format!("suspicious text content: {}", label))
            .collect()
    }
}

impl Default for TextScanner {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_SCAN_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_has_no_reasons() {
        let scanner = TextScanner::default();
        assert!(scanner.scan(b"# Notes\n\nThe evaluation went fine.\n").is_empty());
        assert!(scanner.scan(b"condition = true; online=yes").is_empty());
    }

    #[test]
    fn detects_script_tag_case_insensitively() {
        let reasons = TextScanner::default().scan(b"<p>hi</p><SCRIPT>alert(1)</SCRIPT>");
        assert_eq!(reasons, vec!["suspicious text content: script tag".to_string()]);
    }

    #[test]
    fn reports_each_matching_pattern() {
        let payload = b"<?php eval(base64_decode('aGk=')); system('id'); ?>";
        let reasons = TextScanner::default().scan(payload);
        assert_eq!(reasons.len(), 4);
        assert!(reasons.iter().any(|r| r.ends_with("php opener")));
        assert!(reasons.iter().any(|r| r.ends_with("shell exec call")));
    }

    #[test]
    fn detects_event_handlers_and_iframes() {
        let reasons = TextScanner::default().scan(b"<img src=x onError = 'x'><IFRAME src=//evil>");
        assert!(reasons.iter().any(|r| r.ends_with("inline event handler")));
        assert!(reasons.iter().any(|r| r.ends_with("iframe tag")));
    }

    #[test]
    fn shebang_only_at_line_start() {
        let scanner = TextScanner::default();
        assert_eq!(scanner.scan(b"#!/bin/sh\nrm -rf /\n").len(), 1);
        assert_eq!(scanner.scan(b"notes\n#!/usr/bin/env python\n").len(), 1);
        assert!(scanner.scan(b"issue #! not a shebang").is_empty());
    }

    #[test]
    fn only_the_prefix_is_scanned() {
        let mut payload = "a".repeat(DEFAULT_TEXT_SCAN_LIMIT).into_bytes();
        payload.extend_from_slice(b"<script>");
        assert!(TextScanner::default().scan(&payload).is_empty());
        assert_eq!(TextScanner::new(payload.len()).scan(&payload).len(), 1);
    }

    #[test]
    fn invalid_utf8_is_not_fatal() {
        let reasons = TextScanner::default().scan(&[0xFF, 0xFE, b'<', b'i', b'f', b'r', b'a', b'm', b'e']);
        assert_eq!(reasons.len(), 1);
        assert!(TextScanner::default().scan(&[0xC3, 0x28, 0xFF]).is_empty());
    }

    #[test]
    fn labels_are_enumerable() {
        let labels: Vec<_> = pattern_labels().collect();
        assert_eq!(labels.first(), Some(&"script tag"));
        assert_eq!(labels.len(), 8);
    }
}
