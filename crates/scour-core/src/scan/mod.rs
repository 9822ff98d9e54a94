//! Scan entry point: input checks, parsing, validation and serialization.

pub mod validator;

pub use validator::{MAX_NESTING_DEPTH, TagValidator};

use crate::diagnostic::Diagnostic;
use crate::dom::Fragment;
use crate::error::{Error, Result};
use crate::policy::Policy;
use chrono::{DateTime, TimeDelta, Utc};
use std::borrow::Cow;

/// Sanitizes markup against one policy. Cheap to construct; holds no per-scan state.
#[derive(Debug, Clone, Copy)]
pub struct Scanner<'p> {
    policy: &'p Policy,
}

impl<'p> Scanner<'p> {
    pub fn new(policy: &'p Policy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &'p Policy {
        self.policy
    }

    pub fn scan(&self, markup: &str) -> Result<ScanResult> {
        let max = self.policy.max_input_size();
        let size = markup.chars().count();
        if size > max {
            return Err(Error::InputTooLarge { size, max });
        }

        let started_at = Utc::now();
        tracing::debug!(size, "scan started");

        let input = strip_invalid_xml_chars(markup);
        let fragment = Fragment::parse(&input);
        let mut validator = TagValidator::new(self.policy);
        validator.validate_fragment(&fragment)?;
        let clean_html = fragment.serialize()?;
        let messages = validator.into_messages();

        let finished_at = Utc::now();
        tracing::debug!(
            size,
            clean_size = clean_html.len(),
            messages = messages.len(),
            elapsed_us = (finished_at - started_at).num_microseconds().unwrap_or(i64::MAX),
            "scan finished"
        );
        Ok(ScanResult {
            clean_html,
            messages,
            started_at,
            finished_at,
        })
    }
}

/// Outcome of a successful scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    clean_html: String,
    messages: Vec<Diagnostic>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn clean_html(&self) -> &str {
        &self.clean_html
    }

    pub fn into_clean_html(self) -> String {
        self.clean_html
    }

    /// Diagnostics in the order the problems were found.
    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn elapsed(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }
}

/// Drops characters outside the XML 1.0 `Char` production.
pub fn strip_invalid_xml_chars(input: &str) -> Cow<'_, str> {
    if input.chars().all(is_xml_char) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.chars().filter(|&c| is_xml_char(c)).collect())
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::directive;

    #[test]
    fn strip_invalid_xml_chars_keeps_whitespace_and_text() {
        assert!(matches!(
            strip_invalid_xml_chars("plain\ttext\r\n"),
            Cow::Borrowed(_)
        ));
        assert_eq!(
            strip_invalid_xml_chars("a\u{0}b\u{8}c\u{FFFE}d\u{1F600}"),
            "abcd\u{1F600}"
        );
    }

    #[test]
    fn size_limit_counts_characters() {
        let policy = Policy::builder()
            .directive(directive::MAX_INPUT_SIZE, "3")
            .build();
        let scanner = Scanner::new(&policy);
        assert!(scanner.scan("äöü").is_ok());
        assert!(matches!(
            scanner.scan("abcd"),
            Err(Error::InputTooLarge { size: 4, max: 3 })
        ));
    }

    #[test]
    fn result_carries_timing() {
        let result = Scanner::new(Policy::builtin())
            .scan("<p>hello</p>")
            .expect("scan");
        assert_eq!(result.clean_html(), "<p>hello</p>");
        assert!(result.messages().is_empty());
        assert!(result.finished_at() >= result.started_at());
        assert!(result.elapsed() >= TimeDelta::zero());
    }
}
