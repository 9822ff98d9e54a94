#![forbid(unsafe_code)]

//! `scour` is a policy-driven HTML/CSS sanitizer.
//!
//! Untrusted markup is parsed, every element, attribute and style is checked against a
//! declarative [`Policy`], and the cleaned markup is returned together with an ordered list
//! of [`Diagnostic`]s explaining what was removed and why.
//!
//! ```
//! let result = scour::sanitize("<b onclick=\"steal()\">hi</b>").unwrap();
//! assert_eq!(result.clean_html(), "<b>hi</b>");
//! ```
//!
//! Use [`Sanitizer`] to share a custom policy between threads.

pub use scour_core::*;

use std::path::Path;
use std::sync::Arc;

/// A policy bundled for reuse. Cloning is cheap; clones share the same [`Policy`].
#[derive(Debug, Clone)]
pub struct Sanitizer {
    policy: Arc<Policy>,
}

impl Sanitizer {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    /// Loads an XML policy file.
    pub fn from_path(path: impl AsRef<Path>) -> std::result::Result<Self, PolicyError> {
        Ok(Self::new(Policy::from_path(path)?))
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Cleans an HTML fragment.
    pub fn sanitize(&self, html: &str) -> Result<ScanResult> {
        Scanner::new(&self.policy).scan(html)
    }

    /// Cleans a standalone stylesheet, as if it were the body of a `<style>` element.
    pub fn sanitize_style_sheet(&self, css: &str) -> Result<CleanStyle> {
        let max = self.check_size(css)?;
        Ok(CssScanner::new(&self.policy).scan_style_sheet(css, max)?)
    }

    /// Cleans the value of a `style` attribute that sits on `tag`.
    pub fn sanitize_inline_style(&self, css: &str, tag: &str) -> Result<CleanStyle> {
        let max = self.check_size(css)?;
        let tag = tag.to_ascii_lowercase();
        Ok(CssScanner::new(&self.policy).scan_inline_style(css, &tag, max)?)
    }

    fn check_size(&self, css: &str) -> Result<usize> {
        let max = self.policy.max_input_size();
        let size = css.chars().count();
        if size > max {
            tracing::debug!(size, max, "style input rejected");
            return Err(Error::InputTooLarge { size, max });
        }
        Ok(max)
    }
}

impl Default for Sanitizer {
    /// A sanitizer over a copy of [`Policy::builtin`].
    fn default() -> Self {
        Self::new(Policy::builtin().clone())
    }
}

impl From<Policy> for Sanitizer {
    fn from(policy: Policy) -> Self {
        Self::new(policy)
    }
}

/// Cleans `html` with the built-in policy.
pub fn sanitize(html: &str) -> Result<ScanResult> {
    Scanner::new(Policy::builtin()).scan(html)
}
