#![forbid(unsafe_code)]

//! Policy-driven HTML/CSS sanitizer (headless core).
//!
//! Design goals:
//! - every decision comes from a declarative [`Policy`]; nothing is hard-coded per tag
//! - deterministic output with an ordered, explainable list of [`Diagnostic`]s
//! - a policy is immutable once built and can be shared across threads
//!
//! ```
//! use scour_core::{Policy, Scanner};
//!
//! let result = Scanner::new(Policy::builtin())
//!     .scan("<p onclick=\"x()\">hi<script>alert(1)</script></p>")
//!     .unwrap();
//! assert_eq!(result.clean_html(), "<p>hi</p>");
//! assert_eq!(result.messages().len(), 2);
//! ```

pub mod css;
pub mod diagnostic;
pub mod dom;
pub mod error;
pub mod policy;
pub mod scan;

pub use css::{CleanStyle, CssError, CssScanner, CssValidator};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::{Error, PolicyError, Result};
pub use policy::{
    AllowedPattern, AttributeRule, OnInvalid, Policy, PolicyBuilder, PropertyRule, TagAction,
    TagRule,
};
pub use scan::{MAX_NESTING_DEPTH, ScanResult, Scanner, TagValidator};
