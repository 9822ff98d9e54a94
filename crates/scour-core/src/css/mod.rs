//! CSS sanitization.
//!
//! Tokenizing is done by `cssparser`. [`lexical`] and [`selector`] turn its token stream
//! into the small value/selector model the [`CssValidator`] understands, and the
//! [`CssScanner`] drives the whole thing rule by rule, rebuilding a clean stylesheet or
//! inline declaration list.

pub mod lexical;
pub mod scanner;
pub mod selector;
pub mod validator;

pub use scanner::CssScanner;
pub use validator::{CssValidator, lexical_value_to_string, serialize_value};

use crate::diagnostic::Diagnostic;
use cssparser::{ParseError, Parser, serialize_identifier, serialize_string};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CssError {
    #[error("Malformed CSS at line {line}, column {column}: {reason}")]
    Malformed {
        line: u32,
        column: u32,
        reason: String,
    },
}

/// Output of one stylesheet or inline-style scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanStyle {
    /// The rebuilt CSS, containing only accepted rules and declarations.
    pub css: String,
    pub messages: Vec<Diagnostic>,
    /// `@import` targets encountered, in order. They are never fetched.
    pub imports: Vec<String>,
}

impl CleanStyle {
    pub fn is_empty(&self) -> bool {
        self.css.trim().is_empty()
    }
}

/// Consumes the rest of the current (nested) input and returns it as trimmed source text.
pub(crate) fn remaining_text<'i, 't>(p: &mut Parser<'i, 't>) -> Result<String, ParseError<'i, ()>> {
    let start = p.position();
    while p.next_including_whitespace_and_comments().is_ok() {}
    Ok(p.slice_from(start).trim().to_string())
}

/// `serialize_identifier`, with `<` written as a hex escape so the output can never end a
/// `<style>` element early.
pub(crate) fn write_identifier<W: fmt::Write>(name: &str, dest: &mut W) -> fmt::Result {
    let mut out = String::new();
    serialize_identifier(name, &mut out)?;
    dest.write_str(&out.replace("\\<", "\\3c "))
}

/// `serialize_string`, with `<` written as a hex escape.
pub(crate) fn write_string<W: fmt::Write>(value: &str, dest: &mut W) -> fmt::Result {
    let mut out = String::new();
    serialize_string(value, &mut out)?;
    dest.write_str(&out.replace('<', "\\3c "))
}
