//! Human-readable sanitization diagnostics.
//!
//! Every action the scanner takes on the input (unwrapping a tag, dropping an attribute,
//! rejecting a CSS property, ...) is reported as one [`Diagnostic`]. The message text is
//! meant for end users; [`DiagnosticKind`] is the stable, machine-readable classification.
//! Untrusted values embedded in messages are HTML-escaped so the messages can be displayed
//! as markup.

use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    TagNotInPolicy,
    TagFiltered,
    TagRemoved,
    TagEncoded,
    CommentRemoved,
    ConditionalCommentStripped,
    AttributeNotInPolicy,
    AttributeInvalid,
    AttributeCausedRemoval,
    AttributeCausedFilter,
    AttributeCausedEncode,
    CssTagMalformed,
    CssAttributeMalformed,
    CssSelectorRejected,
    CssSelectorMalformed,
    CssConditionUnsupported,
    CssPropertyRejected,
    CssDeclarationMalformed,
    CssImportIgnored,
    CssAtRuleRemoved,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TagNotInPolicy => "tag-not-in-policy",
            Self::TagFiltered => "tag-filtered",
            Self::TagRemoved => "tag-removed",
            Self::TagEncoded => "tag-encoded",
            Self::CommentRemoved => "comment-removed",
            Self::ConditionalCommentStripped => "conditional-comment-stripped",
            Self::AttributeNotInPolicy => "attribute-not-in-policy",
            Self::AttributeInvalid => "attribute-invalid",
            Self::AttributeCausedRemoval => "attribute-caused-removal",
            Self::AttributeCausedFilter => "attribute-caused-filter",
            Self::AttributeCausedEncode => "attribute-caused-encode",
            Self::CssTagMalformed => "css-tag-malformed",
            Self::CssAttributeMalformed => "css-attribute-malformed",
            Self::CssSelectorRejected => "css-selector-rejected",
            Self::CssSelectorMalformed => "css-selector-malformed",
            Self::CssConditionUnsupported => "css-condition-unsupported",
            Self::CssPropertyRejected => "css-property-rejected",
            Self::CssDeclarationMalformed => "css-declaration-malformed",
            Self::CssImportIgnored => "css-import-ignored",
            Self::CssAtRuleRemoved => "css-at-rule-removed",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    kind: DiagnosticKind,
    message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Diagnostic {
    fn new(kind: DiagnosticKind, message: String) -> Self {
        tracing::trace!(kind = kind.as_str(), message = message.as_str(), "diagnostic");
        Self { kind, message }
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn tag_not_in_policy(tag: &str) -> Self {
        Self::new(
            DiagnosticKind::TagNotInPolicy,
            format!(
                "The {} tag is not allowed by the policy. It has been filtered out, but its contents were kept.",
                esc(tag)
            ),
        )
    }

    pub(crate) fn tag_filtered(tag: &str) -> Self {
        Self::new(
            DiagnosticKind::TagFiltered,
            format!(
                "The {} tag has been filtered for security reasons. The contents of the tag will remain in place.",
                esc(tag)
            ),
        )
    }

    pub(crate) fn tag_removed(tag: &str) -> Self {
        Self::new(
            DiagnosticKind::TagRemoved,
            format!(
                "The {} tag has been removed for security reasons.",
                esc(tag)
            ),
        )
    }

    pub(crate) fn tag_encoded(tag: &str) -> Self {
        Self::new(
            DiagnosticKind::TagEncoded,
            format!(
                "The {} tag is not allowed as markup. It has been encoded as text and its contents were kept.",
                esc(tag)
            ),
        )
    }

    pub(crate) fn comment_removed() -> Self {
        Self::new(
            DiagnosticKind::CommentRemoved,
            "A comment has been removed.".to_string(),
        )
    }

    pub(crate) fn conditional_comment_stripped(comment: &str) -> Self {
        Self::new(
            DiagnosticKind::ConditionalCommentStripped,
            format!(
                "The comment \"{}\" contained conditional directives, which have been removed.",
                esc_quoted(comment)
            ),
        )
    }

    pub(crate) fn attribute_not_in_policy(tag: &str, attribute: &str) -> Self {
        Self::new(
            DiagnosticKind::AttributeNotInPolicy,
            format!(
                "The {} attribute of the {} tag has been removed for security reasons. This removal should not affect the display of the HTML submitted.",
                esc(attribute),
                esc(tag)
            ),
        )
    }

    pub(crate) fn attribute_invalid(tag: &str, attribute: &str, value: &str) -> Self {
        Self::new(
            DiagnosticKind::AttributeInvalid,
            format!(
                "{} The attribute has been removed and the rest of the tag left in place.",
                rejected_value(tag, attribute, value)
            ),
        )
    }

    pub(crate) fn attribute_caused_removal(tag: &str, attribute: &str, value: &str) -> Self {
        Self::new(
            DiagnosticKind::AttributeCausedRemoval,
            format!(
                "{} The {} tag has been removed together with its contents.",
                rejected_value(tag, attribute, value),
                esc(tag)
            ),
        )
    }

    pub(crate) fn attribute_caused_filter(tag: &str, attribute: &str, value: &str) -> Self {
        Self::new(
            DiagnosticKind::AttributeCausedFilter,
            format!(
                "{} The {} tag has been filtered and its contents left in place.",
                rejected_value(tag, attribute, value),
                esc(tag)
            ),
        )
    }

    pub(crate) fn attribute_caused_encode(tag: &str, attribute: &str, value: &str) -> Self {
        Self::new(
            DiagnosticKind::AttributeCausedEncode,
            format!(
                "{} The {} tag has been encoded as text and its contents left in place.",
                rejected_value(tag, attribute, value),
                esc(tag)
            ),
        )
    }

    pub(crate) fn css_tag_malformed(css: &str, reason: &str) -> Self {
        Self::new(
            DiagnosticKind::CssTagMalformed,
            format!(
                "The style tag contained CSS that could not be parsed ({}): \"{}\". The style tag has been removed.",
                esc(reason),
                esc_quoted(css)
            ),
        )
    }

    pub(crate) fn css_attribute_malformed(tag: &str, value: &str, reason: &str) -> Self {
        Self::new(
            DiagnosticKind::CssAttributeMalformed,
            format!(
                "The {} tag had a style attribute, \"{}\", that could not be parsed ({}). The attribute has been removed.",
                esc(tag),
                esc_quoted(value),
                esc(reason)
            ),
        )
    }

    pub(crate) fn css_selector_rejected(owner: &str, selector: &str) -> Self {
        Self::new(
            DiagnosticKind::CssSelectorRejected,
            format!(
                "The {} tag had a selector, \"{}\", that could not be allowed. The selector has been removed.",
                esc(owner),
                esc_quoted(selector)
            ),
        )
    }

    pub(crate) fn css_selector_malformed(owner: &str, selector: &str) -> Self {
        Self::new(
            DiagnosticKind::CssSelectorMalformed,
            format!(
                "The {} tag had a selector, \"{}\", that could not be parsed. The selector has been removed.",
                esc(owner),
                esc_quoted(selector)
            ),
        )
    }

    pub(crate) fn css_condition_unsupported(selector: &str) -> Self {
        Self::new(
            DiagnosticKind::CssConditionUnsupported,
            format!(
                "Unknown condition for selector {} encountered",
                esc(selector)
            ),
        )
    }

    pub(crate) fn css_property_rejected(owner: &str, property: &str, value: &str) -> Self {
        Self::new(
            DiagnosticKind::CssPropertyRejected,
            format!(
                "The {} tag had a style property, \"{}\", with a value of \"{}\" that could not be allowed for security reasons. The property has been removed.",
                esc(owner),
                esc_quoted(property),
                esc_quoted(value)
            ),
        )
    }

    pub(crate) fn css_declaration_malformed(owner: &str, declaration: &str) -> Self {
        Self::new(
            DiagnosticKind::CssDeclarationMalformed,
            format!(
                "The {} tag had a style declaration, \"{}\", that could not be parsed. The declaration has been removed.",
                esc(owner),
                esc_quoted(declaration)
            ),
        )
    }

    pub(crate) fn css_import_ignored(url: &str) -> Self {
        Self::new(
            DiagnosticKind::CssImportIgnored,
            format!(
                "The style sheet import of \"{}\" was not followed. Imported style sheets are never fetched.",
                esc_quoted(url)
            ),
        )
    }

    pub(crate) fn css_import_over_limit(url: &str, limit: usize) -> Self {
        Self::new(
            DiagnosticKind::CssImportIgnored,
            format!(
                "The style sheet import of \"{}\" exceeds the limit of {limit} imports and has been removed.",
                esc_quoted(url)
            ),
        )
    }

    pub(crate) fn css_at_rule_removed(owner: &str, at_rule: &str) -> Self {
        Self::new(
            DiagnosticKind::CssAtRuleRemoved,
            format!(
                "The {} tag contained an @{} rule, which is not supported. The rule has been removed.",
                esc(owner),
                esc(at_rule)
            ),
        )
    }
}

fn rejected_value(tag: &str, attribute: &str, value: &str) -> String {
    format!(
        "The {} tag contained an attribute that could not be processed. The {} attribute had a value of \"{}\". This value could not be accepted for security reasons.",
        esc(tag),
        esc(attribute),
        esc_quoted(value)
    )
}

fn esc(s: &str) -> Cow<'_, str> {
    htmlize::escape_text(s)
}

fn esc_quoted(s: &str) -> Cow<'_, str> {
    htmlize::escape_attribute(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_escape_untrusted_values() {
        let d = Diagnostic::attribute_invalid("a", "href", "javascript:alert(\"<x>\")");
        assert_eq!(d.kind(), DiagnosticKind::AttributeInvalid);
        assert!(d.message().contains("javascript:alert(&quot;&lt;x&gt;&quot;)"));
        assert!(!d.message().contains("<x>"));
        assert_eq!(d.to_string(), d.message());
    }

    #[test]
    fn kinds_have_stable_names() {
        assert_eq!(DiagnosticKind::TagFiltered.as_str(), "tag-filtered");
        assert_eq!(
            DiagnosticKind::CssConditionUnsupported.to_string(),
            "css-condition-unsupported"
        );
    }
}
