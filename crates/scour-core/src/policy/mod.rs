//! In-memory policy model.
//!
//! A [`Policy`] is built once (from XML via [`Policy::from_xml_str`] / [`Policy::from_path`],
//! or programmatically via [`PolicyBuilder`]) and is read-only afterwards. It is `Send + Sync`
//! and can be shared across concurrently running scans.

mod loader;

use crate::error::PolicyError;
use indexmap::IndexMap;
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

pub const DEFAULT_MAX_INPUT_SIZE: usize = 100_000;
pub const DEFAULT_MAX_STYLESHEET_IMPORTS: usize = 1;

/// Well-known directive names.
pub mod directive {
    pub const MAX_INPUT_SIZE: &str = "maxInputSize";
    pub const NOFOLLOW_ANCHORS: &str = "nofollowAnchors";
    pub const MAX_STYLESHEET_IMPORTS: &str = "maxStyleSheetImports";
    pub const ON_UNKNOWN_TAG: &str = "onUnknownTag";
    pub const PRESERVE_COMMENTS: &str = "preserveComments";
}

/// Named regular expressions consulted by the CSS selector validator.
pub mod regex_name {
    pub const CSS_ELEMENT_SELECTOR: &str = "cssElementSelector";
    pub const CSS_ELEMENT_EXCLUSION: &str = "cssElementExclusion";
    pub const CSS_CLASS_SELECTOR: &str = "cssClassSelector";
    pub const CSS_CLASS_EXCLUSION: &str = "cssClassExclusion";
    pub const CSS_ID_SELECTOR: &str = "cssIDSelector";
    pub const CSS_ID_EXCLUSION: &str = "cssIDExclusion";
    pub const CSS_PSEUDO_ELEMENT_SELECTOR: &str = "cssPseudoElementSelector";
    pub const CSS_PSEUDO_ELEMENT_EXCLUSION: &str = "cssPseudoElementExclusion";
    pub const CSS_ATTRIBUTE_SELECTOR: &str = "cssAttributeSelector";
    pub const CSS_ATTRIBUTE_EXCLUSION: &str = "cssAttributeExclusion";
}

/// A policy regular expression. The source text is kept as written; matching is always
/// against the whole value.
#[derive(Debug, Clone)]
pub struct AllowedPattern {
    source: String,
    anchored: Regex,
}

impl AllowedPattern {
    pub fn new(source: impl Into<String>) -> Result<Self, PolicyError> {
        let source = source.into();
        let anchored =
            Regex::new(&format!("^(?:{source})$")).map_err(|err| PolicyError::InvalidRegex {
                pattern: source.clone(),
                source: err,
            })?;
        Ok(Self { source, anchored })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_full_match(&self, value: &str) -> bool {
        self.anchored.is_match(value)
    }
}

/// Remedy applied when an attribute (or CSS property) value fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnInvalid {
    RemoveTag,
    FilterTag,
    /// Render the element's tags as literal text and keep its (validated) children.
    EncodeTag,
    #[default]
    RemoveAttribute,
}

impl OnInvalid {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RemoveTag => "removeTag",
            Self::FilterTag => "filterTag",
            Self::EncodeTag => "encodeTag",
            Self::RemoveAttribute => "removeAttribute",
        }
    }
}

impl FromStr for OnInvalid {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "removeTag" => Ok(Self::RemoveTag),
            "filterTag" => Ok(Self::FilterTag),
            "encodeTag" => Ok(Self::EncodeTag),
            "removeAttribute" => Ok(Self::RemoveAttribute),
            _ => Err(()),
        }
    }
}

/// Disposition of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    /// Keep the element, validating its attributes and children.
    Validate,
    /// Unwrap the element, keeping its (validated) children.
    Filter,
    /// Keep the element but strip all attributes and non-text children.
    Truncate,
    /// Replace the element's tags with escaped text, keeping its (validated) children.
    Encode,
    /// Drop the element and its whole subtree.
    Remove,
}

impl TagAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Filter => "filter",
            Self::Truncate => "truncate",
            Self::Encode => "encode",
            Self::Remove => "remove",
        }
    }
}

impl FromStr for TagAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "validate" => Ok(Self::Validate),
            "filter" => Ok(Self::Filter),
            "truncate" => Ok(Self::Truncate),
            "encode" => Ok(Self::Encode),
            "remove" | "reject" => Ok(Self::Remove),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttributeRule {
    name: String,
    allowed_values: Vec<String>,
    allowed_patterns: Vec<AllowedPattern>,
    on_invalid: OnInvalid,
    description: Option<String>,
}

impl AttributeRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            allowed_values: Vec::new(),
            allowed_patterns: Vec::new(),
            on_invalid: OnInvalid::default(),
            description: None,
        }
    }

    pub fn with_literal(mut self, value: impl Into<String>) -> Self {
        self.allowed_values.push(value.into());
        self
    }

    pub fn with_pattern(mut self, pattern: AllowedPattern) -> Self {
        self.allowed_patterns.push(pattern);
        self
    }

    pub fn with_on_invalid(mut self, on_invalid: OnInvalid) -> Self {
        self.on_invalid = on_invalid;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns a copy of this rule with the given overrides applied.
    ///
    /// Common attributes are templates shared by many tags; attaching one to a tag with a
    /// different remedy must never affect the other tags using the same template.
    pub fn with_overrides(&self, on_invalid: Option<OnInvalid>, description: Option<&str>) -> Self {
        let mut copy = self.clone();
        if let Some(on_invalid) = on_invalid {
            copy.on_invalid = on_invalid;
        }
        if let Some(description) = description {
            copy.description = Some(description.to_string());
        }
        copy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allowed_values(&self) -> &[String] {
        &self.allowed_values
    }

    pub fn allowed_patterns(&self) -> &[AllowedPattern] {
        &self.allowed_patterns
    }

    pub fn on_invalid(&self) -> OnInvalid {
        self.on_invalid
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Literal values compare case-insensitively; patterns must match the whole value.
    pub fn accepts(&self, value: &str) -> bool {
        let lowered = value.to_lowercase();
        self.allowed_values
            .iter()
            .any(|allowed| allowed.to_lowercase() == lowered)
            || self.allowed_patterns.iter().any(|p| p.is_full_match(value))
    }
}

#[derive(Debug, Clone)]
pub struct TagRule {
    name: String,
    action: TagAction,
    attributes: IndexMap<String, AttributeRule>,
}

impl TagRule {
    pub fn new(name: impl Into<String>, action: TagAction) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            action,
            attributes: IndexMap::new(),
        }
    }

    pub fn with_attribute(mut self, rule: AttributeRule) -> Self {
        self.attributes.insert(rule.name.clone(), rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> TagAction {
        self.action
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeRule> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &AttributeRule> {
        self.attributes.values()
    }
}

#[derive(Debug, Clone)]
pub struct PropertyRule {
    name: String,
    allowed_values: Vec<String>,
    allowed_patterns: Vec<AllowedPattern>,
    shorthand_refs: Vec<String>,
    on_invalid: OnInvalid,
    description: Option<String>,
}

impl PropertyRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            allowed_values: Vec::new(),
            allowed_patterns: Vec::new(),
            shorthand_refs: Vec::new(),
            on_invalid: OnInvalid::default(),
            description: None,
        }
    }

    pub fn with_literal(mut self, value: impl Into<String>) -> Self {
        self.allowed_values.push(value.into().to_lowercase());
        self
    }

    pub fn with_pattern(mut self, pattern: AllowedPattern) -> Self {
        self.allowed_patterns.push(pattern);
        self
    }

    pub fn with_shorthand(mut self, property: impl Into<String>) -> Self {
        self.shorthand_refs.push(property.into().to_ascii_lowercase());
        self
    }

    pub fn with_on_invalid(mut self, on_invalid: OnInvalid) -> Self {
        self.on_invalid = on_invalid;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allowed_values(&self) -> &[String] {
        &self.allowed_values
    }

    pub fn allowed_patterns(&self) -> &[AllowedPattern] {
        &self.allowed_patterns
    }

    pub fn shorthand_refs(&self) -> &[String] {
        &self.shorthand_refs
    }

    pub fn on_invalid(&self) -> OnInvalid {
        self.on_invalid
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Checks an already lowercased value against the literal list and the patterns.
    /// Shorthand references are resolved by the CSS validator.
    pub fn matches_value(&self, lowered: &str) -> bool {
        self.allowed_values.iter().any(|v| v == lowered)
            || self.allowed_patterns.iter().any(|p| p.is_full_match(lowered))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Policy {
    tag_rules: IndexMap<String, TagRule>,
    common_attributes: IndexMap<String, AttributeRule>,
    global_attributes: IndexMap<String, AttributeRule>,
    css_properties: IndexMap<String, PropertyRule>,
    named_regexes: IndexMap<String, AllowedPattern>,
    directives: IndexMap<String, String>,
}

impl Policy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    /// The policy bundled with the crate: a conservative rule set for user-submitted rich text.
    pub fn builtin() -> &'static Policy {
        static POLICY: OnceLock<Policy> = OnceLock::new();
        POLICY.get_or_init(|| {
            Policy::from_xml_str(include_str!("builtin.xml")).expect("valid builtin policy")
        })
    }

    pub fn tag_rule(&self, name: &str) -> Option<&TagRule> {
        self.tag_rules.get(&name.to_ascii_lowercase())
    }

    pub fn common_attribute(&self, name: &str) -> Option<&AttributeRule> {
        self.common_attributes.get(&name.to_ascii_lowercase())
    }

    pub fn global_attribute(&self, name: &str) -> Option<&AttributeRule> {
        self.global_attributes.get(&name.to_ascii_lowercase())
    }

    pub fn property(&self, name: &str) -> Option<&PropertyRule> {
        self.css_properties.get(&name.to_ascii_lowercase())
    }

    pub fn regex(&self, name: &str) -> Option<&AllowedPattern> {
        self.named_regexes.get(name)
    }

    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives.get(name).map(String::as_str)
    }

    pub fn tag_rules(&self) -> impl Iterator<Item = &TagRule> {
        self.tag_rules.values()
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyRule> {
        self.css_properties.values()
    }

    /// Maximum input size in characters (`maxInputSize`, default 100000).
    pub fn max_input_size(&self) -> usize {
        self.usize_directive(directive::MAX_INPUT_SIZE, DEFAULT_MAX_INPUT_SIZE)
    }

    /// Whether validated anchors get `rel="nofollow"` (`nofollowAnchors`, default false).
    pub fn nofollow_anchors(&self) -> bool {
        self.directive(directive::NOFOLLOW_ANCHORS)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// Whether tags without a rule are encoded as text (`onUnknownTag="encode"`) instead of
    /// being filtered.
    pub fn encode_unknown_tags(&self) -> bool {
        self.directive(directive::ON_UNKNOWN_TAG)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("encode"))
    }

    /// Whether comments are kept (`preserveComments`, default true). Conditional-comment
    /// directives are stripped from kept comments either way.
    pub fn preserve_comments(&self) -> bool {
        self.directive(directive::PRESERVE_COMMENTS)
            .is_none_or(|v| !v.trim().eq_ignore_ascii_case("false"))
    }

    /// How many `@import` URLs a stylesheet scan keeps in its queue.
    pub fn max_style_sheet_imports(&self) -> usize {
        self.usize_directive(
            directive::MAX_STYLESHEET_IMPORTS,
            DEFAULT_MAX_STYLESHEET_IMPORTS,
        )
    }

    fn usize_directive(&self, name: &str, default: usize) -> usize {
        let Some(raw) = self.directive(name) else {
            return default;
        };
        match raw.trim().parse::<usize>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(directive = name, value = raw, "ignoring non-numeric directive");
                default
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct PolicyBuilder {
    policy: Policy,
}

impl PolicyBuilder {
    pub fn tag(mut self, rule: TagRule) -> Self {
        self.policy.tag_rules.insert(rule.name.clone(), rule);
        self
    }

    pub fn common_attribute(mut self, rule: AttributeRule) -> Self {
        self.policy
            .common_attributes
            .insert(rule.name.clone(), rule);
        self
    }

    pub fn global_attribute(mut self, rule: AttributeRule) -> Self {
        self.policy
            .global_attributes
            .insert(rule.name.clone(), rule);
        self
    }

    pub fn property(mut self, rule: PropertyRule) -> Self {
        self.policy.css_properties.insert(rule.name.clone(), rule);
        self
    }

    pub fn regex(mut self, name: impl Into<String>, pattern: AllowedPattern) -> Self {
        self.policy.named_regexes.insert(name.into(), pattern);
        self
    }

    pub fn directive(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.policy.directives.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Policy {
        for property in self.policy.css_properties.values() {
            for target in &property.shorthand_refs {
                if !self.policy.css_properties.contains_key(target) {
                    tracing::warn!(
                        property = property.name.as_str(),
                        shorthand = target.as_str(),
                        "shorthand reference does not name a property rule"
                    );
                }
            }
        }
        self.policy
    }
}
