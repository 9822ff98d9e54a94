//! Recursive tag/attribute validation over the parsed node tree.

use crate::css::CssScanner;
use crate::diagnostic::Diagnostic;
use crate::dom::{self, Fragment, NodeKind};
use crate::error::{Error, Result};
use crate::policy::{OnInvalid, Policy, TagAction, TagRule};
use markup5ever_rcdom::Handle;
use regex::Regex;
use std::sync::OnceLock;

/// Elements nested deeper than this fail the scan with [`Error::TooDeep`].
pub const MAX_NESTING_DEPTH: usize = 250;

const EMPTY_STYLE_SHEET: &str = "/* */";

/// `[if IE]>`, `<![endif]`, `<!--[if !mso]>` and friends.
fn conditional_directive() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<?!?\[\s*(?:end)?if[^\]]*\]>?")
            .expect("valid conditional directive regex")
    })
}

/// Applies a [`Policy`] to a node tree in place, collecting diagnostics as it goes.
pub struct TagValidator<'p> {
    policy: &'p Policy,
    css: CssScanner<'p>,
    messages: Vec<Diagnostic>,
    max_input_size: usize,
    nofollow: bool,
    encode_unknown: bool,
    preserve_comments: bool,
}

impl<'p> TagValidator<'p> {
    pub fn new(policy: &'p Policy) -> Self {
        Self {
            policy,
            css: CssScanner::new(policy),
            messages: Vec::new(),
            max_input_size: policy.max_input_size(),
            nofollow: policy.nofollow_anchors(),
            encode_unknown: policy.encode_unknown_tags(),
            preserve_comments: policy.preserve_comments(),
        }
    }

    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Diagnostic> {
        self.messages
    }

    /// Validates a parsed fragment. Attributes of stray `<html>` tags, which the parser keeps
    /// out of the tree, are reported as removed.
    pub fn validate_fragment(&mut self, fragment: &Fragment) -> Result<()> {
        for attribute in fragment.root_attributes() {
            self.messages
                .push(Diagnostic::attribute_not_in_policy("html", attribute));
        }
        self.validate_root(fragment.root())
    }

    /// Validates every child of `root` (the root itself is never touched).
    pub fn validate_root(&mut self, root: &Handle) -> Result<()> {
        self.validate_children(root, 0)
    }

    /// Validates one node and its subtree. The node may be detached or replaced by its
    /// children when this returns.
    pub fn validate(&mut self, node: &Handle) -> Result<()> {
        self.validate_at(node, 0)
    }

    fn validate_children(&mut self, parent: &Handle, depth: usize) -> Result<()> {
        let mut index = 0;
        while let Some(child) = dom::child_at(parent, index) {
            self.validate_at(&child, depth)?;
            // A detached child was removed or replaced by its own children, which now sit
            // at `index` and get visited next.
            if dom::is_attached(&child) {
                index += 1;
            }
        }
        Ok(())
    }

    fn validate_at(&mut self, node: &Handle, depth: usize) -> Result<()> {
        match dom::kind(node) {
            NodeKind::Element => {}
            NodeKind::Comment => {
                self.validate_comment(node);
                return Ok(());
            }
            NodeKind::Text | NodeKind::Other => return Ok(()),
        }
        if depth >= MAX_NESTING_DEPTH {
            return Err(Error::TooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }
        let Some(name) = dom::element_name(node) else {
            return Ok(());
        };

        let policy = self.policy;
        match policy.tag_rule(&name) {
            None if self.encode_unknown => {
                self.messages.push(Diagnostic::tag_encoded(&name));
                self.encode(node, depth)
            }
            None => {
                self.messages.push(Diagnostic::tag_not_in_policy(&name));
                self.filter(node, depth)
            }
            Some(rule) => match rule.action() {
                TagAction::Filter => {
                    self.messages.push(Diagnostic::tag_filtered(&name));
                    self.filter(node, depth)
                }
                TagAction::Encode => {
                    self.messages.push(Diagnostic::tag_encoded(&name));
                    self.encode(node, depth)
                }
                TagAction::Validate => self.validate_tag(node, &name, rule, depth),
                TagAction::Truncate => self.truncate(node, &name, depth),
                TagAction::Remove => {
                    self.messages.push(Diagnostic::tag_removed(&name));
                    dom::detach(node);
                    Ok(())
                }
            },
        }
    }

    fn filter(&mut self, node: &Handle, depth: usize) -> Result<()> {
        self.validate_children(node, depth + 1)?;
        dom::promote_children(node);
        Ok(())
    }

    fn encode(&mut self, node: &Handle, depth: usize) -> Result<()> {
        self.validate_children(node, depth + 1)?;
        dom::encode_and_promote(node);
        Ok(())
    }

    fn validate_comment(&mut self, node: &Handle) {
        if !self.preserve_comments {
            self.messages.push(Diagnostic::comment_removed());
            dom::detach(node);
            return;
        }
        let Some(text) = dom::comment_text(node) else {
            return;
        };
        let stripped = conditional_directive().replace_all(text, "");
        if stripped != text {
            self.messages
                .push(Diagnostic::conditional_comment_stripped(text));
            // Visited again by the caller; every pass shortens the text.
            dom::replace_comment(node, &stripped);
        }
    }

    fn truncate(&mut self, node: &Handle, name: &str, depth: usize) -> Result<()> {
        while let Some((attribute, _)) = dom::attribute_at(node, 0) {
            self.messages
                .push(Diagnostic::attribute_not_in_policy(name, &attribute));
            dom::remove_attribute_at(node, 0);
        }
        dom::retain_text_children(node);
        // Only text and comments are left.
        self.validate_children(node, depth + 1)
    }

    fn validate_tag(
        &mut self,
        node: &Handle,
        name: &str,
        rule: &TagRule,
        depth: usize,
    ) -> Result<()> {
        if name == "style" && !self.clean_style_element(node) {
            return Ok(());
        }

        let policy = self.policy;
        let mut index = 0;
        while let Some((attribute, value)) = dom::attribute_at(node, index) {
            let Some(attribute_rule) = rule
                .attribute(&attribute)
                .or_else(|| policy.global_attribute(&attribute))
            else {
                self.messages
                    .push(Diagnostic::attribute_not_in_policy(name, &attribute));
                dom::remove_attribute_at(node, index);
                continue;
            };

            if attribute == "style" {
                match self
                    .css
                    .scan_inline_style(&value, name, self.max_input_size)
                {
                    Ok(clean) => {
                        dom::set_attribute_value_at(node, index, &clean.css);
                        self.messages.extend(clean.messages);
                        index += 1;
                    }
                    Err(err) => {
                        self.messages.push(Diagnostic::css_attribute_malformed(
                            name,
                            &value,
                            &err.to_string(),
                        ));
                        dom::remove_attribute_at(node, index);
                    }
                }
                continue;
            }

            let decoded = htmlize::unescape(value.as_str());
            if attribute_rule.accepts(&decoded) {
                index += 1;
                continue;
            }
            match attribute_rule.on_invalid() {
                OnInvalid::RemoveTag => {
                    self.messages.push(Diagnostic::attribute_caused_removal(
                        name, &attribute, &value,
                    ));
                    dom::detach(node);
                    return Ok(());
                }
                OnInvalid::FilterTag => {
                    self.filter(node, depth)?;
                    self.messages.push(Diagnostic::attribute_caused_filter(
                        name, &attribute, &value,
                    ));
                    return Ok(());
                }
                OnInvalid::EncodeTag => {
                    self.encode(node, depth)?;
                    self.messages.push(Diagnostic::attribute_caused_encode(
                        name, &attribute, &value,
                    ));
                    return Ok(());
                }
                OnInvalid::RemoveAttribute => {
                    self.messages
                        .push(Diagnostic::attribute_invalid(name, &attribute, &value));
                    dom::remove_attribute_at(node, index);
                }
            }
        }

        if self.nofollow && name == "a" {
            dom::set_attribute(node, "rel", "nofollow");
        }

        self.validate_children(node, depth + 1)
    }

    /// Replaces the body of a `<style>` element with its cleaned stylesheet. Returns `false`
    /// when the CSS was unusable and the element has been removed.
    fn clean_style_element(&mut self, node: &Handle) -> bool {
        let css = dom::text_content(node);
        match self.css.scan_style_sheet(&css, self.max_input_size) {
            Ok(clean) => {
                if clean.is_empty() {
                    dom::set_text_content(node, EMPTY_STYLE_SHEET);
                } else {
                    dom::set_text_content(node, &clean.css);
                }
                self.messages.extend(clean.messages);
                true
            }
            Err(err) => {
                self.messages
                    .push(Diagnostic::css_tag_malformed(&css, &err.to_string()));
                dom::detach(node);
                false
            }
        }
    }
}
