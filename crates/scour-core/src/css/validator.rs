//! Policy checks for CSS properties, selectors and conditions.

use crate::css::lexical::{LexicalUnit, Operator};
use crate::css::selector::{Condition, Selector};
use crate::diagnostic::Diagnostic;
use crate::policy::{Policy, PropertyRule, regex_name};
use crate::css::{write_identifier, write_string};

/// Decides whether CSS constructs are allowed by a [`Policy`]. Pure: the only side effect is
/// pushing diagnostics into the sink passed by the caller.
#[derive(Debug, Clone, Copy)]
pub struct CssValidator<'p> {
    policy: &'p Policy,
}

impl<'p> CssValidator<'p> {
    pub fn new(policy: &'p Policy) -> Self {
        Self { policy }
    }

    /// Every non-operator unit of `value` must be accepted by the property rule named
    /// `name`, directly or through one of its shorthand references.
    pub fn is_valid_property(&self, name: &str, value: &[LexicalUnit]) -> bool {
        let Some(rule) = self.policy.property(name) else {
            return false;
        };
        let mut components = value
            .iter()
            .filter(|unit| !matches!(unit, LexicalUnit::Operator(_)))
            .peekable();
        if components.peek().is_none() {
            return false;
        }
        components.all(|unit| match lexical_value_to_string(unit) {
            Some(text) => self.is_valid_component(rule, &text.to_lowercase(), &mut Vec::new()),
            None => false,
        })
    }

    fn is_valid_component<'a>(
        &'a self,
        rule: &'a PropertyRule,
        lowered: &str,
        visited: &mut Vec<&'a str>,
    ) -> bool {
        if rule.matches_value(lowered) {
            return true;
        }
        visited.push(rule.name());
        for target in rule.shorthand_refs() {
            if visited.contains(&target.as_str()) {
                continue;
            }
            let Some(shorthand) = self.policy.property(target) else {
                continue;
            };
            if self.is_valid_component(shorthand, lowered, visited) {
                return true;
            }
        }
        false
    }

    /// `source` is the selector as written; it is only used in diagnostics.
    pub fn is_valid_selector(
        &self,
        source: &str,
        selector: &Selector,
        messages: &mut Vec<Diagnostic>,
    ) -> bool {
        match selector {
            Selector::Universal { explicit: false } => true,
            Selector::Universal { explicit: true } => self.is_valid_element("*"),
            Selector::Element(name) => self.is_valid_element(name),
            Selector::Conditional { simple, condition } => {
                self.is_valid_selector(source, simple, messages)
                    & self.is_valid_condition(source, condition, messages)
            }
            Selector::Descendant {
                ancestor: left,
                simple,
            }
            | Selector::Child {
                parent: left,
                simple,
            }
            | Selector::Adjacent {
                sibling: left,
                simple,
            }
            | Selector::GeneralSibling {
                sibling: left,
                simple,
            } => {
                self.is_valid_selector(source, left, messages)
                    & self.is_valid_selector(source, simple, messages)
            }
        }
    }

    pub fn is_valid_condition(
        &self,
        source: &str,
        condition: &Condition,
        messages: &mut Vec<Diagnostic>,
    ) -> bool {
        match condition {
            Condition::And(first, second) => {
                self.is_valid_condition(source, first, messages)
                    & self.is_valid_condition(source, second, messages)
            }
            Condition::Negation(selector) => self.is_valid_selector(source, selector, messages),
            Condition::Class(_) => self.matches_pair(
                regex_name::CSS_CLASS_SELECTOR,
                regex_name::CSS_CLASS_EXCLUSION,
                &condition.to_string(),
            ),
            Condition::Id(_) => self.matches_pair(
                regex_name::CSS_ID_SELECTOR,
                regex_name::CSS_ID_EXCLUSION,
                &condition.to_string(),
            ),
            Condition::PseudoClass(_) | Condition::PseudoElement(_) => self.matches_pair(
                regex_name::CSS_PSEUDO_ELEMENT_SELECTOR,
                regex_name::CSS_PSEUDO_ELEMENT_EXCLUSION,
                &condition.to_string(),
            ),
            Condition::Attribute { .. } => self.matches_pair(
                regex_name::CSS_ATTRIBUTE_SELECTOR,
                regex_name::CSS_ATTRIBUTE_EXCLUSION,
                &condition.to_string(),
            ),
            Condition::OnlyChild | Condition::OnlyOfType => true,
            Condition::Positional(_)
            | Condition::Lang(_)
            | Condition::Content(_)
            | Condition::Unsupported(_) => {
                messages.push(Diagnostic::css_condition_unsupported(source));
                false
            }
        }
    }

    fn is_valid_element(&self, name: &str) -> bool {
        self.matches_pair(
            regex_name::CSS_ELEMENT_SELECTOR,
            regex_name::CSS_ELEMENT_EXCLUSION,
            name,
        )
    }

    /// Missing allow pattern: nothing is allowed. Missing exclusion: nothing is excluded.
    fn matches_pair(&self, allow: &str, exclude: &str, text: &str) -> bool {
        let lowered = text.to_lowercase();
        let allowed = self
            .policy
            .regex(allow)
            .is_some_and(|p| p.is_full_match(&lowered));
        let excluded = self
            .policy
            .regex(exclude)
            .is_some_and(|p| p.is_full_match(&lowered));
        allowed && !excluded
    }
}

/// Canonical CSS text of a single lexical unit, or `None` for units that are never allowed
/// (functions, sub-expressions, unicode ranges, operators, unknown tokens).
pub fn lexical_value_to_string(unit: &LexicalUnit) -> Option<String> {
    match unit {
        LexicalUnit::Integer(v) => Some(v.to_string()),
        LexicalUnit::Real(v) => Some(v.to_string()),
        LexicalUnit::Dimension { value, unit } => Some(format!("{value}{unit}")),
        LexicalUnit::Percentage(v) => Some(format!("{v}%")),
        LexicalUnit::Inherit => Some("inherit".to_string()),
        LexicalUnit::Ident(name) => {
            let mut out = String::new();
            write_identifier(name, &mut out).ok()?;
            Some(out)
        }
        LexicalUnit::String(s) => Some(quoted(s)),
        LexicalUnit::Uri(url) => {
            if url.chars().all(is_plain_url_char) {
                Some(format!("url({url})"))
            } else {
                Some(format!("url({})", quoted(url)))
            }
        }
        LexicalUnit::RgbColor(channels) => {
            let channels = channels
                .iter()
                .map(|channel| match channel {
                    LexicalUnit::Integer(_) | LexicalUnit::Percentage(_) => {
                        lexical_value_to_string(channel)
                    }
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Some(format!("rgb({})", channels.join(",")))
        }
        LexicalUnit::Operator(_)
        | LexicalUnit::Function { .. }
        | LexicalUnit::SubExpression(_)
        | LexicalUnit::UnicodeRange { .. }
        | LexicalUnit::Unknown(_) => None,
    }
}

/// Serializes a whole property value. Commas are followed by a space, slashes are glued to
/// both neighbours (`12px/1.5`).
pub fn serialize_value(units: &[LexicalUnit]) -> Option<String> {
    let mut out = String::new();
    let mut glue_next = true;
    for unit in units {
        match unit {
            LexicalUnit::Operator(Operator::Comma) => {
                out.push(',');
                glue_next = false;
            }
            LexicalUnit::Operator(Operator::Slash) => {
                out.push('/');
                glue_next = true;
            }
            other => {
                if !glue_next {
                    out.push(' ');
                }
                out.push_str(&lexical_value_to_string(other)?);
                glue_next = false;
            }
        }
    }
    Some(out)
}

fn quoted(s: &str) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_string(s, &mut out);
    out
}

fn is_plain_url_char(c: char) -> bool {
    c.is_alphanumeric() || "-._~:/?#[]@!$&*+,;=%".contains(c)
}
