//! XML policy loader.
//!
//! The document root may have any name; the loader looks for these sections below it:
//! `common-regexps`, `directives`, `common-attributes`, `global-tag-attributes`, `tag-rules`
//! and `css-rules`. Sections may appear in any order.

use super::{AllowedPattern, AttributeRule, OnInvalid, Policy, PropertyRule, TagAction, TagRule};
use crate::error::PolicyError;
use indexmap::IndexMap;
use roxmltree::{Document, Node};
use std::path::Path;

impl Policy {
    pub fn from_xml_str(xml: &str) -> Result<Self, PolicyError> {
        let doc = Document::parse(xml)?;
        read_policy(doc.root_element())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_xml_str(&xml)
    }
}

fn read_policy(root: Node<'_, '_>) -> Result<Policy, PolicyError> {
    let mut builder = Policy::builder();

    let mut regexes: IndexMap<String, AllowedPattern> = IndexMap::new();
    for node in sections(root, "common-regexps", "regexp") {
        let name = required(node, "name")?;
        let pattern = AllowedPattern::new(required(node, "value")?)?;
        regexes.insert(name.to_string(), pattern.clone());
        builder = builder.regex(name, pattern);
    }

    for node in sections(root, "directives", "directive") {
        builder = builder.directive(required(node, "name")?, required(node, "value")?);
    }

    let mut common: IndexMap<String, AttributeRule> = IndexMap::new();
    for node in sections(root, "common-attributes", "attribute") {
        let rule = read_attribute(node, &regexes)?;
        common.insert(rule.name().to_string(), rule.clone());
        builder = builder.common_attribute(rule);
    }

    for node in sections(root, "global-tag-attributes", "attribute") {
        let rule = resolve_reference(node, &common, "global-tag-attributes")?;
        builder = builder.global_attribute(rule);
    }

    for node in sections(root, "tag-rules", "tag") {
        let name = required(node, "name")?;
        let action = match node.attribute("action") {
            None => TagAction::Remove,
            Some(raw) => raw.parse::<TagAction>().unwrap_or_else(|()| {
                tracing::warn!(tag = name, action = raw, "unknown tag action, treating as remove");
                TagAction::Remove
            }),
        };
        let mut tag = TagRule::new(name, action);
        for attribute in elements(node, "attribute") {
            let rule = if attribute.children().any(|c| c.is_element()) {
                read_attribute(attribute, &regexes)?
            } else {
                resolve_reference(attribute, &common, &format!("tag {name}"))?
            };
            tag = tag.with_attribute(rule);
        }
        builder = builder.tag(tag);
    }

    for node in sections(root, "css-rules", "property") {
        builder = builder.property(read_property(node, &regexes)?);
    }

    Ok(builder.build())
}

fn read_attribute(
    node: Node<'_, '_>,
    regexes: &IndexMap<String, AllowedPattern>,
) -> Result<AttributeRule, PolicyError> {
    let name = required(node, "name")?;
    let mut rule = AttributeRule::new(name).with_on_invalid(on_invalid(node));
    if let Some(description) = node.attribute("description") {
        rule = rule.with_description(description);
    }
    for pattern in read_patterns(node, name, regexes)? {
        rule = rule.with_pattern(pattern);
    }
    for literal in read_literals(node) {
        rule = rule.with_literal(literal);
    }
    Ok(rule)
}

fn read_property(
    node: Node<'_, '_>,
    regexes: &IndexMap<String, AllowedPattern>,
) -> Result<PropertyRule, PolicyError> {
    let name = required(node, "name")?;
    let mut rule = PropertyRule::new(name).with_on_invalid(on_invalid(node));
    if let Some(description) = node.attribute("description") {
        rule = rule.with_description(description);
    }
    for pattern in read_patterns(node, name, regexes)? {
        rule = rule.with_pattern(pattern);
    }
    for literal in read_literals(node) {
        rule = rule.with_literal(literal);
    }
    for list in elements(node, "shorthand-list") {
        for shorthand in elements(list, "shorthand") {
            rule = rule.with_shorthand(required(shorthand, "name")?);
        }
    }
    Ok(rule)
}

/// An attribute without an inline definition refers to a common attribute; the tag may
/// override the remedy and the description on its own copy.
fn resolve_reference(
    node: Node<'_, '_>,
    common: &IndexMap<String, AttributeRule>,
    context: &str,
) -> Result<AttributeRule, PolicyError> {
    let name = required(node, "name")?;
    let template = common
        .get(&name.to_ascii_lowercase())
        .ok_or_else(|| PolicyError::UnknownAttribute {
            name: name.to_string(),
            context: context.to_string(),
        })?;
    let on_invalid = node.attribute("onInvalid").map(|_| on_invalid(node));
    Ok(template.with_overrides(on_invalid, node.attribute("description")))
}

fn read_patterns(
    node: Node<'_, '_>,
    owner: &str,
    regexes: &IndexMap<String, AllowedPattern>,
) -> Result<Vec<AllowedPattern>, PolicyError> {
    let mut out = Vec::new();
    for list in elements(node, "regexp-list") {
        for regexp in elements(list, "regexp") {
            if let Some(name) = regexp.attribute("name") {
                let pattern = regexes
                    .get(name)
                    .ok_or_else(|| PolicyError::UnknownRegex {
                        name: name.to_string(),
                        attribute: owner.to_string(),
                    })?;
                out.push(pattern.clone());
            } else if let Some(value) = regexp.attribute("value") {
                out.push(AllowedPattern::new(value)?);
            } else {
                return Err(PolicyError::MissingAttribute {
                    element: "regexp".to_string(),
                    attribute: "value",
                });
            }
        }
    }
    Ok(out)
}

fn read_literals(node: Node<'_, '_>) -> Vec<String> {
    elements(node, "literal-list")
        .flat_map(|list| elements(list, "literal"))
        .filter_map(|literal| {
            literal
                .attribute("value")
                .or_else(|| literal.text())
                .map(str::to_string)
        })
        .collect()
}

fn on_invalid(node: Node<'_, '_>) -> OnInvalid {
    match node.attribute("onInvalid") {
        None => OnInvalid::default(),
        Some(raw) => raw.parse().unwrap_or_else(|()| {
            tracing::warn!(
                name = node.attribute("name").unwrap_or_default(),
                on_invalid = raw,
                "unknown onInvalid value, using removeAttribute"
            );
            OnInvalid::default()
        }),
    }
}

fn required<'a>(node: Node<'a, '_>, attribute: &'static str) -> Result<&'a str, PolicyError> {
    node.attribute(attribute)
        .ok_or_else(|| PolicyError::MissingAttribute {
            element: node.tag_name().name().to_string(),
            attribute,
        })
}

fn elements<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn sections<'a, 'input>(
    root: Node<'a, 'input>,
    section: &'static str,
    entry: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    elements(root, section).flat_map(move |s| elements(s, entry))
}
