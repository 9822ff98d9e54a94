//! Mutable node tree used by the validator.
//!
//! Markup is parsed with `html5ever` into an `markup5ever_rcdom` tree. Children are owned
//! through `Rc` handles; parent links are weak and only used for navigation. The helpers
//! below keep both directions consistent when nodes move.

use crate::error::{Error, Result};
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{
    Attribute, LocalName, Namespace, ParseOpts, QualName, local_name, ns, parse_fragment,
};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    /// Document, doctype and processing-instruction nodes.
    Other,
}

/// A parsed markup fragment.
///
/// Markup is parsed with the HTML fragment algorithm in a `body` context, so comments and
/// whitespace at the start of the input survive and head-only elements such as `style` stay
/// where they were written. The parsed nodes are moved under a synthetic root which is what
/// gets validated and serialized.
pub struct Fragment {
    root: Handle,
    root_attributes: Vec<String>,
}

impl Fragment {
    pub fn parse(markup: &str) -> Self {
        let context = QualName::new(None, ns!(html), local_name!("body"));
        let dom: RcDom =
            parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new(), false)
                .one(markup);
        let root = Node::new(NodeData::Document);
        let mut root_attributes = Vec::new();

        // The parser wraps the fragment in an `html` element. Its children are moved out
        // before `dom` is dropped, since dropping a node empties its whole subtree.
        let top_level: Vec<Handle> = dom.document.children.borrow().clone();
        for node in top_level {
            if let NodeData::Element { attrs, .. } = &node.data {
                root_attributes.extend(
                    attrs
                        .borrow()
                        .iter()
                        .map(|a| a.name.local.as_ref().to_ascii_lowercase()),
                );
            }
            let children: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
            for child in children {
                append(&root, child);
            }
        }
        Self {
            root,
            root_attributes,
        }
    }

    /// Attributes of stray `<html>` tags. The parser merges them into the fragment's
    /// wrapper element, so they never reach the output.
    pub fn root_attributes(&self) -> &[String] {
        &self.root_attributes
    }

    pub fn root(&self) -> &Handle {
        &self.root
    }

    pub fn serialize(&self) -> Result<String> {
        let mut bytes = Vec::new();
        let handle: SerializableHandle = self.root.clone().into();
        serialize(
            &mut bytes,
            &handle,
            SerializeOpts {
                traversal_scope: TraversalScope::ChildrenOnly(None),
                ..Default::default()
            },
        )
        .map_err(|err| Error::Serialize {
            message: err.to_string(),
        })?;
        String::from_utf8(bytes).map_err(|err| Error::Serialize {
            message: err.to_string(),
        })
    }
}

pub fn kind(node: &Handle) -> NodeKind {
    match node.data {
        NodeData::Element { .. } => NodeKind::Element,
        NodeData::Text { .. } => NodeKind::Text,
        NodeData::Comment { .. } => NodeKind::Comment,
        _ => NodeKind::Other,
    }
}

/// Lowercased local name of an element.
pub fn element_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref().to_ascii_lowercase()),
        _ => None,
    }
}

pub fn parent(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

pub fn is_attached(node: &Handle) -> bool {
    parent(node).is_some()
}

pub fn child_at(node: &Handle, index: usize) -> Option<Handle> {
    node.children.borrow().get(index).cloned()
}

fn append(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Removes `node` (and its subtree) from its parent.
pub fn detach(node: &Handle) {
    if let Some(parent) = parent(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

/// Replaces `node` in its parent with its children, keeping their order.
pub fn promote_children(node: &Handle) {
    let children: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
    replace_with(node, children);
}

/// Replaces `node` with its children framed by text nodes that spell out its start and end
/// tags, so the element shows up as literal text. An element without children becomes a
/// single self-closing tag.
pub fn encode_and_promote(node: &Handle) {
    let NodeData::Element { name, attrs, .. } = &node.data else {
        return;
    };
    let name = name.local.as_ref().to_ascii_lowercase();
    let children: Vec<Handle> = node.children.borrow_mut().drain(..).collect();

    let mut start = format!("<{name}");
    for attr in attrs.borrow().iter() {
        start.push(' ');
        start.push_str(attr.name.local.as_ref());
        start.push_str("=\"");
        start.push_str(&attr.value);
        start.push('"');
    }
    start.push_str(if children.is_empty() { "/>" } else { ">" });

    let has_children = !children.is_empty();
    let mut replacement = Vec::with_capacity(children.len() + 2);
    replacement.push(text_node(&start));
    replacement.extend(children);
    if has_children {
        replacement.push(text_node(&format!("</{name}>")));
    }
    replace_with(node, replacement);
}

fn replace_with(node: &Handle, replacement: Vec<Handle>) {
    let Some(parent) = parent(node) else {
        return;
    };
    for child in &replacement {
        child.parent.set(Some(Rc::downgrade(&parent)));
    }
    let mut siblings = parent.children.borrow_mut();
    if let Some(position) = siblings.iter().position(|c| Rc::ptr_eq(c, node)) {
        siblings.splice(position..=position, replacement);
    }
    drop(siblings);
    node.parent.set(None);
}

fn text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

pub fn comment_text(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Comment { contents } => Some(&**contents),
        _ => None,
    }
}

/// Swaps `node` for a comment holding `text`. The old node ends up detached.
pub fn replace_comment(node: &Handle, text: &str) {
    let comment = Node::new(NodeData::Comment {
        contents: StrTendril::from_slice(text),
    });
    replace_with(node, vec![comment]);
}

/// Drops every child that is neither text nor a comment.
pub fn retain_text_children(node: &Handle) {
    let mut children = node.children.borrow_mut();
    children.retain(|child| {
        let keep = matches!(kind(child), NodeKind::Text | NodeKind::Comment);
        if !keep {
            child.parent.set(None);
        }
        keep
    });
}

/// Concatenated text of the direct text children.
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    for child in node.children.borrow().iter() {
        if let NodeData::Text { contents } = &child.data {
            out.push_str(&contents.borrow());
        }
    }
    out
}

/// Replaces all children with a single text node.
pub fn set_text_content(node: &Handle, text: &str) {
    let old: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
    for child in old {
        child.parent.set(None);
    }
    append(node, text_node(text));
}

pub fn attribute_count(node: &Handle) -> usize {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs.borrow().len(),
        _ => 0,
    }
}

/// Name (lowercased) and value of the attribute at `index`.
pub fn attribute_at(node: &Handle, index: usize) -> Option<(String, String)> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .get(index)
            .map(|a| (a.name.local.as_ref().to_ascii_lowercase(), a.value.to_string())),
        _ => None,
    }
}

pub fn remove_attribute_at(node: &Handle, index: usize) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        if index < attrs.len() {
            attrs.remove(index);
        }
    }
}

pub fn set_attribute_value_at(node: &Handle, index: usize, value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        if let Some(attr) = attrs.borrow_mut().get_mut(index) {
            attr.value = StrTendril::from_slice(value);
        }
    }
}

/// Sets `name` to `value`, replacing an existing attribute of that name or appending one.
pub fn set_attribute(node: &Handle, name: &str, value: &str) {
    let NodeData::Element { attrs, .. } = &node.data else {
        return;
    };
    let mut attrs = attrs.borrow_mut();
    if let Some(attr) = attrs
        .iter_mut()
        .find(|a| a.name.local.as_ref().eq_ignore_ascii_case(name))
    {
        attr.value = StrTendril::from_slice(value);
    } else {
        attrs.push(Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
            value: StrTendril::from_slice(value),
        });
    }
}
