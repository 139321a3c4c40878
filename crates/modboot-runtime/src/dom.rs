//! Detached document model
//!
//! The bridge prepares the host's entrypoint as a detached [`Document`]
//! before it replaces the live one. Only what the takeover needs is
//! modelled: elements with attributes, text or raw markup content, lookups
//! by id and tag, insertion and serialization.

use std::fmt::Write as _;

/// Handle to a node of a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Content held directly by an element, before its children
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Text, escaped when serialized
    Text(String),
    /// Raw markup, serialized verbatim
    Markup(String),
}

/// An element to be inserted into a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    content: Option<Content>,
}

impl Element {
    /// Create an element with the given tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            content: None,
        }
    }

    /// Set an attribute
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
        self
    }

    /// Set the `id` attribute
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Set the `class` attribute
    pub fn class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    /// Set text content
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.content = Some(Content::Text(text.into()));
        self
    }

    /// Set raw markup content
    pub fn markup(mut self, markup: impl Into<String>) -> Self {
        self.content = Some(Content::Markup(markup.into()));
        self
    }

    /// Tag name
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Element content
    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }
}

#[derive(Debug, Clone)]
struct Node {
    element: Element,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An arena-backed document tree rooted at `<html>`
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    head: NodeId,
    body: NodeId,
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

impl Document {
    /// Create an empty `<html><head></head><body></body></html>` document
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![Node {
                element: Element::new("html"),
                parent: None,
                children: Vec::new(),
            }],
            head: NodeId(0),
            body: NodeId(0),
        };
        doc.head = doc.append_child(doc.root(), Element::new("head"));
        doc.body = doc.append_child(doc.root(), Element::new("body"));
        doc
    }

    /// The `<html>` element
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The `<head>` element
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// The `<body>` element
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Append an element as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, element: Element) -> NodeId {
        let id = self.push(element, Some(parent));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Insert an element as the next sibling of `anchor`.
    ///
    /// Returns `None` when `anchor` is the root and has no parent.
    pub fn insert_after(&mut self, anchor: NodeId, element: Element) -> Option<NodeId> {
        let parent = self.nodes.get(anchor.0)?.parent?;
        let id = self.push(element, Some(parent));
        let siblings = &mut self.nodes[parent.0].children;
        let position = siblings
            .iter()
            .position(|&child| child == anchor)
            .map_or(siblings.len(), |p| p + 1);
        siblings.insert(position, id);
        Some(id)
    }

    fn push(&mut self, element: Element, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            element,
            parent,
            children: Vec::new(),
        });
        id
    }

    /// Element stored at a node
    pub fn element(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0).map(|n| &n.element)
    }

    /// Parent of a node
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    /// Children of a node, in document order
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// First element in document order carrying the given id
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.find(self.root(), &|element| element.attribute("id") == Some(id))
    }

    /// First direct child of `parent` with the given tag
    pub fn child_by_tag(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&child| self.nodes[child.0].element.tag.eq_ignore_ascii_case(tag))
    }

    fn find(&self, from: NodeId, predicate: &dyn Fn(&Element) -> bool) -> Option<NodeId> {
        if predicate(&self.nodes[from.0].element) {
            return Some(from);
        }
        self.nodes[from.0]
            .children
            .iter()
            .find_map(|&child| self.find(child, predicate))
    }

    /// Replace a node's content with text
    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.element.content = Some(Content::Text(text.into()));
        }
    }

    /// Replace a node's content with raw markup
    pub fn set_markup(&mut self, node: NodeId, markup: impl Into<String>) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.element.content = Some(Content::Markup(markup.into()));
        }
    }

    /// Set an attribute on a node
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            let element = std::mem::replace(&mut n.element, Element::new(""));
            n.element = element.attr(name, value);
        }
    }

    /// Serialize the whole document, doctype included
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>");
        self.write_node(self.root(), &mut out);
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Node {
            element, children, ..
        } = &self.nodes[node.0];

        out.push('<');
        out.push_str(&element.tag);
        for (name, value) in &element.attributes {
            let _ = write!(out, " {}=\"{}\"", name, escape(value, true));
        }
        out.push('>');

        if VOID_TAGS.contains(&element.tag.to_ascii_lowercase().as_str()) {
            return;
        }

        match &element.content {
            Some(Content::Text(text)) => out.push_str(&escape(text, false)),
            Some(Content::Markup(markup)) => out.push_str(markup),
            None => {}
        }

        for &child in children {
            self.write_node(child, out);
        }

        let _ = write!(out, "</{}>", element.tag);
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if attribute => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
