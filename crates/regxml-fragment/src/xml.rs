//! XML fragment tree.
//!
//! A small arena-backed element tree: nodes are indexed by
//! [`NodeId`] and keep parent links, which the fragment builder uses
//! to walk ancestor chains for cycle detection and to inject
//! namespace declarations on the root after traversal. Serialization
//! writes the markup directly with proper escaping.

use std::fmt::Write as _;

/// Namespace-qualified element name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub ns: String,
    pub local: String,
}

/// A serialized attribute: prefixed name plus value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub qname: String,
    pub value: String,
}

/// Index of a node within its fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Debug)]
struct ElementData {
    name: QName,
    prefix: String,
    attributes: Vec<Attribute>,
    text: Option<String>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
enum NodeKind {
    Element(ElementData),
    Comment(String),
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    kind: NodeKind,
}

/// An XML document fragment.
#[derive(Debug, Default)]
#[must_use]
pub struct Fragment {
    nodes: Vec<Node>,
    top: Vec<NodeId>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { parent, kind });
        match parent {
            Some(p) => self.element_mut(p).children.push(id),
            None => self.top.push(id),
        }
        id
    }

    fn element(&self, id: NodeId) -> &ElementData {
        match &self.nodes[id.0].kind {
            NodeKind::Element(e) => e,
            NodeKind::Comment(_) => panic!("node is a comment"),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> &mut ElementData {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(e) => e,
            NodeKind::Comment(_) => panic!("node is a comment"),
        }
    }

    /// Appends an element under `parent`, or at the top level.
    pub fn add_element(
        &mut self,
        parent: Option<NodeId>,
        ns: &str,
        local: &str,
        prefix: &str,
    ) -> NodeId {
        self.push(
            parent,
            NodeKind::Element(ElementData {
                name: QName {
                    ns: ns.to_string(),
                    local: local.to_string(),
                },
                prefix: prefix.to_string(),
                attributes: Vec::new(),
                text: None,
                children: Vec::new(),
            }),
        )
    }

    /// Appends a comment under `parent`.
    pub fn add_comment(&mut self, parent: Option<NodeId>, text: impl Into<String>) {
        self.push(parent, NodeKind::Comment(text.into()));
    }

    /// Sets the element's own text. Existing children are kept;
    /// serialization writes the text before them.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.element_mut(id).text = Some(text.into());
    }

    /// Sets an attribute, replacing any attribute of the same name.
    pub fn set_attribute(&mut self, id: NodeId, qname: impl Into<String>, value: impl Into<String>) {
        let qname = qname.into();
        let value = value.into();
        let attrs = &mut self.element_mut(id).attributes;
        match attrs.iter_mut().find(|a| a.qname == qname) {
            Some(attr) => attr.value = value,
            None => attrs.push(Attribute { qname, value }),
        }
    }

    /// The first top-level element.
    pub fn root(&self) -> Option<NodeId> {
        self.top
            .iter()
            .copied()
            .find(|id| matches!(self.nodes[id.0].kind, NodeKind::Element(_)))
    }

    /// The node's parent element.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// The element's qualified name.
    pub fn name(&self, id: NodeId) -> &QName {
        &self.element(id).name
    }

    /// The element's serialization prefix.
    pub fn prefix(&self, id: NodeId) -> &str {
        &self.element(id).prefix
    }

    /// The element's attributes.
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        &self.element(id).attributes
    }

    /// Attribute value by local name, with any prefix.
    pub fn attribute_local(&self, id: NodeId, local: &str) -> Option<&str> {
        self.element(id)
            .attributes
            .iter()
            .find(|a| a.qname == local || a.qname.ends_with(&format!(":{local}")))
            .map(|a| a.value.as_str())
    }

    /// The element's own text, if set.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.element(id).text.as_deref()
    }

    /// The element's child elements, in document order.
    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.element(id)
            .children
            .iter()
            .copied()
            .filter(|c| matches!(self.nodes[c.0].kind, NodeKind::Element(_)))
            .collect()
    }

    /// First child element with the given local name.
    pub fn find_child(&self, id: NodeId, local: &str) -> Option<NodeId> {
        self.child_elements(id)
            .into_iter()
            .find(|&c| self.name(c).local == local)
    }

    /// Concatenated text of the element and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let elem = self.element(id);
        if let Some(text) = &elem.text {
            out.push_str(text);
        }
        for child in &elem.children {
            if matches!(self.nodes[child.0].kind, NodeKind::Element(_)) {
                self.collect_text(*child, out);
            }
        }
    }

    /// Serializes the fragment with two-space indentation.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for id in &self.top {
            self.write_node(*id, 0, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match &self.nodes[id.0].kind {
            NodeKind::Comment(text) => {
                let _ = writeln!(out, "{indent}<!-- {} -->", sanitize_comment(text));
            }
            NodeKind::Element(elem) => {
                let tag = if elem.prefix.is_empty() {
                    elem.name.local.clone()
                } else {
                    format!("{}:{}", elem.prefix, elem.name.local)
                };

                let _ = write!(out, "{indent}<{tag}");
                for attr in &elem.attributes {
                    let _ = write!(out, " {}=\"{}\"", attr.qname, xml_escape(&attr.value));
                }

                match (&elem.text, elem.children.is_empty()) {
                    (None, true) => {
                        let _ = writeln!(out, "/>");
                    }
                    (Some(text), true) => {
                        let _ = writeln!(out, ">{}</{tag}>", xml_escape(text));
                    }
                    (text, false) => {
                        let _ = writeln!(out, ">");
                        if let Some(text) = text {
                            let _ = writeln!(out, "{indent}  {}", xml_escape(text));
                        }
                        for child in &elem.children {
                            self.write_node(*child, depth + 1, out);
                        }
                        let _ = writeln!(out, "{indent}</{tag}>");
                    }
                }
            }
        }
    }
}

/// Escapes text and attribute content.
fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() && c != '\t' && c != '\n' && c != '\r' => {
                let _ = write!(out, "&#x{:X};", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Comments may not contain a double hyphen.
fn sanitize_comment(s: &str) -> String {
    s.replace("--", "- -")
}
