//! Minimal tagged-node document tree and its XML rendering
//!
//! Reports are assembled as [`DocumentNode`] trees and serialized in the
//! dialect the dashboard expects: two-space indentation, one element per
//! line, text escaped with a fixed set of entities and every character at
//! or above 127 written as a numeric character reference.
//!
//! The tree performs no schema validation; builders decide whether a node
//! carries a body, children, or both.

mod parse;

pub use parse::{parse_document, parse_file, DocumentError};

use std::collections::BTreeMap;
use std::fmt;

/// XML declaration emitted before every serialized document
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// A tagged node with attributes, a text body and ordered children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentNode {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub body: String,
    pub children: Vec<DocumentNode>,
}

impl DocumentNode {
    /// Create an empty node
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Create a leaf node with a text body
    pub fn leaf(tag: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder-style body setter
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: DocumentNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child and return a mutable reference to it
    pub fn push(&mut self, child: DocumentNode) -> &mut DocumentNode {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Append a leaf child
    pub fn push_leaf(&mut self, tag: impl Into<String>, body: impl Into<String>) {
        self.children.push(DocumentNode::leaf(tag, body));
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// First direct child with the given tag
    pub fn child(&self, tag: &str) -> Option<&DocumentNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// All direct children with the given tag
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a DocumentNode> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// Depth-first search for the first descendant with the given tag
    pub fn find(&self, tag: &str) -> Option<&DocumentNode> {
        for child in &self.children {
            if child.tag == tag {
                return Some(child);
            }
            if let Some(found) = child.find(tag) {
                return Some(found);
            }
        }
        None
    }

    /// Body text of the first direct child with the given tag
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.child(tag).map(|c| c.body.as_str())
    }

    /// Serialize with the XML declaration
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(256);
        out.push_str(XML_DECLARATION);
        out.push('\n');
        self.encode_into(&mut out, "");
        out
    }

    /// Serialize without the XML declaration
    pub fn to_fragment(&self) -> String {
        let mut out = String::new();
        self.encode_into(&mut out, "");
        out
    }

    fn encode_into(&self, out: &mut String, indent: &str) {
        out.push_str(indent);
        out.push('<');
        out.push_str(&self.tag);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            escape_into(out, value, true);
            out.push('"');
        }
        out.push('>');

        if !self.children.is_empty() {
            out.push('\n');
            let child_indent = format!("{}  ", indent);
            for child in &self.children {
                child.encode_into(out, &child_indent);
            }
        }
        escape_into(out, &self.body, false);
        if !self.children.is_empty() {
            out.push_str(indent);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push_str(">\n");
    }
}

impl fmt::Display for DocumentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

/// Escape text for the dashboard XML dialect.
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text, false);
    out
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            // Parsers normalize raw CR, and raw whitespace in attribute values
            '\r' => out.push_str("&#13;"),
            '\n' if attribute => out.push_str("&#10;"),
            '\t' if attribute => out.push_str("&#9;"),
            '\t' | '\n' => out.push(c),
            // Not representable in XML 1.0, even as a reference
            c if (c as u32) < 0x20 => out.push_str("&#65533;"),
            c if (c as u32) >= 127 => {
                out.push_str("&#");
                out.push_str(&(c as u32).to_string());
                out.push(';');
            }
            c => out.push(c),
        }
    }
}
