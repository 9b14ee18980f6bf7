//! Parsing XML text back into [`DocumentNode`] trees
//!
//! Used for scenario files, previously generated reports (merge) and the
//! XML output of the version-control client.

use std::fs;
use std::path::Path;

use super::DocumentNode;

/// Errors from document parsing
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("XML parse error: {0}")]
    Parse(#[from] roxmltree::Error),
}

/// Parse XML text into a document tree rooted at the document element.
///
/// Text of an element is the concatenation of its text and CDATA children;
/// whitespace-only text around child elements is dropped.
pub fn parse_document(text: &str) -> Result<DocumentNode, DocumentError> {
    let doc = roxmltree::Document::parse(text)?;
    Ok(convert(doc.root_element()))
}

/// Read and parse an XML file
pub fn parse_file(path: &Path) -> Result<DocumentNode, DocumentError> {
    let text = fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_document(&text)
}

fn convert(node: roxmltree::Node<'_, '_>) -> DocumentNode {
    let mut out = DocumentNode::new(node.tag_name().name());
    for attr in node.attributes() {
        out.attributes
            .insert(attr.name().to_string(), attr.value().to_string());
    }

    let mut body = String::new();
    for child in node.children() {
        if child.is_element() {
            out.children.push(convert(child));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                body.push_str(text);
            }
        }
    }

    out.body = if out.children.is_empty() {
        body
    } else {
        body.trim().to_string()
    };
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_structure() {
        let original = DocumentNode::new("Site")
            .with_attr("Name", "a&b <host>")
            .with_attr("BuildStamp", "20240101-0000-Nightly")
            .with_child(
                DocumentNode::new("Build")
                    .with_child(DocumentNode::leaf("BuildCommand", "make && make install"))
                    .with_child(DocumentNode::leaf("Text", "r\u{e9}sum\u{e9} > 1 \u{4e2d}"))
                    .with_child(DocumentNode::leaf("Empty", "")),
            );

        let parsed = parse_document(&original.to_xml()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_cdata_is_body() {
        let parsed = parse_document("<FileWrite file=\"a\"><![CDATA[x < y]]></FileWrite>").unwrap();
        assert_eq!(parsed.body, "x < y");
        assert_eq!(parsed.attr("file"), Some("a"));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            parse_document("<Site><Build></Site>"),
            Err(DocumentError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_missing_file() {
        let err = parse_file(Path::new("/nonexistent/ccdash/report.xml")).unwrap_err();
        assert!(matches!(err, DocumentError::Io { .. }));
    }
}
