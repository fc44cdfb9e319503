//! Editor document tree and a lazy positional walker over it.
//!
//! Positions follow the rich-text editor convention: every character of a
//! text node occupies one position, every container consumes one position
//! for its opening boundary and one for its closing boundary, and atomic
//! leaves (images, rules, citation chips) occupy a single position. The
//! root `doc` node's own boundary is not counted, so the first child starts
//! at position 0.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node type used for structured citation chips produced by normalization.
pub const CITATION_NODE: &str = "citation";

/// Inline mark attached to a text run (bold, link, citation, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
}

impl Mark {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attrs: None,
        }
    }
}

/// A node of the editor document tree.
///
/// A node carries either `text` (text leaf) or `content` (container) or
/// neither (atomic leaf).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<DocumentNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

/// Structural shape of a node, derived from which fields it carries.
#[derive(Debug, Clone, Copy)]
pub enum NodeShape<'a> {
    Text(&'a str),
    Container(&'a [DocumentNode]),
    Atom,
}

impl DocumentNode {
    pub fn doc(content: Vec<DocumentNode>) -> Self {
        Self::container("doc", content)
    }

    pub fn container(kind: impl Into<String>, content: Vec<DocumentNode>) -> Self {
        Self {
            kind: kind.into(),
            content: Some(content),
            ..Self::default()
        }
    }

    pub fn paragraph(content: Vec<DocumentNode>) -> Self {
        Self::container("paragraph", content)
    }

    pub fn heading(level: u8, content: Vec<DocumentNode>) -> Self {
        let mut attrs = Map::new();
        attrs.insert("level".into(), Value::from(level));
        Self {
            attrs: Some(attrs),
            ..Self::container("heading", content)
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn atom(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Structured citation chip that replaces a matched inline citation.
    pub fn citation(citation_id: impl Into<String>, fallback: impl Into<String>) -> Self {
        let mut attrs = Map::new();
        attrs.insert("citationId".into(), Value::String(citation_id.into()));
        attrs.insert("fallback".into(), Value::String(fallback.into()));
        Self {
            kind: CITATION_NODE.into(),
            attrs: Some(attrs),
            ..Self::default()
        }
    }

    pub fn with_mark(mut self, mark: Mark) -> Self {
        self.marks.push(mark);
        self
    }

    pub fn shape(&self) -> NodeShape<'_> {
        if let Some(text) = &self.text {
            NodeShape::Text(text)
        } else if let Some(content) = &self.content {
            NodeShape::Container(content)
        } else {
            NodeShape::Atom
        }
    }

    pub fn children(&self) -> &[DocumentNode] {
        self.content.as_deref().unwrap_or(&[])
    }

    pub fn is_heading(&self) -> bool {
        self.kind == "heading"
    }

    pub fn has_mark(&self, kind: &str) -> bool {
        self.marks.iter().any(|m| m.kind == kind)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.as_ref()?.get(key)?.as_str()
    }

    /// Concatenated text of every text leaf below this node.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(node: &DocumentNode, out: &mut String) {
    match node.shape() {
        NodeShape::Text(text) => out.push_str(text),
        NodeShape::Container(children) => {
            for child in children {
                collect_text(child, out);
            }
        }
        NodeShape::Atom => {}
    }
}

/// Positions a piece of text occupies: UTF-16 code units, as the editor
/// counts them.
pub fn text_width(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Number of positions a subtree occupies.
pub fn node_size(node: &DocumentNode) -> usize {
    match node.shape() {
        NodeShape::Text(text) => text_width(text),
        NodeShape::Container(children) => 2 + children.iter().map(node_size).sum::<usize>(),
        NodeShape::Atom => 1,
    }
}

/// One step of a positional walk.
///
/// `pos` is the position *before* the token: for `Enter` the opening
/// boundary sits at `pos` and the first child starts at `pos + 1`; for
/// `Text` the first character sits at `pos`.
#[derive(Debug, Clone, Copy)]
pub enum WalkEvent<'a> {
    Enter {
        node: &'a DocumentNode,
        pos: usize,
        depth: usize,
    },
    Exit {
        node: &'a DocumentNode,
        pos: usize,
    },
    Text {
        node: &'a DocumentNode,
        text: &'a str,
        pos: usize,
    },
    Atom {
        node: &'a DocumentNode,
        pos: usize,
    },
}

/// Depth-first iterator yielding positioned events; see [`walk`].
pub struct Walk<'a> {
    stack: Vec<(&'a DocumentNode, std::slice::Iter<'a, DocumentNode>)>,
    pos: usize,
}

/// Lazily walk the children of `root`, tracking document positions.
pub fn walk(root: &DocumentNode) -> Walk<'_> {
    Walk {
        stack: vec![(root, root.children().iter())],
        pos: 0,
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = WalkEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let depth = self.stack.len();
        let (_, children) = self.stack.last_mut()?;
        match children.next() {
            Some(child) => {
                let pos = self.pos;
                match child.shape() {
                    NodeShape::Text(text) => {
                        self.pos += text_width(text);
                        Some(WalkEvent::Text {
                            node: child,
                            text,
                            pos,
                        })
                    }
                    NodeShape::Container(grandchildren) => {
                        self.pos += 1;
                        self.stack.push((child, grandchildren.iter()));
                        Some(WalkEvent::Enter {
                            node: child,
                            pos,
                            depth,
                        })
                    }
                    NodeShape::Atom => {
                        self.pos += 1;
                        Some(WalkEvent::Atom { node: child, pos })
                    }
                }
            }
            None => {
                let (node, _) = self.stack.pop()?;
                if self.stack.is_empty() {
                    // root boundary is not counted
                    return None;
                }
                let pos = self.pos;
                self.pos += 1;
                Some(WalkEvent::Exit { node, pos })
            }
        }
    }
}

/// Character at document position `pos`, found by walking the tree.
///
/// Returns `None` when `pos` addresses a boundary or atom rather than text.
pub fn char_at_position(root: &DocumentNode, pos: usize) -> Option<char> {
    walk(root).find_map(|event| match event {
        WalkEvent::Text { text, pos: start, .. } if pos >= start => {
            let mut unit = start;
            text.chars().find_map(|ch| {
                let at = unit;
                unit += ch.len_utf16();
                (at == pos).then_some(ch)
            })
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DocumentNode {
        DocumentNode::doc(vec![
            DocumentNode::heading(1, vec![DocumentNode::text("Intro")]),
            DocumentNode::paragraph(vec![
                DocumentNode::text("ab"),
                DocumentNode::atom("hardBreak"),
                DocumentNode::text("cd"),
            ]),
        ])
    }

    #[test]
    fn deserializes_editor_json() {
        let json = r#"{"type":"doc","content":[{"type":"paragraph","content":[
            {"type":"text","text":"Hi","marks":[{"type":"bold"}]},
            {"type":"image","attrs":{"src":"x.png"}}]}]}"#;
        let doc: DocumentNode = serde_json::from_str(json).unwrap();
        let para = &doc.children()[0];
        assert_eq!(para.children()[0].text.as_deref(), Some("Hi"));
        assert!(para.children()[0].has_mark("bold"));
        assert!(matches!(para.children()[1].shape(), NodeShape::Atom));
    }

    #[test]
    fn walk_counts_boundaries_and_atoms() {
        let doc = sample();
        let events: Vec<_> = walk(&doc)
            .map(|e| match e {
                WalkEvent::Enter { node, pos, .. } => format!("enter {} {pos}", node.kind),
                WalkEvent::Exit { node, pos } => format!("exit {} {pos}", node.kind),
                WalkEvent::Text { text, pos, .. } => format!("text {text} {pos}"),
                WalkEvent::Atom { node, pos } => format!("atom {} {pos}", node.kind),
            })
            .collect();
        assert_eq!(
            events,
            vec![
                "enter heading 0",
                "text Intro 1",
                "exit heading 6",
                "enter paragraph 7",
                "text ab 8",
                "atom hardBreak 10",
                "text cd 11",
                "exit paragraph 13",
            ]
        );
    }

    #[test]
    fn node_size_matches_walk() {
        let doc = sample();
        let total: usize = doc.children().iter().map(node_size).sum();
        assert_eq!(total, 14);
    }

    #[test]
    fn char_lookup_skips_boundaries() {
        let doc = sample();
        assert_eq!(char_at_position(&doc, 1), Some('I'));
        assert_eq!(char_at_position(&doc, 11), Some('c'));
        assert_eq!(char_at_position(&doc, 10), None);
        assert_eq!(char_at_position(&doc, 0), None);
    }

    #[test]
    fn text_content_flattens_nested_nodes() {
        let doc = sample();
        assert_eq!(doc.text_content(), "Introabcd");
    }
}
