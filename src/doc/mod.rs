//! The document model.
//!
//! Free-text fields (node/task descriptions, chat messages) are stored as
//! one serialized tree per field. The tree mixes formatted text with live
//! references to other domain entities (people, organisation units, corpus
//! nodes, tasks, tags). Parsing never fails: values written before the
//! structured format existed are plain strings and are promoted to a
//! one-paragraph document.

mod raw;

use raw::{from_raw, to_raw, RawNode};

/// Text-level formatting attribute on a text leaf. The stored order is
/// irrelevant; rendering stacks marks in a fixed order (see `render`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mark {
    Bold,
    Italic,
    Code,
    Strike,
}

/// Which domain entity a reference node points at.
///
/// `CorpusNode` is serialized as `node` (the corpus item type predates the
/// task/tag split).
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
pub enum RefKind {
    #[strum(serialize = "person")]
    Person,
    #[strum(serialize = "organisatie")]
    Organisatie,
    #[strum(serialize = "node")]
    CorpusNode,
    #[strum(serialize = "task")]
    Task,
    #[strum(serialize = "tag")]
    Tag,
}

impl RefKind {
    pub(crate) fn from_wire(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    pub(crate) fn as_wire(self) -> &'static str {
        self.into()
    }

    /// Legacy wire family: `@` insertions were stored as `mention`, `#`
    /// insertions as `hashtag`, before `referenceKind` existed.
    pub(crate) fn family_kind(self) -> &'static str {
        match self {
            RefKind::Person | RefKind::Organisatie => "mention",
            RefKind::CorpusNode | RefKind::Task | RefKind::Tag => "hashtag",
        }
    }

    /// Display prefix on chips and suggestion rows.
    pub fn sigil(self) -> &'static str {
        match self {
            RefKind::Person | RefKind::Organisatie => "@",
            RefKind::CorpusNode | RefKind::Task | RefKind::Tag => "#",
        }
    }
}

/// Only levels 2 and 3 are allowed; everything else clamps to 2 on parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadingLevel {
    Two,
    Three,
}

impl HeadingLevel {
    pub(crate) fn from_wire(level: i64) -> Self {
        if level == 3 {
            HeadingLevel::Three
        } else {
            HeadingLevel::Two
        }
    }

    pub fn as_level(self) -> i64 {
        match self {
            HeadingLevel::Two => 2,
            HeadingLevel::Three => 3,
        }
    }
}

/// One node of the document tree.
///
/// `Unknown` carries node kinds newer than this client so that an older
/// renderer degrades gracefully instead of throwing the document away.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Document { content: Vec<Node> },
    Paragraph { content: Vec<Node> },
    Heading { level: HeadingLevel, content: Vec<Node> },
    Blockquote { content: Vec<Node> },
    BulletList { content: Vec<Node> },
    OrderedList { content: Vec<Node> },
    ListItem { content: Vec<Node> },
    /// Text leaves only.
    CodeBlock { content: Vec<Node> },
    Text { text: String, marks: Vec<Mark> },
    HardBreak,
    HorizontalRule,
    /// Always a leaf; `label` is the display label cached at insert time.
    EntityRef { id: String, label: String, kind: RefKind },
    Unknown { kind: String, content: Vec<Node> },
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text {
            text: text.into(),
            marks: vec![],
        }
    }

    pub fn marked_text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Node::Text {
            text: text.into(),
            marks,
        }
    }

    pub fn paragraph(content: Vec<Node>) -> Self {
        Node::Paragraph { content }
    }

    /// Child nodes, if this kind has any.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document { content }
            | Node::Paragraph { content }
            | Node::Heading { content, .. }
            | Node::Blockquote { content }
            | Node::BulletList { content }
            | Node::OrderedList { content }
            | Node::ListItem { content }
            | Node::CodeBlock { content }
            | Node::Unknown { content, .. } => content,
            _ => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Document { content }
            | Node::Paragraph { content }
            | Node::Heading { content, .. }
            | Node::Blockquote { content }
            | Node::BulletList { content }
            | Node::OrderedList { content }
            | Node::ListItem { content }
            | Node::CodeBlock { content }
            | Node::Unknown { content, .. } => Some(content),
            _ => None,
        }
    }
}

/// A document with no content still contains one empty paragraph.
pub fn empty_document() -> Node {
    Node::Document {
        content: vec![Node::paragraph(vec![])],
    }
}

/// Parse a persisted field value into a document tree.
///
/// Structured parse succeeds only when the decoded root kind is
/// `document`. On any decode failure, or a non-document root, the raw
/// string is kept verbatim as a one-paragraph plain-text document. Most
/// pre-existing field values take this path.
pub fn parse(raw: &str) -> Node {
    if let Ok(decoded) = serde_json::from_str::<RawNode>(raw) {
        if decoded.kind == "document" {
            let mut doc = from_raw(decoded);
            // A document is never childless; repair stored `content: []`.
            if let Node::Document { content } = &mut doc {
                if content.is_empty() {
                    content.push(Node::paragraph(vec![]));
                }
            }
            return doc;
        }
    }

    if raw.is_empty() {
        return empty_document();
    }

    Node::Document {
        content: vec![Node::paragraph(vec![Node::text(raw)])],
    }
}

/// Deterministic encoding of the tree; the inverse of `parse` for
/// anything `serialize` itself produced. Plain-text inputs come back
/// from `parse` as structured documents, not as the original string.
pub fn serialize(node: &Node) -> String {
    // RawNode has no fallible serialization states (string keys only).
    serde_json::to_string(&to_raw(node)).unwrap_or_default()
}

/// True iff the document contains no text leaf with non-whitespace
/// content and no reference node.
pub fn is_empty(node: &Node) -> bool {
    match node {
        Node::Text { text, .. } => text.trim().is_empty(),
        Node::EntityRef { .. } => false,
        _ => node.children().iter().all(is_empty),
    }
}

/// The two-node fragment inserted when a suggestion candidate is
/// committed: the reference node plus its trailing synthetic space, so
/// the display label and whatever gets typed next don't merge.
pub fn reference_fragment(id: &str, label: &str, kind: RefKind) -> [Node; 2] {
    [
        Node::EntityRef {
            id: id.to_string(),
            label: label.to_string(),
            kind,
        },
        Node::text(" "),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> Node {
        Node::Document {
            content: vec![
                Node::Heading {
                    level: HeadingLevel::Three,
                    content: vec![Node::text("Dossier")],
                },
                Node::paragraph(vec![
                    Node::marked_text("status: ", vec![Mark::Bold]),
                    Node::EntityRef {
                        id: "task-9".to_string(),
                        label: "Begroting afronden".to_string(),
                        kind: RefKind::Task,
                    },
                    Node::text(" "),
                    Node::HardBreak,
                    Node::marked_text("done", vec![Mark::Strike, Mark::Italic]),
                ]),
                Node::BulletList {
                    content: vec![Node::ListItem {
                        content: vec![Node::paragraph(vec![Node::text("punt 1")])],
                    }],
                },
            ],
        }
    }

    #[test]
    fn test_serialize_parse_round_trip() {
        let doc = sample_doc();
        let s = serialize(&doc);
        assert_eq!(parse(&s), doc);

        // Idempotent on its own output.
        assert_eq!(serialize(&parse(&s)), s);
    }

    #[test]
    fn test_plain_text_promotion() {
        let doc = parse("hello");
        assert_eq!(
            doc,
            Node::Document {
                content: vec![Node::paragraph(vec![Node::text("hello")])],
            }
        );
        assert!(!is_empty(&doc));
    }

    #[test]
    fn test_non_document_json_falls_back_to_plain_text() {
        // Valid JSON, wrong root kind: kept verbatim.
        let raw = r#"{"kind":"paragraph","content":[]}"#;
        let doc = parse(raw);
        assert_eq!(
            doc,
            Node::Document {
                content: vec![Node::paragraph(vec![Node::text(raw)])],
            }
        );
    }

    #[test]
    fn test_childless_document_gains_empty_paragraph() {
        let doc = parse(r#"{"kind":"document","content":[]}"#);
        assert_eq!(doc, empty_document());

        let doc = parse(r#"{"kind":"document"}"#);
        assert_eq!(doc, empty_document());
    }

    #[test]
    fn test_empty_document_detection() {
        assert!(is_empty(&parse(&serialize(&empty_document()))));
        assert!(is_empty(&parse("")));
        assert!(is_empty(&parse("   ")));

        let with_ref = Node::Document {
            content: vec![Node::paragraph(vec![Node::EntityRef {
                id: "p1".to_string(),
                label: "Jane Doe".to_string(),
                kind: RefKind::Person,
            }])],
        };
        assert!(!is_empty(&with_ref));
    }

    #[test]
    fn test_reference_kind_backfill_for_legacy_documents() {
        // Authored before `referenceKind` existed: only the family kind.
        let raw = r#"{"kind":"document","content":[{"kind":"paragraph","content":[
            {"kind":"mention","attrs":{"referenceId":"p1","displayLabel":"Jane Doe"}},
            {"kind":"hashtag","attrs":{"referenceId":"n7","displayLabel":"Budget-Dossier"}}
        ]}]}"#;

        let doc = parse(raw);
        let para = &doc.children()[0];
        assert_eq!(
            para.children()[0],
            Node::EntityRef {
                id: "p1".to_string(),
                label: "Jane Doe".to_string(),
                kind: RefKind::Person,
            }
        );
        assert_eq!(
            para.children()[1],
            Node::EntityRef {
                id: "n7".to_string(),
                label: "Budget-Dossier".to_string(),
                kind: RefKind::CorpusNode,
            }
        );
    }

    #[test]
    fn test_explicit_reference_kind_wins_over_family_default() {
        let raw = r#"{"kind":"document","content":[{"kind":"paragraph","content":[
            {"kind":"mention","attrs":{"referenceId":"o2","displayLabel":"Min. BZK","referenceKind":"organisatie"}}
        ]}]}"#;

        let doc = parse(raw);
        assert_eq!(
            doc.children()[0].children()[0],
            Node::EntityRef {
                id: "o2".to_string(),
                label: "Min. BZK".to_string(),
                kind: RefKind::Organisatie,
            }
        );
    }

    #[test]
    fn test_heading_level_clamps_to_two() {
        let raw = r#"{"kind":"document","content":[{"kind":"heading","attrs":{"level":5},"content":[{"kind":"text","text":"t"}]}]}"#;
        let doc = parse(raw);
        assert_eq!(
            doc.children()[0],
            Node::Heading {
                level: HeadingLevel::Two,
                content: vec![Node::text("t")],
            }
        );
    }

    #[test]
    fn test_unknown_kind_keeps_children() {
        let raw = r#"{"kind":"document","content":[{"kind":"table","content":[{"kind":"paragraph","content":[{"kind":"text","text":"cell"}]}]}]}"#;
        let doc = parse(raw);
        assert_eq!(
            doc.children()[0],
            Node::Unknown {
                kind: "table".to_string(),
                content: vec![Node::paragraph(vec![Node::text("cell")])],
            }
        );

        // And survives a round trip.
        assert_eq!(parse(&serialize(&doc)), doc);
    }

    #[test]
    fn test_duplicate_marks_collapse_on_parse() {
        let raw = r#"{"kind":"document","content":[{"kind":"paragraph","content":[
            {"kind":"text","text":"x","marks":[{"type":"bold"},{"type":"bold"},{"type":"glow"},{"type":"strike"}]}
        ]}]}"#;
        let doc = parse(raw);
        assert_eq!(
            doc.children()[0].children()[0],
            Node::marked_text("x", vec![Mark::Bold, Mark::Strike])
        );
    }

    #[test]
    fn test_code_block_drops_non_text_children() {
        let raw = r#"{"kind":"document","content":[{"kind":"codeBlock","content":[
            {"kind":"text","text":"let x = 1;"},
            {"kind":"hardBreak"},
            {"kind":"text","text":"x + 1"}
        ]}]}"#;
        let doc = parse(raw);
        assert_eq!(
            doc.children()[0],
            Node::CodeBlock {
                content: vec![Node::text("let x = 1;"), Node::text("x + 1")],
            }
        );
    }

    #[test]
    fn test_reference_fragment_has_trailing_space() {
        let [r, space] = reference_fragment("n7", "Budget-Dossier", RefKind::CorpusNode);
        assert_eq!(
            r,
            Node::EntityRef {
                id: "n7".to_string(),
                label: "Budget-Dossier".to_string(),
                kind: RefKind::CorpusNode,
            }
        );
        assert_eq!(space, Node::text(" "));
    }
}
