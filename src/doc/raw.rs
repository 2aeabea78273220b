use serde::{Deserialize, Serialize};

use super::{HeadingLevel, Mark, Node, RefKind};

/// Wire shape of a persisted document node.
///
/// The backend stores the whole tree as one JSON string on the parent
/// record's text field, so this struct has to absorb every historical
/// variant: reference nodes under their legacy family kinds (`mention`,
/// `hashtag`), documents written before `referenceKind` existed, and
/// node kinds newer than this client.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct RawNode {
    pub kind: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<RawNode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<RawMark>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<RawAttrs>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct RawMark {
    #[serde(rename = "type")]
    pub mark_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub(crate) struct RawAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,

    #[serde(rename = "referenceId", default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,

    #[serde(rename = "displayLabel", default, skip_serializing_if = "Option::is_none")]
    pub display_label: Option<String>,

    #[serde(rename = "referenceKind", default, skip_serializing_if = "Option::is_none")]
    pub reference_kind: Option<String>,
}

impl RawNode {
    fn container(kind: &str, content: Vec<RawNode>) -> Self {
        Self {
            kind: kind.to_string(),
            content,
            text: None,
            marks: None,
            attrs: None,
        }
    }

    fn leaf(kind: &str) -> Self {
        Self::container(kind, vec![])
    }
}

fn mark_from_wire(name: &str) -> Option<Mark> {
    match name {
        "bold" => Some(Mark::Bold),
        "italic" => Some(Mark::Italic),
        "code" => Some(Mark::Code),
        "strike" => Some(Mark::Strike),
        // Unknown marks are dropped, same policy as unknown leaf kinds.
        _ => None,
    }
}

fn mark_to_wire(mark: Mark) -> &'static str {
    match mark {
        Mark::Bold => "bold",
        Mark::Italic => "italic",
        Mark::Code => "code",
        Mark::Strike => "strike",
    }
}

/// Marks are a set on the wire too; duplicates from older clients are
/// collapsed here so structural equality behaves.
fn marks_from_wire(marks: Option<Vec<RawMark>>) -> Vec<Mark> {
    let mut out: Vec<Mark> = vec![];
    for m in marks.unwrap_or_default() {
        if let Some(mark) = mark_from_wire(&m.mark_type) {
            if !out.contains(&mark) {
                out.push(mark);
            }
        }
    }
    out
}

/// `referenceKind` backfill for documents authored before the kind
/// distinction existed: absence is never an error, the family kind
/// decides the default.
fn reference_kind_from_wire(attrs: &RawAttrs, family_default: RefKind) -> RefKind {
    attrs
        .reference_kind
        .as_deref()
        .and_then(RefKind::from_wire)
        .unwrap_or(family_default)
}

pub(crate) fn from_raw(raw: RawNode) -> Node {
    let children = |content: Vec<RawNode>| content.into_iter().map(from_raw).collect::<Vec<_>>();

    match raw.kind.as_str() {
        "document" => Node::Document {
            content: children(raw.content),
        },
        "paragraph" => Node::Paragraph {
            content: children(raw.content),
        },
        "heading" => Node::Heading {
            level: HeadingLevel::from_wire(
                raw.attrs.as_ref().and_then(|a| a.level).unwrap_or(2),
            ),
            content: children(raw.content),
        },
        "blockquote" => Node::Blockquote {
            content: children(raw.content),
        },
        "bulletList" => Node::BulletList {
            content: children(raw.content),
        },
        "orderedList" => Node::OrderedList {
            content: children(raw.content),
        },
        "listItem" => Node::ListItem {
            content: children(raw.content),
        },
        "codeBlock" => Node::CodeBlock {
            // Code blocks only hold text leaves; anything else is dropped.
            content: children(raw.content)
                .into_iter()
                .filter(|n| matches!(n, Node::Text { .. }))
                .collect(),
        },
        "text" => Node::Text {
            text: raw.text.unwrap_or_default(),
            marks: marks_from_wire(raw.marks),
        },
        "hardBreak" => Node::HardBreak,
        "horizontalRule" => Node::HorizontalRule,
        "mention" => {
            let attrs = raw.attrs.unwrap_or_default();
            Node::EntityRef {
                id: attrs.reference_id.clone().unwrap_or_default(),
                label: attrs.display_label.clone().unwrap_or_default(),
                kind: reference_kind_from_wire(&attrs, RefKind::Person),
            }
        }
        "hashtag" => {
            let attrs = raw.attrs.unwrap_or_default();
            Node::EntityRef {
                id: attrs.reference_id.clone().unwrap_or_default(),
                label: attrs.display_label.clone().unwrap_or_default(),
                kind: reference_kind_from_wire(&attrs, RefKind::CorpusNode),
            }
        }
        _ => Node::Unknown {
            kind: raw.kind,
            content: children(raw.content),
        },
    }
}

pub(crate) fn to_raw(node: &Node) -> RawNode {
    let children = |content: &Vec<Node>| content.iter().map(to_raw).collect::<Vec<_>>();

    match node {
        Node::Document { content } => RawNode::container("document", children(content)),
        Node::Paragraph { content } => RawNode::container("paragraph", children(content)),
        Node::Heading { level, content } => RawNode {
            attrs: Some(RawAttrs {
                level: Some(level.as_level()),
                ..RawAttrs::default()
            }),
            ..RawNode::container("heading", children(content))
        },
        Node::Blockquote { content } => RawNode::container("blockquote", children(content)),
        Node::BulletList { content } => RawNode::container("bulletList", children(content)),
        Node::OrderedList { content } => RawNode::container("orderedList", children(content)),
        Node::ListItem { content } => RawNode::container("listItem", children(content)),
        Node::CodeBlock { content } => RawNode::container("codeBlock", children(content)),
        Node::Text { text, marks } => RawNode {
            text: Some(text.clone()),
            marks: if marks.is_empty() {
                None
            } else {
                Some(
                    marks
                        .iter()
                        .map(|m| RawMark {
                            mark_type: mark_to_wire(*m).to_string(),
                        })
                        .collect(),
                )
            },
            ..RawNode::leaf("text")
        },
        Node::HardBreak => RawNode::leaf("hardBreak"),
        Node::HorizontalRule => RawNode::leaf("horizontalRule"),
        Node::EntityRef { id, label, kind } => RawNode {
            attrs: Some(RawAttrs {
                reference_id: Some(id.clone()),
                display_label: Some(label.clone()),
                // Always written out; the backfill default only exists for
                // documents older than the kind distinction.
                reference_kind: Some(kind.as_wire().to_string()),
                ..RawAttrs::default()
            }),
            ..RawNode::leaf(kind.family_kind())
        },
        Node::Unknown { kind, content } => RawNode::container(kind, children(content)),
    }
}
