//! The mutable editing session behind the authoring surface.
//!
//! One session owns one document tree for its lifetime (single writer;
//! trees are never shared between sessions). All operations are
//! synchronous tree surgery; the component half in `mod.rs` feeds it DOM
//! events and mirrors the caret back into the browser selection.

use crate::doc::{self, Mark, Node};
use crate::resolver::Candidate;

/// Caret position inside an inline-hosting block (paragraph or heading).
///
/// `host` is the child-index path from the document root to the block.
/// When `inline` addresses a text leaf, `offset` is a byte offset into it
/// (always on a char boundary); otherwise the caret sits on the boundary
/// before `content[inline]`, with `inline == len` meaning end-of-block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caret {
    pub host: Vec<usize>,
    pub inline: usize,
    pub offset: usize,
}

/// An open `@`/`#` authoring context: the trigger character at byte
/// `start` of the text leaf at (`host`, `inline`), with the query being
/// whatever sits between it and the caret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriggerContext {
    pub trigger: char,
    host: Vec<usize>,
    inline: usize,
    start: usize,
}

pub struct EditSession {
    doc: Node,
    caret: Caret,
    pending_marks: Vec<Mark>,
    trigger: Option<TriggerContext>,
}

fn is_inline_host(node: &Node) -> bool {
    matches!(node, Node::Paragraph { .. } | Node::Heading { .. })
}

/// Deepest-last inline host, depth first.
fn last_inline_host(node: &Node, path: &mut Vec<usize>) -> Option<Vec<usize>> {
    for (i, child) in node.children().iter().enumerate().rev() {
        path.push(i);
        if is_inline_host(child) {
            return Some(path.clone());
        }
        if let Some(found) = last_inline_host(child, path) {
            return Some(found);
        }
        path.pop();
    }
    None
}

impl EditSession {
    pub fn new(mut document: Node) -> Self {
        if !matches!(document, Node::Document { .. }) {
            document = doc::empty_document();
        }
        if let Some(content) = document.children_mut() {
            if content.is_empty() {
                content.push(Node::paragraph(vec![]));
            }
        }

        let host = last_inline_host(&document, &mut vec![]).unwrap_or_else(|| {
            // No inline host anywhere (e.g. a lone horizontalRule):
            // append an empty paragraph to type into.
            vec![]
        });

        let mut session = Self {
            doc: document,
            caret: Caret {
                host,
                inline: 0,
                offset: 0,
            },
            pending_marks: vec![],
            trigger: None,
        };

        if session.caret.host.is_empty() {
            if let Some(content) = session.doc.children_mut() {
                content.push(Node::paragraph(vec![]));
                session.caret.host = vec![content.len() - 1];
            }
        }

        session.move_caret_to_host_end();
        session
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn caret(&self) -> &Caret {
        &self.caret
    }

    pub fn pending_marks(&self) -> &[Mark] {
        &self.pending_marks
    }

    /// The active trigger character and the query typed after it.
    pub fn trigger_query(&self) -> Option<(char, String)> {
        let t = self.trigger.as_ref()?;
        let content = self.node_at(&t.host)?.children();
        let Node::Text { text, .. } = content.get(t.inline)? else {
            return None;
        };
        let query_start = t.start + t.trigger.len_utf8();
        let query = text.get(query_start..self.caret.offset)?;
        Some((t.trigger, query.to_string()))
    }

    /// Abandon the current trigger context (popup closed without commit).
    pub fn clear_trigger(&mut self) {
        self.trigger = None;
    }

    fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let mut node = &self.doc;
        for &i in path {
            node = node.children().get(i)?;
        }
        Some(node)
    }

    fn content_mut(&mut self, path: &[usize]) -> Option<&mut Vec<Node>> {
        let mut node = &mut self.doc;
        for &i in path {
            node = node.children_mut()?.get_mut(i)?;
        }
        node.children_mut()
    }

    fn move_caret_to_host_end(&mut self) {
        let host = self.caret.host.clone();
        let Some(content) = self.node_at(&host).map(Node::children) else {
            return;
        };
        let (inline, offset) = match content.last() {
            Some(Node::Text { text, .. }) => (content.len() - 1, text.len()),
            _ => (content.len(), 0),
        };
        self.caret.inline = inline;
        self.caret.offset = offset;
    }

    /// Move the caret to an explicit position (mouse click). Invalid
    /// positions are rejected; `offset` is clamped to the nearest char
    /// boundary.
    pub fn set_caret(&mut self, host: Vec<usize>, inline: usize, offset: usize) -> bool {
        let Some(node) = self.node_at(&host) else {
            return false;
        };
        if !is_inline_host(node) {
            return false;
        }

        let content = node.children();
        if inline > content.len() {
            return false;
        }

        let offset = match content.get(inline) {
            Some(Node::Text { text, .. }) => {
                let mut off = offset.min(text.len());
                while off > 0 && !text.is_char_boundary(off) {
                    off -= 1;
                }
                off
            }
            _ => 0,
        };

        self.caret = Caret {
            host,
            inline,
            offset,
        };
        self.revalidate_trigger();
        true
    }

    /// Click on an inline host outside any text leaf (padding, empty
    /// block): caret to end of that block.
    pub fn set_caret_host_end(&mut self, host: Vec<usize>) -> bool {
        match self.node_at(&host) {
            Some(node) if is_inline_host(node) => {
                self.caret.host = host;
                self.move_caret_to_host_end();
                self.revalidate_trigger();
                true
            }
            _ => false,
        }
    }

    /// Text of the leaf the caret sits in, when it sits in one. The
    /// component half needs this to translate the byte offset into a DOM
    /// (UTF-16) offset.
    pub fn caret_leaf_text(&self) -> Option<String> {
        let content = self.node_at(&self.caret.host)?.children();
        match content.get(self.caret.inline)? {
            Node::Text { text, .. } => Some(text.clone()),
            _ => None,
        }
    }

    /// Ensure the caret sits on an inline boundary of its host, splitting
    /// the current text leaf when it sits mid-leaf. Returns the insertion
    /// index for new inline nodes.
    fn boundary_index(&mut self) -> usize {
        let caret = self.caret.clone();
        let Some(content) = self.content_mut(&caret.host) else {
            return 0;
        };
        if caret.inline >= content.len() {
            return content.len();
        }

        match &mut content[caret.inline] {
            Node::Text { text, marks } => {
                if caret.offset == 0 {
                    caret.inline
                } else if caret.offset >= text.len() {
                    caret.inline + 1
                } else {
                    let suffix = text.split_off(caret.offset);
                    let marks = marks.clone();
                    content.insert(caret.inline + 1, Node::Text { text: suffix, marks });
                    caret.inline + 1
                }
            }
            _ => caret.inline,
        }
    }

    fn insert_plain(&mut self, ch: char) {
        let caret = self.caret.clone();
        let pending = self.pending_marks.clone();

        // Fast path: caret inside a text leaf with the active mark set.
        if let Some(content) = self.content_mut(&caret.host) {
            if let Some(Node::Text { text, marks }) = content.get_mut(caret.inline) {
                if *marks == pending && caret.offset <= text.len() {
                    text.insert(caret.offset, ch);
                    self.caret.offset = caret.offset + ch.len_utf8();
                    return;
                }
            }
        }

        let idx = self.boundary_index();
        let host = self.caret.host.clone();
        let Some(content) = self.content_mut(&host) else {
            return;
        };

        // Extend the preceding leaf when its marks match, otherwise start
        // a fresh leaf for the active mark set.
        if idx > 0 {
            if let Some(Node::Text { text, marks }) = content.get_mut(idx - 1) {
                if *marks == pending {
                    text.push(ch);
                    let offset = text.len();
                    self.caret.inline = idx - 1;
                    self.caret.offset = offset;
                    return;
                }
            }
        }

        content.insert(idx, Node::Text {
            text: ch.to_string(),
            marks: pending,
        });
        self.caret.inline = idx;
        self.caret.offset = ch.len_utf8();
    }

    /// Insert one typed character. When it is a configured trigger char a
    /// new reference-authoring context opens at its position.
    pub fn insert_char(&mut self, ch: char, triggers: &[char]) {
        self.insert_plain(ch);

        if triggers.contains(&ch) {
            self.trigger = Some(TriggerContext {
                trigger: ch,
                host: self.caret.host.clone(),
                inline: self.caret.inline,
                start: self.caret.offset - ch.len_utf8(),
            });
        } else {
            self.revalidate_trigger();
        }
    }

    pub fn insert_text(&mut self, text: &str, triggers: &[char]) {
        for ch in text.chars() {
            self.insert_char(ch, triggers);
        }
    }

    pub fn insert_hard_break(&mut self) {
        let idx = self.boundary_index();
        let host = self.caret.host.clone();
        if let Some(content) = self.content_mut(&host) {
            content.insert(idx, Node::HardBreak);
            self.caret.inline = idx + 1;
            self.caret.offset = 0;
        }
        self.revalidate_trigger();
    }

    /// Enter: split the current block at the caret; the tail becomes a new
    /// paragraph sibling.
    pub fn split_block(&mut self) {
        let idx = self.boundary_index();
        let host_path = self.caret.host.clone();
        let Some((&host_idx, parent_path)) = host_path.split_last() else {
            return;
        };
        let parent_path = parent_path.to_vec();

        let tail = match self.content_mut(&host_path) {
            Some(content) => content.split_off(idx),
            None => return,
        };

        let Some(parent_content) = self.content_mut(&parent_path) else {
            return;
        };
        parent_content.insert(host_idx + 1, Node::paragraph(tail));

        let mut new_host = parent_path;
        new_host.push(host_idx + 1);
        self.caret = Caret {
            host: new_host,
            inline: 0,
            offset: 0,
        };
        self.trigger = None;
    }

    pub fn backspace(&mut self) {
        let caret = self.caret.clone();

        if let Some(content) = self.content_mut(&caret.host) {
            // Inside a text leaf: remove the char before the caret.
            if let Some(Node::Text { text, .. }) = content.get_mut(caret.inline) {
                if caret.offset > 0 && caret.offset <= text.len() {
                    let ch_start = text[..caret.offset]
                        .char_indices()
                        .next_back()
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    text.replace_range(ch_start..caret.offset, "");
                    let emptied = text.is_empty();
                    if emptied {
                        content.remove(caret.inline);
                    }
                    self.caret.offset = if emptied { 0 } else { ch_start };
                    self.revalidate_trigger();
                    return;
                }
            }

            // On a boundary: delete into the previous inline node.
            if caret.inline > 0 {
                let prev = caret.inline - 1;
                match &mut content[prev] {
                    Node::Text { text, .. } => {
                        if let Some((i, _)) = text.char_indices().next_back() {
                            text.truncate(i);
                        }
                        if text.is_empty() {
                            content.remove(prev);
                            self.caret.inline = prev;
                            self.caret.offset = 0;
                        } else {
                            let len = text.len();
                            self.caret.inline = prev;
                            self.caret.offset = len;
                        }
                    }
                    // References delete atomically, never label-by-char.
                    _ => {
                        content.remove(prev);
                        self.caret.inline = prev;
                        self.caret.offset = 0;
                    }
                }
                self.revalidate_trigger();
                return;
            }
        }

        self.merge_with_previous_host();
        self.revalidate_trigger();
    }

    /// Backspace at block start: fold this block's inline run into the
    /// previous sibling when that sibling is an inline host too.
    fn merge_with_previous_host(&mut self) {
        let host_path = self.caret.host.clone();
        let Some((&host_idx, parent_path)) = host_path.split_last() else {
            return;
        };
        if host_idx == 0 {
            return;
        }
        let parent_path = parent_path.to_vec();

        let mut prev_path = parent_path.clone();
        prev_path.push(host_idx - 1);
        let Some(prev) = self.node_at(&prev_path) else {
            return;
        };
        if !is_inline_host(prev) {
            return;
        }
        let junction = prev.children().len();

        let inlines = match self.content_mut(&host_path) {
            Some(content) => std::mem::take(content),
            None => return,
        };

        if let Some(parent_content) = self.content_mut(&parent_path) {
            parent_content.remove(host_idx);
        }
        if let Some(prev_content) = self.content_mut(&prev_path) {
            prev_content.extend(inlines);
        }

        self.caret = Caret {
            host: prev_path,
            inline: junction,
            offset: 0,
        };
        // Boundary caret normalizes into the leaf ending at the junction.
        if junction > 0 {
            let caret_host = self.caret.host.clone();
            let leaf_len = match self
                .node_at(&caret_host)
                .and_then(|n| n.children().get(junction - 1))
            {
                Some(Node::Text { text, .. }) => Some(text.len()),
                _ => None,
            };
            if let Some(len) = leaf_len {
                self.caret.inline = junction - 1;
                self.caret.offset = len;
            }
        }
        self.trigger = None;
    }

    /// Toggle a mark for subsequent typing.
    pub fn toggle_mark(&mut self, mark: Mark) {
        if let Some(pos) = self.pending_marks.iter().position(|m| *m == mark) {
            self.pending_marks.remove(pos);
        } else {
            self.pending_marks.push(mark);
        }
    }

    /// Commit an accepted suggestion: replace trigger char + query with
    /// the reference node and its trailing space, caret after the space.
    pub fn commit_candidate(&mut self, candidate: &Candidate) -> bool {
        let Some(t) = self.trigger.take() else {
            return false;
        };
        let caret = self.caret.clone();
        if caret.host != t.host || caret.inline != t.inline {
            return false;
        }

        let Some(content) = self.content_mut(&t.host) else {
            return false;
        };
        let Some(Node::Text { text, marks }) = content.get(t.inline) else {
            return false;
        };
        if t.start > text.len() || caret.offset > text.len() || t.start > caret.offset {
            return false;
        }

        let prefix = text[..t.start].to_string();
        let suffix = text[caret.offset..].to_string();
        let marks = marks.clone();

        let mut replacement: Vec<Node> = vec![];
        if !prefix.is_empty() {
            replacement.push(Node::marked_text(prefix, marks.clone()));
        }
        let space_rel = replacement.len() + 1;
        let [reference, space] =
            doc::reference_fragment(&candidate.id, &candidate.label, candidate.kind);
        replacement.push(reference);
        replacement.push(space);
        if !suffix.is_empty() {
            replacement.push(Node::marked_text(suffix, marks));
        }

        content.splice(t.inline..t.inline + 1, replacement);

        self.caret = Caret {
            host: t.host,
            inline: t.inline + space_rel,
            offset: 1,
        };
        true
    }

    /// Close the trigger context when an edit moved the caret out from
    /// under it or deleted the trigger character.
    fn revalidate_trigger(&mut self) {
        let Some(t) = self.trigger.clone() else {
            return;
        };

        let still_valid = (|| {
            if self.caret.host != t.host || self.caret.inline != t.inline {
                return false;
            }
            let content = match self.node_at(&t.host) {
                Some(node) => node.children(),
                None => return false,
            };
            let Some(Node::Text { text, .. }) = content.get(t.inline) else {
                return false;
            };
            let Some(after_start) = text.get(t.start..) else {
                return false;
            };
            if !after_start.starts_with(t.trigger) {
                return false;
            }
            // Caret must sit after the trigger char, inside the query.
            self.caret.offset > t.start && self.caret.offset <= text.len()
        })();

        if !still_valid {
            self.trigger = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::{empty_document, parse, serialize, HeadingLevel, Mark, RefKind};

    const TRIGGERS: &[char] = &['@', '#'];

    fn candidate(id: &str, label: &str, kind: RefKind) -> Candidate {
        Candidate {
            id: id.to_string(),
            label: label.to_string(),
            subtitle: None,
            kind,
        }
    }

    fn fresh() -> EditSession {
        EditSession::new(parse(""))
    }

    #[test]
    fn test_typing_into_empty_document() {
        let mut s = fresh();
        s.insert_text("hallo", TRIGGERS);

        assert_eq!(
            s.doc(),
            &Node::Document {
                content: vec![Node::paragraph(vec![Node::text("hallo")])],
            }
        );
        assert_eq!(s.caret(), &Caret { host: vec![0], inline: 0, offset: 5 });
    }

    #[test]
    fn test_trigger_opens_and_tracks_query() {
        let mut s = fresh();
        s.insert_text("cc ", TRIGGERS);
        assert_eq!(s.trigger_query(), None);

        s.insert_text("@jan", TRIGGERS);
        assert_eq!(s.trigger_query(), Some(('@', "jan".to_string())));

        s.insert_char(' ', TRIGGERS);
        // Spaces are allowed inside the query (people have full names).
        assert_eq!(s.trigger_query(), Some(('@', "jan ".to_string())));
    }

    #[test]
    fn test_backspacing_the_trigger_char_closes_the_context() {
        let mut s = fresh();
        s.insert_text("@j", TRIGGERS);
        assert!(s.trigger_query().is_some());

        s.backspace();
        assert_eq!(s.trigger_query(), Some(('@', String::new())));

        s.backspace();
        assert_eq!(s.trigger_query(), None);
    }

    #[test]
    fn test_commit_replaces_trigger_range_with_reference_and_space() {
        let mut s = fresh();
        s.insert_text("zie @jan", TRIGGERS);

        assert!(s.commit_candidate(&candidate("p1", "Jane Doe", RefKind::Person)));

        assert_eq!(
            s.doc(),
            &Node::Document {
                content: vec![Node::paragraph(vec![
                    Node::text("zie "),
                    Node::EntityRef {
                        id: "p1".to_string(),
                        label: "Jane Doe".to_string(),
                        kind: RefKind::Person,
                    },
                    Node::text(" "),
                ])],
            }
        );
        // Caret after the synthetic space, so typing continues cleanly.
        assert_eq!(s.caret(), &Caret { host: vec![0], inline: 2, offset: 1 });
        assert_eq!(s.trigger_query(), None);

        s.insert_text("en", TRIGGERS);
        assert_eq!(
            s.doc().children()[0].children()[2],
            Node::text(" en")
        );
    }

    #[test]
    fn test_commit_mid_text_keeps_suffix() {
        let mut s = fresh();
        s.insert_text("a #bud b", TRIGGERS);
        // Caret back to just after "#bud"; the context is still live, the
        // committed query is whatever sits before the caret.
        assert!(s.set_caret(vec![0], 0, 6));
        assert_eq!(s.trigger_query(), Some(('#', "bud".to_string())));

        assert!(s.commit_candidate(&candidate("n7", "Budget-Dossier", RefKind::CorpusNode)));
        let para = &s.doc().children()[0];
        assert_eq!(
            para.children(),
            &[
                Node::text("a "),
                Node::EntityRef {
                    id: "n7".to_string(),
                    label: "Budget-Dossier".to_string(),
                    kind: RefKind::CorpusNode,
                },
                Node::text(" "),
                Node::text(" b"),
            ]
        );
        assert_eq!(s.caret(), &Caret { host: vec![0], inline: 2, offset: 1 });
    }

    #[test]
    fn test_reference_deletes_atomically() {
        let mut s = fresh();
        s.insert_text("@jan", TRIGGERS);
        assert!(s.commit_candidate(&candidate("p1", "Jane Doe", RefKind::Person)));

        // Remove the trailing space, then the whole reference in one go.
        s.backspace();
        assert!(matches!(
            s.doc().children()[0].children().last(),
            Some(Node::EntityRef { .. })
        ));

        s.backspace();
        assert!(crate::doc::is_empty(s.doc()));
    }

    #[test]
    fn test_split_block_moves_tail_to_new_paragraph() {
        let mut s = fresh();
        s.insert_text("eerste tweede", TRIGGERS);
        assert!(s.set_caret(vec![0], 0, 6));

        s.split_block();

        assert_eq!(
            s.doc(),
            &Node::Document {
                content: vec![
                    Node::paragraph(vec![Node::text("eerste")]),
                    Node::paragraph(vec![Node::text(" tweede")]),
                ],
            }
        );
        assert_eq!(s.caret(), &Caret { host: vec![1], inline: 0, offset: 0 });
    }

    #[test]
    fn test_backspace_at_block_start_merges_paragraphs() {
        let mut s = fresh();
        s.insert_text("ab", TRIGGERS);
        s.split_block();
        s.insert_text("cd", TRIGGERS);
        assert!(s.set_caret(vec![1], 0, 0));

        s.backspace();

        assert_eq!(
            s.doc(),
            &Node::Document {
                content: vec![Node::paragraph(vec![Node::text("ab"), Node::text("cd")])],
            }
        );
        // Caret at the junction, at the end of the original text.
        assert_eq!(s.caret(), &Caret { host: vec![0], inline: 0, offset: 2 });
    }

    #[test]
    fn test_hard_break_insertion() {
        let mut s = fresh();
        s.insert_text("a", TRIGGERS);
        s.insert_hard_break();
        s.insert_text("b", TRIGGERS);

        assert_eq!(
            s.doc().children()[0].children(),
            &[Node::text("a"), Node::HardBreak, Node::text("b")]
        );
    }

    #[test]
    fn test_mark_toggle_starts_a_new_leaf() {
        let mut s = fresh();
        s.insert_text("plain ", TRIGGERS);
        s.toggle_mark(Mark::Bold);
        s.insert_text("bold", TRIGGERS);
        s.toggle_mark(Mark::Bold);
        s.insert_text(" plain", TRIGGERS);

        assert_eq!(
            s.doc().children()[0].children(),
            &[
                Node::text("plain "),
                Node::marked_text("bold", vec![Mark::Bold]),
                Node::text(" plain"),
            ]
        );
    }

    #[test]
    fn test_boundary_typing_extends_matching_leaf() {
        let mut s = fresh();
        s.insert_text("ab", TRIGGERS);
        // Boundary caret after the leaf, same (empty) mark set.
        assert!(s.set_caret(vec![0], 1, 0));

        s.insert_text("c", TRIGGERS);

        assert_eq!(s.doc().children()[0].children(), &[Node::text("abc")]);
        assert_eq!(s.caret(), &Caret { host: vec![0], inline: 0, offset: 3 });
    }

    #[test]
    fn test_backspace_emptying_a_leaf_drops_it() {
        let mut s = fresh();
        s.insert_text("a", TRIGGERS);

        s.backspace();

        assert_eq!(s.doc(), &empty_document());
        assert_eq!(s.caret(), &Caret { host: vec![0], inline: 0, offset: 0 });
    }

    #[test]
    fn test_session_round_trips_through_serialization() {
        let mut s = fresh();
        s.insert_text("zie @jan", TRIGGERS);
        assert!(s.commit_candidate(&candidate("p1", "Jane Doe", RefKind::Person)));
        s.insert_text("voor details", TRIGGERS);

        let persisted = serialize(s.doc());
        assert_eq!(&parse(&persisted), s.doc());
    }

    #[test]
    fn test_caret_lands_in_existing_document() {
        let raw_doc = Node::Document {
            content: vec![
                Node::Heading {
                    level: HeadingLevel::Two,
                    content: vec![Node::text("kop")],
                },
                Node::paragraph(vec![Node::text("tekst")]),
            ],
        };
        let s = EditSession::new(raw_doc);
        assert_eq!(s.caret(), &Caret { host: vec![1], inline: 0, offset: 5 });
    }

    #[test]
    fn test_set_caret_rejects_invalid_positions() {
        let mut s = fresh();
        s.insert_text("ab", TRIGGERS);

        assert!(!s.set_caret(vec![5], 0, 0));
        assert!(!s.set_caret(vec![0], 9, 0));
        // Offsets clamp instead of failing.
        assert!(s.set_caret(vec![0], 0, 99));
        assert_eq!(s.caret().offset, 2);
    }
}
