//! Read-only rendering of a document tree.
//!
//! A pure mapping from nodes to views: no I/O, no mutation, safe to call
//! repeatedly. Click behavior of reference chips is decided by
//! `reference_action` so the dispatch table stays testable without a DOM.

use leptos::prelude::*;

use crate::doc::{HeadingLevel, Mark, Node, RefKind};

/// Host-supplied collaborators: the router and the detail-pane
/// controller. The renderer only ever invokes these.
#[derive(Clone)]
pub struct RenderHandlers {
    pub navigate: Callback<String>,
    pub open_entity_detail: Callback<(RefKind, String)>,
}

/// What clicking a reference chip does, by reference kind.
#[derive(Clone, Debug, PartialEq)]
pub enum RefAction {
    Navigate(String),
    OpenDetail(RefKind, String),
}

/// Kind dispatch for reference clicks. `None` means the chip is label
/// display only; that is the deliberate fallback for kinds without a
/// click target, not an error.
pub fn reference_action(kind: RefKind, id: &str) -> Option<RefAction> {
    match kind {
        RefKind::Organisatie => Some(RefAction::Navigate(format!(
            "/organisaties?ref={}",
            urlencoding::encode(id)
        ))),
        RefKind::CorpusNode => Some(RefAction::OpenDetail(RefKind::CorpusNode, id.to_string())),
        RefKind::Task => Some(RefAction::OpenDetail(RefKind::Task, id.to_string())),
        RefKind::Person | RefKind::Tag => None,
    }
}

/// Fixed stacking order for text marks. The stored mark set is
/// order-independent; rendering always nests bold > italic > code >
/// strike so identical sets produce identical markup.
pub const MARK_STACK: [Mark; 4] = [Mark::Bold, Mark::Italic, Mark::Code, Mark::Strike];

pub fn mark_stack(marks: &[Mark]) -> Vec<Mark> {
    MARK_STACK
        .iter()
        .copied()
        .filter(|m| marks.contains(m))
        .collect()
}

/// Code blocks hold text leaves only; they render as one newline-joined
/// run.
pub(crate) fn code_block_text(content: &[Node]) -> String {
    content
        .iter()
        .filter_map(|n| match n {
            Node::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_doc(node: &Node, handlers: &RenderHandlers) -> AnyView {
    render_node(node, handlers)
}

fn render_children(content: &[Node], handlers: &RenderHandlers) -> AnyView {
    content
        .iter()
        .map(|child| render_node(child, handlers))
        .collect_view()
        .into_any()
}

fn render_node(node: &Node, handlers: &RenderHandlers) -> AnyView {
    match node {
        Node::Document { content } => view! {
            <div class="space-y-2 text-sm leading-relaxed">
                {render_children(content, handlers)}
            </div>
        }
        .into_any(),
        Node::Paragraph { content } => view! {
            <p class="min-h-[1.25rem] whitespace-pre-wrap">{render_children(content, handlers)}</p>
        }
        .into_any(),
        Node::Heading { level, content } => match level {
            HeadingLevel::Two => view! {
                <h2 class="text-base font-semibold">{render_children(content, handlers)}</h2>
            }
            .into_any(),
            HeadingLevel::Three => view! {
                <h3 class="text-sm font-semibold">{render_children(content, handlers)}</h3>
            }
            .into_any(),
        },
        Node::Blockquote { content } => view! {
            <blockquote class="border-l-2 border-border pl-3 text-muted-foreground">
                {render_children(content, handlers)}
            </blockquote>
        }
        .into_any(),
        Node::BulletList { content } => view! {
            <ul class="list-disc space-y-1 pl-5">{render_children(content, handlers)}</ul>
        }
        .into_any(),
        Node::OrderedList { content } => view! {
            <ol class="list-decimal space-y-1 pl-5">{render_children(content, handlers)}</ol>
        }
        .into_any(),
        Node::ListItem { content } => {
            view! { <li>{render_children(content, handlers)}</li> }.into_any()
        }
        Node::CodeBlock { content } => view! {
            <pre class="overflow-x-auto rounded-md bg-muted p-3 font-mono text-xs">
                <code>{code_block_text(content)}</code>
            </pre>
        }
        .into_any(),
        Node::Text { text, marks } => render_text(text, marks),
        Node::HardBreak => view! { <br /> }.into_any(),
        Node::HorizontalRule => view! { <hr class="my-2 border-border" /> }.into_any(),
        Node::EntityRef { id, label, kind } => render_reference(id, label, *kind, handlers),
        // Forward compatibility: a container kind newer than this client
        // renders its children unwrapped; an unknown leaf renders nothing.
        Node::Unknown { content, .. } => {
            if content.is_empty() {
                ().into_view().into_any()
            } else {
                render_children(content, handlers)
            }
        }
    }
}

fn render_text(text: &str, marks: &[Mark]) -> AnyView {
    let mut inner = view! { <span>{text.to_string()}</span> }.into_any();
    // Innermost-first: the first mark in the stack order ends up outermost.
    for mark in mark_stack(marks).into_iter().rev() {
        inner = match mark {
            Mark::Bold => view! { <strong>{inner}</strong> }.into_any(),
            Mark::Italic => view! { <em>{inner}</em> }.into_any(),
            Mark::Code => view! {
                <code class="rounded bg-muted px-1 font-mono text-[0.85em]">{inner}</code>
            }
            .into_any(),
            Mark::Strike => view! { <s>{inner}</s> }.into_any(),
        };
    }
    inner
}

fn render_reference(id: &str, label: &str, kind: RefKind, handlers: &RenderHandlers) -> AnyView {
    let action = reference_action(kind, id);
    let sigil = kind.sigil();

    let class = if action.is_some() {
        "inline-flex items-center rounded bg-primary/10 px-1 text-primary cursor-pointer hover:bg-primary/20"
    } else {
        "inline-flex items-center rounded bg-muted px-1 text-muted-foreground"
    };

    let handlers = handlers.clone();
    let on_click = move |ev: web_sys::MouseEvent| {
        ev.stop_propagation();
        let Some(action) = action.clone() else {
            return;
        };
        match action {
            RefAction::Navigate(path) => handlers.navigate.run(path),
            RefAction::OpenDetail(kind, id) => handlers.open_entity_detail.run((kind, id)),
        }
    };

    view! {
        <span class=class data-reference-kind=kind.as_wire() on:click=on_click>
            {sigil}{label.to_string()}
        </span>
    }
    .into_any()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_stacking_is_insertion_order_independent() {
        assert_eq!(
            mark_stack(&[Mark::Strike, Mark::Bold]),
            mark_stack(&[Mark::Bold, Mark::Strike])
        );
        assert_eq!(
            mark_stack(&[Mark::Strike, Mark::Code, Mark::Italic, Mark::Bold]),
            vec![Mark::Bold, Mark::Italic, Mark::Code, Mark::Strike]
        );
        assert_eq!(mark_stack(&[]), vec![]);
    }

    #[test]
    fn test_reference_click_dispatch_table() {
        assert_eq!(
            reference_action(RefKind::CorpusNode, "n7"),
            Some(RefAction::OpenDetail(RefKind::CorpusNode, "n7".to_string()))
        );
        assert_eq!(
            reference_action(RefKind::Task, "t3"),
            Some(RefAction::OpenDetail(RefKind::Task, "t3".to_string()))
        );
        assert_eq!(
            reference_action(RefKind::Organisatie, "Min BZK"),
            Some(RefAction::Navigate("/organisaties?ref=Min%20BZK".to_string()))
        );

        // Default-safe: people and tags have no click target.
        assert_eq!(reference_action(RefKind::Person, "p1"), None);
        assert_eq!(reference_action(RefKind::Tag, "urgent"), None);
    }

    #[test]
    fn test_code_block_text_joins_lines() {
        let content = vec![
            crate::doc::Node::text("let x = 1;"),
            crate::doc::Node::text("x + 1"),
        ];
        assert_eq!(code_block_text(&content), "let x = 1;\nx + 1");
    }
}
