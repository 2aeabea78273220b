//! The controlled editing surface.
//!
//! [`EditSession`] (in `session.rs`) owns the document tree and the
//! caret; this module owns the browser half: a contenteditable host
//! whose keydown events are intercepted and replayed against the
//! session, with the DOM re-rendered from the tree and the selection
//! mirrored back afterwards. The browser never mutates the tree on its
//! own.

mod session;

pub use session::{Caret, EditSession};

use leptos::ev;
use leptos::html;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::{request_animation_frame, window_event_listener};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

use crate::doc::{self, Mark, Node};
use crate::render::mark_stack;
use crate::resolver::{
    Candidate, KeyOutcome, SuggestionCore, SuggestionMenu, TriggerConfig, DEBOUNCE_MS,
};

/// Guards the value-prop loop of the controlled surface.
///
/// The parent feeds `value` in and receives `on_change` out; without a
/// gate, every emitted change would come straight back through the
/// value effect and rebuild the session mid-typing (dropping the
/// caret). The gate remembers the last string in each direction and
/// skips anything already seen.
pub(crate) struct SyncGate {
    last_external: Option<String>,
    last_emitted: Option<String>,
    // One-shot: swallows the single notification produced by applying an
    // external replacement (its normalization pass), nothing after it.
    suppress_next: bool,
}

impl SyncGate {
    pub(crate) fn seeded(initial: &str) -> Self {
        Self {
            last_external: Some(initial.to_string()),
            last_emitted: None,
            suppress_next: false,
        }
    }

    pub(crate) fn should_apply_external(&self, incoming: &str) -> bool {
        self.last_emitted.as_deref() != Some(incoming)
            && self.last_external.as_deref() != Some(incoming)
    }

    pub(crate) fn note_external_applied(&mut self, incoming: &str) {
        self.last_external = Some(incoming.to_string());
        self.suppress_next = true;
    }

    /// A local change notification; returns the string to hand to
    /// `on_change`, or `None` when it is suppressed or landed on the last
    /// emitted value.
    pub(crate) fn emit(&mut self, serialized: String) -> Option<String> {
        if std::mem::take(&mut self.suppress_next) {
            self.last_emitted = Some(serialized);
            return None;
        }
        if self.last_emitted.as_deref() == Some(serialized.as_str()) {
            return None;
        }
        self.last_emitted = Some(serialized.clone());
        Some(serialized)
    }
}

fn utf16_to_byte_idx(s: &str, pos_utf16: u32) -> usize {
    if pos_utf16 == 0 {
        return 0;
    }
    let mut acc: u32 = 0;
    for (i, ch) in s.char_indices() {
        let w = ch.len_utf16() as u32;
        if acc + w > pos_utf16 {
            return i;
        }
        acc += w;
        if acc == pos_utf16 {
            return i + ch.len_utf8();
        }
    }
    s.len()
}

fn byte_idx_to_utf16(s: &str, byte_idx: usize) -> u32 {
    s[..byte_idx.min(s.len())].encode_utf16().count() as u32
}

fn path_attr(path: &[usize]) -> String {
    path.iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

fn parse_path(attr: &str) -> Option<Vec<usize>> {
    attr.split('.').map(|seg| seg.parse().ok()).collect()
}

/// Class list for a text leaf in the editable view. Marks style a single
/// flat span here so each leaf keeps exactly one DOM text node; the
/// nested markup lives in the read-only renderer.
fn leaf_class(marks: &[Mark]) -> String {
    let mut classes: Vec<&str> = vec![];
    for mark in mark_stack(marks) {
        classes.push(match mark {
            Mark::Bold => "font-semibold",
            Mark::Italic => "italic",
            Mark::Code => "rounded bg-muted px-0.5 font-mono text-[0.85em]",
            Mark::Strike => "line-through",
        });
    }
    classes.join(" ")
}

fn render_inline(content: &[Node]) -> AnyView {
    content
        .iter()
        .enumerate()
        .map(|(i, node)| match node {
            Node::Text { text, marks } => view! {
                <span data-inline=i.to_string() class=leaf_class(marks)>
                    {text.clone()}
                </span>
            }
            .into_any(),
            Node::HardBreak => view! { <br data-inline=i.to_string() /> }.into_any(),
            Node::EntityRef { label, kind, .. } => view! {
                <span
                    data-inline=i.to_string()
                    data-reference-kind=kind.as_wire()
                    contenteditable="false"
                    class="inline-flex items-center rounded bg-primary/10 px-1 text-primary"
                >
                    {kind.sigil()}{label.clone()}
                </span>
            }
            .into_any(),
            // Block nodes never sit in an inline run; parsing guarantees it.
            _ => ().into_view().into_any(),
        })
        .collect_view()
        .into_any()
}

fn render_editable(node: &Node, path: &[usize]) -> AnyView {
    let child_views = |content: &[Node]| {
        content
            .iter()
            .enumerate()
            .map(|(i, child)| {
                let mut child_path = path.to_vec();
                child_path.push(i);
                render_editable(child, &child_path)
            })
            .collect_view()
            .into_any()
    };

    match node {
        Node::Document { content } => {
            view! { <div class="space-y-2">{child_views(content)}</div> }.into_any()
        }
        Node::Paragraph { content } => {
            if content.is_empty() {
                // A br keeps the empty block clickable and full-height.
                view! { <p data-path=path_attr(path) class="min-h-[1.25rem] whitespace-pre-wrap"><br /></p> }
                    .into_any()
            } else {
                view! {
                    <p data-path=path_attr(path) class="min-h-[1.25rem] whitespace-pre-wrap">
                        {render_inline(content)}
                    </p>
                }
                .into_any()
            }
        }
        Node::Heading { level, content } => match level {
            doc::HeadingLevel::Two => view! {
                <h2 data-path=path_attr(path) class="text-base font-semibold">
                    {render_inline(content)}
                </h2>
            }
            .into_any(),
            doc::HeadingLevel::Three => view! {
                <h3 data-path=path_attr(path) class="text-sm font-semibold">
                    {render_inline(content)}
                </h3>
            }
            .into_any(),
        },
        Node::Blockquote { content } => view! {
            <blockquote class="border-l-2 border-border pl-3">{child_views(content)}</blockquote>
        }
        .into_any(),
        Node::BulletList { content } => {
            view! { <ul class="list-disc pl-5">{child_views(content)}</ul> }.into_any()
        }
        Node::OrderedList { content } => {
            view! { <ol class="list-decimal pl-5">{child_views(content)}</ol> }.into_any()
        }
        Node::ListItem { content } => view! { <li>{child_views(content)}</li> }.into_any(),
        Node::CodeBlock { content } => view! {
            <pre contenteditable="false" class="rounded-md bg-muted p-3 font-mono text-xs">
                <code>{crate::render::code_block_text(content)}</code>
            </pre>
        }
        .into_any(),
        Node::HorizontalRule => {
            view! { <hr contenteditable="false" class="my-2 border-border" /> }.into_any()
        }
        Node::Unknown { content, .. } => child_views(content),
        // Inline nodes outside a host are unreachable after parsing.
        _ => ().into_view().into_any(),
    }
}

fn place_dom_caret(root: &web_sys::HtmlDivElement, caret: &Caret, leaf_text: Option<&str>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };
    let Ok(Some(host_el)) = root.query_selector(&format!("[data-path='{}']", path_attr(&caret.host)))
    else {
        return;
    };
    let Ok(range) = document.create_range() else {
        return;
    };

    match leaf_text {
        Some(text) => {
            let Ok(Some(leaf_el)) = host_el.query_selector(&format!(
                "[data-inline='{}']",
                caret.inline
            )) else {
                return;
            };
            let Some(text_node) = leaf_el.first_child() else {
                return;
            };
            if range
                .set_start(&text_node, byte_idx_to_utf16(text, caret.offset))
                .is_err()
            {
                return;
            }
        }
        None => {
            if range.set_start(&host_el, caret.inline as u32).is_err() {
                return;
            }
        }
    }
    range.collapse_with_to_start(true);

    if let Ok(Some(selection)) = window.get_selection() {
        let _ = selection.remove_all_ranges();
        let _ = selection.add_range(&range);
    }
}

/// Viewport point just under the caret, for anchoring the popup.
fn caret_viewport_point() -> Option<(f64, f64)> {
    let selection = web_sys::window()?.get_selection().ok()??;
    if selection.range_count() == 0 {
        return None;
    }
    let range = selection.get_range_at(0).ok()?;
    let rect = range.get_bounding_client_rect();
    Some((rect.left(), rect.bottom() + 4.0))
}

/// Rich-text editor bound to a serialized document string.
///
/// Controlled component: `value` in, `on_change` out, both carrying the
/// persisted JSON form. Typing a configured trigger character opens the
/// suggestion popup; committing a row inserts a reference node.
#[component]
pub fn AuthoringSurface(
    #[prop(into)] value: Signal<String>,
    on_change: Callback<String>,
    #[prop(into, optional)] read_only: Signal<bool>,
    #[prop(optional)] autofocus: bool,
    triggers: Vec<TriggerConfig>,
) -> impl IntoView {
    let trigger_chars = StoredValue::new(triggers.iter().map(|t| t.trigger).collect::<Vec<_>>());
    // Providers hold an Rc, so they stay on this thread.
    let triggers_sv = StoredValue::new_local(triggers);

    let session = RwSignal::new(EditSession::new(doc::parse(&value.get_untracked())));
    let core = RwSignal::new(SuggestionCore::new());
    let gate = RwSignal::new(SyncGate::seeded(&value.get_untracked()));
    let anchor: RwSignal<Option<(f64, f64)>> = RwSignal::new(None);
    // Bumped on every tree edit; the editable view renders from it so
    // caret-only session changes do not wipe the DOM selection.
    let rev = RwSignal::new(0u64);

    let editor_ref: NodeRef<html::Div> = NodeRef::new();
    let debounce_timer = StoredValue::new(None::<i32>);

    let close_popup = move || {
        core.update(|c| c.close());
        anchor.try_set(None);
    };

    let schedule_fire = move |trigger: char, generation: u64| {
        let Some(window) = web_sys::window() else {
            return;
        };
        let timer = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            Closure::once_into_js(move || {
                let Some((seq, query)) = core.try_update(|c| c.fire(generation)).flatten() else {
                    return;
                };
                let Some(provider) = triggers_sv.try_with_value(|ts| {
                    ts.iter()
                        .find(|t| t.trigger == trigger)
                        .map(|t| t.provider.clone())
                })
                .flatten() else {
                    return;
                };
                spawn_local(async move {
                    let items = provider(query).await;
                    // try_update: the surface may be gone by the time the
                    // provider resolves.
                    core.try_update(|c| c.apply_results(seq, items));
                });
            })
            .as_ref()
            .unchecked_ref(),
            DEBOUNCE_MS,
        );
        if let Ok(id) = timer {
            debounce_timer.set_value(Some(id));
        }
    };

    // Reconcile the popup with the session's trigger context.
    let sync_suggestions = move || {
        match session.with_untracked(|s| s.trigger_query()) {
            None => {
                if core.with_untracked(|c| c.is_open()) {
                    close_popup();
                }
            }
            Some((trigger, query)) => {
                if !core.with_untracked(|c| c.is_open()) {
                    let needs_query = triggers_sv
                        .with_value(|ts| {
                            ts.iter()
                                .find(|t| t.trigger == trigger)
                                .map(|t| t.needs_query)
                        })
                        .unwrap_or(false);
                    core.update(|c| c.open(needs_query));
                }
                let generation = core
                    .try_update(|c| c.note_keystroke(&query))
                    .unwrap_or_default();
                schedule_fire(trigger, generation);
            }
        }
    };

    let after_edit = move || {
        rev.update(|r| *r += 1);
        let serialized = session.with_untracked(|s| doc::serialize(s.doc()));
        if let Some(out) = gate.try_update(|g| g.emit(serialized)).flatten() {
            on_change.run(out);
        }
        sync_suggestions();
    };

    // External value changes rebuild the session wholesale. The rebuild's
    // own normalized serialization goes through the emit path once and is
    // swallowed by the gate's one-shot flag.
    Effect::new(move |_| {
        let incoming = value.get();
        if !gate.with_untracked(|g| g.should_apply_external(&incoming)) {
            return;
        }
        gate.update(|g| g.note_external_applied(&incoming));
        session.set(EditSession::new(doc::parse(&incoming)));
        close_popup();
        rev.update(|r| *r += 1);

        let normalized = session.with_untracked(|s| doc::serialize(s.doc()));
        if let Some(out) = gate.try_update(|g| g.emit(normalized)).flatten() {
            on_change.run(out);
        }
    });

    // After each re-render, mirror the model caret into the DOM
    // selection and re-anchor the popup. Deferred to the next tick so
    // the new nodes are mounted.
    Effect::new(move |_| {
        rev.track();
        let Some(el) = editor_ref.get() else {
            return;
        };
        if read_only.get_untracked() {
            return;
        }
        let caret = session.with_untracked(|s| s.caret().clone());
        let leaf_text = session.with_untracked(|s| s.caret_leaf_text());
        let Some(window) = web_sys::window() else {
            return;
        };
        let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            Closure::once_into_js(move || {
                place_dom_caret(&el, &caret, leaf_text.as_deref());
                if core.try_with(|c| c.is_open()).unwrap_or(false) {
                    anchor.try_set(caret_viewport_point());
                }
            })
            .as_ref()
            .unchecked_ref(),
            0,
        );
    });

    if autofocus {
        Effect::new(move |_| {
            let Some(el) = editor_ref.get() else {
                return;
            };
            // Focus after layout has settled, not merely after mount.
            request_animation_frame(move || {
                let _ = el.focus();
            });
        });
    }

    // The anchor is a viewport point; a resize invalidates it.
    let resize_listener = window_event_listener(ev::resize, move |_| {
        close_popup();
    });

    on_cleanup(move || {
        resize_listener.remove();
        if let Some(id) = debounce_timer.get_value() {
            if let Some(window) = web_sys::window() {
                window.clear_timeout_with_handle(id);
            }
        }
    });

    // Browser caret moved on its own (click, arrow keys): fold it back
    // into the model without re-rendering.
    let sync_caret_from_dom = move || {
        let Some(selection) = web_sys::window().and_then(|w| w.get_selection().ok().flatten())
        else {
            return;
        };
        let Some(node) = selection.anchor_node() else {
            return;
        };
        let offset_utf16 = selection.anchor_offset();

        let element = match node.dyn_ref::<web_sys::Element>() {
            Some(el) => el.clone(),
            None => match node.parent_element() {
                Some(el) => el,
                None => return,
            },
        };

        let inline_el = element.closest("[data-inline]").ok().flatten();
        let Some(host_el) = element.closest("[data-path]").ok().flatten() else {
            return;
        };
        let Some(host) = host_el.get_attribute("data-path").as_deref().and_then(parse_path)
        else {
            return;
        };

        match inline_el {
            Some(inline_el) => {
                let Some(inline) = inline_el
                    .get_attribute("data-inline")
                    .and_then(|v| v.parse::<usize>().ok())
                else {
                    return;
                };
                let text = inline_el.text_content().unwrap_or_default();
                let offset = utf16_to_byte_idx(&text, offset_utf16);
                session.update(|s| {
                    s.set_caret(host, inline, offset);
                });
            }
            None => {
                session.update(|s| {
                    s.set_caret_host_end(host);
                });
            }
        }
        sync_suggestions();
    };

    let commit = move |candidate: Candidate| {
        let applied = session
            .try_update(|s| s.commit_candidate(&candidate))
            .unwrap_or(false);
        close_popup();
        if applied {
            after_edit();
        }
    };

    let on_keydown = move |ev: web_sys::KeyboardEvent| {
        if read_only.get_untracked() {
            return;
        }
        let key = ev.key();

        // The open popup owns the keyboard first.
        if core.with_untracked(|c| c.is_open()) {
            match core.try_update(|c| c.on_key(&key)).unwrap_or(KeyOutcome::Ignored) {
                KeyOutcome::Consumed => {
                    ev.prevent_default();
                    ev.stop_propagation();
                    return;
                }
                KeyOutcome::Close => {
                    ev.prevent_default();
                    ev.stop_propagation();
                    session.update(|s| s.clear_trigger());
                    anchor.try_set(None);
                    return;
                }
                KeyOutcome::Commit(candidate) => {
                    ev.prevent_default();
                    ev.stop_propagation();
                    commit(candidate);
                    return;
                }
                KeyOutcome::Ignored => {}
            }
        }

        if ev.ctrl_key() || ev.meta_key() {
            let mark = if ev.shift_key() && key.eq_ignore_ascii_case("x") {
                Some(Mark::Strike)
            } else {
                match key.as_str() {
                    "b" => Some(Mark::Bold),
                    "i" => Some(Mark::Italic),
                    "e" => Some(Mark::Code),
                    _ => None,
                }
            };
            if let Some(mark) = mark {
                ev.prevent_default();
                session.update(|s| s.toggle_mark(mark));
            }
            // Everything else (copy, paste, select-all) stays native.
            return;
        }

        match key.as_str() {
            "Enter" => {
                ev.prevent_default();
                if ev.shift_key() {
                    session.update(|s| s.insert_hard_break());
                } else {
                    session.update(|s| s.split_block());
                }
                after_edit();
            }
            "Backspace" => {
                ev.prevent_default();
                session.update(|s| s.backspace());
                after_edit();
            }
            _ => {
                // Single-char keys are printable input; named keys
                // (arrows, Home, Tab) keep their native behavior.
                let mut chars = key.chars();
                if let (Some(ch), None) = (chars.next(), chars.next()) {
                    ev.prevent_default();
                    let triggers = trigger_chars.get_value();
                    session.update(|s| s.insert_char(ch, &triggers));
                    after_edit();
                }
            }
        }
    };

    let on_paste = move |ev: web_sys::ClipboardEvent| {
        ev.prevent_default();
        if read_only.get_untracked() {
            return;
        }
        let Some(data) = ev.clipboard_data() else {
            return;
        };
        let Ok(text) = data.get_data("text/plain") else {
            return;
        };
        if text.is_empty() {
            return;
        }
        let triggers = trigger_chars.get_value();
        session.update(|s| {
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    s.split_block();
                }
                s.insert_text(line.trim_end_matches('\r'), &triggers);
            }
        });
        after_edit();
    };

    let on_blur = move |_| {
        // Menu rows commit on mousedown with default prevented, so a blur
        // here is a real focus loss.
        close_popup();
        session.update(|s| s.clear_trigger());
    };

    view! {
        <div class="relative">
            <div
                node_ref=editor_ref
                class="min-h-32 w-full rounded-md border border-input bg-background px-3 py-2 text-sm outline-none focus-visible:ring-2 focus-visible:ring-ring"
                contenteditable=move || (!read_only.get()).to_string()
                spellcheck="false"
                role="textbox"
                aria-multiline="true"
                on:keydown=on_keydown
                on:keyup=move |ev: web_sys::KeyboardEvent| {
                    if ev.key().starts_with("Arrow") {
                        sync_caret_from_dom();
                    }
                }
                on:click=move |_| sync_caret_from_dom()
                on:paste=on_paste
                on:blur=on_blur
            >
                {move || {
                    rev.track();
                    session.with_untracked(|s| render_editable(s.doc(), &[]))
                }}
            </div>
            <SuggestionMenu core anchor on_commit=Callback::new(commit) />
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_skips_echo_of_emitted_value() {
        let mut gate = SyncGate::seeded("{}");
        let emitted = gate.emit("doc-v1".to_string()).expect("first edit emits");

        // The parent writes the emitted value back into the prop.
        assert!(!gate.should_apply_external(&emitted));
        // A genuinely new external value still applies.
        assert!(gate.should_apply_external("doc-v2"));
    }

    #[test]
    fn test_gate_skips_repeat_external_value() {
        let mut gate = SyncGate::seeded("{}");
        assert!(gate.should_apply_external("doc-v1"));
        gate.note_external_applied("doc-v1");
        assert!(!gate.should_apply_external("doc-v1"));
    }

    #[test]
    fn test_external_apply_suppresses_exactly_one_notification() {
        let mut gate = SyncGate::seeded("{}");
        gate.note_external_applied("legacy plain text");

        // The replacement's own normalization pass is swallowed.
        assert!(gate.emit("normalized-doc".to_string()).is_none());
        // The next real edit goes out.
        assert!(gate.emit("normalized-doc-edited".to_string()).is_some());
    }

    #[test]
    fn test_gate_collapses_no_change_edits() {
        let mut gate = SyncGate::seeded("{}");
        assert!(gate.emit("doc-v1".to_string()).is_some());
        assert!(gate.emit("doc-v1".to_string()).is_none());
        assert!(gate.emit("doc-v2".to_string()).is_some());
    }

    #[test]
    fn test_initial_value_counts_as_seen() {
        let gate = SyncGate::seeded("doc-v1");
        assert!(!gate.should_apply_external("doc-v1"));
    }

    #[test]
    fn test_utf16_byte_conversion() {
        let s = "a\u{20ac}\u{1f600}b";
        assert_eq!(utf16_to_byte_idx(s, 0), 0);
        assert_eq!(utf16_to_byte_idx(s, 1), 1);
        assert_eq!(utf16_to_byte_idx(s, 2), 4);
        // Surrogate pair counts as two UTF-16 units.
        assert_eq!(utf16_to_byte_idx(s, 4), 8);
        assert_eq!(utf16_to_byte_idx(s, 99), s.len());

        assert_eq!(byte_idx_to_utf16(s, 4), 2);
        assert_eq!(byte_idx_to_utf16(s, 8), 4);
        assert_eq!(byte_idx_to_utf16(s, 999), 5);
    }

    #[test]
    fn test_path_attr_round_trip() {
        assert_eq!(path_attr(&[0, 2, 1]), "0.2.1");
        assert_eq!(parse_path("0.2.1"), Some(vec![0, 2, 1]));
        assert_eq!(parse_path("x"), None);
    }
}
