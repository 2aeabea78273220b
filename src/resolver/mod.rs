//! Suggestion engine behind the `@`/`#` triggers.
//!
//! The reactive component half lives in `menu.rs`; this module is the
//! synchronous core the authoring surface drives: trigger lifecycle,
//! debounce generations, request sequencing and the keyboard protocol.
//! Keeping it free of timers and DOM makes the protocol testable on the
//! host target.

mod menu;

pub use menu::SuggestionMenu;

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::doc::RefKind;

/// Debounce window between the last keystroke and the provider call.
pub(crate) const DEBOUNCE_MS: i32 = 150;

/// A search-result item eligible for insertion as a reference node.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub label: String,
    pub subtitle: Option<String>,
    pub kind: RefKind,
}

pub type Provider = Rc<dyn Fn(String) -> Pin<Box<dyn Future<Output = Vec<Candidate>>>>>;

/// Per-trigger-character configuration. `needs_query` providers are never
/// called with an empty query; the popup shows a "keep typing" hint row
/// instead.
#[derive(Clone)]
pub struct TriggerConfig {
    pub trigger: char,
    pub needs_query: bool,
    pub provider: Provider,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuggestionState {
    Closed,
    /// Trigger typed, nothing debounced yet (or empty query on a
    /// `needs_query` trigger).
    PendingHint,
    Loading,
    Open,
}

/// Outcome of feeding one keystroke to the open popup.
#[derive(Clone, Debug, PartialEq)]
pub enum KeyOutcome {
    /// Not ours; let the editing surface handle it.
    Ignored,
    /// Handled; the caller must stop default handling and propagation
    /// (Escape in particular must not reach an enclosing modal).
    Consumed,
    Commit(Candidate),
    Close,
}

#[derive(Clone)]
pub struct SuggestionCore {
    state: SuggestionState,
    needs_query: bool,
    query: String,
    items: Vec<Candidate>,
    highlighted: usize,
    // Debounce: only the timer armed for the newest generation may fire.
    debounce_gen: u64,
    // Request sequencing: a response is dropped unless it answers the
    // latest issued request, so a slow early request can never overwrite
    // a fresher result.
    request_seq: u64,
}

impl SuggestionCore {
    pub fn new() -> Self {
        Self {
            state: SuggestionState::Closed,
            needs_query: false,
            query: String::new(),
            items: vec![],
            highlighted: 0,
            debounce_gen: 0,
            request_seq: 0,
        }
    }

    pub fn state(&self) -> SuggestionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != SuggestionState::Closed
    }

    pub fn items(&self) -> &[Candidate] {
        &self.items
    }

    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    /// Pointer hover moves the highlight too.
    pub fn set_highlighted(&mut self, index: usize) {
        if index < self.items.len() {
            self.highlighted = index;
        }
    }

    /// Trigger character just typed: open in pending state, no call yet.
    pub fn open(&mut self, needs_query: bool) {
        self.state = SuggestionState::PendingHint;
        self.needs_query = needs_query;
        self.query.clear();
        self.items.clear();
        self.highlighted = 0;
    }

    /// Record the live query and restart the debounce window. Returns the
    /// generation the caller should arm its timer with.
    pub fn note_keystroke(&mut self, query: &str) -> u64 {
        self.query = query.to_string();
        self.debounce_gen += 1;
        self.debounce_gen
    }

    /// Debounce timer elapsed. `None` when a newer keystroke superseded
    /// this timer or the popup closed in the meantime; otherwise the
    /// request to issue: (sequence number, query snapshot).
    pub fn fire(&mut self, generation: u64) -> Option<(u64, String)> {
        if self.state == SuggestionState::Closed || generation != self.debounce_gen {
            return None;
        }

        if self.query.is_empty() && self.needs_query {
            self.state = SuggestionState::PendingHint;
            return None;
        }

        self.request_seq += 1;
        self.state = SuggestionState::Loading;
        Some((self.request_seq, self.query.clone()))
    }

    /// Provider response. Out-of-order completions (stale sequence
    /// numbers) are discarded.
    pub fn apply_results(&mut self, seq: u64, items: Vec<Candidate>) {
        if self.state == SuggestionState::Closed || seq != self.request_seq {
            return;
        }

        self.items = items;
        self.highlighted = 0;
        self.state = SuggestionState::Open;
    }

    pub fn on_key(&mut self, key: &str) -> KeyOutcome {
        if self.state == SuggestionState::Closed {
            return KeyOutcome::Ignored;
        }

        let n = self.items.len();
        match key {
            "ArrowDown" => {
                if n > 0 {
                    self.highlighted = (self.highlighted + 1) % n;
                }
                KeyOutcome::Consumed
            }
            "ArrowUp" => {
                if n > 0 {
                    self.highlighted = (self.highlighted + n - 1) % n;
                }
                KeyOutcome::Consumed
            }
            "Enter" => {
                if self.state == SuggestionState::Open && n > 0 {
                    let candidate = self.items[self.highlighted.min(n - 1)].clone();
                    self.close();
                    KeyOutcome::Commit(candidate)
                } else {
                    // Empty list: a no-op, but still ours while open.
                    KeyOutcome::Consumed
                }
            }
            "Escape" => {
                self.close();
                KeyOutcome::Close
            }
            _ => KeyOutcome::Ignored,
        }
    }

    pub fn close(&mut self) {
        self.state = SuggestionState::Closed;
        self.query.clear();
        self.items.clear();
        self.highlighted = 0;
    }
}

impl Default for SuggestionCore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            label: id.to_string(),
            subtitle: None,
            kind: RefKind::Person,
        }
    }

    fn open_with(items: Vec<Candidate>) -> SuggestionCore {
        let mut core = SuggestionCore::new();
        core.open(false);
        let generation = core.note_keystroke("q");
        let (seq, _) = core.fire(generation).expect("latest generation fires");
        core.apply_results(seq, items);
        core
    }

    #[test]
    fn test_debounce_coalesces_to_last_keystroke() {
        let mut core = SuggestionCore::new();
        core.open(false);

        let generations: Vec<u64> = ["j", "ja", "jan", "jane", "jane "]
            .iter()
            .map(|q| core.note_keystroke(q))
            .collect();

        // All five timers eventually elapse; only the newest one fires.
        let fired: Vec<(u64, String)> = generations
            .into_iter()
            .filter_map(|generation| core.fire(generation))
            .collect();

        assert_eq!(fired, vec![(1, "jane ".to_string())]);
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut core = SuggestionCore::new();
        core.open(false);

        let g1 = core.note_keystroke("ja");
        let (seq1, _) = core.fire(g1).expect("fires");

        let g2 = core.note_keystroke("jane");
        let (seq2, _) = core.fire(g2).expect("fires");

        // Slow first request resolves after the fresher one.
        core.apply_results(seq2, vec![candidate("fresh")]);
        core.apply_results(seq1, vec![candidate("stale")]);

        assert_eq!(core.items(), &[candidate("fresh")]);
        assert_eq!(core.state(), SuggestionState::Open);
    }

    #[test]
    fn test_empty_query_on_hint_trigger_skips_provider() {
        let mut core = SuggestionCore::new();
        core.open(true);

        let generation = core.note_keystroke("");
        assert_eq!(core.fire(generation), None);
        assert_eq!(core.state(), SuggestionState::PendingHint);
    }

    #[test]
    fn test_keyboard_wraparound() {
        let mut core = open_with(vec![candidate("a"), candidate("b"), candidate("c")]);

        assert_eq!(core.highlighted(), 0);
        assert_eq!(core.on_key("ArrowUp"), KeyOutcome::Consumed);
        assert_eq!(core.highlighted(), 2);

        assert_eq!(core.on_key("ArrowDown"), KeyOutcome::Consumed);
        assert_eq!(core.highlighted(), 0);
    }

    #[test]
    fn test_enter_commits_highlighted_candidate() {
        let mut core = open_with(vec![candidate("a"), candidate("b")]);
        core.on_key("ArrowDown");

        assert_eq!(core.on_key("Enter"), KeyOutcome::Commit(candidate("b")));
        assert!(!core.is_open());
    }

    #[test]
    fn test_enter_on_empty_list_is_a_noop() {
        let mut core = open_with(vec![]);
        assert_eq!(core.on_key("Enter"), KeyOutcome::Consumed);
        assert!(core.is_open());
    }

    #[test]
    fn test_escape_closes_and_is_consumed() {
        let mut core = open_with(vec![candidate("a")]);
        assert_eq!(core.on_key("Escape"), KeyOutcome::Close);
        assert!(!core.is_open());

        // Closed popup never swallows keys.
        assert_eq!(core.on_key("Escape"), KeyOutcome::Ignored);
    }

    #[test]
    fn test_timer_from_before_close_never_fires() {
        let mut core = SuggestionCore::new();
        core.open(false);
        let generation = core.note_keystroke("ja");
        core.close();

        assert_eq!(core.fire(generation), None);
    }
}
