use leptos::prelude::*;

use crate::api::SearchClient;
use crate::doc::RefKind;

#[derive(Clone)]
pub(crate) struct AppState {
    pub search_client: RwSignal<SearchClient>,

    /// Entity detail pane target, set by clicking a node or task chip in
    /// rendered content. `None` closes the pane.
    pub open_detail: RwSignal<Option<(RefKind, String)>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            search_client: RwSignal::new(SearchClient::new()),
            open_detail: RwSignal::new(None),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Newtype wrapper for `provide_context`.
#[derive(Clone)]
pub(crate) struct AppContext(pub AppState);
