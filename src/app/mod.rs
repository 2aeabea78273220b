use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

use crate::pages::{ComposerPage, OrganisatiesPage};
use crate::state::{AppContext, AppState};

#[component]
pub fn App() -> impl IntoView {
    provide_context(AppContext(AppState::new()));

    // Leptos CSR requires the `csr` feature on `leptos`; router hooks
    // require a <Router> context.
    view! {
        <Router>
            <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Not found"</div> }>
                <Route path=path!("organisaties") view=OrganisatiesPage />
                <Route path=path!("") view=ComposerPage />
            </Routes>
        </Router>
    }
}
