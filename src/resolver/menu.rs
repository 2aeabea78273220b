use leptos::prelude::*;

use crate::components::ui::menu::{MenuHint, MenuSurface};
use crate::components::ui::spinner::Spinner;
use crate::resolver::{Candidate, SuggestionCore, SuggestionState};

/// Floating suggestion list anchored under the caret.
///
/// Purely presentational: all protocol state lives in [`SuggestionCore`],
/// which the authoring surface owns. Rows commit on mousedown so the
/// editor never loses its selection to the click.
#[component]
pub fn SuggestionMenu(
    core: RwSignal<SuggestionCore>,
    anchor: RwSignal<Option<(f64, f64)>>,
    on_commit: Callback<Candidate>,
) -> impl IntoView {
    let position = move || {
        let (x, y) = anchor.get().unwrap_or((0.0, 0.0));
        format!("left: {x}px; top: {y}px;")
    };

    let visible = move || core.read().is_open() && anchor.read().is_some();

    view! {
        <Show when=visible fallback=|| ().into_view()>
            <MenuSurface attr:style=position attr:role="listbox">
                {move || match core.read().state() {
                    SuggestionState::Closed => ().into_any(),
                    SuggestionState::PendingHint => {
                        view! { <MenuHint>"Typ om te zoeken"</MenuHint> }.into_any()
                    }
                    SuggestionState::Loading => view! {
                        <MenuHint>
                            <Spinner class="mr-2" />
                            "Zoeken..."
                        </MenuHint>
                    }
                    .into_any(),
                    SuggestionState::Open => {
                        let items = core.read().items().to_vec();
                        if items.is_empty() {
                            view! { <MenuHint>"Geen resultaten"</MenuHint> }.into_any()
                        } else {
                            items
                                .into_iter()
                                .enumerate()
                                .map(|(index, candidate)| {
                                    view! {
                                        <SuggestionRow index candidate core on_commit />
                                    }
                                })
                                .collect_view()
                                .into_any()
                        }
                    }
                }}
            </MenuSurface>
        </Show>
    }
}

#[component]
fn SuggestionRow(
    index: usize,
    candidate: Candidate,
    core: RwSignal<SuggestionCore>,
    on_commit: Callback<Candidate>,
) -> impl IntoView {
    let selected = move || core.read().highlighted() == index;
    let committed = candidate.clone();
    let sigil = candidate.kind.sigil();

    view! {
        <div
            class="flex cursor-pointer items-baseline gap-2 rounded-sm px-2 py-1.5 text-sm aria-selected:bg-muted"
            role="option"
            aria-selected=move || selected().to_string()
            // mousedown, not click: the editor must keep focus and caret.
            on:mousedown=move |ev| {
                ev.prevent_default();
                core.update(|c| c.close());
                on_commit.run(committed.clone());
            }
            on:mouseenter=move |_| {
                core.update(|c| c.set_highlighted(index));
            }
        >
            <span class="text-muted-foreground">{sigil}</span>
            <span class="font-medium">{candidate.label.clone()}</span>
            {candidate.subtitle.clone().map(|subtitle| {
                view! { <span class="ml-auto text-xs text-muted-foreground">{subtitle}</span> }
            })}
        </div>
    }
}
