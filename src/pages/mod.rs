use leptos::prelude::*;
use leptos_router::hooks::{use_navigate, use_query_map};

use crate::api::{hashtag_trigger, mention_trigger};
use crate::components::ui::{
    Button, ButtonSize, ButtonVariant, Card, CardContent, CardDescription, CardHeader, CardTitle,
};
use crate::doc::{parse, RefKind};
use crate::render::{render_doc, RenderHandlers};
use crate::state::AppContext;
use crate::surface::AuthoringSurface;

const SEED_DOCUMENT: &str = r#"{"kind":"document","content":[{"kind":"heading","attrs":{"level":2},"content":[{"kind":"text","text":"Nieuwe notitie"}]},{"kind":"paragraph","content":[{"kind":"text","text":"Typ @ voor personen en organisaties, # voor dossiers, taken en tags."}]}]}"#;

/// Editor and live preview side by side, with the entity detail pane
/// underneath when a chip is clicked.
#[component]
pub fn ComposerPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let value = RwSignal::new(SEED_DOCUMENT.to_string());
    let read_only = RwSignal::new(false);

    let client = app_state.0.search_client.get_untracked();
    let triggers = vec![mention_trigger(client.clone()), hashtag_trigger(client)];

    let navigate = StoredValue::new(use_navigate());
    let open_detail = app_state.0.open_detail;
    let handlers = RenderHandlers {
        navigate: Callback::new(move |path: String| {
            navigate.with_value(|nav| nav(&path, Default::default()));
        }),
        open_entity_detail: Callback::new(move |(kind, id): (RefKind, String)| {
            open_detail.set(Some((kind, id)));
        }),
    };

    view! {
        <div class="mx-auto flex max-w-5xl flex-col gap-4 px-4 py-8">
            <div class="flex items-center justify-between">
                <h1 class="text-lg font-semibold">"Opsteller"</h1>
                <Button
                    variant=ButtonVariant::Outline
                    size=ButtonSize::Sm
                    on:click=move |_| read_only.update(|v| *v = !*v)
                >
                    {move || if read_only.get() { "Bewerken" } else { "Alleen-lezen" }}
                </Button>
            </div>

            <div class="grid gap-4 md:grid-cols-2">
                <AuthoringSurface
                    value=value
                    on_change=Callback::new(move |next: String| value.set(next))
                    read_only=read_only
                    autofocus=true
                    triggers=triggers
                />

                <Card>
                    <CardHeader>
                        <CardTitle>"Voorbeeld"</CardTitle>
                        <CardDescription>"Zoals lezers het zien"</CardDescription>
                    </CardHeader>
                    <CardContent>
                        {
                            let handlers = handlers.clone();
                            move || render_doc(&parse(&value.get()), &handlers)
                        }
                    </CardContent>
                </Card>
            </div>

            <DetailPane />
        </div>
    }
}

#[component]
fn DetailPane() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let open_detail = app_state.0.open_detail;

    move || {
        open_detail.get().map(|(kind, id)| {
            let title = match kind {
                RefKind::CorpusNode => "Dossier",
                RefKind::Task => "Taak",
                RefKind::Person => "Persoon",
                RefKind::Organisatie => "Organisatie",
                RefKind::Tag => "Tag",
            };
            view! {
                <Card>
                    <CardHeader>
                        <CardTitle>{title}</CardTitle>
                        <CardDescription>{id.clone()}</CardDescription>
                    </CardHeader>
                    <CardContent>
                        <Button
                            variant=ButtonVariant::Ghost
                            size=ButtonSize::Sm
                            on:click=move |_| open_detail.set(None)
                        >
                            "Sluiten"
                        </Button>
                    </CardContent>
                </Card>
            }
        })
    }
}

/// Landing page for organisation chips; `?ref=` carries the clicked
/// organisation id.
#[component]
pub fn OrganisatiesPage() -> impl IntoView {
    let query = use_query_map();
    let selected = move || query.get().get("ref");

    view! {
        <div class="mx-auto max-w-3xl px-4 py-8">
            <Card>
                <CardHeader>
                    <CardTitle>"Organisaties"</CardTitle>
                    <CardDescription>
                        {move || match selected() {
                            Some(id) => format!("Gefilterd op {id}"),
                            None => "Alle organisaties".to_string(),
                        }}
                    </CardDescription>
                </CardHeader>
                <CardContent>
                    <Button variant=ButtonVariant::Outline size=ButtonSize::Sm href="/">
                        "Terug naar opsteller"
                    </Button>
                </CardContent>
            </Card>
        </div>
    }
}
