use leptos::prelude::*;
use leptos_ui::clx;

mod components {
    use super::*;
    clx! {MenuSurface, div, "fixed z-50 min-w-56 max-w-80 overflow-hidden rounded-md border bg-popover p-1 text-popover-foreground shadow-md"}
    clx! {MenuHint, div, "flex items-center px-2 py-1.5 text-sm text-muted-foreground"}
}

#[allow(unused_imports)]
pub use components::*;
