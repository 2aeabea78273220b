mod api;
mod app;
mod components;
pub mod doc;
mod pages;
pub mod render;
pub mod resolver;
mod state;
pub mod surface;

use leptos::prelude::*;

use crate::app::App;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    mount_to_body(App);
}

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use wasm_bindgen_test::*;

    use crate::api::EnvConfig;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_env_config_defaults_without_window_env() {
        let config = EnvConfig::new();
        assert_eq!(config.api_url, "http://localhost:6689");
    }

    #[wasm_bindgen_test]
    fn test_env_config_reads_window_env() {
        let window = web_sys::window().expect("window");
        let env = js_sys::Object::new();
        js_sys::Reflect::set(&env, &"API_URL".into(), &"https://corpus.test".into())
            .expect("set API_URL");
        js_sys::Reflect::set(&window, &"ENV".into(), &env).expect("set ENV");

        let config = EnvConfig::new();
        assert_eq!(config.api_url, "https://corpus.test");

        js_sys::Reflect::set(&window, &"ENV".into(), &wasm_bindgen::JsValue::UNDEFINED)
            .expect("unset ENV");
    }
}
