// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-View WebAssembly Bindings
//!
//! Browser front end of the viewport pipeline: `fetch`, `blob:` worker URLs,
//! `ResizeObserver`, DOM overlays and a bridge to the JavaScript 3D engine.

use wasm_bindgen::prelude::*;

#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

mod api;
mod bridge;
mod dom;
mod error;
mod platform;
mod utils;

pub use api::WebViewer;
pub use bridge::{EngineBridge, JsEngine};
pub use dom::{ActionHandler, DomUiHost};
pub use error::{BindingError, BindingResult};
pub use platform::{BlobModuleRegistry, BrowserFetcher, ResizeWatcher};
pub use utils::set_panic_hook as init_panic_hook;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Route log output to the browser console.
///
/// `filter` uses `tracing` directive syntax, e.g. `"info,ifc_view_core=debug"`.
/// Returns `false` if logging was already initialized.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(filter: Option<String>) -> bool {
    utils::init_logging(filter.as_deref())
}

/// Get the version of IFC-View
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
