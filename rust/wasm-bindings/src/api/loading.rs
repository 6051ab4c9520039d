// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model loading and readiness methods

use super::{spawn_promise, WebViewer};
use crate::error::BindingError;
use crate::utils::{js_message, now_ms, to_js};
use ifc_view_core::Capability;
use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
impl WebViewer {
    /// Load a model and resolve with its description
    ///
    /// Rejects when the viewer is not ready, the download fails or the
    /// engine cannot parse the payload. The scene is unchanged in every
    /// rejected case.
    ///
    /// Example:
    /// ```javascript
    /// const model = await viewer.load('/api/system_model/download');
    /// console.log(model.id, model.schema);
    /// ```
    #[wasm_bindgen]
    pub fn load(&self, endpoint: Option<String>) -> Promise {
        let viewport = self.viewport.clone();
        let endpoint = endpoint.unwrap_or_else(|| viewport.config().endpoint.clone());
        spawn_promise(async move {
            let started = now_ms();
            let model = match viewport.load(&endpoint).await {
                Ok(model) => model,
                Err(e) => {
                    e.log("Error loading IFC");
                    return Err(e.into());
                }
            };
            tracing::info!(model = %model.id, elapsed_ms = now_ms() - started, "Model ready");
            Ok(to_js(&model)?)
        })
    }

    /// Same as the "Load IFC" button: load from the configured endpoint,
    /// report failures on the status line and resolve with `null`.
    #[wasm_bindgen(js_name = loadDefault)]
    pub fn load_default(&self) -> Promise {
        let viewport = self.viewport.clone();
        spawn_promise(async move {
            match viewport.trigger_load().await {
                Some(model) => Ok(to_js(&model)?),
                None => Ok(JsValue::NULL),
            }
        })
    }

    /// Register `callback({ endpoint, stage, percent })` for every load
    #[wasm_bindgen(js_name = onProgress)]
    pub fn on_progress(&self, callback: Function) {
        self.viewport.on_progress(move |event| {
            let result = to_js(event).and_then(|value| callback.call1(&JsValue::NULL, &value));
            if let Err(e) = result {
                tracing::warn!(error = %js_message(&e), "Progress callback failed");
            }
        });
    }

    /// Resolve once `capability` (`scene`, `worker` or `highlighter`) is
    /// available; reject if the viewer is disposed first
    #[wasm_bindgen(js_name = whenReady)]
    pub fn when_ready(&self, capability: &str) -> Result<Promise, JsValue> {
        let cap = Capability::from_name(capability)
            .ok_or_else(|| BindingError::UnknownCapability(capability.to_string()))?;
        let ready = self.viewport.when_ready(cap);
        Ok(spawn_promise(async move {
            ready.await?;
            Ok(JsValue::UNDEFINED)
        }))
    }
}
