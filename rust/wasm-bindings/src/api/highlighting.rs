// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Highlighting and quantity table methods

use super::{spawn_promise, WebViewer};
use crate::error::BindingError;
use crate::utils::to_js;
use ifc_view_core::{TableEvent, DEFAULT_GROUP};
use js_sys::{Array, Promise};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
impl WebViewer {
    /// Highlight every element of an IFC type
    #[wasm_bindgen(js_name = highlightByType)]
    pub fn highlight_by_type(&self, element_type: String) -> Promise {
        let viewport = self.viewport.clone();
        spawn_promise(async move {
            viewport.highlight_by_type(&element_type).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Highlight every element on a building level
    #[wasm_bindgen(js_name = highlightByLevel)]
    pub fn highlight_by_level(&self, level: String) -> Promise {
        let viewport = self.viewport.clone();
        spawn_promise(async move {
            viewport.highlight_by_level(&level).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = resetHighlight)]
    pub fn reset_highlight(&self) -> Result<(), JsValue> {
        self.viewport
            .reset_highlight()
            .map_err(|e| JsValue::from(BindingError::from(e)))
    }

    /// Feed a table interaction, e.g. `{ type: "row-click", elementType: "Wall" }`
    #[wasm_bindgen(js_name = handleTableEvent)]
    pub fn handle_table_event(&self, event: JsValue) -> Result<Promise, JsValue> {
        let event: TableEvent =
            serde_wasm_bindgen::from_value(event).map_err(|e| JsValue::from(BindingError::from(e)))?;
        let viewport = self.viewport.clone();
        Ok(spawn_promise(async move {
            viewport.handle_table_event(&event).await?;
            Ok(JsValue::UNDEFINED)
        }))
    }

    /// Highlighted element ids of `group` (default group when omitted), sorted
    #[wasm_bindgen]
    pub fn selection(&self, group: Option<String>) -> Array {
        let mut ids: Vec<String> = self
            .viewport
            .selection(group.as_deref().unwrap_or(DEFAULT_GROUP))
            .into_iter()
            .map(|id| id.0)
            .collect();
        ids.sort();
        ids.into_iter().map(JsValue::from).collect()
    }

    /// Re-fetch quantities and rebuild the table; resolves with its rows
    #[wasm_bindgen(js_name = refreshQuantities)]
    pub fn refresh_quantities(&self) -> Promise {
        let viewport = self.viewport.clone();
        spawn_promise(async move {
            let table = viewport.refresh_quantities().await?;
            Ok(to_js(&table.records())?)
        })
    }
}
