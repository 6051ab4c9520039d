// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::utils::js_message;
use ifc_view_core::ViewerError;
use thiserror::Error;
use wasm_bindgen::JsValue;

/// Errors surfaced to JavaScript callers
#[derive(Error, Debug)]
pub enum BindingError {
    #[error(transparent)]
    Viewer(#[from] ViewerError),

    #[error("Invalid argument: {0}")]
    Argument(#[from] serde_wasm_bindgen::Error),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("{0}")]
    Js(String),
}

impl From<JsValue> for BindingError {
    fn from(value: JsValue) -> Self {
        BindingError::Js(js_message(&value))
    }
}

impl From<BindingError> for JsValue {
    fn from(err: BindingError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

pub type BindingResult<T> = Result<T, BindingError>;
