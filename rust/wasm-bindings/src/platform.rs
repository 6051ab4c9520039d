// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Browser implementations of the pipeline's platform services.

use crate::utils::js_message;
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use ifc_view_core::{Fetcher, HttpResponse, ModuleRegistry, SurfaceObserver, SurfaceSize};
use js_sys::{Array, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{File, FilePropertyBag, HtmlElement, ResizeObserver, ResizeObserverEntry, Response, Url};

/// `window.fetch` based [`Fetcher`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserFetcher;

async fn fetch(url: &str) -> Result<HttpResponse, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("window is unavailable"))?;
    let response: Response = JsFuture::from(window.fetch_with_str(url))
        .await?
        .dyn_into()
        .map_err(|_| JsValue::from_str("fetch did not return a Response"))?;

    let status = response.status();
    if !response.ok() {
        return Ok(HttpResponse::status(status));
    }

    let buffer = JsFuture::from(response.array_buffer()?).await?;
    Ok(HttpResponse {
        status,
        body: Uint8Array::new(&buffer).to_vec(),
    })
}

impl Fetcher for BrowserFetcher {
    fn get(&self, url: &str) -> LocalBoxFuture<'static, Result<HttpResponse, String>> {
        let url = url.to_string();
        async move { fetch(&url).await.map_err(|e| js_message(&e)) }.boxed_local()
    }
}

/// Materializes module sources as `blob:` object URLs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlobModuleRegistry;

impl ModuleRegistry for BlobModuleRegistry {
    fn create_module_url(&self, source: &[u8], file_name: &str, mime_type: &str) -> Result<String, String> {
        let parts = Array::new();
        parts.push(&Uint8Array::from(source));

        let options = FilePropertyBag::new();
        options.set_type(mime_type);
        let file = File::new_with_u8_array_sequence_and_options(&parts, file_name, &options)
            .map_err(|e| format!("cannot create {file_name}: {}", js_message(&e)))?;

        Url::create_object_url_with_blob(&file).map_err(|e| format!("cannot create object URL: {}", js_message(&e)))
    }

    fn revoke(&self, url: &str) {
        if let Err(e) = Url::revoke_object_url(url) {
            tracing::warn!(url, error = %js_message(&e), "Failed to revoke object URL");
        }
    }
}

type ResizeCallback = Closure<dyn FnMut(Array, ResizeObserver)>;

/// `ResizeObserver` on the viewer container.
pub struct ResizeWatcher {
    observer: ResizeObserver,
    _callback: ResizeCallback,
}

impl ResizeWatcher {
    /// Observe `container`, calling `on_resize` with each new content size.
    pub fn watch(container: &HtmlElement, mut on_resize: impl FnMut(SurfaceSize) + 'static) -> Result<Self, JsValue> {
        let callback = Closure::wrap(Box::new(move |entries: Array, _observer: ResizeObserver| {
            let last = entries.length().checked_sub(1).map(|i| entries.get(i));
            if let Some(entry) = last.and_then(|e| e.dyn_into::<ResizeObserverEntry>().ok()) {
                let rect = entry.content_rect();
                on_resize(SurfaceSize::new(rect.width(), rect.height()));
            }
        }) as Box<dyn FnMut(Array, ResizeObserver)>);

        let observer = ResizeObserver::new(callback.as_ref().unchecked_ref())?;
        observer.observe(container);
        Ok(Self {
            observer,
            _callback: callback,
        })
    }
}

impl SurfaceObserver for ResizeWatcher {
    fn disconnect(&self) {
        self.observer.disconnect();
    }
}

impl Drop for ResizeWatcher {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}
