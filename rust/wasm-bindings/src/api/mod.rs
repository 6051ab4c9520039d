// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JavaScript API for IFC-View
//!
//! One [`WebViewer`] per container element. Async methods return promises
//! that reject with an `Error` whose message is the pipeline error.

mod highlighting;
mod loading;

use crate::bridge::{EngineBridge, JsEngine};
use crate::dom::DomUiHost;
use crate::error::{BindingError, BindingResult};
use crate::platform::{BlobModuleRegistry, BrowserFetcher, ResizeWatcher};
use crate::utils::{self, to_js};
use gloo_timers::future::TimeoutFuture;
use ifc_view_core::{Services, StaticElementQuery, StaticQuantityProvider, UiAction, ViewerConfig, Viewport};
use js_sys::Promise;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, HtmlElement};

/// Run `future` on the browser's event loop and expose it as a promise.
pub(crate) fn spawn_promise<F>(future: F) -> Promise
where
    F: Future<Output = BindingResult<JsValue>> + 'static,
{
    let mut future = Some(future);
    Promise::new(&mut |resolve, reject| {
        let Some(future) = future.take() else {
            return;
        };
        spawn_local(async move {
            match future.await {
                Ok(value) => {
                    let _ = resolve.call1(&JsValue::NULL, &value);
                }
                Err(e) => {
                    let _ = reject.call1(&JsValue::NULL, &JsValue::from(e));
                }
            }
        });
    })
}

/// Plain object, JSON string, or nothing for the defaults.
fn parse_config(config: JsValue) -> BindingResult<ViewerConfig> {
    if config.is_undefined() || config.is_null() {
        return Ok(ViewerConfig::default());
    }
    if let Some(json) = config.as_string() {
        return Ok(ViewerConfig::from_json(&json)?);
    }
    Ok(serde_wasm_bindgen::from_value(config)?)
}

/// Browser viewer bound to one container element.
#[wasm_bindgen]
pub struct WebViewer {
    viewport: Viewport<JsEngine>,
    ui: Rc<DomUiHost>,
    engine: EngineBridge,
    camera_rest: RefCell<Option<Closure<dyn FnMut()>>>,
}

#[wasm_bindgen]
impl WebViewer {
    /// Create a viewer in `container`, driving `engine`.
    ///
    /// Initialization starts by itself once the container has a nonzero
    /// height. `config` is a plain object or a JSON string and may be
    /// omitted; missing fields take their defaults.
    ///
    /// Example:
    /// ```javascript
    /// const viewer = new WebViewer(document.getElementById('viewer'), engine, {
    ///   endpoint: '/api/system_model/download',
    ///   loadPolicy: 'serialized',
    /// });
    /// await viewer.whenReady('worker');
    /// const model = await viewer.load();
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(container: HtmlElement, engine: EngineBridge, config: JsValue) -> Result<WebViewer, JsValue> {
        Self::create(container, engine, config).map_err(JsValue::from)
    }

    /// Current lifecycle state, e.g. `{ state: "ready", models: 1 }`.
    #[wasm_bindgen]
    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.viewport.state())
    }

    #[wasm_bindgen(getter, js_name = stateName)]
    pub fn state_name(&self) -> String {
        self.viewport.state().as_str().to_string()
    }

    /// Children of the scene root as `{ id, kind, model? }` objects.
    #[wasm_bindgen(js_name = sceneChildren)]
    pub fn scene_children(&self) -> Result<JsValue, JsValue> {
        to_js(&self.viewport.scene_children())
    }

    /// Models inserted so far.
    #[wasm_bindgen]
    pub fn models(&self) -> Result<JsValue, JsValue> {
        to_js(&self.viewport.models())
    }

    #[wasm_bindgen(getter, js_name = workerUrl)]
    pub fn worker_url(&self) -> Option<String> {
        self.viewport.worker_url()
    }

    /// Release the scene, worker URL and overlays. Safe to call repeatedly.
    #[wasm_bindgen]
    pub fn dispose(&self) {
        self.viewport.teardown();
        self.ui.detach();
        if let Some(callback) = self.camera_rest.borrow_mut().take() {
            if let Err(e) = self.engine.off_camera_rest(callback.as_ref().unchecked_ref()) {
                // The engine keeps calling it; the weak viewport makes that a no-op
                tracing::warn!(error = %utils::js_message(&e), "Cannot unregister camera rest callback");
                callback.forget();
            }
        }
    }
}

impl WebViewer {
    fn create(container: HtmlElement, engine: EngineBridge, config: JsValue) -> BindingResult<Self> {
        utils::init_logging(None);
        let config = parse_config(config)?;

        let document = container
            .owner_document()
            .ok_or_else(|| BindingError::Js("container is not attached to a document".into()))?;
        let overlay_parent: Element = match document.body() {
            Some(body) => body.unchecked_into(),
            None => container.clone().unchecked_into(),
        };
        let ui = Rc::new(DomUiHost::new(overlay_parent)?);

        let services = Services {
            fetcher: Rc::new(BrowserFetcher),
            modules: Rc::new(BlobModuleRegistry),
            ui: ui.clone(),
            quantities: Rc::new(StaticQuantityProvider::reference()),
            elements: Rc::new(StaticElementQuery::reference()),
        };
        let viewport = Viewport::new(JsEngine::new(engine.clone()), config, services)?;

        let weak = viewport.downgrade();
        ui.set_action_handler(Rc::new(move |action: UiAction| {
            let Some(viewport) = weak.upgrade() else {
                return;
            };
            spawn_local(async move {
                // Let the click handler return before the work starts
                TimeoutFuture::new(0).await;
                viewport.dispatch(action).await;
            });
        }));

        let weak = viewport.downgrade();
        let camera_rest = Closure::wrap(Box::new(move || {
            if let Some(viewport) = weak.upgrade() {
                viewport.on_camera_rest();
            }
        }) as Box<dyn FnMut()>);
        engine.on_camera_rest(camera_rest.as_ref().unchecked_ref());

        let weak = viewport.downgrade();
        let watcher = ResizeWatcher::watch(&container, move |size| {
            let Some(viewport) = weak.upgrade() else {
                return;
            };
            if let Some(init) = viewport.observe(size) {
                spawn_local(async move {
                    if let Err(e) = init.await {
                        tracing::debug!(error = %e, "Viewport initialization ended early");
                    }
                });
            }
        })?;
        viewport.mount(Some(Box::new(watcher)));

        tracing::info!(version = env!("CARGO_PKG_VERSION"), "Viewer created");
        Ok(Self {
            viewport,
            ui,
            engine,
            camera_rest: RefCell::new(Some(camera_rest)),
        })
    }
}

impl Drop for WebViewer {
    fn drop(&mut self) {
        self.dispose();
    }
}
