// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge to the JavaScript 3D/BIM engine.
//!
//! The host page passes an object implementing the methods below. Each one is
//! a thin wrapper over the engine's components:
//!
//! ## Scene
//! - `createWorld(width, height)` - clear the container, create scene, camera and renderer
//! - `addGrid()` - install the reference grid
//! - `setLookAt(px, py, pz, tx, ty, tz, orthographic)` - place the camera
//! - `update(force)` - request a scene update
//! - `dispose()` - release renderer and scene; must tolerate repeated calls and
//!   a world that was never created
//! - `onCameraRest(callback)` - call `callback` whenever camera controls come to rest
//! - `offCameraRest(callback)` - stop calling `callback`
//!
//! ## Loading
//! - `setupLoader(config)` - point the IFC parser at its wasm files
//! - `initWorker(url)` - start the fragments worker from a module URL
//! - `load(bytes, name, fragments, coordinate, onProgress): Promise<model>`
//! - `bindCamera(model)` - make the model follow the camera
//! - `addToScene(model)` - add the model's render object to the scene
//!
//! ## Highlighting
//! - `highlight(group, ids, color, opacity, transparent, renderedFaces)`
//! - `clearHighlight(group)`

use crate::utils::{js_message, to_js};
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use ifc_view_core::config::{HighlightStyle, LoaderConfig, Projection};
use ifc_view_core::{
    Camera, ElementId, Engine, EngineError, ModelFormat, ParseRequest, ProgressSink, SurfaceSize, WorkerHandle,
};
use js_sys::{Array, Function, Promise, Uint8Array};
use rustc_hash::FxHashSet;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

#[wasm_bindgen]
extern "C" {
    /// Engine object supplied by the host page.
    #[derive(Clone)]
    pub type EngineBridge;

    #[wasm_bindgen(method, catch, js_name = createWorld)]
    fn create_world(this: &EngineBridge, width: f64, height: f64) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = addGrid)]
    fn add_grid(this: &EngineBridge) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = setLookAt)]
    fn set_look_at(
        this: &EngineBridge,
        px: f64,
        py: f64,
        pz: f64,
        tx: f64,
        ty: f64,
        tz: f64,
        orthographic: bool,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = setupLoader)]
    fn setup_loader(this: &EngineBridge, config: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = initWorker)]
    fn init_worker(this: &EngineBridge, url: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch)]
    fn load(
        this: &EngineBridge,
        bytes: Uint8Array,
        name: &str,
        fragments: bool,
        coordinate: bool,
        on_progress: &Function,
    ) -> Result<Promise, JsValue>;

    #[wasm_bindgen(method, js_name = bindCamera)]
    fn bind_camera(this: &EngineBridge, model: &JsValue);

    #[wasm_bindgen(method, js_name = addToScene)]
    fn add_to_scene(this: &EngineBridge, model: &JsValue);

    #[wasm_bindgen(method)]
    fn update(this: &EngineBridge, force: bool);

    #[wasm_bindgen(method)]
    fn highlight(
        this: &EngineBridge,
        group: &str,
        ids: Array,
        color: &str,
        opacity: f64,
        transparent: bool,
        rendered_faces: u8,
    );

    #[wasm_bindgen(method, js_name = clearHighlight)]
    fn clear_highlight(this: &EngineBridge, group: &str);

    #[wasm_bindgen(method)]
    fn dispose(this: &EngineBridge);

    #[wasm_bindgen(method, js_name = onCameraRest)]
    pub(crate) fn on_camera_rest(this: &EngineBridge, callback: &Function);

    #[wasm_bindgen(method, catch, js_name = offCameraRest)]
    pub(crate) fn off_camera_rest(this: &EngineBridge, callback: &Function) -> Result<(), JsValue>;
}

fn engine_error(value: JsValue) -> EngineError {
    EngineError::new(js_message(&value))
}

/// [`Engine`] backed by the host's JavaScript engine.
pub struct JsEngine {
    bridge: EngineBridge,
    disposed: bool,
}

impl JsEngine {
    pub fn new(bridge: EngineBridge) -> Self {
        Self { bridge, disposed: false }
    }
}

impl Engine for JsEngine {
    type Model = JsValue;

    fn create_world(&mut self, surface: SurfaceSize) -> Result<(), EngineError> {
        self.bridge
            .create_world(surface.width, surface.height)
            .map_err(engine_error)
    }

    fn add_grid(&mut self) -> Result<(), EngineError> {
        self.bridge.add_grid().map_err(engine_error)
    }

    fn set_camera(&mut self, camera: &Camera) -> Result<(), EngineError> {
        let (p, t) = (camera.position, camera.target);
        self.bridge
            .set_look_at(p.x, p.y, p.z, t.x, t.y, t.z, camera.projection == Projection::Orthographic)
            .map_err(engine_error)
    }

    fn configure_loader(&mut self, loader: &LoaderConfig) -> Result<(), EngineError> {
        let config = to_js(loader).map_err(engine_error)?;
        self.bridge.setup_loader(&config).map_err(engine_error)
    }

    fn attach_worker(&mut self, worker: &WorkerHandle) -> Result<(), EngineError> {
        self.bridge.init_worker(worker.url()).map_err(engine_error)
    }

    fn parse(
        &self,
        bytes: Vec<u8>,
        request: ParseRequest,
        progress: ProgressSink,
    ) -> LocalBoxFuture<'static, Result<JsValue, EngineError>> {
        let bridge = self.bridge.clone();
        async move {
            // JS reports 0..1, the pipeline works in percent
            let on_progress =
                Closure::wrap(Box::new(move |fraction: f64| progress.parsing(fraction * 100.0)) as Box<dyn FnMut(f64)>);
            let promise = bridge
                .load(
                    Uint8Array::from(bytes.as_slice()),
                    &request.name,
                    request.format == ModelFormat::Fragments,
                    request.coordinate,
                    on_progress.as_ref().unchecked_ref(),
                )
                .map_err(engine_error)?;
            let model = JsFuture::from(promise).await.map_err(engine_error);
            // The callback must outlive the promise
            drop(on_progress);
            model
        }
        .boxed_local()
    }

    fn bind_camera(&mut self, model: &JsValue) {
        self.bridge.bind_camera(model);
    }

    fn insert(&mut self, model: &JsValue) {
        self.bridge.add_to_scene(model);
    }

    fn update(&mut self, force: bool) {
        self.bridge.update(force);
    }

    fn highlight(&mut self, group: &str, ids: &FxHashSet<ElementId>, style: &HighlightStyle) {
        let array: Array = ids.iter().map(|id| JsValue::from_str(&id.0)).collect();
        self.bridge.highlight(
            group,
            array,
            &style.color,
            style.opacity,
            style.transparent,
            style.rendered_faces,
        );
    }

    fn clear_highlight(&mut self, group: &str) {
        self.bridge.clear_highlight(group);
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.bridge.dispose();
        }
    }
}
