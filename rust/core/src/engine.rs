// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface to the external 3D/BIM engine.
//!
//! Geometry, parsing and rendering belong to the engine. The pipeline only
//! decides *when* each engine operation happens and keeps its own record of
//! what the scene contains.

use crate::config::{HighlightStyle, LoaderConfig};
use crate::error::EngineError;
use crate::highlight::ElementId;
use crate::loader::ModelFormat;
use crate::progress::ProgressSink;
use crate::scene::Camera;
use crate::surface::SurfaceSize;
use crate::worker::WorkerHandle;
use futures::future::LocalBoxFuture;
use rustc_hash::FxHashSet;

/// What the engine needs to know to parse one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseRequest {
    /// Name the model is registered under.
    pub name: String,
    pub format: ModelFormat,
    /// Whether the engine should re-center coordinates of this model.
    pub coordinate: bool,
}

/// The external engine driving scene, camera, renderer and parser.
pub trait Engine {
    /// Engine-side parsed model (render object plus geometry).
    type Model;

    /// Clear the container and create scene, camera and renderer bound to it.
    fn create_world(&mut self, surface: SurfaceSize) -> Result<(), EngineError>;

    /// Install the reference grid.
    fn add_grid(&mut self) -> Result<(), EngineError>;

    fn set_camera(&mut self, camera: &Camera) -> Result<(), EngineError>;

    /// Point the parser at its wasm files.
    fn configure_loader(&mut self, loader: &LoaderConfig) -> Result<(), EngineError>;

    fn attach_worker(&mut self, worker: &WorkerHandle) -> Result<(), EngineError>;

    /// Parse `bytes`. The returned future must not borrow the engine so the
    /// pipeline can release its state while parsing runs. Progress is
    /// reported from that future, never from this call.
    fn parse(
        &self,
        bytes: Vec<u8>,
        request: ParseRequest,
        progress: ProgressSink,
    ) -> LocalBoxFuture<'static, Result<Self::Model, EngineError>>;

    /// Make the model follow the active camera (culling, LOD).
    fn bind_camera(&mut self, model: &Self::Model);

    /// Add the model's render object to the scene.
    fn insert(&mut self, model: &Self::Model);

    /// Request a scene update.
    fn update(&mut self, force: bool);

    fn highlight(&mut self, group: &str, ids: &FxHashSet<ElementId>, style: &HighlightStyle);

    fn clear_highlight(&mut self, group: &str);

    /// Release renderer and scene resources. Must tolerate repeated calls and
    /// a partially created world.
    fn dispose(&mut self);
}
