// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scene bootstrap.
//!
//! [`SceneContext`] bundles the engine with the pipeline's own record of the
//! scene graph and camera. There is exactly one per mounted viewport.

use crate::config::{CameraConfig, Projection, ViewerConfig};
use crate::engine::Engine;
use crate::error::{EngineError, Result, ViewerError};
use crate::surface::SurfaceSize;
use nalgebra::Point3;
use serde::Serialize;
use std::fmt;

/// Identifier of a node in the scene graph. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

/// Identifier of a loaded model, e.g. `model-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModelId(pub String);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeKind {
    Grid,
    Model { model: ModelId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneNode {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Children of the scene root, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneGraph {
    children: Vec<SceneNode>,
    #[serde(skip)]
    next_id: u32,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.children.push(SceneNode { id, kind });
        id
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn model_count(&self) -> usize {
        self.children
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Model { .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.children.clear();
    }
}

/// Orbit camera state.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Point3<f64>,
    pub target: Point3<f64>,
    pub projection: Projection,
}

impl Camera {
    pub fn from_config(config: &CameraConfig) -> Self {
        let [px, py, pz] = config.position;
        let [tx, ty, tz] = config.target;
        Self {
            position: Point3::new(px, py, pz),
            target: Point3::new(tx, ty, tz),
            projection: config.projection,
        }
    }

    pub fn distance(&self) -> f64 {
        nalgebra::distance(&self.position, &self.target)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

/// Scene graph, camera and renderer of one mounted viewport.
pub struct SceneContext<E: Engine> {
    graph: SceneGraph,
    camera: Camera,
    engine: E,
    models: Vec<(ModelId, E::Model)>,
    surface: SurfaceSize,
    alive: bool,
    updates: u64,
}

fn build_world<E: Engine>(engine: &mut E, surface: SurfaceSize, camera: &Camera, config: &ViewerConfig) -> std::result::Result<(), EngineError> {
    engine.create_world(surface)?;
    engine.set_camera(camera)?;
    engine.add_grid()?;
    engine.configure_loader(&config.loader)?;
    Ok(())
}

impl<E: Engine> SceneContext<E> {
    /// Create the world inside the (now renderable) container.
    pub fn bootstrap(mut engine: E, surface: SurfaceSize, config: &ViewerConfig) -> Result<Self> {
        let camera = Camera::from_config(&config.camera);

        if let Err(e) = build_world(&mut engine, surface, &camera, config) {
            engine.dispose();
            return Err(ViewerError::Initialization(e.to_string()));
        }

        let mut graph = SceneGraph::new();
        graph.add(NodeKind::Grid);

        tracing::info!(
            width = surface.width,
            height = surface.height,
            camera_distance = camera.distance(),
            "Scene initialized"
        );

        Ok(Self {
            graph,
            camera,
            engine,
            models: Vec::new(),
            surface,
            alive: true,
            updates: 0,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Number of scene updates requested so far.
    pub fn update_count(&self) -> u64 {
        self.updates
    }

    /// Bind the model to the camera, add it to the scene and refresh.
    pub fn insert_model(&mut self, id: ModelId, model: E::Model) -> NodeId {
        self.engine.bind_camera(&model);
        let node = self.graph.add(NodeKind::Model { model: id.clone() });
        self.engine.insert(&model);
        self.models.push((id, model));
        self.request_update();
        node
    }

    /// Force a scene update. Returns `false` on a torn-down context.
    pub fn request_update(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        self.engine.update(true);
        self.updates += 1;
        true
    }

    /// Release engine resources. Repeated calls do nothing.
    pub fn teardown(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.models.clear();
        self.graph.clear();
        self.engine.dispose();
        tracing::info!("Scene disposed");
    }
}
