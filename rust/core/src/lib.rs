// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC-View Core
//!
//! Viewport lifecycle and asynchronous model-loading pipeline for IFC and
//! fragment building models.
//!
//! ## Overview
//!
//! The pipeline runs on a single-threaded cooperative executor and drives an
//! external 3D/BIM engine through the [`Engine`] trait:
//!
//! - **Surface readiness**: initialization waits for a container with real height
//! - **Scene bootstrap**: scene, camera, renderer and grid, created exactly once
//! - **Worker provisioning**: the parsing worker is fetched and turned into a revocable URL
//! - **Model loading**: fetch, validate, parse, insert, with progress and liveness checks
//! - **Highlighting**: quantity table interactions select elements by type or level
//! - **Teardown**: deterministic, idempotent release from any state
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ifc_view_core::{SurfaceSize, Viewport, ViewerConfig};
//!
//! let viewport = Viewport::new(engine, ViewerConfig::default(), services)?;
//! viewport.mount(Some(Box::new(resize_observer)));
//!
//! // Called from the platform's resize callback
//! if let Some(init) = viewport.observe(SurfaceSize::new(1280.0, 720.0)) {
//!     spawn_local(async move { let _ = init.await; });
//! }
//!
//! // Later, from the "Load IFC" button
//! let model = viewport.load("/api/system_model/download").await?;
//! viewport.highlight_by_type("Wall").await?;
//!
//! viewport.teardown();
//! ```
//!
//! Every external collaborator ([`Fetcher`], [`ModuleRegistry`], [`UiHost`],
//! [`QuantityProvider`], [`ElementQuery`]) is a trait so the core has no
//! dependency on a browser or UI toolkit.

pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod gate;
pub mod highlight;
pub mod loader;
pub mod progress;
pub mod quantities;
pub mod scene;
pub mod surface;
pub mod ui;
pub mod viewport;
pub mod worker;

pub use config::{CameraConfig, HighlightStyle, LoadPolicy, LoaderConfig, Projection, ViewerConfig};
pub use engine::{Engine, ParseRequest};
pub use error::{EngineError, Result, ViewerError};
pub use fetch::{Fetcher, HttpResponse};
pub use gate::{Capability, CapabilityState, ReadinessGate};
pub use highlight::{ElementId, ElementQuery, Highlighter, SelectionSet, StaticElementQuery, DEFAULT_GROUP};
pub use loader::{LoadedModel, ModelFormat};
pub use progress::{LoadStage, ProgressEvent, ProgressSink};
pub use quantities::{
    HighlightTarget, QuantityProvider, QuantityRow, QuantityTable, StaticQuantityProvider, TableEvent,
};
pub use scene::{Camera, ModelId, NodeId, NodeKind, SceneContext, SceneGraph, SceneNode};
pub use surface::{ReadinessMonitor, SurfaceObserver, SurfaceSize};
pub use ui::{Overlay, OverlayHandle, SceneStats, UiAction, UiHost, ViewerStatus};
pub use viewport::{Services, Viewport, ViewportState, WeakViewport};
pub use worker::{ModuleRegistry, WorkerHandle};
