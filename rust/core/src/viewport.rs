// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewport lifecycle.
//!
//! [`Viewport`] owns every resource of one mounted viewer: the readiness
//! monitor, the scene, the worker handle, overlays and selections. It moves
//! through [`ViewportState`] and can be torn down from any state.
//!
//! All state sits behind `Rc<RefCell<_>>` and no borrow is held across an
//! `.await`, so loads, highlight requests and camera events can interleave on
//! a single-threaded executor.

use crate::config::ViewerConfig;
use crate::engine::Engine;
use crate::error::{Result, ViewerError};
use crate::fetch::Fetcher;
use crate::gate::{Capability, ReadinessGate};
use crate::highlight::{ElementId, ElementQuery, Highlighter, DEFAULT_GROUP};
use crate::loader::LoadedModel;
use crate::progress::{ProgressEvent, ProgressListeners};
use crate::quantities::{HighlightTarget, QuantityProvider, QuantityTable, TableEvent};
use crate::scene::{SceneContext, SceneNode};
use crate::surface::{ReadinessMonitor, SurfaceObserver, SurfaceSize};
use crate::ui::{Overlay, OverlayHandle, OverlayTracker, SceneStats, UiAction, UiHost, ViewerStatus};
use crate::worker::{self, ModuleRegistry, WorkerHandle};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ViewportState {
    Unmounted,
    Observing,
    Bootstrapping,
    Ready { models: usize },
    #[serde(rename_all = "camelCase")]
    Loading { in_flight: usize, models: usize },
    TornDown,
}

impl ViewportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewportState::Unmounted => "unmounted",
            ViewportState::Observing => "observing",
            ViewportState::Bootstrapping => "bootstrapping",
            ViewportState::Ready { .. } => "ready",
            ViewportState::Loading { .. } => "loading",
            ViewportState::TornDown => "tornDown",
        }
    }
}

impl fmt::Display for ViewportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Unmounted,
    Observing,
    Bootstrapping,
    Active,
    TornDown,
}

/// External collaborators of a viewport.
#[derive(Clone)]
pub struct Services {
    pub fetcher: Rc<dyn Fetcher>,
    pub modules: Rc<dyn ModuleRegistry>,
    pub ui: Rc<dyn UiHost>,
    pub quantities: Rc<dyn QuantityProvider>,
    pub elements: Rc<dyn ElementQuery>,
}

pub(crate) struct Shared {
    pub(crate) config: ViewerConfig,
    pub(crate) services: Services,
    pub(crate) gate: ReadinessGate,
    pub(crate) progress: ProgressListeners,
    pub(crate) load_lock: futures::lock::Mutex<()>,
}

pub(crate) struct Inner<E: Engine> {
    pub(crate) phase: Phase,
    pub(crate) monitor: ReadinessMonitor,
    pub(crate) observer: Option<Box<dyn SurfaceObserver>>,
    /// Engine waiting for the surface; moved into the scene on bootstrap.
    pub(crate) engine: Option<E>,
    pub(crate) scene: Option<SceneContext<E>>,
    pub(crate) worker: Option<WorkerHandle>,
    pub(crate) overlays: OverlayTracker,
    pub(crate) highlighter: Highlighter,
    pub(crate) table: Option<QuantityTable>,
    pub(crate) models: Vec<LoadedModel>,
    pub(crate) in_flight: usize,
    pub(crate) next_model: u32,
}

impl<E: Engine> Inner<E> {
    fn live_scene_mut(&mut self) -> Option<&mut SceneContext<E>> {
        self.scene.as_mut().filter(|scene| scene.is_alive())
    }
}

/// Lifecycle controller of one mounted viewer. Cheap to clone.
pub struct Viewport<E: Engine> {
    inner: Rc<RefCell<Inner<E>>>,
    shared: Rc<Shared>,
}

impl<E: Engine> Clone for Viewport<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            shared: self.shared.clone(),
        }
    }
}

/// Non-owning reference for callbacks held by overlays and observers.
pub struct WeakViewport<E: Engine> {
    inner: Weak<RefCell<Inner<E>>>,
    shared: Weak<Shared>,
}

impl<E: Engine> Clone for WeakViewport<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<E: Engine> WeakViewport<E> {
    pub fn upgrade(&self) -> Option<Viewport<E>> {
        Some(Viewport {
            inner: self.inner.upgrade()?,
            shared: self.shared.upgrade()?,
        })
    }
}

impl<E: Engine> Viewport<E> {
    pub(crate) fn inner(&self) -> &RefCell<Inner<E>> {
        &self.inner
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    pub fn downgrade(&self) -> WeakViewport<E> {
        WeakViewport {
            inner: Rc::downgrade(&self.inner),
            shared: Rc::downgrade(&self.shared),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.shared.config
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.shared.gate
    }

    pub fn state(&self) -> ViewportState {
        let inner = self.inner.borrow();
        match inner.phase {
            Phase::Unmounted => ViewportState::Unmounted,
            Phase::Observing => ViewportState::Observing,
            Phase::Bootstrapping => ViewportState::Bootstrapping,
            Phase::TornDown => ViewportState::TornDown,
            Phase::Active if inner.in_flight > 0 => ViewportState::Loading {
                in_flight: inner.in_flight,
                models: inner.models.len(),
            },
            Phase::Active => ViewportState::Ready {
                models: inner.models.len(),
            },
        }
    }

    /// Register a listener for load progress of every `load` call.
    pub fn on_progress(&self, listener: impl Fn(&ProgressEvent) + 'static) {
        self.shared.progress.add(listener);
    }

    /// Resolve once `cap` is available, or `NotReady` if it never will be.
    pub fn when_ready(&self, cap: Capability) -> LocalBoxFuture<'static, Result<()>> {
        self.shared.gate.await_ready(cap).boxed_local()
    }

    /// Snapshot of the scene root's children; empty before bootstrap and
    /// after teardown.
    pub fn scene_children(&self) -> Vec<SceneNode> {
        self.inner
            .borrow()
            .scene
            .as_ref()
            .map(|scene| scene.graph().children().to_vec())
            .unwrap_or_default()
    }

    /// Read access to the live scene.
    pub fn with_scene<R>(&self, f: impl FnOnce(&SceneContext<E>) -> R) -> Option<R> {
        let inner = self.inner.borrow();
        inner.scene.as_ref().filter(|scene| scene.is_alive()).map(f)
    }

    pub fn models(&self) -> Vec<LoadedModel> {
        self.inner.borrow().models.clone()
    }

    pub fn selection(&self, group: &str) -> FxHashSet<ElementId> {
        self.inner.borrow().highlighter.selection().ids(group)
    }

    pub fn worker_url(&self) -> Option<String> {
        self.inner.borrow().worker.as_ref().map(|w| w.url().to_string())
    }

    pub fn overlay_count(&self) -> usize {
        self.inner.borrow().overlays.len()
    }

    pub fn quantity_table(&self) -> Option<QuantityTable> {
        self.inner.borrow().table.clone()
    }

    /// Camera controls came to rest: refresh the scene. Safe at any time.
    pub fn on_camera_rest(&self) -> bool {
        match self.inner.borrow_mut().live_scene_mut() {
            Some(scene) => scene.request_update(),
            None => false,
        }
    }

    pub(crate) fn report_error(&self, context: &str, err: &ViewerError) {
        err.log(context);
        self.report_status(&ViewerStatus::from_error(err));
    }

    /// Show `status` on the host's status line. Nothing is shown once torn down.
    pub(crate) fn report_status(&self, status: &ViewerStatus) {
        if self.inner.borrow().phase == Phase::TornDown {
            tracing::debug!(?status, "Status dropped after teardown");
            return;
        }
        self.shared.services.ui.report(status);
    }

    fn mount_overlay(&self, overlay: Overlay) -> Result<OverlayHandle> {
        let handle = self.shared.services.ui.mount(&overlay)?;
        let mut inner = self.inner.borrow_mut();
        if inner.phase == Phase::TornDown {
            drop(inner);
            self.shared.services.ui.unmount(handle);
            return Err(ViewerError::NotReady(Capability::Scene));
        }
        inner.overlays.track(overlay.kind(), handle);
        Ok(handle)
    }

    /// Mount `overlay`, or update it in place when one of its kind exists.
    fn show_overlay(&self, overlay: Overlay) -> Result<OverlayHandle> {
        let existing = self.inner.borrow().overlays.find(overlay.kind());
        match existing {
            Some(handle) => {
                self.shared.services.ui.update(handle, &overlay)?;
                Ok(handle)
            }
            None => self.mount_overlay(overlay),
        }
    }

    pub(crate) fn refresh_stats(&self) {
        if !self.shared.config.show_stats {
            return;
        }
        let stats = {
            let inner = self.inner.borrow();
            let Some(scene) = inner.scene.as_ref().filter(|scene| scene.is_alive()) else {
                return;
            };
            SceneStats {
                models: scene.graph().model_count(),
                nodes: scene.graph().len(),
                updates: scene.update_count(),
            }
        };
        if let Err(e) = self.show_overlay(Overlay::Stats(stats)) {
            tracing::warn!(error = %e, "Stats overlay unavailable");
        }
    }

    /// Release everything, in order: readiness monitor, overlays, worker URL,
    /// scene. Each step tolerates a missing resource; repeated calls do nothing.
    pub fn teardown(&self) {
        let (observer, overlays, worker, scene, engine) = {
            let mut inner = self.inner.borrow_mut();
            if inner.phase == Phase::TornDown {
                return;
            }
            inner.phase = Phase::TornDown;
            inner.monitor.disconnect();
            inner.highlighter.forget();
            inner.table = None;
            (
                inner.observer.take(),
                inner.overlays.drain(),
                inner.worker.take(),
                inner.scene.take(),
                inner.engine.take(),
            )
        };

        if let Some(observer) = observer {
            observer.disconnect();
        }
        for handle in overlays {
            self.shared.services.ui.unmount(handle);
        }
        if let Some(worker) = worker {
            worker.revoke();
        }
        if let Some(mut scene) = scene {
            scene.teardown();
        }
        if let Some(mut engine) = engine {
            engine.dispose();
        }

        self.shared.progress.clear();
        self.shared.gate.close();
        tracing::info!("Viewport torn down");
    }
}

impl<E: Engine + 'static> Viewport<E> {
    pub fn new(engine: E, config: ViewerConfig, services: Services) -> Result<Self> {
        config.validate()?;
        let highlighter = Highlighter::new(config.highlight.clone());
        Ok(Self {
            inner: Rc::new(RefCell::new(Inner {
                phase: Phase::Unmounted,
                monitor: ReadinessMonitor::new(),
                observer: None,
                engine: Some(engine),
                scene: None,
                worker: None,
                overlays: OverlayTracker::default(),
                highlighter,
                table: None,
                models: Vec::new(),
                in_flight: 0,
                next_model: 0,
            })),
            shared: Rc::new(Shared {
                config,
                services,
                gate: ReadinessGate::new(),
                progress: ProgressListeners::default(),
                load_lock: futures::lock::Mutex::new(()),
            }),
        })
    }

    /// Start watching the host container. `observer` is disconnected once the
    /// surface becomes ready or the viewport is torn down.
    pub fn mount(&self, observer: Option<Box<dyn SurfaceObserver>>) {
        let mut inner = self.inner.borrow_mut();
        if inner.phase != Phase::Unmounted {
            tracing::warn!(phase = ?inner.phase, "Viewport already mounted");
            if let Some(observer) = observer {
                drop(inner);
                observer.disconnect();
            }
            return;
        }
        inner.phase = Phase::Observing;
        inner.monitor.start();
        inner.observer = observer;
    }

    /// Feed a size observation. Returns the initialization continuation the
    /// first time the surface has a nonzero height, `None` otherwise.
    pub fn observe(&self, size: SurfaceSize) -> Option<LocalBoxFuture<'static, Result<()>>> {
        let observer = {
            let mut inner = self.inner.borrow_mut();
            if inner.phase != Phase::Observing {
                return None;
            }
            tracing::debug!(height = size.height, "Container resized");
            if !inner.monitor.observe(size) {
                return None;
            }
            inner.phase = Phase::Bootstrapping;
            inner.observer.take()
        };
        if let Some(observer) = observer {
            observer.disconnect();
        }

        let viewport = self.clone();
        Some(async move { viewport.initialize(size).await }.boxed_local())
    }

    async fn initialize(self, size: SurfaceSize) -> Result<()> {
        let shared = self.shared.clone();
        tracing::info!("Initializing components");
        self.report_status(&ViewerStatus::Initializing);

        let Some(engine) = self.inner.borrow_mut().engine.take() else {
            return Err(ViewerError::NotReady(Capability::Scene));
        };

        let scene = match SceneContext::bootstrap(engine, size, &shared.config) {
            Ok(scene) => scene,
            Err(e) => {
                self.report_error("Error initializing components", &e);
                self.teardown();
                return Err(e);
            }
        };
        {
            let mut inner = self.inner.borrow_mut();
            if inner.phase == Phase::TornDown {
                drop(inner);
                let mut scene = scene;
                scene.teardown();
                return Err(ViewerError::NotReady(Capability::Scene));
            }
            inner.scene = Some(scene);
        }
        shared.gate.publish(Capability::Scene);

        self.provision_worker().await?;

        if let Err(e) = self.mount_overlay(Overlay::loader_panel()) {
            self.report_error("Loader panel unavailable", &e);
        }
        self.refresh_stats();

        {
            let mut inner = self.inner.borrow_mut();
            if inner.phase == Phase::TornDown {
                return Err(ViewerError::NotReady(Capability::Scene));
            }
            inner.phase = Phase::Active;
        }
        tracing::info!("Viewport ready");
        self.report_status(&ViewerStatus::Ready);
        Ok(())
    }

    /// Fetch and attach the worker. Only a torn-down viewport is an error;
    /// a missing worker just leaves loading unavailable.
    async fn provision_worker(&self) -> Result<()> {
        let shared = self.shared.clone();
        shared.gate.await_ready(Capability::Scene).await?;

        let result = worker::provision(
            &*shared.services.fetcher,
            shared.services.modules.clone(),
            &shared.config.loader.worker_url,
        )
        .await;

        let handle = match result {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load worker");
                shared.gate.mark_unavailable(Capability::Worker);
                self.report_status(&ViewerStatus::WorkerUnavailable { reason: e.to_string() });
                return Ok(());
            }
        };

        let attached = {
            let mut inner = self.inner.borrow_mut();
            if inner.phase == Phase::TornDown {
                drop(inner);
                handle.revoke();
                return Err(ViewerError::NotReady(Capability::Worker));
            }
            let attached = match inner.live_scene_mut() {
                Some(scene) => scene.engine_mut().attach_worker(&handle).map_err(|e| e.to_string()),
                None => Err("scene is gone".to_string()),
            };
            if attached.is_ok() {
                inner.worker = Some(handle);
            } else {
                handle.revoke();
            }
            attached
        };

        match attached {
            Ok(()) => {
                tracing::info!("Worker initialized successfully");
                shared.gate.publish(Capability::Worker);
            }
            Err(reason) => {
                tracing::warn!(%reason, "Engine rejected worker");
                shared.gate.mark_unavailable(Capability::Worker);
                self.report_status(&ViewerStatus::WorkerUnavailable { reason });
            }
        }
        Ok(())
    }

    /// First successful load: activate the highlighter and show the table.
    pub(crate) async fn activate_highlighter(&self) {
        if self.shared.gate.is_ready(Capability::Highlighter) || self.with_scene(|_| ()).is_none() {
            return;
        }
        self.shared.gate.publish(Capability::Highlighter);
        if let Err(e) = self.refresh_quantities().await {
            self.report_error("Cannot create quantities panel", &e);
        }
    }

    /// Fetch quantity rows and (re)build the quantities panel.
    pub async fn refresh_quantities(&self) -> Result<QuantityTable> {
        self.shared.gate.check(Capability::Highlighter)?;
        let table = QuantityTable::load(&*self.shared.services.quantities, &self.shared.config.levels).await?;
        {
            let mut inner = self.inner.borrow_mut();
            if inner.phase == Phase::TornDown {
                return Err(ViewerError::NotReady(Capability::Highlighter));
            }
            inner.table = Some(table.clone());
        }
        self.show_overlay(Overlay::QuantitiesPanel { table: table.clone() })?;
        Ok(table)
    }

    fn apply_highlight(&self, ids: Vec<ElementId>) -> Result<()> {
        let inner = &mut *self.inner.borrow_mut();
        let scene = inner
            .scene
            .as_mut()
            .filter(|scene| scene.is_alive())
            .ok_or(ViewerError::NotReady(Capability::Scene))?;
        inner.highlighter.highlight(scene.engine_mut(), DEFAULT_GROUP, ids);
        Ok(())
    }

    /// Highlight every element of `element_type` in the default group.
    pub async fn highlight_by_type(&self, element_type: &str) -> Result<()> {
        self.shared.gate.check(Capability::Scene)?;
        let ids = self.shared.services.elements.elements_of_type(element_type).await?;
        tracing::debug!(element_type, count = ids.len(), "Highlighting by type");
        self.apply_highlight(ids)
    }

    /// Highlight every element on `level` in the default group.
    pub async fn highlight_by_level(&self, level: &str) -> Result<()> {
        self.shared.gate.check(Capability::Scene)?;
        let ids = self.shared.services.elements.elements_in_level(level).await?;
        tracing::debug!(level, count = ids.len(), "Highlighting by level");
        self.apply_highlight(ids)
    }

    /// Clear every selection group.
    pub fn reset_highlight(&self) -> Result<()> {
        self.shared.gate.check(Capability::Scene)?;
        let inner = &mut *self.inner.borrow_mut();
        match inner.scene.as_mut().filter(|scene| scene.is_alive()) {
            Some(scene) => inner.highlighter.reset(scene.engine_mut()),
            None => inner.highlighter.forget(),
        }
        Ok(())
    }

    /// Route a table interaction to the highlighter. Headers that are not
    /// level columns are ignored.
    pub async fn handle_table_event(&self, event: &TableEvent) -> Result<()> {
        let target = {
            let inner = self.inner.borrow();
            match inner.table.as_ref() {
                Some(table) => table.resolve(event),
                None => QuantityTable::from_rows(Vec::new(), &self.shared.config.levels).resolve(event),
            }
        };
        match target {
            Some(HighlightTarget::ElementType(element_type)) => self.highlight_by_type(&element_type).await,
            Some(HighlightTarget::Level(level)) => self.highlight_by_level(&level).await,
            None => Ok(()),
        }
    }

    /// Error boundary for overlay interactions: failures are logged and
    /// reported through the UI host, never propagated.
    pub async fn dispatch(&self, action: UiAction) {
        let result = match &action {
            UiAction::LoadRequested => {
                tracing::info!("Load IFC button clicked");
                self.trigger_load().await;
                Ok(())
            }
            UiAction::ResetHighlight => self.reset_highlight(),
            UiAction::Table(event) => self.handle_table_event(event).await,
        };
        if let Err(e) = result {
            self.report_error("UI action failed", &e);
        }
    }
}

impl<E: Engine> fmt::Debug for Viewport<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewport").field("state", &self.state()).finish()
    }
}
