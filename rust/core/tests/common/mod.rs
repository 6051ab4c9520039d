// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recording doubles for the viewport's collaborators.

#![allow(dead_code)]

use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use ifc_view_core::config::{HighlightStyle, LoaderConfig, DEFAULT_ENDPOINT, DEFAULT_WORKER_URL};
use ifc_view_core::{
    Camera, ElementId, ElementQuery, Engine, EngineError, Fetcher, HttpResponse, ModuleRegistry, Overlay, OverlayHandle,
    ParseRequest, ProgressSink, Services, StaticElementQuery, StaticQuantityProvider, SurfaceObserver, SurfaceSize,
    UiHost, ViewerConfig, ViewerStatus, Viewport, WorkerHandle,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

pub const IFC4_BODY: &[u8] = b"ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');\nFILE_NAME('tower.ifc','2024-01-01T00:00:00',(''),(''),'','','');\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Tower',$,$,$,$,$,$);\nENDSEC;\nEND-ISO-10303-21;\n";

pub const WORKER_SOURCE: &[u8] = b"self.onmessage = () => {};";

/// Parsed model produced by [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct TestModel {
    pub name: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Immediate,
    Fail,
    /// Reports progress from `parse` itself, before returning the future.
    Eager,
    /// Parse completes only when released through [`EngineLog::release_next`].
    Deferred,
}

type PendingParse = (String, usize, oneshot::Sender<Result<TestModel, EngineError>>);

/// Everything the engine was asked to do.
#[derive(Default)]
pub struct EngineLog {
    pub calls: Vec<String>,
    pub parse_calls: usize,
    pub bind_camera: usize,
    pub inserted: Vec<String>,
    pub updates: usize,
    pub highlights: FxHashMap<String, FxHashSet<ElementId>>,
    pub cleared: Vec<String>,
    pub disposed: usize,
    pub worker_url: Option<String>,
    pub parse_mode: ParseMode,
    pub fail_world: bool,
    pub reject_worker: bool,
    pending: VecDeque<PendingParse>,
}

impl EngineLog {
    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn pending_parses(&self) -> usize {
        self.pending.len()
    }

    /// Complete the oldest deferred parse.
    pub fn release_next(&mut self) -> bool {
        match self.pending.pop_front() {
            Some((name, bytes, tx)) => tx.send(Ok(TestModel { name, bytes })).is_ok(),
            None => false,
        }
    }
}

pub struct RecordingEngine {
    log: Rc<RefCell<EngineLog>>,
}

impl RecordingEngine {
    pub fn new() -> (Self, Rc<RefCell<EngineLog>>) {
        let log = Rc::new(RefCell::new(EngineLog::default()));
        (Self { log: log.clone() }, log)
    }

    fn record(&self, call: &str) {
        self.log.borrow_mut().calls.push(call.to_string());
    }
}

impl Engine for RecordingEngine {
    type Model = TestModel;

    fn create_world(&mut self, _surface: SurfaceSize) -> Result<(), EngineError> {
        self.record("create_world");
        if self.log.borrow().fail_world {
            return Err(EngineError::new("WebGL context lost"));
        }
        Ok(())
    }

    fn add_grid(&mut self) -> Result<(), EngineError> {
        self.record("add_grid");
        Ok(())
    }

    fn set_camera(&mut self, _camera: &Camera) -> Result<(), EngineError> {
        self.record("set_camera");
        Ok(())
    }

    fn configure_loader(&mut self, _loader: &LoaderConfig) -> Result<(), EngineError> {
        self.record("configure_loader");
        Ok(())
    }

    fn attach_worker(&mut self, worker: &WorkerHandle) -> Result<(), EngineError> {
        self.record("attach_worker");
        let mut log = self.log.borrow_mut();
        if log.reject_worker {
            return Err(EngineError::new("worker rejected"));
        }
        log.worker_url = Some(worker.url().to_string());
        Ok(())
    }

    fn parse(
        &self,
        bytes: Vec<u8>,
        request: ParseRequest,
        progress: ProgressSink,
    ) -> LocalBoxFuture<'static, Result<TestModel, EngineError>> {
        let mut log = self.log.borrow_mut();
        log.parse_calls += 1;
        let len = bytes.len();
        let mode = log.parse_mode;
        match mode {
            ParseMode::Immediate => async move {
                progress.parsing(50.0);
                Ok(TestModel {
                    name: request.name,
                    bytes: len,
                })
            }
            .boxed_local(),
            ParseMode::Eager => {
                drop(log);
                progress.parsing(1.0);
                async move {
                    Ok(TestModel {
                        name: request.name,
                        bytes: len,
                    })
                }
                .boxed_local()
            }
            ParseMode::Fail => async move { Err(EngineError::new("unexpected token at #1")) }.boxed_local(),
            ParseMode::Deferred => {
                let (tx, rx) = oneshot::channel();
                log.pending.push_back((request.name, len, tx));
                async move {
                    progress.parsing(10.0);
                    rx.await.map_err(|_| EngineError::new("parser dropped"))?
                }
                .boxed_local()
            }
        }
    }

    fn bind_camera(&mut self, _model: &TestModel) {
        self.log.borrow_mut().bind_camera += 1;
    }

    fn insert(&mut self, model: &TestModel) {
        self.log.borrow_mut().inserted.push(model.name.clone());
    }

    fn update(&mut self, _force: bool) {
        self.log.borrow_mut().updates += 1;
    }

    fn highlight(&mut self, group: &str, ids: &FxHashSet<ElementId>, _style: &HighlightStyle) {
        self.log.borrow_mut().highlights.insert(group.to_string(), ids.clone());
    }

    fn clear_highlight(&mut self, group: &str) {
        let mut log = self.log.borrow_mut();
        log.highlights.remove(group);
        log.cleared.push(group.to_string());
    }

    fn dispose(&mut self) {
        self.log.borrow_mut().disposed += 1;
    }
}

/// Fetcher answering from a per-URL script; unknown URLs are 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: RefCell<FxHashMap<String, Result<HttpResponse, String>>>,
    pub requests: RefCell<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn respond(&self, url: &str, response: Result<HttpResponse, String>) {
        self.responses.borrow_mut().insert(url.to_string(), response);
    }
}

impl Fetcher for ScriptedFetcher {
    fn get(&self, url: &str) -> LocalBoxFuture<'static, Result<HttpResponse, String>> {
        self.requests.borrow_mut().push(url.to_string());
        let response = self
            .responses
            .borrow()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Ok(HttpResponse::status(404)));
        async move { response }.boxed_local()
    }
}

#[derive(Default)]
pub struct RecordingRegistry {
    pub created: RefCell<Vec<String>>,
    pub revoked: RefCell<Vec<String>>,
}

impl ModuleRegistry for RecordingRegistry {
    fn create_module_url(&self, _source: &[u8], file_name: &str, _mime_type: &str) -> Result<String, String> {
        let mut created = self.created.borrow_mut();
        let url = format!("blob:{}#{}", file_name, created.len() + 1);
        created.push(url.clone());
        Ok(url)
    }

    fn revoke(&self, url: &str) {
        self.revoked.borrow_mut().push(url.to_string());
    }
}

#[derive(Default)]
pub struct RecordingUi {
    next: Cell<u32>,
    pub mounted: RefCell<Vec<(OverlayHandle, Overlay)>>,
    pub unmounted: RefCell<Vec<OverlayHandle>>,
    pub statuses: RefCell<Vec<ViewerStatus>>,
}

impl RecordingUi {
    pub fn last_status(&self) -> Option<ViewerStatus> {
        self.statuses.borrow().last().cloned()
    }

    pub fn has_quantities_panel(&self) -> bool {
        self.mounted
            .borrow()
            .iter()
            .any(|(_, overlay)| matches!(overlay, Overlay::QuantitiesPanel { .. }))
    }
}

impl UiHost for RecordingUi {
    fn mount(&self, overlay: &Overlay) -> ifc_view_core::Result<OverlayHandle> {
        let handle = OverlayHandle(self.next.get());
        self.next.set(handle.0 + 1);
        self.mounted.borrow_mut().push((handle, overlay.clone()));
        Ok(handle)
    }

    fn update(&self, handle: OverlayHandle, overlay: &Overlay) -> ifc_view_core::Result<()> {
        if let Some(entry) = self.mounted.borrow_mut().iter_mut().find(|(h, _)| *h == handle) {
            entry.1 = overlay.clone();
        }
        Ok(())
    }

    fn unmount(&self, handle: OverlayHandle) {
        self.mounted.borrow_mut().retain(|(h, _)| *h != handle);
        self.unmounted.borrow_mut().push(handle);
    }

    fn report(&self, status: &ViewerStatus) {
        self.statuses.borrow_mut().push(status.clone());
    }
}

/// Counts disconnects of the size observer.
pub struct CountingObserver(pub Rc<Cell<u32>>);

impl SurfaceObserver for CountingObserver {
    fn disconnect(&self) {
        self.0.set(self.0.get() + 1);
    }
}

/// Element query that resolves only once its sender fires.
pub struct GatedQuery {
    gate: RefCell<Option<oneshot::Receiver<()>>>,
}

impl GatedQuery {
    pub fn new() -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                gate: RefCell::new(Some(rx)),
            },
            tx,
        )
    }

    fn resolve(&self, ids: Vec<ElementId>) -> LocalBoxFuture<'static, ifc_view_core::Result<Vec<ElementId>>> {
        let gate = self.gate.borrow_mut().take();
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(ids)
        }
        .boxed_local()
    }
}

impl ElementQuery for GatedQuery {
    fn elements_of_type(&self, _element_type: &str) -> LocalBoxFuture<'static, ifc_view_core::Result<Vec<ElementId>>> {
        self.resolve(vec!["frag_1".into(), "frag_2".into()])
    }

    fn elements_in_level(&self, _level: &str) -> LocalBoxFuture<'static, ifc_view_core::Result<Vec<ElementId>>> {
        self.resolve(vec!["frag_3".into(), "frag_4".into()])
    }
}

pub struct Harness {
    pub viewport: Viewport<RecordingEngine>,
    pub engine: Rc<RefCell<EngineLog>>,
    pub fetcher: Rc<ScriptedFetcher>,
    pub registry: Rc<RecordingRegistry>,
    pub ui: Rc<RecordingUi>,
    pub disconnects: Rc<Cell<u32>>,
}

impl Harness {
    /// Viewport with a reachable worker and model endpoint, not yet mounted.
    pub fn new(config: ViewerConfig) -> Self {
        Self::with_elements(config, Rc::new(StaticElementQuery::reference()))
    }

    pub fn with_elements(config: ViewerConfig, elements: Rc<dyn ElementQuery>) -> Self {
        let (engine, log) = RecordingEngine::new();
        let fetcher = Rc::new(ScriptedFetcher::default());
        fetcher.respond(DEFAULT_WORKER_URL, Ok(HttpResponse::ok(WORKER_SOURCE)));
        fetcher.respond(DEFAULT_ENDPOINT, Ok(HttpResponse::ok(IFC4_BODY)));
        let registry = Rc::new(RecordingRegistry::default());
        let ui = Rc::new(RecordingUi::default());

        let services = Services {
            fetcher: fetcher.clone(),
            modules: registry.clone(),
            ui: ui.clone(),
            quantities: Rc::new(StaticQuantityProvider::reference()),
            elements,
        };
        let viewport = Viewport::new(engine, config, services).expect("valid config");

        Self {
            viewport,
            engine: log,
            fetcher,
            registry,
            ui,
            disconnects: Rc::new(Cell::new(0)),
        }
    }

    pub fn mount(&self) {
        self.viewport
            .mount(Some(Box::new(CountingObserver(self.disconnects.clone()))));
    }

    /// Mount, report a renderable surface and run initialization to the end.
    pub async fn ready(config: ViewerConfig) -> Self {
        let harness = Self::new(config);
        harness.mount();
        let init = harness
            .viewport
            .observe(SurfaceSize::new(1280.0, 720.0))
            .expect("first renderable size starts initialization");
        init.await.expect("initialization succeeds");
        harness
    }

    pub fn children(&self) -> usize {
        self.viewport.scene_children().len()
    }
}
