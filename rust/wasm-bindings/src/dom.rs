// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DOM overlays: loader panel, quantities table, stats and status line.
//!
//! Panels are appended to a parent element outside the engine's container,
//! so clearing the container on bootstrap does not remove them. Clicks are
//! turned into [`UiAction`]s and handed to the registered action handler.

use crate::utils::js_message;
use ifc_view_core::quantities::COLUMN_ELEMENT_TYPE;
use ifc_view_core::{Overlay, OverlayHandle, SceneStats, TableEvent, UiAction, UiHost, ViewerError, ViewerStatus};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event};

pub type ActionHandler = Rc<dyn Fn(UiAction)>;

type Listener = Closure<dyn FnMut(Event)>;

struct Panel {
    element: Element,
    _listeners: Vec<Listener>,
}

/// [`UiHost`] rendering plain DOM elements.
pub struct DomUiHost {
    document: Document,
    parent: Element,
    status: RefCell<Option<Element>>,
    panels: RefCell<FxHashMap<u32, Panel>>,
    next: Cell<u32>,
    detached: Cell<bool>,
    handler: Rc<RefCell<Option<ActionHandler>>>,
}

impl DomUiHost {
    pub fn new(parent: Element) -> Result<Self, JsValue> {
        let document = parent
            .owner_document()
            .ok_or_else(|| JsValue::from_str("overlay parent is not attached to a document"))?;
        Ok(Self {
            document,
            parent,
            status: RefCell::new(None),
            panels: RefCell::new(FxHashMap::default()),
            next: Cell::new(1),
            detached: Cell::new(false),
            handler: Rc::new(RefCell::new(None)),
        })
    }

    /// Route panel interactions to `handler`.
    pub fn set_action_handler(&self, handler: ActionHandler) {
        *self.handler.borrow_mut() = Some(handler);
    }

    /// Remove the status line and drop the action handler. Later status
    /// reports are ignored.
    pub fn detach(&self) {
        self.detached.set(true);
        if let Some(status) = self.status.borrow_mut().take() {
            status.remove();
        }
        self.handler.borrow_mut().take();
    }

    fn element(&self, tag: &str, class: &str, text: Option<&str>) -> Result<Element, JsValue> {
        let element = self.document.create_element(tag)?;
        if !class.is_empty() {
            element.set_class_name(class);
        }
        if text.is_some() {
            element.set_text_content(text);
        }
        Ok(element)
    }

    fn on_click(&self, target: &Element, action: UiAction, listeners: &mut Vec<Listener>) -> Result<(), JsValue> {
        let handler = self.handler.clone();
        let listener = Closure::wrap(Box::new(move |_event: Event| {
            let current = handler.borrow().clone();
            if let Some(dispatch) = current {
                dispatch(action.clone());
            }
        }) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback("click", listener.as_ref().unchecked_ref())?;
        listeners.push(listener);
        Ok(())
    }

    fn build(&self, overlay: &Overlay) -> Result<Panel, JsValue> {
        let mut listeners = Vec::new();
        let element = match overlay {
            Overlay::LoaderPanel { label } => {
                let root = self.element("div", "ifc-view-panel ifc-view-loader", None)?;
                let heading = self.element("h3", "", Some(label.as_str()))?;
                root.append_child(&heading)?;
                let button = self.element("button", "ifc-view-button", Some("Load IFC"))?;
                self.on_click(&button, UiAction::LoadRequested, &mut listeners)?;
                root.append_child(&button)?;
                root
            }
            Overlay::QuantitiesPanel { table } => {
                let root = self.element("div", "ifc-view-panel ifc-view-quantities", None)?;
                let reset = self.element("button", "ifc-view-button", Some("Reset"))?;
                self.on_click(&reset, UiAction::ResetHighlight, &mut listeners)?;
                root.append_child(&reset)?;

                let columns = table.columns();
                let grid = self.element("table", "ifc-view-table", None)?;
                let head = self.element("tr", "", None)?;
                for column in &columns {
                    let th = self.element("th", "", Some(column.as_str()))?;
                    let event = TableEvent::ColumnHeaderClick { column: column.clone() };
                    self.on_click(&th, UiAction::Table(event), &mut listeners)?;
                    head.append_child(&th)?;
                }
                grid.append_child(&head)?;

                for record in table.records() {
                    let tr = self.element("tr", "", None)?;
                    for column in &columns {
                        let text = record.get(column).map(cell_text).unwrap_or_default();
                        let td = self.element("td", "", Some(text.as_str()))?;
                        tr.append_child(&td)?;
                    }
                    if let Some(element_type) = record.get(COLUMN_ELEMENT_TYPE).and_then(Value::as_str) {
                        let event = TableEvent::RowClick {
                            element_type: element_type.to_string(),
                        };
                        self.on_click(&tr, UiAction::Table(event), &mut listeners)?;
                    }
                    grid.append_child(&tr)?;
                }
                root.append_child(&grid)?;
                root
            }
            Overlay::Stats(stats) => self.element("div", "ifc-view-stats", Some(stats_text(stats).as_str()))?,
        };
        Ok(Panel {
            element,
            _listeners: listeners,
        })
    }

    fn status_line(&self) -> Result<Element, JsValue> {
        if let Some(status) = self.status.borrow().as_ref() {
            return Ok(status.clone());
        }
        let status = self.element("div", "ifc-view-status", None)?;
        self.parent.append_child(&status)?;
        *self.status.borrow_mut() = Some(status.clone());
        Ok(status)
    }
}

fn ui_error(value: JsValue) -> ViewerError {
    ViewerError::Ui(js_message(&value))
}

impl UiHost for DomUiHost {
    fn mount(&self, overlay: &Overlay) -> ifc_view_core::Result<OverlayHandle> {
        let panel = self.build(overlay).map_err(ui_error)?;
        self.parent.append_child(&panel.element).map_err(ui_error)?;

        let handle = OverlayHandle(self.next.get());
        self.next.set(handle.0 + 1);
        self.panels.borrow_mut().insert(handle.0, panel);
        tracing::debug!(handle = handle.0, kind = ?overlay.kind(), "Overlay mounted");
        Ok(handle)
    }

    fn update(&self, handle: OverlayHandle, overlay: &Overlay) -> ifc_view_core::Result<()> {
        let panel = self.build(overlay).map_err(ui_error)?;
        let mut panels = self.panels.borrow_mut();
        let Some(old) = panels.get(&handle.0) else {
            return Err(ViewerError::Ui(format!("overlay {} is not mounted", handle.0)));
        };
        old.element.replace_with_with_node_1(&panel.element).map_err(ui_error)?;
        panels.insert(handle.0, panel);
        Ok(())
    }

    fn unmount(&self, handle: OverlayHandle) {
        let panel = self.panels.borrow_mut().remove(&handle.0);
        if let Some(panel) = panel {
            panel.element.remove();
        }
    }

    fn report(&self, status: &ViewerStatus) {
        if self.detached.get() {
            return;
        }
        match self.status_line() {
            Ok(line) => line.set_text_content(Some(status_text(status).as_str())),
            Err(e) => tracing::warn!(error = %js_message(&e), "Status line unavailable"),
        }
    }
}

/// Table cell text: whole numbers without a fraction.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn stats_text(stats: &SceneStats) -> String {
    format!(
        "models {} | nodes {} | updates {}",
        stats.models, stats.nodes, stats.updates
    )
}

pub fn status_text(status: &ViewerStatus) -> String {
    match status {
        ViewerStatus::Initializing => "Initializing viewer...".into(),
        ViewerStatus::Ready => "Ready".into(),
        ViewerStatus::WorkerUnavailable { reason } => format!("Loading unavailable: {reason}"),
        ViewerStatus::Loading { percent } => format!("Loading... {percent:.0}%"),
        ViewerStatus::Loaded { model } => format!("Loaded {model}"),
        ViewerStatus::NotReady { message } => format!("Not ready: {message}"),
        ViewerStatus::Failed { message } => format!("Error: {message}"),
    }
}
