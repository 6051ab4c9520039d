// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Load progress reporting.

use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// Pipeline stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadStage {
    Fetching,
    Parsing,
    Inserting,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Endpoint the model is loaded from.
    pub endpoint: String,
    pub stage: LoadStage,
    /// 0..=100
    pub percent: f64,
}

type Listener = Rc<dyn Fn(&ProgressEvent)>;

/// Registered progress listeners, shared between the viewport and in-flight
/// loads. Kept outside the viewport state so listeners may call back into it.
#[derive(Clone, Default)]
pub struct ProgressListeners {
    listeners: Rc<RefCell<Vec<Listener>>>,
}

impl ProgressListeners {
    pub fn add(&self, listener: impl Fn(&ProgressEvent) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn emit(&self, event: &ProgressEvent) {
        // Snapshot so a listener can register another one while being called
        let snapshot: Vec<Listener> = self.listeners.borrow().clone();
        for listener in snapshot {
            listener(event);
        }
    }

    /// Sink bound to one load call.
    pub fn sink(&self, endpoint: &str) -> ProgressSink {
        ProgressSink {
            listeners: self.clone(),
            endpoint: endpoint.to_string(),
        }
    }
}

/// Progress reporter handed to the engine for a single parse.
#[derive(Clone)]
pub struct ProgressSink {
    listeners: ProgressListeners,
    endpoint: String,
}

impl ProgressSink {
    pub fn report(&self, stage: LoadStage, percent: f64) {
        let percent = if percent.is_finite() { percent.clamp(0.0, 100.0) } else { 0.0 };
        tracing::debug!(endpoint = %self.endpoint, ?stage, percent, "Loading progress");
        self.listeners.emit(&ProgressEvent {
            endpoint: self.endpoint.clone(),
            stage,
            percent,
        });
    }

    /// Engine-side parse progress.
    pub fn parsing(&self, percent: f64) {
        self.report(LoadStage::Parsing, percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_clamps_and_tags_events() {
        let listeners = ProgressListeners::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in = seen.clone();
        listeners.add(move |event| seen_in.borrow_mut().push(event.clone()));

        let sink = listeners.sink("/api/a/download");
        sink.parsing(42.0);
        sink.parsing(250.0);
        sink.report(LoadStage::Fetching, f64::NAN);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].percent, 42.0);
        assert_eq!(seen[1].percent, 100.0);
        assert_eq!(seen[2].percent, 0.0);
        assert_eq!(seen[2].stage, LoadStage::Fetching);
        assert!(seen.iter().all(|e| e.endpoint == "/api/a/download"));
    }

    #[test]
    fn test_listener_can_register_during_emit() {
        let listeners = ProgressListeners::default();
        let inner = listeners.clone();
        listeners.add(move |_| inner.add(|_| {}));

        listeners.sink("x").parsing(1.0);
        assert_eq!(listeners.len(), 2);
    }
}
