// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Readiness gate
//!
//! Makes the ordering of the asynchronous setup explicit: the scene must exist
//! before the worker is provisioned, and the worker must exist before a load is
//! accepted. Callers either check a capability synchronously or await it.

use crate::error::{Result, ViewerError};
use futures::channel::oneshot;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// A prerequisite resource tracked by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Scene graph, camera and renderer exist.
    Scene,
    /// The parsing worker has been provisioned and attached.
    Worker,
    /// At least one model is loaded and the highlighter is active.
    Highlighter,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Scene, Capability::Worker, Capability::Highlighter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Scene => "scene",
            Capability::Worker => "worker",
            Capability::Highlighter => "highlighter",
        }
    }

    /// Parse the lowercase name used by the JavaScript API.
    pub fn from_name(name: &str) -> Option<Self> {
        Capability::ALL.into_iter().find(|cap| cap.as_str() == name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapabilityState {
    #[default]
    Pending,
    Ready,
    Unavailable,
}

#[derive(Default)]
struct GateState {
    capabilities: FxHashMap<Capability, CapabilityState>,
    waiters: Vec<(Capability, oneshot::Sender<bool>)>,
}

impl GateState {
    fn settle(&mut self, cap: Capability, state: CapabilityState) {
        self.capabilities.insert(cap, state);
        let ready = state == CapabilityState::Ready;
        let (matching, rest): (Vec<_>, Vec<_>) =
            self.waiters.drain(..).partition(|(waiting, _)| *waiting == cap);
        self.waiters = rest;
        for (_, tx) in matching {
            // The waiter may have been dropped; that is fine.
            let _ = tx.send(ready);
        }
    }
}

/// Shared, cloneable readiness gate.
#[derive(Clone, Default)]
pub struct ReadinessGate {
    state: Rc<RefCell<GateState>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, cap: Capability) -> CapabilityState {
        self.state
            .borrow()
            .capabilities
            .get(&cap)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_ready(&self, cap: Capability) -> bool {
        self.state(cap) == CapabilityState::Ready
    }

    /// Mark a capability as available and wake everyone waiting on it.
    pub fn publish(&self, cap: Capability) {
        self.state.borrow_mut().settle(cap, CapabilityState::Ready);
    }

    /// Mark a capability as permanently missing for this viewport.
    pub fn mark_unavailable(&self, cap: Capability) {
        self.state.borrow_mut().settle(cap, CapabilityState::Unavailable);
    }

    /// Close the gate: every capability becomes unavailable.
    pub fn close(&self) {
        let mut state = self.state.borrow_mut();
        for cap in Capability::ALL {
            state.settle(cap, CapabilityState::Unavailable);
        }
    }

    /// Immediate check, never waits.
    pub fn check(&self, cap: Capability) -> Result<()> {
        if self.is_ready(cap) {
            Ok(())
        } else {
            Err(ViewerError::NotReady(cap))
        }
    }

    /// Resolve once `cap` is published, or with `NotReady` if it never will be.
    pub fn await_ready(&self, cap: Capability) -> impl Future<Output = Result<()>> + 'static {
        let receiver = {
            let mut state = self.state.borrow_mut();
            match state.capabilities.get(&cap).copied().unwrap_or_default() {
                CapabilityState::Ready => None,
                CapabilityState::Unavailable => Some(Err(())),
                CapabilityState::Pending => {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push((cap, tx));
                    Some(Ok(rx))
                }
            }
        };

        async move {
            match receiver {
                None => Ok(()),
                Some(Err(())) => Err(ViewerError::NotReady(cap)),
                Some(Ok(rx)) => match rx.await {
                    Ok(true) => Ok(()),
                    _ => Err(ViewerError::NotReady(cap)),
                },
            }
        }
    }

    /// Number of futures currently waiting on the gate.
    pub fn pending_waiters(&self) -> usize {
        self.state.borrow().waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_before_and_after_publish() {
        let gate = ReadinessGate::new();
        assert_eq!(gate.check(Capability::Worker), Err(ViewerError::NotReady(Capability::Worker)));

        gate.publish(Capability::Worker);
        assert!(gate.check(Capability::Worker).is_ok());
        assert!(gate.check(Capability::Scene).is_err());
    }

    #[tokio::test]
    async fn test_await_ready_resolves_on_publish() {
        let gate = ReadinessGate::new();
        let waiting = gate.await_ready(Capability::Scene);
        assert_eq!(gate.pending_waiters(), 1);

        gate.publish(Capability::Scene);
        assert!(waiting.await.is_ok());
        assert_eq!(gate.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn test_await_ready_fails_when_closed() {
        let gate = ReadinessGate::new();
        let worker = gate.await_ready(Capability::Worker);
        let scene = gate.await_ready(Capability::Scene);

        gate.close();

        assert_eq!(worker.await, Err(ViewerError::NotReady(Capability::Worker)));
        assert_eq!(scene.await, Err(ViewerError::NotReady(Capability::Scene)));
        assert_eq!(gate.state(Capability::Highlighter), CapabilityState::Unavailable);
    }

    #[tokio::test]
    async fn test_unavailable_only_wakes_matching_waiters() {
        let gate = ReadinessGate::new();
        let worker = gate.await_ready(Capability::Worker);
        let _scene = gate.await_ready(Capability::Scene);

        gate.mark_unavailable(Capability::Worker);
        assert!(worker.await.is_err());
        assert_eq!(gate.pending_waiters(), 1);

        // Already settled capabilities resolve without registering a waiter
        assert!(gate.await_ready(Capability::Worker).await.is_err());
        assert_eq!(gate.pending_waiters(), 1);
    }

    #[test]
    fn test_capability_names() {
        assert_eq!(Capability::from_name("worker"), Some(Capability::Worker));
        assert_eq!(Capability::from_name("renderer"), None);
        assert_eq!(Capability::Highlighter.to_string(), "highlighter");
    }
}
