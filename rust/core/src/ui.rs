// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Overlay panels and status reporting.
//!
//! Overlays live outside any managed component tree, so they are mounted and
//! unmounted explicitly through a [`UiHost`]. User interactions come back as
//! [`UiAction`]s dispatched to the viewport.

use crate::error::{Result, ViewerError};
use crate::quantities::{QuantityTable, TableEvent};
use serde::Serialize;

/// Opaque handle of a mounted overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayHandle(pub u32);

/// Snapshot shown by the stats overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneStats {
    pub models: usize,
    pub nodes: usize,
    pub updates: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    /// Panel with the "Load IFC" trigger.
    LoaderPanel { label: String },
    /// Reset button plus the element quantity table.
    QuantitiesPanel { table: QuantityTable },
    /// Performance and scene statistics.
    Stats(SceneStats),
}

impl Overlay {
    pub fn loader_panel() -> Self {
        Overlay::LoaderPanel {
            label: "IFC Loader".into(),
        }
    }

    pub fn kind(&self) -> OverlayKind {
        match self {
            Overlay::LoaderPanel { .. } => OverlayKind::LoaderPanel,
            Overlay::QuantitiesPanel { .. } => OverlayKind::QuantitiesPanel,
            Overlay::Stats(_) => OverlayKind::Stats,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    LoaderPanel,
    QuantitiesPanel,
    Stats,
}

/// User-visible pipeline status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ViewerStatus {
    Initializing,
    Ready,
    WorkerUnavailable { reason: String },
    Loading { percent: f64 },
    Loaded { model: String },
    NotReady { message: String },
    Failed { message: String },
}

impl ViewerStatus {
    pub fn from_error(err: &ViewerError) -> Self {
        if err.is_not_ready() {
            ViewerStatus::NotReady {
                message: err.to_string(),
            }
        } else {
            ViewerStatus::Failed {
                message: err.to_string(),
            }
        }
    }
}

/// Interaction raised by an overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    LoadRequested,
    ResetHighlight,
    Table(TableEvent),
}

/// Host able to attach overlays next to the rendering canvas.
pub trait UiHost {
    fn mount(&self, overlay: &Overlay) -> Result<OverlayHandle>;
    fn update(&self, handle: OverlayHandle, overlay: &Overlay) -> Result<()>;
    /// Must tolerate handles that are already gone.
    fn unmount(&self, handle: OverlayHandle);
    fn report(&self, status: &ViewerStatus);
}

/// Overlays mounted by one viewport.
#[derive(Debug, Default)]
pub struct OverlayTracker {
    mounted: Vec<(OverlayKind, OverlayHandle)>,
}

impl OverlayTracker {
    pub fn track(&mut self, kind: OverlayKind, handle: OverlayHandle) {
        self.mounted.push((kind, handle));
    }

    pub fn find(&self, kind: OverlayKind) -> Option<OverlayHandle> {
        self.mounted.iter().find(|(k, _)| *k == kind).map(|(_, h)| *h)
    }

    pub fn len(&self) -> usize {
        self.mounted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty()
    }

    /// Hand back every handle, most recently mounted first.
    pub fn drain(&mut self) -> Vec<OverlayHandle> {
        self.mounted.drain(..).rev().map(|(_, h)| h).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::Capability;

    #[test]
    fn test_tracker_drains_in_reverse_order() {
        let mut tracker = OverlayTracker::default();
        tracker.track(OverlayKind::LoaderPanel, OverlayHandle(1));
        tracker.track(OverlayKind::Stats, OverlayHandle(2));

        assert_eq!(tracker.find(OverlayKind::Stats), Some(OverlayHandle(2)));
        assert_eq!(tracker.drain(), vec![OverlayHandle(2), OverlayHandle(1)]);
        assert!(tracker.is_empty());
        assert!(tracker.drain().is_empty());
    }

    #[test]
    fn test_status_from_error() {
        let status = ViewerStatus::from_error(&ViewerError::NotReady(Capability::Worker));
        assert_eq!(
            status,
            ViewerStatus::NotReady {
                message: "worker is not ready".into()
            }
        );

        let status = ViewerStatus::from_error(&ViewerError::Fetch { status: 404 });
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], "HTTP error! status: 404");
    }
}
