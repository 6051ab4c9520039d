// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Surface readiness monitoring.
//!
//! A renderer created inside a zero-height container produces a degenerate
//! viewport, so initialization waits until the host reports a real size.

use serde::{Deserialize, Serialize};

/// Observed size of the host container, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
}

impl SurfaceSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_renderable(&self) -> bool {
        self.height.is_finite() && self.height > 0.0
    }

}

/// Platform size source (e.g. a `ResizeObserver`) that can be stopped.
pub trait SurfaceObserver {
    fn disconnect(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorPhase {
    #[default]
    Idle,
    Observing,
    Fired,
    Disconnected,
}

/// One-shot gate between size observations and scene initialization.
#[derive(Debug, Default)]
pub struct ReadinessMonitor {
    phase: MonitorPhase,
    last_size: Option<SurfaceSize>,
}

impl ReadinessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn last_size(&self) -> Option<SurfaceSize> {
        self.last_size
    }

    pub fn start(&mut self) {
        if self.phase == MonitorPhase::Idle {
            self.phase = MonitorPhase::Observing;
        }
    }

    /// Record a size observation. Returns `true` exactly once, on the first
    /// renderable size seen while observing.
    pub fn observe(&mut self, size: SurfaceSize) -> bool {
        if self.phase != MonitorPhase::Observing {
            return false;
        }
        self.last_size = Some(size);
        if size.is_renderable() {
            self.phase = MonitorPhase::Fired;
            true
        } else {
            false
        }
    }

    pub fn disconnect(&mut self) {
        if self.phase != MonitorPhase::Fired {
            self.phase = MonitorPhase::Disconnected;
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == MonitorPhase::Observing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_on_first_positive_height() {
        let mut monitor = ReadinessMonitor::new();
        monitor.start();

        assert!(!monitor.observe(SurfaceSize::new(800.0, 0.0)));
        assert!(!monitor.observe(SurfaceSize::new(0.0, -3.0)));
        assert!(monitor.observe(SurfaceSize::new(800.0, 600.0)));
        assert!(!monitor.observe(SurfaceSize::new(1024.0, 768.0)));
        assert_eq!(monitor.phase(), MonitorPhase::Fired);
    }

    #[test]
    fn test_ignores_observations_before_start_and_after_disconnect() {
        let mut monitor = ReadinessMonitor::new();
        assert!(!monitor.observe(SurfaceSize::new(800.0, 600.0)));

        monitor.start();
        monitor.disconnect();
        assert!(!monitor.observe(SurfaceSize::new(800.0, 600.0)));
        assert_eq!(monitor.phase(), MonitorPhase::Disconnected);
        assert!(!monitor.is_active());
    }

    #[test]
    fn test_nan_height_is_not_renderable() {
        assert!(!SurfaceSize::new(10.0, f64::NAN).is_renderable());
        assert!(!SurfaceSize::new(10.0, f64::INFINITY).is_renderable());
        assert!(SurfaceSize::new(0.0, 1.0).is_renderable());
    }
}
