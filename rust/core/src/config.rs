// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer configuration.
//!
//! Every field has a default so embedders only override what they need. The
//! browser bindings deserialize this from a plain JavaScript object.

use crate::error::{Result, ViewerError};
use serde::{Deserialize, Serialize};

/// Default model download endpoint.
pub const DEFAULT_ENDPOINT: &str = "/api/system_model/download";

/// Default location of the fragments worker script.
pub const DEFAULT_WORKER_URL: &str = "https://thatopen.github.io/engine_fragment/resources/worker.mjs";

/// Default location of the IFC parser wasm files.
pub const DEFAULT_WASM_PATH: &str = "/wasm/";

/// How overlapping `load` calls on one viewport are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadPolicy {
    /// Every call runs independently and every parsed model is inserted.
    #[default]
    Concurrent,
    /// Calls run one after another in arrival order.
    Serialized,
}

/// Parameters of the model loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Directory holding the IFC parser wasm files.
    pub wasm_path: String,
    /// Whether `wasm_path` is absolute rather than relative to the page.
    pub wasm_absolute: bool,
    /// Worker script fetched at startup.
    pub worker_url: String,
    /// Treat downloaded bytes as precompiled fragments instead of IFC.
    pub use_fragments_format: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            wasm_path: DEFAULT_WASM_PATH.into(),
            wasm_absolute: false,
            worker_url: DEFAULT_WORKER_URL.into(),
            use_fragments_format: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Projection {
    #[default]
    Perspective,
    Orthographic,
}

/// Initial camera placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
    pub position: [f64; 3],
    pub target: [f64; 3],
    pub projection: Projection,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [78.0, 20.0, -2.2],
            target: [26.0, -4.0, 25.0],
            projection: Projection::Perspective,
        }
    }
}

/// Material applied to highlighted elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HighlightStyle {
    /// CSS hex color, e.g. `#bcf124`.
    pub color: String,
    pub opacity: f64,
    pub transparent: bool,
    /// 0 = front faces, 1 = back faces, 2 = both.
    pub rendered_faces: u8,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: "#bcf124".into(),
            opacity: 1.0,
            transparent: false,
            rendered_faces: 0,
        }
    }
}

impl HighlightStyle {
    /// Parse `color` into RGB components in `0.0..=1.0`.
    pub fn rgb(&self) -> Option<[f32; 3]> {
        let hex = self.color.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .ok()
                .map(|v| v as f32 / 255.0)
        };
        Some([channel(0)?, channel(2)?, channel(4)?])
    }
}

/// Complete viewer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    /// Endpoint the load trigger downloads the model from.
    pub endpoint: String,
    pub loader: LoaderConfig,
    pub camera: CameraConfig,
    pub load_policy: LoadPolicy,
    pub highlight: HighlightStyle,
    /// Building levels shown as columns of the quantities table.
    pub levels: Vec<String>,
    /// Base name given to loaded models.
    pub model_name: String,
    /// Mount the performance stats overlay.
    pub show_stats: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            loader: LoaderConfig::default(),
            camera: CameraConfig::default(),
            load_policy: LoadPolicy::default(),
            highlight: HighlightStyle::default(),
            levels: vec!["Level 1".into(), "Level 2".into(), "Level 3".into()],
            model_name: "model".into(),
            show_stats: false,
        }
    }
}

impl ViewerConfig {
    /// Parse a JSON document, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ViewerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ViewerError::Config("endpoint must not be empty".into()));
        }
        if self.loader.worker_url.trim().is_empty() {
            return Err(ViewerError::Config("loader.workerUrl must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.highlight.opacity) {
            return Err(ViewerError::Config(format!(
                "highlight.opacity must be within 0..=1, got {}",
                self.highlight.opacity
            )));
        }
        if self.highlight.rgb().is_none() {
            return Err(ViewerError::Config(format!(
                "highlight.color must be a #rrggbb color, got {:?}",
                self.highlight.color
            )));
        }
        let finite = |v: &[f64; 3]| v.iter().all(|c| c.is_finite());
        if !finite(&self.camera.position) || !finite(&self.camera.target) {
            return Err(ViewerError::Config("camera coordinates must be finite".into()));
        }
        if self.model_name.trim().is_empty() {
            return Err(ViewerError::Config("modelName must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_match_reference_setup() {
        let config = ViewerConfig::default();
        assert_eq!(config.endpoint, "/api/system_model/download");
        assert_eq!(config.loader.wasm_path, "/wasm/");
        assert!(!config.loader.wasm_absolute);
        assert_eq!(config.camera.position, [78.0, 20.0, -2.2]);
        assert_eq!(config.camera.target, [26.0, -4.0, 25.0]);
        assert_eq!(config.load_policy, LoadPolicy::Concurrent);
        assert_eq!(config.levels.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial_override() {
        let config = ViewerConfig::from_json(
            r#"{
                "endpoint": "/api/basic_structure/download",
                "loadPolicy": "serialized",
                "loader": { "useFragmentsFormat": true }
            }"#,
        )
        .unwrap();

        assert_eq!(config.endpoint, "/api/basic_structure/download");
        assert_eq!(config.load_policy, LoadPolicy::Serialized);
        assert!(config.loader.use_fragments_format);
        // Untouched nested fields keep their defaults
        assert_eq!(config.loader.worker_url, DEFAULT_WORKER_URL);
        assert_eq!(config.model_name, "model");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ViewerConfig::default();
        config.highlight.opacity = 1.5;
        assert!(matches!(config.validate(), Err(ViewerError::Config(_))));

        let mut config = ViewerConfig::default();
        config.endpoint = "  ".into();
        assert!(config.validate().is_err());

        let mut config = ViewerConfig::default();
        config.camera.target[1] = f64::NAN;
        assert!(config.validate().is_err());

        assert!(matches!(
            ViewerConfig::from_json("{ not json"),
            Err(ViewerError::Config(_))
        ));
    }

    #[test]
    fn test_highlight_rgb() {
        let [r, g, b] = HighlightStyle::default().rgb().unwrap();
        assert_relative_eq!(r, 188.0 / 255.0);
        assert_relative_eq!(g, 241.0 / 255.0);
        assert_relative_eq!(b, 36.0 / 255.0);

        let style = HighlightStyle {
            color: "green".into(),
            ..Default::default()
        };
        assert!(style.rgb().is_none());
    }
}
