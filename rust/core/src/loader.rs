// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model loading.
//!
//! Fetch, validate, parse, then insert. Nothing touches the scene graph until
//! the engine has produced a model and the scene is confirmed to be alive, so
//! a failed or orphaned load leaves the viewport exactly as it was.

use crate::config::{LoadPolicy, LoaderConfig};
use crate::engine::{Engine, ParseRequest};
use crate::error::{Result, ViewerError};
use crate::fetch::fetch_bytes;
use crate::gate::Capability;
use crate::progress::LoadStage;
use crate::scene::{ModelId, NodeId};
use crate::ui::ViewerStatus;
use crate::viewport::{Inner, Viewport};
use memchr::memmem;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// STEP physical file magic every IFC file starts with.
const STEP_MAGIC: &[u8] = b"ISO-10303-21";

/// How far into the payload the header is searched.
const HEADER_WINDOW: usize = 4096;

/// Schemas recognised in `FILE_SCHEMA`, most specific first.
const KNOWN_SCHEMAS: [&str; 4] = ["IFC4X3", "IFC4X2", "IFC4", "IFC2X3"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelFormat {
    Ifc,
    Fragments,
}

impl ModelFormat {
    pub fn from_config(loader: &LoaderConfig) -> Self {
        if loader.use_fragments_format {
            ModelFormat::Fragments
        } else {
            ModelFormat::Ifc
        }
    }
}

fn header(bytes: &[u8]) -> &[u8] {
    &bytes[..bytes.len().min(HEADER_WINDOW)]
}

fn is_step(bytes: &[u8]) -> bool {
    memmem::find(header(bytes), STEP_MAGIC).is_some()
}

/// Schema identifier from the STEP header, if present.
pub fn sniff_ifc_schema(bytes: &[u8]) -> Option<&'static str> {
    let header = header(bytes);
    let start = memmem::find(header, b"FILE_SCHEMA")?;
    let clause = &header[start..];
    let end = memchr::memchr(b';', clause).unwrap_or(clause.len());
    let clause = &clause[..end];

    KNOWN_SCHEMAS
        .into_iter()
        .find(|schema| memmem::find(clause, schema.as_bytes()).is_some())
}

/// Reject payloads that cannot be the configured format before handing them
/// to the engine. Returns the IFC schema when one is declared.
pub fn validate_payload(bytes: &[u8], format: ModelFormat) -> Result<Option<&'static str>> {
    if bytes.is_empty() {
        return Err(ViewerError::Parse("empty model payload".into()));
    }
    match format {
        ModelFormat::Ifc => {
            if !is_step(bytes) {
                return Err(ViewerError::Parse("payload is not an IFC (STEP) file".into()));
            }
            Ok(sniff_ifc_schema(bytes))
        }
        ModelFormat::Fragments => {
            if is_step(bytes) {
                return Err(ViewerError::Parse(
                    "payload is an IFC file but the fragments format is configured".into(),
                ));
            }
            Ok(None)
        }
    }
}

/// A model inserted into the scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedModel {
    pub id: ModelId,
    pub endpoint: String,
    pub node: NodeId,
    pub format: ModelFormat,
    pub schema: Option<String>,
    pub byte_len: usize,
    pub camera_bound: bool,
}

/// Counts a load as in flight for as long as it lives.
struct InFlight<'a, E: Engine> {
    inner: &'a RefCell<Inner<E>>,
}

impl<'a, E: Engine> InFlight<'a, E> {
    fn enter(inner: &'a RefCell<Inner<E>>) -> Self {
        inner.borrow_mut().in_flight += 1;
        Self { inner }
    }
}

impl<E: Engine> Drop for InFlight<'_, E> {
    fn drop(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }
}

impl<E: Engine + 'static> Viewport<E> {
    /// Load the model served at `endpoint` into the scene.
    ///
    /// Resolves to `NotReady` when no worker is available (not provisioned yet,
    /// unavailable, or torn down), and when the viewport is torn down before the
    /// parsed model could be inserted.
    pub async fn load(&self, endpoint: &str) -> Result<LoadedModel> {
        let shared = self.shared();
        if let Err(e) = shared.gate.check(Capability::Worker) {
            tracing::warn!(endpoint, "Components not initialized yet");
            return Err(e);
        }

        let _serial = match shared.config.load_policy {
            LoadPolicy::Serialized => Some(shared.load_lock.lock().await),
            LoadPolicy::Concurrent => None,
        };
        // The viewport may have been torn down while queued
        shared.gate.check(Capability::Worker)?;

        let _in_flight = InFlight::enter(self.inner());
        let progress = shared.progress.sink(endpoint);

        tracing::info!(endpoint, "Starting IFC load");
        self.report_status(&ViewerStatus::Loading { percent: 0.0 });
        progress.report(LoadStage::Fetching, 0.0);

        let bytes = fetch_bytes(&*shared.services.fetcher, endpoint).await?;
        let format = ModelFormat::from_config(&shared.config.loader);
        let schema = validate_payload(&bytes, format)?;
        let byte_len = bytes.len();
        tracing::debug!(endpoint, byte_len, ?format, schema, "Buffer loaded, starting parser");

        let (id, request) = {
            let inner = &mut *self.inner().borrow_mut();
            if !inner.scene.as_ref().is_some_and(|scene| scene.is_alive()) {
                return Err(ViewerError::NotReady(Capability::Scene));
            }
            inner.next_model += 1;
            let id = ModelId(format!("{}-{}", shared.config.model_name, inner.next_model));
            let request = ParseRequest {
                name: id.0.clone(),
                format,
                coordinate: false,
            };
            (id, request)
        };
        // No mutable borrow across parse(): progress listeners may read the viewport
        let parse = {
            let inner = self.inner().borrow();
            let scene = inner
                .scene
                .as_ref()
                .filter(|scene| scene.is_alive())
                .ok_or(ViewerError::NotReady(Capability::Scene))?;
            scene.engine().parse(bytes, request, progress.clone())
        };

        let model = parse.await.map_err(|e| ViewerError::Parse(e.to_string()))?;
        progress.report(LoadStage::Inserting, 100.0);

        let loaded = {
            let inner = &mut *self.inner().borrow_mut();
            let Some(scene) = inner.scene.as_mut().filter(|scene| scene.is_alive()) else {
                tracing::debug!(model = %id, endpoint, "Discarding model parsed after teardown");
                return Err(ViewerError::NotReady(Capability::Scene));
            };
            let node = scene.insert_model(id.clone(), model);
            let loaded = LoadedModel {
                id,
                endpoint: endpoint.to_string(),
                node,
                format,
                schema: schema.map(str::to_string),
                byte_len,
                camera_bound: true,
            };
            inner.models.push(loaded.clone());
            loaded
        };

        progress.report(LoadStage::Done, 100.0);
        tracing::info!(model = %loaded.id, endpoint, byte_len, "IFC load completed");
        self.report_status(&ViewerStatus::Loaded {
            model: loaded.id.to_string(),
        });

        self.activate_highlighter().await;
        self.refresh_stats();
        Ok(loaded)
    }

    /// Load from the configured endpoint. This is the UI boundary: failures
    /// are logged and reported, never returned.
    pub async fn trigger_load(&self) -> Option<LoadedModel> {
        let endpoint = self.shared().config.endpoint.clone();
        match self.load(&endpoint).await {
            Ok(model) => Some(model),
            Err(e) => {
                self.report_error("Error loading IFC", &e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IFC4_HEADER: &[u8] = b"ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'P',$,$,$,$,$,$);\nENDSEC;\nEND-ISO-10303-21;\n";

    #[test]
    fn test_sniff_schema_prefers_specific_identifier() {
        assert_eq!(sniff_ifc_schema(IFC4_HEADER), Some("IFC4"));
        assert_eq!(sniff_ifc_schema(b"ISO-10303-21;\nFILE_SCHEMA(('IFC4X3_ADD2'));"), Some("IFC4X3"));
        assert_eq!(sniff_ifc_schema(b"ISO-10303-21;\nFILE_SCHEMA(('IFC2X3'));"), Some("IFC2X3"));
        assert_eq!(sniff_ifc_schema(b"ISO-10303-21;\nDATA;"), None);
    }

    #[test]
    fn test_validate_ifc_payload() {
        assert_eq!(validate_payload(IFC4_HEADER, ModelFormat::Ifc).unwrap(), Some("IFC4"));
        assert!(matches!(
            validate_payload(b"<html>404</html>", ModelFormat::Ifc),
            Err(ViewerError::Parse(_))
        ));
        assert!(matches!(validate_payload(b"", ModelFormat::Ifc), Err(ViewerError::Parse(_))));
    }

    #[test]
    fn test_validate_fragments_payload() {
        assert_eq!(validate_payload(&[0x1f, 0x8b, 0x08, 0x00], ModelFormat::Fragments).unwrap(), None);
        assert!(validate_payload(IFC4_HEADER, ModelFormat::Fragments).is_err());
    }

    #[test]
    fn test_format_from_config() {
        let mut loader = LoaderConfig::default();
        assert_eq!(ModelFormat::from_config(&loader), ModelFormat::Ifc);
        loader.use_fragments_format = true;
        assert_eq!(ModelFormat::from_config(&loader), ModelFormat::Fragments);
    }
}
