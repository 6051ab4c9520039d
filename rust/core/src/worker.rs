// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Worker provisioning.
//!
//! The parsing worker is fetched as source and turned into a locally
//! addressable module (a Blob object URL in the browser). The URL must be
//! revoked once the viewport goes away.

use crate::error::{Result, ViewerError};
use crate::fetch::Fetcher;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// File name given to the materialized worker module.
pub const WORKER_FILE_NAME: &str = "worker.mjs";

/// MIME type of the worker module.
pub const WORKER_MIME_TYPE: &str = "text/javascript";

/// Turns fetched bytes into addressable module URLs.
pub trait ModuleRegistry {
    fn create_module_url(&self, source: &[u8], file_name: &str, mime_type: &str) -> std::result::Result<String, String>;
    fn revoke(&self, url: &str);
}

/// Addressable reference to the worker module. Revoked at most once.
pub struct WorkerHandle {
    url: String,
    registry: Rc<dyn ModuleRegistry>,
    revoked: Cell<bool>,
}

impl WorkerHandle {
    pub fn new(url: String, registry: Rc<dyn ModuleRegistry>) -> Self {
        Self {
            url,
            registry,
            revoked: Cell::new(false),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn revoke(&self) {
        if !self.revoked.replace(true) {
            tracing::debug!(url = %self.url, "Revoking worker URL");
            self.registry.revoke(&self.url);
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.revoke();
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("url", &self.url)
            .field("revoked", &self.revoked.get())
            .finish()
    }
}

/// Fetch the worker script from `url` and materialize it as a module.
pub async fn provision(
    fetcher: &dyn Fetcher,
    registry: Rc<dyn ModuleRegistry>,
    url: &str,
) -> Result<WorkerHandle> {
    tracing::info!(url, "Fetching worker script");

    let response = fetcher
        .get(url)
        .await
        .map_err(|e| ViewerError::WorkerProvision(format!("fetching {url}: {e}")))?;
    if !response.is_success() {
        return Err(ViewerError::WorkerProvision(format!(
            "fetching {url}: HTTP status {}",
            response.status
        )));
    }
    if response.body.is_empty() {
        return Err(ViewerError::WorkerProvision(format!("{url} returned an empty script")));
    }

    let module_url = registry
        .create_module_url(&response.body, WORKER_FILE_NAME, WORKER_MIME_TYPE)
        .map_err(ViewerError::WorkerProvision)?;

    tracing::info!(module_url = %module_url, bytes = response.body.len(), "Worker script materialized");
    Ok(WorkerHandle::new(module_url, registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::HttpResponse;
    use futures::future::LocalBoxFuture;
    use futures::FutureExt;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Registry {
        created: RefCell<Vec<(usize, String, String)>>,
        revoked: RefCell<Vec<String>>,
    }

    impl ModuleRegistry for Registry {
        fn create_module_url(&self, source: &[u8], file_name: &str, mime_type: &str) -> std::result::Result<String, String> {
            let mut created = self.created.borrow_mut();
            created.push((source.len(), file_name.to_string(), mime_type.to_string()));
            Ok(format!("blob:worker-{}", created.len()))
        }

        fn revoke(&self, url: &str) {
            self.revoked.borrow_mut().push(url.to_string());
        }
    }

    struct Canned(u16, &'static [u8]);

    impl Fetcher for Canned {
        fn get(&self, _url: &str) -> LocalBoxFuture<'static, std::result::Result<HttpResponse, String>> {
            let response = HttpResponse {
                status: self.0,
                body: self.1.to_vec(),
            };
            async move { Ok(response) }.boxed_local()
        }
    }

    #[tokio::test]
    async fn test_provision_materializes_module() {
        let registry = Rc::new(Registry::default());
        let handle = provision(&Canned(200, b"export {}"), registry.clone(), "https://host/worker.mjs")
            .await
            .unwrap();

        assert_eq!(handle.url(), "blob:worker-1");
        assert_eq!(
            registry.created.borrow()[0],
            (9, "worker.mjs".to_string(), "text/javascript".to_string())
        );
    }

    #[tokio::test]
    async fn test_provision_fails_on_error_status() {
        let registry = Rc::new(Registry::default());
        let err = provision(&Canned(503, b""), registry.clone(), "https://host/worker.mjs")
            .await
            .unwrap_err();

        assert!(matches!(err, ViewerError::WorkerProvision(_)));
        assert!(registry.created.borrow().is_empty());
    }

    #[test]
    fn test_revoke_is_idempotent_and_runs_on_drop() {
        let registry = Rc::new(Registry::default());
        let handle = WorkerHandle::new("blob:a".into(), registry.clone());
        handle.revoke();
        handle.revoke();
        drop(handle);
        assert_eq!(*registry.revoked.borrow(), vec!["blob:a".to_string()]);

        drop(WorkerHandle::new("blob:b".into(), registry.clone()));
        assert_eq!(registry.revoked.borrow().len(), 2);
    }
}
