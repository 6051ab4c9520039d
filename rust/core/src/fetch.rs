// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP access used by the worker provisioner and the model loader.

use crate::error::{Result, ViewerError};
use futures::future::LocalBoxFuture;

/// Response to a GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests. An `Err` means the request itself failed (network,
/// CORS, abort); HTTP error statuses are returned as responses.
pub trait Fetcher {
    fn get(&self, url: &str) -> LocalBoxFuture<'static, std::result::Result<HttpResponse, String>>;
}

/// GET `url` and return the body of a successful response.
pub async fn fetch_bytes(fetcher: &dyn Fetcher, url: &str) -> Result<Vec<u8>> {
    let response = fetcher.get(url).await.map_err(ViewerError::Network)?;
    tracing::debug!(url, status = response.status, bytes = response.body.len(), "Fetch response received");

    if !response.is_success() {
        return Err(ViewerError::Fetch {
            status: response.status,
        });
    }
    Ok(response.body)
}
