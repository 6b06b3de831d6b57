// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! HTTP channel used to talk to the signing service.
//!
//! Requests go through a [`SyncHttpResolver`]. The concrete transport is
//! [`reqwest::blocking::Client`]. Bearer authentication and retries are
//! resolver wrappers that can be stacked around any other resolver:
//!
//! ```text
//! RetryResolver -> BearerTokenResolver -> reqwest::blocking::Client
//! ```

use std::io;

use http::{Request, Response};

use crate::credential::CredentialError;

mod bearer;
mod reqwest;
mod retry;

pub use bearer::BearerTokenResolver;
pub use retry::{RetryOptions, RetryResolver};

// Since we use `http::Request` and `http::Response` we also expose the `http` crate.
pub use http;

/// A resolver for sync (blocking) HTTP requests.
#[cfg_attr(test, mockall::automock)]
pub trait SyncHttpResolver {
    /// Resolve a [`Request`] into a [`Response`] holding the complete body.
    fn http_resolve(&self, request: Request<Vec<u8>>)
        -> Result<Response<Vec<u8>>, HttpResolverError>;
}

impl<T: SyncHttpResolver + ?Sized> SyncHttpResolver for Box<T> {
    fn http_resolve(
        &self,
        request: Request<Vec<u8>>,
    ) -> Result<Response<Vec<u8>>, HttpResolverError> {
        (**self).http_resolve(request)
    }
}

/// An error that occurs while resolving an HTTP request.
#[derive(Debug, thiserror::Error)]
pub enum HttpResolverError {
    /// An error occured in the [`http`] crate.
    #[error(transparent)]
    Http(#[from] http::Error),

    /// An error occured during I/O.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// No bearer token could be attached to the request.
    #[error("could not obtain a bearer token: {0}")]
    Credential(#[from] CredentialError),

    /// An error occured from the underlying HTTP client.
    #[error("an error occurred from the underlying http client: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Copies a request so it can be sent again.
pub(crate) fn clone_request(request: &Request<Vec<u8>>) -> Result<Request<Vec<u8>>, http::Error> {
    let mut builder = Request::builder()
        .method(request.method().clone())
        .uri(request.uri().clone())
        .version(request.version());

    if let Some(headers) = builder.headers_mut() {
        headers.extend(request.headers().clone());
    }

    builder.body(request.body().clone())
}
