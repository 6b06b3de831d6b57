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

use std::sync::Arc;

use http::{header, HeaderValue, Request, Response};

use crate::{
    credential::{CredentialError, TokenCredential},
    http::{HttpResolverError, SyncHttpResolver},
};

/// Attaches an `Authorization: Bearer <token>` header to every request.
///
/// A token is requested from the credential for each request; caching and
/// refreshing tokens is up to the [`TokenCredential`].
pub struct BearerTokenResolver<T> {
    inner: T,
    credential: Arc<dyn TokenCredential>,
    scope: String,
}

impl<T> BearerTokenResolver<T> {
    pub fn new(inner: T, credential: Arc<dyn TokenCredential>, scope: impl Into<String>) -> Self {
        Self {
            inner,
            credential,
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl<T: SyncHttpResolver> SyncHttpResolver for BearerTokenResolver<T> {
    fn http_resolve(
        &self,
        mut request: Request<Vec<u8>>,
    ) -> Result<Response<Vec<u8>>, HttpResolverError> {
        let token = self.credential.get_token(&self.scope)?;

        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.token))
            .map_err(|_| CredentialError::InvalidToken)?;
        value.set_sensitive(true);

        request.headers_mut().insert(header::AUTHORIZATION, value);
        self.inner.http_resolve(request)
    }
}
