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

use std::{thread, time::Duration};

use http::{header, Request, Response, StatusCode};
use log::{debug, warn};

use crate::http::{clone_request, HttpResolverError, SyncHttpResolver};

/// Bounds for [`RetryResolver`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryOptions {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the first retry. Doubled after every retry.
    pub initial_backoff: Duration,

    /// Upper bound on any single delay, including server supplied `Retry-After`.
    pub max_backoff: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(800),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryOptions {
    /// Options that never retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Resends requests that failed in transport or returned a transient status.
///
/// Every attempt is traced at `debug` level; retries are logged as warnings.
pub struct RetryResolver<T> {
    inner: T,
    options: RetryOptions,
}

impl<T> RetryResolver<T> {
    pub fn new(inner: T, options: RetryOptions) -> Self {
        Self { inner, options }
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn retry_after(response: &Response<Vec<u8>>) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

impl<T: SyncHttpResolver> SyncHttpResolver for RetryResolver<T> {
    fn http_resolve(
        &self,
        request: Request<Vec<u8>>,
    ) -> Result<Response<Vec<u8>>, HttpResolverError> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(
                "{} {} (attempt {attempt}/{max_attempts})",
                request.method(),
                request.uri()
            );

            let delay = match self.inner.http_resolve(clone_request(&request)?) {
                Ok(response) => {
                    debug!(
                        "{} {} -> {}",
                        request.method(),
                        request.uri(),
                        response.status()
                    );

                    if !is_transient(response.status()) || attempt >= max_attempts {
                        return Ok(response);
                    }

                    warn!(
                        "{} {} returned {}, retrying",
                        request.method(),
                        request.uri(),
                        response.status()
                    );
                    retry_after(&response)
                        .map(|d| d.min(self.options.max_backoff))
                        .unwrap_or_else(|| self.options.backoff(attempt - 1))
                }
                Err(err @ (HttpResolverError::Io(_) | HttpResolverError::Other(_)))
                    if attempt < max_attempts =>
                {
                    warn!(
                        "{} {} failed: {err}, retrying",
                        request.method(),
                        request.uri()
                    );
                    self.options.backoff(attempt - 1)
                }
                Err(err) => return Err(err),
            };

            thread::sleep(delay);
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use mockall::Sequence;

    use super::*;
    use crate::{credential::CredentialError, http::MockSyncHttpResolver};

    fn quick_options(max_attempts: u32) -> RetryOptions {
        RetryOptions {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    fn status(code: u16) -> Response<Vec<u8>> {
        Response::builder().status(code).body(Vec::new()).unwrap()
    }

    fn get() -> Request<Vec<u8>> {
        Request::get("https://example.com/").body(Vec::new()).unwrap()
    }

    #[test]
    fn retries_transient_status_until_success() {
        let mut seq = Sequence::new();
        let mut inner = MockSyncHttpResolver::new();
        inner
            .expect_http_resolve()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(status(503)));
        inner
            .expect_http_resolve()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(status(200)));

        let resolver = RetryResolver::new(inner, quick_options(4));
        assert_eq!(resolver.http_resolve(get()).unwrap().status(), 200);
    }

    #[test]
    fn returns_last_response_when_attempts_exhausted() {
        let mut inner = MockSyncHttpResolver::new();
        inner
            .expect_http_resolve()
            .times(3)
            .returning(|_| Ok(status(429)));

        let resolver = RetryResolver::new(inner, quick_options(3));
        assert_eq!(resolver.http_resolve(get()).unwrap().status(), 429);
    }

    #[test]
    fn does_not_retry_client_errors() {
        let mut inner = MockSyncHttpResolver::new();
        inner
            .expect_http_resolve()
            .times(1)
            .returning(|_| Ok(status(403)));

        let resolver = RetryResolver::new(inner, quick_options(4));
        assert_eq!(resolver.http_resolve(get()).unwrap().status(), 403);
    }

    #[test]
    fn retries_transport_errors() {
        let mut seq = Sequence::new();
        let mut inner = MockSyncHttpResolver::new();
        inner
            .expect_http_resolve()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(HttpResolverError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "reset",
                )))
            });
        inner
            .expect_http_resolve()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(status(200)));

        let resolver = RetryResolver::new(inner, quick_options(2));
        assert_eq!(resolver.http_resolve(get()).unwrap().status(), 200);
    }

    #[test]
    fn does_not_retry_credential_errors() {
        let mut inner = MockSyncHttpResolver::new();
        inner
            .expect_http_resolve()
            .times(1)
            .returning(|_| Err(HttpResolverError::Credential(CredentialError::EmptyToken)));

        let resolver = RetryResolver::new(inner, quick_options(4));
        assert!(matches!(
            resolver.http_resolve(get()),
            Err(HttpResolverError::Credential(_))
        ));
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let options = RetryOptions {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };

        assert_eq!(options.backoff(0), Duration::from_millis(100));
        assert_eq!(options.backoff(1), Duration::from_millis(200));
        assert_eq!(options.backoff(2), Duration::from_millis(400));
        assert_eq!(options.backoff(3), Duration::from_millis(500));
        assert_eq!(options.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn honors_retry_after_header() {
        let response = Response::builder()
            .status(429)
            .header(header::RETRY_AFTER, "3")
            .body(Vec::new())
            .unwrap();

        assert_eq!(retry_after(&response), Some(Duration::from_secs(3)));
        assert_eq!(retry_after(&status(429)), None);
    }
}
