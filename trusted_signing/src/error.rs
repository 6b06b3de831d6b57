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

use c2pa::SigningAlg;
use thiserror::Error;

use crate::{credential::CredentialError, http::HttpResolverError};

/// Longest response body excerpt carried by an error.
pub(crate) const MAX_BODY_SNIPPET: usize = 1024;

/// `Error` enumerates errors returned by the Trusted Signing client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The signing service could not be reached.
    #[error("signing service unavailable: {0}")]
    RemoteUnavailable(#[source] HttpResolverError),

    /// The certificate chain request was rejected or its body was not a
    /// PKCS#7 certificate bundle.
    #[error("certificate chain retrieval failed (status {status}): {message}")]
    CertificateRetrievalFailed { status: u16, message: String },

    /// The signing request was rejected.
    #[error("signing submission failed (status {status}): {message}")]
    SigningSubmissionFailed { status: u16, message: String },

    /// The signing operation finished with a status other than `Succeeded`.
    #[error("signing failed for operation id {operation_id}: status {status}")]
    SigningFailed {
        operation_id: String,
        status: String,
    },

    /// The signing operation was still in progress after the poll limit.
    #[error("signing operation {operation_id} still in progress after {attempts} polls")]
    SigningTimedOut { operation_id: String, attempts: u32 },

    /// The certificates do not form a single issuer chain.
    #[error("malformed certificate chain: {0}")]
    MalformedChain(String),

    /// The digest length does not match the hash of the signing algorithm.
    #[error("digest for {alg} must be {expected} bytes, got {actual}")]
    InvalidDigest {
        alg: SigningAlg,
        expected: usize,
        actual: usize,
    },

    #[error("signing algorithm {0} is not supported by Trusted Signing")]
    UnsupportedAlgorithm(SigningAlg),

    /// The bearer token could not be obtained.
    #[error("authentication failed: {0}")]
    Authentication(#[source] CredentialError),

    /// A successful response whose body could not be understood.
    #[error("invalid response from signing service: {0}")]
    InvalidResponse(String),

    #[error("invalid signing settings: {0}")]
    InvalidSettings(String),

    /// Reported by the C2PA manifest builder.
    #[error(transparent)]
    Embedding(#[from] c2pa::Error),
}

impl From<HttpResolverError> for Error {
    fn from(err: HttpResolverError) -> Self {
        match err {
            HttpResolverError::Credential(err) => Self::Authentication(err),
            err => Self::RemoteUnavailable(err),
        }
    }
}

/// A specialized `Result` type for Trusted Signing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns at most [`MAX_BODY_SNIPPET`] bytes of a response body as text.
pub(crate) fn body_snippet(body: &[u8]) -> String {
    let end = body.len().min(MAX_BODY_SNIPPET);
    String::from_utf8_lossy(&body[..end]).into_owned()
}
