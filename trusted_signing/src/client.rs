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

//! Client for the Trusted Signing data plane.
//!
//! | Operation    | Request                                                   |
//! |--------------|-----------------------------------------------------------|
//! | chain        | `GET  {profile}/sign/certchain` (`application/pkcs7-mime`) |
//! | submit       | `POST {profile}/sign` with `{"digest", "signatureAlgorithm"}` |
//! | poll         | `GET  {profile}/sign/{operationId}`                        |
//!
//! where `{profile}` is
//! `{endpoint}codesigningaccounts/{account}/certificateprofiles/{profile}` and
//! every request carries `?api-version={version}`.

use std::{fmt, sync::Arc, thread};

use base64::{engine::general_purpose, Engine as _};
use c2pa::SigningAlg;
use http::{header, Request, Response};
use log::{debug, info};
use serde::Deserialize;

use crate::{
    algorithm,
    cert_chain::{certificates_from_pkcs7, order_chain, pem_chain},
    credential::{CachedTokenCredential, TokenCredential, CODE_SIGNING_SCOPE},
    digest_signer::DigestSigningService,
    error::body_snippet,
    http::{
        BearerTokenResolver, HttpResolverError, RetryOptions, RetryResolver, SyncHttpResolver,
    },
    Error, Result, SigningSettings,
};

/// The channel used by [`TrustedSigningClient::new`].
pub type DefaultChannel = RetryResolver<BearerTokenResolver<reqwest::blocking::Client>>;

/// State of a signing operation as reported by the service.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed,

    /// Any status this client does not know. Treated as a failure.
    Other(String),
}

impl From<String> for OperationStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "InProgress" => Self::InProgress,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Other(status),
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => f.write_str("InProgress"),
            Self::Succeeded => f.write_str("Succeeded"),
            Self::Failed => f.write_str("Failed"),
            Self::Other(status) => f.write_str(status),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignOperation {
    #[serde(default)]
    operation_id: String,
    status: OperationStatus,
    #[serde(default)]
    signature: Option<String>,
}

fn invalid_request(err: http::Error) -> Error {
    Error::InvalidSettings(format!("could not build request: {err}"))
}

fn parse_operation(response: &Response<Vec<u8>>) -> Result<SignOperation> {
    serde_json::from_slice(response.body())
        .map_err(|e| Error::InvalidResponse(format!("{e}: {}", body_snippet(response.body()))))
}

/// Talks to one certificate profile of a Trusted Signing account.
pub struct TrustedSigningClient<R = DefaultChannel> {
    resolver: R,
    settings: SigningSettings,
}

impl TrustedSigningClient {
    /// Creates a client that authenticates with `credential` and retries
    /// transient failures with [`RetryOptions::default`].
    ///
    /// Tokens from `credential` are cached until shortly before they expire.
    pub fn new(credential: Arc<dyn TokenCredential>, settings: SigningSettings) -> Result<Self> {
        Self::with_retry(credential, settings, RetryOptions::default())
    }

    pub fn with_retry(
        credential: Arc<dyn TokenCredential>,
        settings: SigningSettings,
        retry: RetryOptions,
    ) -> Result<Self> {
        let transport = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(HttpResolverError::from)?;

        let channel = RetryResolver::new(
            BearerTokenResolver::new(
                transport,
                Arc::new(CachedTokenCredential::new(credential)),
                CODE_SIGNING_SCOPE,
            ),
            retry,
        );

        Ok(Self::with_resolver(channel, settings))
    }
}

impl<R: SyncHttpResolver> TrustedSigningClient<R> {
    /// Creates a client sending its requests through `resolver` as is.
    pub fn with_resolver(resolver: R, settings: SigningSettings) -> Self {
        Self { resolver, settings }
    }

    pub fn settings(&self) -> &SigningSettings {
        &self.settings
    }

    /// Fetches the certificate chain of the profile as concatenated PEM,
    /// leaf certificate first.
    pub fn fetch_certificate_chain(&self) -> Result<Vec<u8>> {
        let url = self.settings.profile_url(&["sign", "certchain"])?;
        info!("fetching certificate chain from {url}");

        let request = Request::get(url.as_str())
            .header(header::ACCEPT, "application/pkcs7-mime")
            .body(Vec::new())
            .map_err(invalid_request)?;

        let response = self.resolver.http_resolve(request)?;
        let status = response.status().as_u16();

        if !response.status().is_success() {
            return Err(Error::CertificateRetrievalFailed {
                status,
                message: body_snippet(response.body()),
            });
        }

        let certs = certificates_from_pkcs7(response.body()).map_err(|e| {
            Error::CertificateRetrievalFailed {
                status,
                message: e.to_string(),
            }
        })?;

        let chain = order_chain(certs)?;
        info!("certificate chain has {} certificate(s)", chain.len());

        Ok(pem_chain(&chain))
    }

    /// Signs `digest` with `alg` and returns the raw signature.
    ///
    /// `digest` must already be the hash of the content, of the length
    /// matching `alg` (48 bytes for PS384). The call blocks while the signing
    /// operation is polled, for at most the configured number of polls.
    pub fn sign_digest(&self, digest: &[u8], alg: SigningAlg) -> Result<Vec<u8>> {
        let expected = algorithm::digest_len(alg)?;
        if digest.len() != expected {
            return Err(Error::InvalidDigest {
                alg,
                expected,
                actual: digest.len(),
            });
        }

        let mut operation = self.submit(digest, alg)?;
        let operation_id = operation.operation_id.clone();
        info!(
            "signing operation {operation_id} submitted: {}",
            operation.status
        );

        let polling = self.settings.polling();
        let mut attempts = 0;

        while operation.status == OperationStatus::InProgress {
            if attempts >= polling.max_attempts {
                return Err(Error::SigningTimedOut {
                    operation_id,
                    attempts,
                });
            }

            thread::sleep(polling.interval);
            attempts += 1;

            operation = self.poll(&operation_id)?;
            debug!(
                "signing operation {operation_id}: {} (poll {attempts})",
                operation.status
            );
        }

        match operation.status {
            OperationStatus::Succeeded => {
                info!("signing operation {operation_id} succeeded");

                let signature = operation.signature.ok_or_else(|| {
                    Error::InvalidResponse(format!(
                        "operation {operation_id} succeeded without a signature"
                    ))
                })?;

                general_purpose::STANDARD
                    .decode(signature)
                    .map_err(|e| Error::InvalidResponse(format!("signature is not base64: {e}")))
            }
            status => Err(Error::SigningFailed {
                operation_id,
                status: status.to_string(),
            }),
        }
    }

    fn submit(&self, digest: &[u8], alg: SigningAlg) -> Result<SignOperation> {
        let body = serde_json::json!({
            "digest": general_purpose::STANDARD.encode(digest),
            "signatureAlgorithm": algorithm::wire_name(alg)?,
        });

        let url = self.settings.profile_url(&["sign"])?;
        let request = Request::post(url.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_string().into_bytes())
            .map_err(invalid_request)?;

        let response = self.resolver.http_resolve(request)?;
        if !response.status().is_success() {
            return Err(Error::SigningSubmissionFailed {
                status: response.status().as_u16(),
                message: body_snippet(response.body()),
            });
        }

        let operation = parse_operation(&response)?;
        if operation.operation_id.is_empty() {
            return Err(Error::InvalidResponse(
                "signing response has no operationId".to_owned(),
            ));
        }

        Ok(operation)
    }

    fn poll(&self, operation_id: &str) -> Result<SignOperation> {
        let url = self.settings.profile_url(&["sign", operation_id])?;
        let request = Request::get(url.as_str())
            .body(Vec::new())
            .map_err(|e| {
                Error::InvalidResponse(format!("cannot poll operation id {operation_id:?}: {e}"))
            })?;

        let response = self.resolver.http_resolve(request)?;
        if !response.status().is_success() {
            return Err(Error::SigningFailed {
                operation_id: operation_id.to_owned(),
                status: format!("HTTP {}", response.status().as_u16()),
            });
        }

        parse_operation(&response)
    }
}

impl<R: SyncHttpResolver + Send + Sync> DigestSigningService for TrustedSigningClient<R> {
    fn sign_digest(&self, digest: &[u8], alg: SigningAlg) -> Result<Vec<u8>> {
        Self::sign_digest(self, digest, alg)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use std::time::Duration;

    use mockall::Sequence;
    use url::Url;

    use super::*;
    use crate::{http::MockSyncHttpResolver, PollingOptions};

    const PROFILE: &str = "https://eus.codesigning.azure.net/codesigningaccounts/acct/certificateprofiles/prof";
    const CHAIN_P7B: &[u8] = include_bytes!("../tests/fixtures/certs/chain.p7b");

    fn settings(max_attempts: u32) -> SigningSettings {
        SigningSettings::new(
            Url::parse("https://eus.codesigning.azure.net").unwrap(),
            "acct",
            "prof",
        )
        .unwrap()
        .with_polling(PollingOptions {
            interval: Duration::ZERO,
            max_attempts,
        })
    }

    fn json(status: u16, body: &str) -> Response<Vec<u8>> {
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.as_bytes().to_vec())
            .unwrap()
    }

    fn expect_submit(resolver: &mut MockSyncHttpResolver, seq: &mut Sequence, status: &'static str) {
        resolver
            .expect_http_resolve()
            .withf(|request| {
                request.method() == http::Method::POST
                    && request.uri() == format!("{PROFILE}/sign?api-version=2022-06-15-preview").as_str()
            })
            .times(1)
            .in_sequence(seq)
            .returning(move |_| {
                Ok(json(
                    202,
                    &format!(r#"{{"operationId":"op-1","status":"{status}"}}"#),
                ))
            });
    }

    fn expect_poll(resolver: &mut MockSyncHttpResolver, seq: &mut Sequence, body: &'static str) {
        resolver
            .expect_http_resolve()
            .withf(|request| {
                request.method() == http::Method::GET
                    && request.uri()
                        == format!("{PROFILE}/sign/op-1?api-version=2022-06-15-preview").as_str()
            })
            .times(1)
            .in_sequence(seq)
            .returning(move |_| Ok(json(200, body)));
    }

    #[test]
    fn polls_until_succeeded() {
        let mut seq = Sequence::new();
        let mut resolver = MockSyncHttpResolver::new();
        expect_submit(&mut resolver, &mut seq, "InProgress");
        expect_poll(&mut resolver, &mut seq, r#"{"operationId":"op-1","status":"InProgress"}"#);
        expect_poll(
            &mut resolver,
            &mut seq,
            r#"{"operationId":"op-1","status":"Succeeded","signature":"AAA="}"#,
        );

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        let signature = client.sign_digest(&[7u8; 48], SigningAlg::Ps384).unwrap();

        assert_eq!(signature, general_purpose::STANDARD.decode("AAA=").unwrap());
        assert_eq!(signature, vec![0, 0]);
    }

    #[test]
    fn failed_operation_reports_id_and_status() {
        let mut seq = Sequence::new();
        let mut resolver = MockSyncHttpResolver::new();
        expect_submit(&mut resolver, &mut seq, "InProgress");
        expect_poll(&mut resolver, &mut seq, r#"{"operationId":"op-1","status":"Failed"}"#);

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        let err = client.sign_digest(&[7u8; 48], SigningAlg::Ps384).unwrap_err();

        match err {
            Error::SigningFailed {
                operation_id,
                status,
            } => {
                assert_eq!(operation_id, "op-1");
                assert_eq!(status, "Failed");
            }
            err => panic!("unexpected error {err:?}"),
        }
    }

    #[test]
    fn unknown_status_is_terminal_failure() {
        let mut seq = Sequence::new();
        let mut resolver = MockSyncHttpResolver::new();
        expect_submit(&mut resolver, &mut seq, "InProgress");
        expect_poll(&mut resolver, &mut seq, r#"{"operationId":"op-1","status":"Cancelled"}"#);

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        assert!(matches!(
            client.sign_digest(&[7u8; 48], SigningAlg::Ps384),
            Err(Error::SigningFailed { status, .. }) if status == "Cancelled"
        ));
    }

    #[test]
    fn terminal_submission_is_not_polled() {
        let mut seq = Sequence::new();
        let mut resolver = MockSyncHttpResolver::new();
        resolver
            .expect_http_resolve()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(json(
                    200,
                    r#"{"operationId":"op-1","status":"Succeeded","signature":"AQID"}"#,
                ))
            });

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        assert_eq!(
            client.sign_digest(&[7u8; 48], SigningAlg::Ps384).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn polling_is_bounded() {
        let mut resolver = MockSyncHttpResolver::new();
        resolver
            .expect_http_resolve()
            .times(4)
            .returning(|_| Ok(json(202, r#"{"operationId":"op-1","status":"InProgress"}"#)));

        let client = TrustedSigningClient::with_resolver(resolver, settings(3));
        assert!(matches!(
            client.sign_digest(&[7u8; 48], SigningAlg::Ps384),
            Err(Error::SigningTimedOut { attempts: 3, .. })
        ));
    }

    #[test]
    fn submission_body_carries_digest_and_algorithm() {
        let mut resolver = MockSyncHttpResolver::new();
        resolver
            .expect_http_resolve()
            .withf(|request| {
                let body: serde_json::Value = serde_json::from_slice(request.body()).unwrap();
                body["signatureAlgorithm"] == "PS384"
                    && body["digest"] == general_purpose::STANDARD.encode([7u8; 48])
                    && request.headers()[header::CONTENT_TYPE] == "application/json"
            })
            .times(1)
            .returning(|_| {
                Ok(json(
                    200,
                    r#"{"operationId":"op-1","status":"Succeeded","signature":"AAA="}"#,
                ))
            });

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        client.sign_digest(&[7u8; 48], SigningAlg::Ps384).unwrap();
    }

    #[test]
    fn rejected_submission() {
        let mut resolver = MockSyncHttpResolver::new();
        resolver
            .expect_http_resolve()
            .times(1)
            .returning(|_| Ok(json(400, r#"{"error":"bad digest"}"#)));

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        match client.sign_digest(&[7u8; 48], SigningAlg::Ps384).unwrap_err() {
            Error::SigningSubmissionFailed { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("bad digest"));
            }
            err => panic!("unexpected error {err:?}"),
        }
    }

    #[test]
    fn transport_failure_while_polling() {
        let mut seq = Sequence::new();
        let mut resolver = MockSyncHttpResolver::new();
        expect_submit(&mut resolver, &mut seq, "InProgress");
        resolver
            .expect_http_resolve()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(HttpResolverError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "reset",
                )))
            });

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        assert!(matches!(
            client.sign_digest(&[7u8; 48], SigningAlg::Ps384),
            Err(Error::RemoteUnavailable(_))
        ));
    }

    #[test]
    fn wrong_digest_length_is_rejected_before_sending() {
        let mut resolver = MockSyncHttpResolver::new();
        resolver.expect_http_resolve().never();

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        assert!(matches!(
            client.sign_digest(&[7u8; 32], SigningAlg::Ps384),
            Err(Error::InvalidDigest {
                expected: 48,
                actual: 32,
                ..
            })
        ));
    }

    #[test]
    fn succeeded_without_signature() {
        let mut resolver = MockSyncHttpResolver::new();
        resolver
            .expect_http_resolve()
            .times(1)
            .returning(|_| Ok(json(200, r#"{"operationId":"op-1","status":"Succeeded"}"#)));

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        assert!(matches!(
            client.sign_digest(&[7u8; 48], SigningAlg::Ps384),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn fetches_and_orders_certificate_chain() {
        let mut resolver = MockSyncHttpResolver::new();
        resolver
            .expect_http_resolve()
            .withf(|request| {
                request.uri()
                    == format!("{PROFILE}/sign/certchain?api-version=2022-06-15-preview").as_str()
                    && request.headers()[header::ACCEPT] == "application/pkcs7-mime"
            })
            .times(1)
            .returning(|_| Ok(Response::new(CHAIN_P7B.to_vec())));

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        let chain = client.fetch_certificate_chain().unwrap();

        let expected: Vec<Vec<u8>> =
            pem::parse_many(include_bytes!("../tests/fixtures/certs/chain.pem"))
                .unwrap()
                .into_iter()
                .map(|p| p.into_contents())
                .collect();
        let actual: Vec<Vec<u8>> = pem::parse_many(&chain)
            .unwrap()
            .into_iter()
            .map(|p| p.into_contents())
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn certificate_chain_forbidden() {
        let mut resolver = MockSyncHttpResolver::new();
        resolver
            .expect_http_resolve()
            .times(1)
            .returning(|_| Ok(json(403, r#"{"error":"forbidden"}"#)));

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        assert!(matches!(
            client.fetch_certificate_chain(),
            Err(Error::CertificateRetrievalFailed { status: 403, .. })
        ));
    }

    #[test]
    fn certificate_chain_unparsable() {
        let mut resolver = MockSyncHttpResolver::new();
        resolver
            .expect_http_resolve()
            .times(1)
            .returning(|_| Ok(Response::new(b"<html>".to_vec())));

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        assert!(matches!(
            client.fetch_certificate_chain(),
            Err(Error::CertificateRetrievalFailed { status: 200, .. })
        ));
    }

    #[test]
    fn operation_id_is_encoded_in_poll_url() {
        let mut seq = Sequence::new();
        let mut resolver = MockSyncHttpResolver::new();
        resolver
            .expect_http_resolve()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json(202, r#"{"operationId":"op/1?x y","status":"InProgress"}"#)));
        resolver
            .expect_http_resolve()
            .withf(|request| {
                request.uri()
                    == format!("{PROFILE}/sign/op%2F1%3Fx%20y?api-version=2022-06-15-preview")
                        .as_str()
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(json(
                    200,
                    r#"{"operationId":"op/1?x y","status":"Succeeded","signature":"AQID"}"#,
                ))
            });

        let client = TrustedSigningClient::with_resolver(resolver, settings(10));
        assert_eq!(
            client.sign_digest(&[7u8; 48], SigningAlg::Ps384).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn status_strings() {
        assert_eq!(
            OperationStatus::from("InProgress".to_owned()),
            OperationStatus::InProgress
        );
        assert_eq!(
            OperationStatus::from("NotStarted".to_owned()),
            OperationStatus::Other("NotStarted".to_owned())
        );
        assert_eq!(OperationStatus::Other("NotStarted".to_owned()).to_string(), "NotStarted");
    }
}
