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

use std::time::Duration;

use c2pa::SigningAlg;
use url::Url;

use crate::{Error, Result};

/// Data plane API version spoken by the client.
pub const DEFAULT_API_VERSION: &str = "2022-06-15-preview";

/// Algorithm used when none is configured: RSASSA-PSS over a SHA-384 digest.
pub const DEFAULT_ALGORITHM: SigningAlg = SigningAlg::Ps384;

/// How a signing operation is polled until it leaves `InProgress`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollingOptions {
    /// Delay between two status requests.
    pub interval: Duration,

    /// Number of status requests after which the operation is abandoned.
    pub max_attempts: u32,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            max_attempts: 2400,
        }
    }
}

/// Identifies the certificate profile to sign with and how to reach it.
///
/// Settings are fixed once the client is created.
#[derive(Clone, Debug, PartialEq)]
pub struct SigningSettings {
    endpoint: Url,
    account: String,
    certificate_profile: String,
    api_version: String,
    algorithm: SigningAlg,
    polling: PollingOptions,
}

impl SigningSettings {
    /// Creates settings for `certificate_profile` of the Trusted Signing
    /// `account` served at `endpoint`, e.g. `https://eus.codesigning.azure.net`.
    pub fn new(
        endpoint: Url,
        account: impl Into<String>,
        certificate_profile: impl Into<String>,
    ) -> Result<Self> {
        let account = account.into();
        let certificate_profile = certificate_profile.into();

        if endpoint.cannot_be_a_base() {
            return Err(Error::InvalidSettings(format!(
                "endpoint {endpoint} is not a base URL"
            )));
        }
        if endpoint.query().is_some() || endpoint.fragment().is_some() {
            return Err(Error::InvalidSettings(format!(
                "endpoint {endpoint} must not have a query or fragment"
            )));
        }
        if account.trim().is_empty() {
            return Err(Error::InvalidSettings("account is empty".to_owned()));
        }
        if certificate_profile.trim().is_empty() {
            return Err(Error::InvalidSettings(
                "certificate profile is empty".to_owned(),
            ));
        }

        let mut endpoint = endpoint;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            endpoint,
            account,
            certificate_profile,
            api_version: DEFAULT_API_VERSION.to_owned(),
            algorithm: DEFAULT_ALGORITHM,
            polling: PollingOptions::default(),
        })
    }

    pub fn with_algorithm(mut self, algorithm: SigningAlg) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_polling(mut self, polling: PollingOptions) -> Self {
        self.polling = polling;
        self
    }

    /// The service endpoint, always ending with `/`.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn certificate_profile(&self) -> &str {
        &self.certificate_profile
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn algorithm(&self) -> SigningAlg {
        self.algorithm
    }

    pub fn polling(&self) -> &PollingOptions {
        &self.polling
    }

    /// URL of the path `segments` below the certificate profile, with the API
    /// version query. Each segment is percent-encoded.
    pub(crate) fn profile_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();

        url.path_segments_mut()
            .map_err(|_| {
                Error::InvalidSettings(format!("endpoint {} is not a base URL", self.endpoint))
            })?
            .pop_if_empty()
            .extend([
                "codesigningaccounts",
                self.account.as_str(),
                "certificateprofiles",
                self.certificate_profile.as_str(),
            ])
            .extend(segments);

        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);

        Ok(url)
    }
}
