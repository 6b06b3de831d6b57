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

use std::{path::Path, sync::Arc};

use c2pa::{Builder, CallbackSigner};
use log::info;

use crate::{
    credential::TokenCredential, digest_signer::DigestSigner, http::SyncHttpResolver, Result,
    SigningSettings, TrustedSigningClient,
};

/// Time stamp authority used unless another one is set.
pub const DEFAULT_TSA_URL: &str = "http://timestamp.acs.microsoft.com";

/// Embeds a C2PA manifest into files, signing the claim with a Trusted
/// Signing certificate profile.
///
/// The certificate chain is fetched once, when the signer is created. Each
/// call to [`sign_file`](Self::sign_file) then runs one remote signing
/// operation.
pub struct TrustedSigner {
    builder: Builder,
    signer: CallbackSigner,
    cert_chain: Vec<u8>,
}

impl TrustedSigner {
    /// Creates a signer for the manifest definition `manifest` (JSON).
    pub fn new(
        credential: Arc<dyn TokenCredential>,
        settings: SigningSettings,
        manifest: &str,
    ) -> Result<Self> {
        Self::from_client(TrustedSigningClient::new(credential, settings)?, manifest)
    }

    pub fn from_client<R>(client: TrustedSigningClient<R>, manifest: &str) -> Result<Self>
    where
        R: SyncHttpResolver + Send + Sync + 'static,
    {
        let cert_chain = client.fetch_certificate_chain()?;
        let alg = client.settings().algorithm();

        Self::from_parts(DigestSigner::new(Arc::new(client), alg), cert_chain, manifest)
    }

    /// Creates a signer from an already fetched PEM chain.
    pub fn from_parts(
        digest_signer: DigestSigner,
        cert_chain: Vec<u8>,
        manifest: &str,
    ) -> Result<Self> {
        let builder = Builder::from_json(manifest)?;
        let alg = digest_signer.alg();

        let signer = CallbackSigner::new(
            move |_context: *const (), data: &[u8]| {
                digest_signer
                    .sign(data)
                    .map_err(|e| c2pa::Error::OtherError(Box::new(e)))
            },
            alg,
            cert_chain.clone(),
        )
        .set_tsa_url(DEFAULT_TSA_URL);

        Ok(Self {
            builder,
            signer,
            cert_chain,
        })
    }

    pub fn with_tsa_url(mut self, tsa_url: impl Into<String>) -> Self {
        self.signer = self.signer.set_tsa_url(tsa_url);
        self
    }

    /// The PEM certificate chain, leaf first.
    pub fn cert_chain(&self) -> &[u8] {
        &self.cert_chain
    }

    /// Signs `input` and writes the result with the embedded manifest to
    /// `output`. Returns the manifest bytes.
    pub fn sign_file<S, D>(&mut self, input: S, output: D) -> Result<Vec<u8>>
    where
        S: AsRef<Path>,
        D: AsRef<Path>,
    {
        info!(
            "signing {} to {}",
            input.as_ref().display(),
            output.as_ref().display()
        );

        Ok(self.builder.sign_file(&self.signer, input, output)?)
    }
}
