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

use c2pa::SigningAlg;
use log::debug;

use crate::{algorithm, Result};

/// Something that signs a precomputed digest, typically a
/// [`TrustedSigningClient`](crate::TrustedSigningClient).
#[cfg_attr(test, mockall::automock)]
pub trait DigestSigningService: Send + Sync {
    /// Returns the raw signature of `digest`.
    fn sign_digest(&self, digest: &[u8], alg: SigningAlg) -> Result<Vec<u8>>;
}

/// Signs content by hashing it locally and sending only the digest to a
/// [`DigestSigningService`].
///
/// This is the callback handed to the C2PA builder: it receives the bytes to
/// be signed and blocks until the signature is available.
#[derive(Clone)]
pub struct DigestSigner {
    service: Arc<dyn DigestSigningService>,
    alg: SigningAlg,
}

impl DigestSigner {
    pub fn new(service: Arc<dyn DigestSigningService>, alg: SigningAlg) -> Self {
        Self { service, alg }
    }

    pub fn alg(&self) -> SigningAlg {
        self.alg
    }

    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let digest = algorithm::hash(self.alg, data)?;
        debug!(
            "signing {} bytes as {} digest of {} bytes",
            data.len(),
            self.alg,
            digest.len()
        );

        self.service.sign_digest(&digest, self.alg)
    }
}
