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

#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Sign C2PA manifests with a key held by a remote Trusted Signing service.
//!
//! The private key never leaves the service. The claim to be signed is hashed
//! locally and only the digest is sent; the service signs it asynchronously
//! and the client polls until the signature is ready. The certificate chain of
//! the signing profile is fetched once as a PKCS#7 bundle and converted to a
//! leaf-first PEM chain for the manifest.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use c2pa_trusted_signing::{AzureCliCredential, SigningSettings, TrustedSigner};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SigningSettings::new(
//!     Url::parse("https://eus.codesigning.azure.net")?,
//!     "signing_account",
//!     "certificate_profile",
//! )?;
//!
//! let manifest = r#"{"title": "example"}"#;
//! let mut signer = TrustedSigner::new(Arc::new(AzureCliCredential::new()), settings, manifest)?;
//! signer.sign_file("image.jpg", "signed.jpg")?;
//! # Ok(())
//! # }
//! ```

pub mod algorithm;
pub mod cert_chain;
mod client;
pub mod credential;
mod digest_signer;
mod error;
pub mod http;
mod settings;
mod trusted_signer;

pub use c2pa::SigningAlg;
pub use client::{DefaultChannel, OperationStatus, TrustedSigningClient};
pub use credential::{
    AccessToken, AzureCliCredential, CachedTokenCredential, StaticTokenCredential,
    TokenCredential,
};
pub use digest_signer::{DigestSigner, DigestSigningService};
pub use error::{Error, Result};
pub use settings::{PollingOptions, SigningSettings, DEFAULT_ALGORITHM, DEFAULT_API_VERSION};
pub use trusted_signer::{TrustedSigner, DEFAULT_TSA_URL};
