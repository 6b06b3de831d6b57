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

//! What the signing service needs to know about a [`SigningAlg`].

use c2pa::SigningAlg;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::{Error, Result};

/// Name of the algorithm in a signing request, e.g. `PS384`.
pub fn wire_name(alg: SigningAlg) -> Result<&'static str> {
    Ok(match alg {
        SigningAlg::Es256 => "ES256",
        SigningAlg::Es384 => "ES384",
        SigningAlg::Es512 => "ES512",
        SigningAlg::Ps256 => "PS256",
        SigningAlg::Ps384 => "PS384",
        SigningAlg::Ps512 => "PS512",
        _ => return Err(Error::UnsupportedAlgorithm(alg)),
    })
}

/// Length in bytes of the digest the service expects for `alg`.
pub fn digest_len(alg: SigningAlg) -> Result<usize> {
    Ok(match alg {
        SigningAlg::Es256 | SigningAlg::Ps256 => 32,
        SigningAlg::Es384 | SigningAlg::Ps384 => 48,
        SigningAlg::Es512 | SigningAlg::Ps512 => 64,
        _ => return Err(Error::UnsupportedAlgorithm(alg)),
    })
}

/// Hashes `data` with the digest function paired with `alg`.
pub fn hash(alg: SigningAlg, data: &[u8]) -> Result<Vec<u8>> {
    Ok(match alg {
        SigningAlg::Es256 | SigningAlg::Ps256 => Sha256::digest(data).to_vec(),
        SigningAlg::Es384 | SigningAlg::Ps384 => Sha384::digest(data).to_vec(),
        SigningAlg::Es512 | SigningAlg::Ps512 => Sha512::digest(data).to_vec(),
        _ => return Err(Error::UnsupportedAlgorithm(alg)),
    })
}
