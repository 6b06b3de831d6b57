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

//! Certificate chain handling: extracting certificates from a PKCS#7 bundle,
//! ordering them leaf first, and encoding the result as PEM.

use std::fmt::Debug;

use ::rasn::prelude::*;
use log::{debug, info};
use pem::{EncodeConfig, LineEnding, Pem};
use rasn_cms::{CertificateChoices, SignedData};
use rasn_pkix::{Certificate, Name};

use crate::{Error, Result};

/// The issuer/subject projection needed to order a chain.
pub trait ChainCertificate {
    type Name: PartialEq + Debug;

    fn issuer(&self) -> &Self::Name;

    fn subject(&self) -> &Self::Name;

    fn is_self_signed(&self) -> bool {
        self.issuer() == self.subject()
    }
}

/// A parsed X.509 certificate together with its DER encoding.
#[derive(Clone, Debug, PartialEq)]
pub struct CertificateRecord {
    issuer: Name,
    subject: Name,
    der: Vec<u8>,
}

impl CertificateRecord {
    pub fn from_der(der: &[u8]) -> std::result::Result<Self, Pkcs7Error> {
        let cert: Certificate =
            rasn::der::decode(der).map_err(|e| Pkcs7Error::Decode(e.to_string()))?;

        Ok(Self {
            issuer: cert.tbs_certificate.issuer,
            subject: cert.tbs_certificate.subject,
            der: der.to_vec(),
        })
    }

    fn from_certificate(cert: &Certificate) -> std::result::Result<Self, Pkcs7Error> {
        let der = rasn::der::encode(cert).map_err(|e| Pkcs7Error::Encode(e.to_string()))?;

        Ok(Self {
            issuer: cert.tbs_certificate.issuer.clone(),
            subject: cert.tbs_certificate.subject.clone(),
            der,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// PEM encoding with `\n` line endings.
    pub fn to_pem(&self) -> String {
        pem::encode_config(
            &Pem::new("CERTIFICATE", self.der.clone()),
            EncodeConfig::new().set_line_ending(LineEnding::LF),
        )
    }
}

impl ChainCertificate for CertificateRecord {
    type Name = Name;

    fn issuer(&self) -> &Name {
        &self.issuer
    }

    fn subject(&self) -> &Name {
        &self.subject
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Pkcs7Error {
    #[error("could not decode PKCS#7 data: {0}")]
    Decode(String),

    #[error("PKCS#7 content is not signed data")]
    NotSignedData,

    #[error("PKCS#7 bundle contains no certificates")]
    NoCertificates,

    #[error("PKCS#7 bundle contains a certificate that is not X.509")]
    UnsupportedCertificate,

    #[error("could not encode certificate: {0}")]
    Encode(String),
}

#[derive(AsnType, Clone, Debug, Decode, Encode, PartialEq, Eq)]
struct ContentInfo {
    content_type: rasn::types::ObjectIdentifier,

    #[rasn(tag(explicit(0)))]
    content: rasn::types::Any,
}

/// Extracts the certificates of a DER encoded PKCS#7 (`.p7b`) bundle, in the
/// order they appear in the bundle.
pub fn certificates_from_pkcs7(
    p7b: &[u8],
) -> std::result::Result<Vec<CertificateRecord>, Pkcs7Error> {
    let content_info: ContentInfo =
        rasn::der::decode(p7b).map_err(|e| Pkcs7Error::Decode(e.to_string()))?;

    if content_info.content_type != Oid::ISO_MEMBER_BODY_US_RSADSI_PKCS7_SIGNED_DATA {
        return Err(Pkcs7Error::NotSignedData);
    }

    let signed_data: SignedData = rasn::der::decode(content_info.content.as_bytes())
        .map_err(|e| Pkcs7Error::Decode(e.to_string()))?;

    let Some(certs) = &signed_data.certificates else {
        return Err(Pkcs7Error::NoCertificates);
    };

    let records = certs
        .to_vec()
        .into_iter()
        .map(|choice| match choice {
            CertificateChoices::Certificate(cert) => CertificateRecord::from_certificate(&cert),
            _ => Err(Pkcs7Error::UnsupportedCertificate),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if records.is_empty() {
        return Err(Pkcs7Error::NoCertificates);
    }

    Ok(records)
}

/// Orders certificates leaf first and root last.
///
/// Exactly one certificate must be self-signed. Starting from it, each step
/// takes the certificate issued by the previous one; when several qualify the
/// one that came first in `certs` wins. Every certificate has to end up in
/// the chain, so bundles that branch, hold unrelated certificates, or lack a
/// root are rejected with [`Error::MalformedChain`].
pub fn order_chain<C: ChainCertificate>(certs: Vec<C>) -> Result<Vec<C>> {
    for cert in &certs {
        debug!(
            "certificate: subject ({:?}) issuer ({:?})",
            cert.subject(),
            cert.issuer()
        );
    }

    let mut remaining: Vec<Option<C>> = certs.into_iter().map(Some).collect();

    let mut roots = remaining
        .iter()
        .enumerate()
        .filter(|(_, c)| c.as_ref().is_some_and(|c| c.is_self_signed()))
        .map(|(i, _)| i);

    let root = match (roots.next(), roots.next()) {
        (Some(root), None) => root,
        (None, _) => {
            return Err(Error::MalformedChain(
                "no self-signed root certificate".to_owned(),
            ))
        }
        (Some(_), Some(_)) => {
            return Err(Error::MalformedChain(
                "more than one self-signed certificate".to_owned(),
            ))
        }
    };

    let mut chain = Vec::with_capacity(remaining.len());
    let mut next = remaining[root].take();

    while let Some(cert) = next {
        next = remaining
            .iter_mut()
            .find(|c| c.as_ref().is_some_and(|c| c.issuer() == cert.subject()))
            .and_then(Option::take);
        chain.push(cert);
    }

    let unlinked = remaining.iter().flatten().count();
    if unlinked > 0 {
        return Err(Error::MalformedChain(format!(
            "{unlinked} certificate(s) not linked to the chain"
        )));
    }

    chain.reverse();

    for cert in &chain {
        info!(
            "sorted certificate: subject ({:?}) issuer ({:?})",
            cert.subject(),
            cert.issuer()
        );
    }

    Ok(chain)
}

/// Concatenates the PEM encodings of `certs`.
pub fn pem_chain(certs: &[CertificateRecord]) -> Vec<u8> {
    certs
        .iter()
        .flat_map(|cert| cert.to_pem().into_bytes())
        .collect()
}
