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

//! Bearer token providers.
//!
//! The signing client does not acquire tokens itself. It asks a
//! [`TokenCredential`] for a token on every request. Wrapping a credential in
//! [`CachedTokenCredential`] reuses a token until shortly before it expires.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    process::Command,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use log::debug;
use serde::Deserialize;

/// OAuth scope of the Trusted Signing data plane.
pub const CODE_SIGNING_SCOPE: &str = "https://codesigning.azure.net/.default";

/// A cached token is replaced this long before it expires.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(300);

// Tokens without a known expiry are reused for this long.
const UNKNOWN_EXPIRY_LIFETIME: Duration = Duration::from_secs(300);

#[cfg(windows)]
const AZ_PROGRAM: &str = "az.cmd";
#[cfg(not(windows))]
const AZ_PROGRAM: &str = "az";

/// A bearer token issued for a scope.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,

    /// Expiry as reported by the issuer, if known.
    pub expires_on: Option<SystemTime>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    ProcessFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("could not parse token response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("token is empty")]
    EmptyToken,

    #[error("token contains characters not allowed in an HTTP header")]
    InvalidToken,
}

/// Provides bearer tokens for a scope.
#[cfg_attr(test, mockall::automock)]
pub trait TokenCredential: Send + Sync {
    fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}

impl<T: TokenCredential + ?Sized> TokenCredential for Arc<T> {
    fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        (**self).get_token(scope)
    }
}

struct CachedToken {
    scope: String,
    token: AccessToken,
    refresh_at: SystemTime,
}

/// Reuses the token of another credential until [`REFRESH_MARGIN`] before it
/// expires.
///
/// Only the token of the most recently requested scope is kept. Concurrent
/// callers wait for a single refresh.
pub struct CachedTokenCredential<C> {
    inner: C,
    cache: Mutex<Option<CachedToken>>,
}

impl<C: TokenCredential> CachedTokenCredential<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            cache: Mutex::new(None),
        }
    }
}

fn refresh_at(token: &AccessToken, now: SystemTime) -> SystemTime {
    match token.expires_on {
        Some(expires_on) => expires_on
            .checked_sub(REFRESH_MARGIN)
            .unwrap_or(UNIX_EPOCH),
        None => now.checked_add(UNKNOWN_EXPIRY_LIFETIME).unwrap_or(now),
    }
}

impl<C: TokenCredential> TokenCredential for CachedTokenCredential<C> {
    fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let now = SystemTime::now();

        if let Some(cached) = cache.as_ref() {
            if cached.scope == scope && now < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }

        let token = self.inner.get_token(scope)?;
        let refresh_at = refresh_at(&token, now);
        debug!("cached token for {scope}");

        *cache = Some(CachedToken {
            scope: scope.to_owned(),
            token: token.clone(),
            refresh_at,
        });

        Ok(token)
    }
}

/// A credential holding a token that was acquired elsewhere.
#[derive(Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenCredential").finish_non_exhaustive()
    }
}

impl TokenCredential for StaticTokenCredential {
    fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
        if self.token.trim().is_empty() {
            return Err(CredentialError::EmptyToken);
        }

        Ok(AccessToken {
            token: self.token.clone(),
            expires_on: None,
        })
    }
}

/// A credential that asks the Azure CLI for a token of the signed-in account.
///
/// Runs `az account get-access-token --scope <scope> --output json`.
#[derive(Clone, Debug)]
pub struct AzureCliCredential {
    program: PathBuf,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self::with_program(AZ_PROGRAM)
    }

    /// Uses `program` in place of `az`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,

    // Seconds since the epoch. Older CLI versions only report a local time
    // string in `expiresOn`, which is ignored.
    #[serde(rename = "expires_on")]
    expires_on_epoch: Option<u64>,
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken, CredentialError> {
    let response: CliTokenResponse = serde_json::from_slice(stdout)?;
    if response.access_token.is_empty() {
        return Err(CredentialError::EmptyToken);
    }

    Ok(AccessToken {
        token: response.access_token,
        expires_on: response
            .expires_on_epoch
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
    })
}

impl TokenCredential for AzureCliCredential {
    fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let program = self.program.display().to_string();
        debug!("requesting token for {scope} from {program}");

        let output = Command::new(&self.program)
            .args(["account", "get-access-token", "--scope", scope])
            .args(["--output", "json"])
            .output()
            .map_err(|source| CredentialError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CredentialError::ProcessFailed {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        parse_cli_token(&output.stdout)
    }
}
