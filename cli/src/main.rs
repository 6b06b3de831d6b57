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

#![doc = include_str!("../README.md")]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use c2pa_trusted_signing::{
    AzureCliCredential, SigningAlg, SigningSettings, StaticTokenCredential, TokenCredential,
    TrustedSigner, DEFAULT_TSA_URL,
};
use clap::Parser;
use log::info;
use url::Url;

// Used when no manifest definition is given.
const DEFAULT_MANIFEST: &str = include_str!("../sample/manifest.json");

/// Sign a file with a C2PA manifest using a Trusted Signing certificate profile.
#[derive(Debug, Parser)]
#[command(author, version, about, arg_required_else_help = true)]
struct CliArgs {
    /// Path to the input file.
    #[arg(short, long)]
    input: PathBuf,

    /// Path to the output file.
    #[arg(short, long)]
    output: PathBuf,

    /// Path to a manifest definition file, or the manifest definition JSON itself.
    #[arg(short, long)]
    manifest: Option<String>,

    /// Path to a C2PA settings file (.json or .toml).
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Replace the output file if it already exists.
    #[arg(short, long)]
    force: bool,

    /// Trusted Signing account name.
    #[arg(short, long, env = "TRUSTED_SIGNING_ACCOUNT")]
    account: String,

    /// Trusted Signing endpoint, e.g. https://eus.codesigning.azure.net.
    #[arg(short, long, env = "TRUSTED_SIGNING_ENDPOINT")]
    endpoint: Url,

    /// Trusted Signing certificate profile.
    #[arg(short, long, env = "TRUSTED_SIGNING_CERTIFICATE_PROFILE")]
    certificate_profile: String,

    /// Signing algorithm, must match the certificate profile.
    #[arg(long, default_value_t = SigningAlg::Ps384)]
    algorithm: SigningAlg,

    /// Time stamp authority URL.
    #[arg(long, default_value = DEFAULT_TSA_URL)]
    tsa_url: String,

    /// Bearer token to use instead of asking the Azure CLI for one.
    #[arg(long, env = "TRUSTED_SIGNING_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
}

// A manifest argument naming an existing file is read, anything else is taken as JSON.
fn load_manifest(manifest: Option<&str>) -> Result<String> {
    match manifest {
        None => Ok(DEFAULT_MANIFEST.to_owned()),
        Some(arg) if Path::new(arg).is_file() => {
            fs::read_to_string(arg).context(format!("reading manifest definition {arg:?}"))
        }
        Some(json) => Ok(json.to_owned()),
    }
}

// Settings are applied to the c2pa library for the rest of the process.
fn load_c2pa_settings(path: &Path) -> Result<()> {
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .context(format!("settings file {path:?} has no extension"))?;

    let settings =
        fs::read_to_string(path).context(format!("reading settings file {path:?}"))?;

    #[allow(deprecated)]
    c2pa::settings::load_settings_from_str(&settings, format)
        .context(format!("loading C2PA settings from {path:?}"))?;

    info!("loaded C2PA settings from {path:?}");
    Ok(())
}

fn prepare_output(output: &Path, force: bool) -> Result<()> {
    if output.exists() {
        if !force {
            bail!("Output already exists; use -f/force to overwrite");
        }
        fs::remove_file(output).context(format!("removing {output:?}"))?;
    }
    Ok(())
}

fn credential(access_token: Option<String>) -> Arc<dyn TokenCredential> {
    match access_token {
        Some(token) => Arc::new(StaticTokenCredential::new(token)),
        None => Arc::new(AzureCliCredential::new()),
    }
}

fn run(args: CliArgs) -> Result<()> {
    if !args.input.is_file() {
        bail!("Input file {:?} does not exist", args.input);
    }
    prepare_output(&args.output, args.force)?;

    if let Some(settings) = &args.settings {
        load_c2pa_settings(settings)?;
    }

    let manifest = load_manifest(args.manifest.as_deref())?;

    let settings = SigningSettings::new(args.endpoint, args.account, args.certificate_profile)?
        .with_algorithm(args.algorithm);

    let mut signer = TrustedSigner::new(credential(args.access_token), settings, &manifest)
        .context("creating Trusted Signing signer")?
        .with_tsa_url(args.tsa_url);

    signer
        .sign_file(&args.input, &args.output)
        .context(format!("signing {:?}", args.input))?;

    info!("signed {:?} -> {:?}", args.input, args.output);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    run(CliArgs::parse())
}
