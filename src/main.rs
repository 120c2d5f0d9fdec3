// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use appattest::attest::{
    self, AssertionContainer, AttestationContainer, EcPublicKey, Environment, KeyExport,
    VerificationOutcome, Verifier,
};
use appattest::store::{ICounterStore, MemoCounterStore, TrustAnchor};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
enum AppAttestCli {
    Attest(AttestArgs),
    Assert(AssertArgs),
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Verify an App Attest attestation object and export the attested \
    public key")]
struct AttestArgs {
    /// Attestation object, base64
    #[arg(short, long)]
    attestation: Option<String>,

    /// JSON file with attestation, challenge, teamId, bundleId and env
    #[arg(short, long)]
    file: Option<String>,

    /// Challenge: 0x-prefixed hex, base64, or raw text
    #[arg(short, long)]
    challenge: Option<String>,

    #[arg(long)]
    team_id: Option<String>,

    #[arg(long)]
    bundle_id: Option<String>,

    /// dev or prod [default: dev]
    #[arg(short, long)]
    env: Option<Environment>,

    /// PEM root certificate to use instead of the Apple App Attestation Root CA
    #[arg(short, long)]
    root: Option<String>,

    /// Where to save the attested key (JSON); a .der copy is written alongside
    #[arg(short, long)]
    output: Option<String>,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Verify an App Attest assertion over signed request data")]
struct AssertArgs {
    /// Signed data JSON file with passportHash, evmAddress and assertion
    #[arg(short, long)]
    json: String,

    /// Public key saved by the attest command (JSON), or a DER file
    #[arg(short, long)]
    public_key: Option<String>,

    /// Stored counter
    #[arg(short, long, default_value_t = 0, conflicts_with = "counters")]
    counter: u32,

    /// Counter store JSON file, updated on success
    #[arg(long)]
    counters: Option<String>,

    /// Only decode the assertion, skip verification
    #[arg(long)]
    parse_only: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttestFile {
    attestation: Option<String>,
    challenge: Option<String>,
    #[serde(alias = "team_id")]
    team_id: Option<String>,
    #[serde(alias = "bundle_id")]
    bundle_id: Option<String>,
    env: Option<Environment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedData {
    passport_hash: String,
    evm_address: String,
    assertion: String,
    key_id: Option<String>,
    timestamp: Option<serde_json::Value>,
}

// field order is part of the signed bytes
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedPayload<'a> {
    passport_hash: &'a str,
    evm_address: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedKey {
    key_id: Option<String>,
    public_key: SavedKeyFormats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedKeyFormats {
    der: Option<String>,
    der_b64: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let ok = match AppAttestCli::parse() {
        AppAttestCli::Attest(args) => match attest(&args) {
            Ok(true) => {
                println!("attestation verification successful");
                true
            }
            Ok(false) => {
                println!("attestation verification failed");
                false
            }
            Err(e) => {
                eprintln!("attestation verification failed: {e}");
                false
            }
        },

        AppAttestCli::Assert(args) => match assertion(&args) {
            Ok(()) => true,
            Err(e) => {
                eprintln!("assertion verification failed: {e}");
                false
            }
        },
    };

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn attest(args: &AttestArgs) -> Result<bool, Box<dyn Error>> {
    let file: AttestFile = match &args.file {
        Some(f) => serde_json::from_str(&fs::read_to_string(f)?)?,
        None => Default::default(),
    };

    let attestation = args
        .attestation
        .clone()
        .or(file.attestation)
        .ok_or("--attestation or --file is required")?;

    let (Some(team_id), Some(bundle_id)) = (
        args.team_id.clone().or(file.team_id),
        args.bundle_id.clone().or(file.bundle_id),
    ) else {
        return Err("--team-id and --bundle-id are required".into());
    };

    let env = args.env.or(file.env).unwrap_or(Environment::Development);

    let challenge = parse_challenge(
        &args
            .challenge
            .clone()
            .or(file.challenge)
            .unwrap_or_default(),
    )?;

    let anchor = match &args.root {
        Some(p) => TrustAnchor::from_pem(&fs::read(p)?)?,
        None => TrustAnchor::apple_app_attest()?,
    };

    let verifier = Verifier::new(anchor, &team_id, &bundle_id, env);

    info!(rp_id = verifier.rp_id(), %env, "verifying attestation");

    let container = AttestationContainer::from_base64(&attestation)?;

    let outcome = verifier.verify_attestation(&container, &challenge);

    report_attestation(&outcome)?;

    if outcome.ok() {
        if let (Some(output), Some(export)) = (&args.output, outcome.key_export()) {
            save_key(&export, Path::new(output))?;
        }
    }

    Ok(outcome.ok())
}

/// `0x`-prefixed hex, else strict base64, else the text itself
fn parse_challenge(s: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    if let Some(h) = s.strip_prefix("0x") {
        return Ok(hex::decode(h)?);
    }

    match attest::base64::decode_str(s) {
        Ok(b) => {
            info!(len = b.len(), "challenge decoded from base64");
            Ok(b)
        }
        Err(_) => Ok(s.as_bytes().to_vec()),
    }
}

fn report_attestation(o: &VerificationOutcome) -> Result<(), Box<dyn Error>> {
    println!("valid: {}", o.ok());

    if let (Some(pk), Some(key_id)) = (&o.public_key, &o.key_id) {
        println!("public key (uncompressed): {}", hex::encode(pk.uncompressed()));
        println!("public key x: {}", hex::encode(pk.x));
        println!("public key y: {}", hex::encode(pk.y));
        println!("key id: {}", hex::encode(key_id));
        println!("key id (base64): {}", attest::base64::encode(key_id));
    }

    if let Some(c) = &o.credential_id {
        println!("credential id: {}", hex::encode(c));
    }

    if let Some(c) = &o.nonce_convention {
        println!("nonce convention: {}", serde_json::to_string(c)?);
    }

    for m in o.messages() {
        println!("error: {m}");
    }

    println!(
        "trust vector: {}",
        serde_json::to_string_pretty(&o.trust_vector())?
    );

    Ok(())
}

fn save_key(export: &KeyExport, output: &Path) -> Result<(), Box<dyn Error>> {
    fs::write(output, serde_json::to_string_pretty(export)?)?;
    println!("public key saved to: {}", output.display());

    let der_path = output.with_extension("der");
    fs::write(&der_path, &export.public_key.der)?;
    println!("DER public key saved to: {}", der_path.display());

    Ok(())
}

/// Compact JSON, keys in signing order
fn signed_payload(data: &SignedData) -> Result<Vec<u8>, Box<dyn Error>> {
    Ok(serde_json::to_vec(&SignedPayload {
        passport_hash: &data.passport_hash,
        evm_address: &data.evm_address,
    })?)
}

fn load_public_key(path: &str) -> Result<EcPublicKey, Box<dyn Error>> {
    if !path.ends_with(".json") {
        return Ok(EcPublicKey::from_der(&fs::read(path)?)?);
    }

    let saved: SavedKey = serde_json::from_str(&fs::read_to_string(path)?)?;

    let der = match (&saved.public_key.der, &saved.public_key.der_b64) {
        (Some(h), _) => hex::decode(h)?,
        (None, Some(b)) => attest::base64::decode_str(b)?,
        (None, None) => return Err(format!("{path}: no publicKey.der or publicKey.derB64").into()),
    };

    info!(key_id = saved.key_id.as_deref().unwrap_or("n/a"), "public key loaded");

    Ok(EcPublicKey::from_der(&der)?)
}

fn assertion(args: &AssertArgs) -> Result<(), Box<dyn Error>> {
    let data: SignedData = serde_json::from_str(&fs::read_to_string(&args.json)?)?;

    println!("passport hash: {}", data.passport_hash);
    println!("evm address: {}", data.evm_address);
    println!("key id: {}", data.key_id.as_deref().unwrap_or("n/a"));
    if let Some(t) = &data.timestamp {
        println!("timestamp: {t}");
    }

    let assertion = AssertionContainer::from_base64(&data.assertion)?;
    let header = attest::AuthDataHeader::decode(&assertion.authenticator_data)?;

    println!("counter: {}", header.sign_count);
    println!("signature length: {} bytes", assertion.signature.len());

    if args.parse_only {
        println!("parse only, verification skipped");
        return Ok(());
    }

    let Some(pk_path) = &args.public_key else {
        return Err("--public-key is required unless --parse-only is given".into());
    };

    let public_key = load_public_key(pk_path)?;
    let payload = signed_payload(&data)?;

    let counter = match &args.counters {
        Some(path) => {
            let mut store = MemoCounterStore::new();
            store.load_json(&fs::read_to_string(path)?)?;

            let key_id = public_key.key_id();
            if store.enroll(&key_id) {
                info!(key_id = %hex::encode(key_id), "key not in counter store, enrolled at 0");
            }

            let counter =
                attest::verify_with_store(&store, &key_id, &assertion, &public_key, &payload)?;

            fs::write(path, store.to_json()?)?;

            info!(stored = store.read(&key_id)?, "counter store updated");

            counter
        }
        None => attest::verify_assertion(&assertion, args.counter, &public_key, &payload)?,
    };

    println!("assertion valid, new counter: {counter}");

    Ok(())
}
