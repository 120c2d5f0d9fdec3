// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::asn1;
use super::authdata::AuthenticatorData;
use super::chain;
use super::common::*;
use super::container::AttestationContainer;
use super::errors::Error;
use super::pubkey::{EcPublicKey, KeyExport};
use crate::store::TrustAnchor;
use ear::claim::*;
use ear::TrustVector;
use openssl::x509::X509;
use serde::Serialize;
use tracing::{debug, warn};

/// Which of the two accepted challenge bindings produced the nonce found in
/// the leaf certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NonceConvention {
    /// `SHA-256(authData || SHA-256(challenge))`, the binding devices compute
    /// when handed the raw challenge
    HashedChallenge,
    /// `SHA-256(authData || challenge)`, seen when the caller pre-hashes the
    /// challenge before passing it to the device
    RawChallenge,
}

/// Result of an attestation appraisal.  Verification never stops at the
/// first problem: `errors` lists every failed check, in check order.
#[derive(Debug, Clone, Default)]
pub struct VerificationOutcome {
    /// The attested key, if the leaf certificate carries a usable one
    pub public_key: Option<EcPublicKey>,
    /// `SHA-256(0x04 || x || y)` of `public_key`
    pub key_id: Option<[u8; 32]>,
    /// The credential id found in the authenticator data
    pub credential_id: Option<Vec<u8>>,
    /// `attStmt.receipt`, untouched
    pub receipt: Option<Vec<u8>>,
    pub nonce_convention: Option<NonceConvention>,
    pub errors: Vec<Error>,
}

impl VerificationOutcome {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    /// Persistable key material for the enrolled device
    pub fn key_export(&self) -> Option<KeyExport> {
        self.public_key.as_ref().map(|k| k.export())
    }

    /// Summarise the outcome as an AR4SI trust vector
    pub fn trust_vector(&self) -> TrustVector {
        let mut tv = TrustVector::default();

        if self.ok() {
            tv.instance_identity.set(TRUSTWORTHY_INSTANCE);
            tv.hardware.set(GENUINE_HARDWARE);

            return tv;
        }

        for e in self.errors.iter() {
            match e {
                Error::AaguidMismatch(_) => {
                    tv.hardware.set(UNRECOGNIZED_HARDWARE);
                }
                Error::ChainLengthInvalid(_)
                | Error::IntermediateSignatureInvalid(_)
                | Error::LeafSignatureInvalid(_)
                | Error::NonECKey(_)
                | Error::CredentialBindingMismatch
                | Error::NonceNotFound(_)
                | Error::NonceMismatch => {
                    tv.instance_identity.set(CRYPTO_VALIDATION_FAILED);
                }
                _ => {
                    // crypto failures take precedence
                    if tv.instance_identity.get() != CRYPTO_VALIDATION_FAILED {
                        tv.instance_identity.set(UNEXPECTED_EVIDENCE);
                    }
                }
            }
        }

        tv
    }
}

/// Appraise an attestation object against the expected relying party id
/// (`<team-id>.<bundle-id>`) and environment, using `anchor` as the root of
/// trust.
///
/// Checks run in a fixed order.  A wrong `fmt` or unparseable authenticator
/// data end the appraisal immediately.  A chain of the wrong length skips
/// only the signature checks: key, binding and nonce are still taken from
/// the first certificate.  Every other failure is recorded and the remaining
/// checks still run.
pub fn verify_attestation(
    container: &AttestationContainer,
    challenge: &[u8],
    rp_id: &str,
    environment: Environment,
    anchor: &TrustAnchor,
) -> VerificationOutcome {
    let mut outcome = VerificationOutcome {
        receipt: container.receipt.clone(),
        ..Default::default()
    };
    let errors = &mut outcome.errors;

    if container.format != APP_ATTEST_FORMAT {
        errors.push(Error::UnsupportedFormat(container.format.clone()));
        return outcome;
    }

    let chain_len = container.certificates.len();
    if chain_len != 2 {
        errors.push(Error::ChainLengthInvalid(chain_len));
    }

    let auth_data = match AuthenticatorData::decode(&container.auth_data) {
        Ok(a) => a,
        Err(e) => {
            errors.push(e);
            return outcome;
        }
    };

    if auth_data.rp_id_hash != sha256(rp_id.as_bytes()) {
        errors.push(Error::RpIdMismatch);
    }

    if !auth_data.header().has_attested_credential_data() {
        errors.push(Error::FlagNotSet);
    }

    if auth_data.sign_count != 0 {
        errors.push(Error::SignCountInvalid(auth_data.sign_count));
    }

    if auth_data.aaguid != *environment.aaguid() {
        errors.push(Error::AaguidMismatch(environment));
    }

    outcome.credential_id = Some(auth_data.credential_id.clone());

    // the leaf-based checks need only the first certificate
    let Some(leaf_der) = container.certificates.first() else {
        return outcome;
    };

    let leaf = X509::from_der(leaf_der);

    if chain_len == 2 {
        outcome.errors.extend(chain::validate(
            leaf.as_deref(),
            &container.certificates[1],
            anchor,
        ));
    }

    let leaf = match leaf {
        Ok(c) => c,
        Err(e) => {
            // a two-certificate chain has already reported it
            if chain_len != 2 {
                outcome
                    .errors
                    .push(Error::MalformedContainer(format!("leaf certificate: {e}")));
            }
            return outcome;
        }
    };

    match EcPublicKey::from_certificate(&leaf) {
        Ok(pk) => {
            let key_id = pk.key_id();

            debug!(key_id = %hex::encode(key_id), "attested key extracted");

            if auth_data.credential_id != key_id {
                outcome.errors.push(Error::CredentialBindingMismatch);
            }

            outcome.key_id = Some(key_id);
            outcome.public_key = Some(pk);
        }
        Err(e) => outcome.errors.push(e),
    }

    let nonce = chain::nonce_extension(leaf_der).and_then(|v| asn1::extract_nonce(&v));

    match nonce {
        Ok(nonce) => match nonce_convention(&nonce, &container.auth_data, challenge) {
            Some(c) => {
                match c {
                    NonceConvention::HashedChallenge => {
                        debug!("nonce bound to SHA-256(challenge)")
                    }
                    NonceConvention::RawChallenge => {
                        warn!("nonce bound to the raw challenge, caller may be pre-hashing it")
                    }
                }
                outcome.nonce_convention = Some(c);
            }
            None => {
                let auth = container.auth_data.as_slice();
                let hashed = sha256_concat(&[auth, &sha256(challenge)]);
                let raw = sha256_concat(&[auth, challenge]);

                debug!(
                    cert_nonce = %hex::encode(nonce),
                    hashed = %hex::encode(hashed),
                    raw = %hex::encode(raw),
                    auth_data_len = auth.len(),
                    "nonce matches neither challenge binding"
                );
                outcome.errors.push(Error::NonceMismatch);
            }
        },
        Err(e) => outcome.errors.push(e),
    }

    outcome
}

/// Find which challenge binding, if any, yields `nonce`
pub fn nonce_convention(
    nonce: &[u8; 32],
    auth_data: &[u8],
    challenge: &[u8],
) -> Option<NonceConvention> {
    let hashed = sha256_concat(&[auth_data, &sha256(challenge)]);
    if *nonce == hashed {
        return Some(NonceConvention::HashedChallenge);
    }

    let raw = sha256_concat(&[auth_data, challenge]);
    if *nonce == raw {
        return Some(NonceConvention::RawChallenge);
    }

    None
}
