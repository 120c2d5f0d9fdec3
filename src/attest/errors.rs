// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::common::Environment;

#[derive(thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Malformed container: {0}")]
    MalformedContainer(String),
    #[error("Unsupported attestation format: {0}")]
    UnsupportedFormat(String),
    #[error("Malformed authenticator data: {0}")]
    MalformedAuthData(String),
    #[error("Certificate chain must hold exactly 2 certificates, got {0}")]
    ChainLengthInvalid(usize),
    #[error("Intermediate certificate signature invalid: {0}")]
    IntermediateSignatureInvalid(String),
    #[error("Leaf certificate signature invalid: {0}")]
    LeafSignatureInvalid(String),
    #[error("Leaf certificate key is not a P-256 EC key: {0}")]
    NonECKey(String),
    #[error("rpIdHash mismatch")]
    RpIdMismatch,
    #[error("attested credential data flag not set")]
    FlagNotSet,
    #[error("signCount should be 0, got {0}")]
    SignCountInvalid(u32),
    #[error("aaguid mismatch (expected {0})")]
    AaguidMismatch(Environment),
    #[error("credentialId != SHA256(publicKey)")]
    CredentialBindingMismatch,
    #[error("Nonce not found: {0}")]
    NonceNotFound(String),
    #[error("Nonce mismatch")]
    NonceMismatch,
    #[error("Replay: counter {counter} <= {stored}")]
    ReplayDetected { counter: u32, stored: u32 },
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),
    #[error("Invalid public key: {0}")]
    InvalidKey(String),
    #[error("Counter store: {0}")]
    Store(#[from] crate::store::Error),
    #[error("Crypto library failure: {0}")]
    Crypto(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Error::Crypto(e.to_string())
    }
}
