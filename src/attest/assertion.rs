// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::authdata::AuthDataHeader;
use super::common::{sha256, sha256_concat};
use super::container::AssertionContainer;
use super::errors::Error;
use super::pubkey::EcPublicKey;
use crate::store::ICounterStore;
use openssl::hash::MessageDigest;
use openssl::sign::Verifier;
use tracing::debug;

/// Verify an assertion made with a previously attested key.
///
/// Unlike attestation this stops at the first failing check.  On success the
/// assertion's counter is returned; the caller must persist it, see
/// [`verify_with_store`] for the race-free way of doing that.
pub fn verify_assertion(
    assertion: &AssertionContainer,
    stored_counter: u32,
    public_key: &EcPublicKey,
    signed_payload: &[u8],
) -> Result<u32, Error> {
    let header = AuthDataHeader::decode(&assertion.authenticator_data)?;

    if header.sign_count <= stored_counter {
        return Err(Error::ReplayDetected {
            counter: header.sign_count,
            stored: stored_counter,
        });
    }

    let nonce = sha256_concat(&[&assertion.authenticator_data, &sha256(signed_payload)]);

    let pkey = public_key.to_pkey()?;
    let mut verifier = Verifier::new(MessageDigest::sha256(), &pkey)?;
    verifier.update(&nonce)?;

    // a malformed DER signature is reported by openssl as an error rather
    // than as a mismatch
    match verifier.verify(&assertion.signature) {
        Ok(true) => {}
        Ok(false) => return Err(Error::SignatureInvalid("mismatch".to_string())),
        Err(e) => return Err(Error::SignatureInvalid(e.to_string())),
    }

    debug!(counter = header.sign_count, "assertion verified");

    Ok(header.sign_count)
}

/// Read the stored counter for `key_id`, verify the assertion against it and
/// advance the counter with a conditional write.  Of two concurrent calls
/// carrying the same counter at most one succeeds; the other gets
/// [`Error::Store`] with a conflict.
pub fn verify_with_store<S: ICounterStore + ?Sized>(
    store: &S,
    key_id: &[u8],
    assertion: &AssertionContainer,
    public_key: &EcPublicKey,
    signed_payload: &[u8],
) -> Result<u32, Error> {
    let stored = store.read(key_id)?;

    let counter = verify_assertion(assertion, stored, public_key, signed_payload)?;

    store.conditional_write(key_id, stored, counter)?;

    Ok(counter)
}
