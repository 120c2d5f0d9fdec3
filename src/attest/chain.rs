// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Two-hop certificate chain validation against the pinned root, and lookup
//! of the nonce extension on the leaf.
//!
//! Trust is established purely by signatures: root signs intermediate,
//! intermediate signs leaf.  There is no path building, and neither validity
//! periods nor revocation status are consulted.

use super::common::NONCE_EXTENSION_OID;
use super::errors::Error;
use crate::store::TrustAnchor;
use openssl::error::ErrorStack;
use openssl::x509::{X509Ref, X509};
use tracing::debug;
use x509_parser::prelude::*;

/// Validate the leaf and intermediate of a two-certificate `x5c` against
/// `anchor`.  The leaf arrives already parsed, or with the reason it could
/// not be.  Both signatures are checked even if the first one fails; the
/// returned list is empty on success.
pub fn validate(
    leaf: Result<&X509Ref, &ErrorStack>,
    intermediate: &[u8],
    anchor: &TrustAnchor,
) -> Vec<Error> {
    let mut errors = Vec::new();

    let intermediate = X509::from_der(intermediate);

    match &intermediate {
        Ok(i) => {
            if let Err(e) = verify_signed_by(i, anchor.certificate()) {
                errors.push(Error::IntermediateSignatureInvalid(e));
            }
        }
        Err(e) => errors.push(Error::IntermediateSignatureInvalid(format!(
            "cannot parse intermediate certificate: {e}"
        ))),
    }

    match (leaf, &intermediate) {
        (Ok(l), Ok(i)) => {
            if let Err(e) = verify_signed_by(l, i) {
                errors.push(Error::LeafSignatureInvalid(e));
            }
        }
        (Err(e), _) => errors.push(Error::LeafSignatureInvalid(format!(
            "cannot parse leaf certificate: {e}"
        ))),
        (Ok(_), Err(_)) => errors.push(Error::LeafSignatureInvalid(
            "issuer certificate unusable".to_string(),
        )),
    }

    debug!(failures = errors.len(), "certificate chain checked");

    errors
}

// verifies with the algorithm declared in the subject certificate
fn verify_signed_by(subject: &X509Ref, issuer: &X509Ref) -> Result<(), String> {
    let key = issuer
        .public_key()
        .map_err(|e| format!("cannot load issuer key: {e}"))?;

    match subject.verify(&key) {
        Ok(true) => Ok(()),
        Ok(false) => Err("signature does not verify".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Return the raw value of the nonce extension of the DER certificate
/// `leaf`, i.e. the DER carried inside the extnValue OCTET STRING
pub fn nonce_extension(leaf: &[u8]) -> Result<Vec<u8>, Error> {
    let (_, cert) = X509Certificate::from_der(leaf)
        .map_err(|e| Error::NonceNotFound(format!("cannot parse leaf certificate: {e}")))?;

    cert.extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == NONCE_EXTENSION_OID)
        .map(|ext| ext.value.to_vec())
        .ok_or_else(|| {
            Error::NonceNotFound(format!("extension {NONCE_EXTENSION_OID} absent"))
        })
}
