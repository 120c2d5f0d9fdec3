// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The attest module verifies App Attest attestation and assertion objects.
//!
//! An attestation is checked once, when the device enrolls its key.  The
//! outcome carries the attested public key and its key id, which the caller
//! persists together with a replay counter set to zero.  Every later request
//! carries an assertion, which is checked against the enrolled key and the
//! stored counter.
//!
//! # Example
//!
//! ```no_run
//! use appattest::attest::{AssertionContainer, AttestationContainer, Environment, Verifier};
//! use appattest::store::{MemoCounterStore, TrustAnchor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let (attestation_b64, assertion_b64) = ("", "");
//! # let challenge = b"server issued challenge";
//! # let payload = br#"{"passportHash":"...","evmAddress":"..."}"#;
//! let anchor = TrustAnchor::apple_app_attest()?;
//! let verifier = Verifier::new(anchor, "TEAMID1234", "com.example.app", Environment::Production);
//!
//! // enrollment
//! let attestation = AttestationContainer::from_base64(attestation_b64)?;
//! let outcome = verifier.verify_attestation(&attestation, challenge);
//! if !outcome.ok() {
//!     for m in outcome.messages() {
//!         eprintln!("{m}");
//!     }
//!     return Ok(());
//! }
//!
//! let (Some(key_id), Some(public_key)) = (outcome.key_id, outcome.public_key) else {
//!     return Ok(());
//! };
//!
//! let counters = MemoCounterStore::new();
//! counters.enroll(&key_id);
//!
//! // later, for each request
//! let assertion = AssertionContainer::from_base64(assertion_b64)?;
//! let counter =
//!     verifier.verify_assertion_with_store(&counters, &key_id, &assertion, &public_key, payload)?;
//! println!("request accepted, counter now {counter}");
//! # Ok(())
//! # }
//! ```

pub use self::assertion::{verify_assertion, verify_with_store};
pub use self::attestation::{verify_attestation, NonceConvention, VerificationOutcome};
pub use self::authdata::{AuthDataHeader, AuthenticatorData};
pub use self::common::*;
pub use self::container::{AssertionContainer, AttestationContainer};
pub use self::errors::Error;
pub use self::pubkey::{EcPublicKey, KeyExport, PublicKeyFormats};
pub use self::verifier::Verifier;

pub mod asn1;
mod assertion;
mod attestation;
pub mod authdata;
pub mod base64;
pub mod chain;
mod common;
mod container;
mod errors;
mod pubkey;
#[cfg(test)]
mod testutil;
mod verifier;
