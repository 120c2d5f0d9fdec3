// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Apple App Attest verification.
//!
//! This crate verifies the evidence produced by Apple's App Attest service
//! ([DCAppAttestService]): the one-off attestation that binds a Secure
//! Enclave key to an app, and the assertions later signed with that key.
//!
//! The API allows:
//! * Decoding CBOR-encoded attestation and assertion objects
//! * Validating the attestation certificate chain up to a pinned root
//! * Checking the authenticator data, the key binding and the challenge nonce
//! * Verifying assertion signatures with counter-based replay protection
//! * Exporting the attested key as DER, raw point, coordinates and JWK
//!
//! [DCAppAttestService]: https://developer.apple.com/documentation/devicecheck/validating_apps_that_connect_to_your_server

pub mod attest;
pub mod store;
