// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::assertion;
use super::attestation::{self, VerificationOutcome};
use super::common::{app_id, Environment};
use super::container::{AssertionContainer, AttestationContainer};
use super::errors::Error;
use super::pubkey::EcPublicKey;
use crate::store::{ICounterStore, TrustAnchor};

/// Verification settings for one app: trust anchor, relying party id and
/// environment.  Build it once and share it.
#[derive(Debug, Clone)]
pub struct Verifier {
    anchor: TrustAnchor,
    rp_id: String,
    environment: Environment,
}

impl Verifier {
    pub fn new(
        anchor: TrustAnchor,
        team_id: &str,
        bundle_id: &str,
        environment: Environment,
    ) -> Self {
        Self::with_rp_id(anchor, &app_id(team_id, bundle_id), environment)
    }

    /// Use a precomposed `<team-id>.<bundle-id>`
    pub fn with_rp_id(anchor: TrustAnchor, rp_id: &str, environment: Environment) -> Self {
        Self {
            anchor,
            rp_id: rp_id.to_string(),
            environment,
        }
    }

    pub fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn verify_attestation(
        &self,
        container: &AttestationContainer,
        challenge: &[u8],
    ) -> VerificationOutcome {
        attestation::verify_attestation(
            container,
            challenge,
            &self.rp_id,
            self.environment,
            &self.anchor,
        )
    }

    pub fn verify_assertion(
        &self,
        assertion: &AssertionContainer,
        stored_counter: u32,
        public_key: &EcPublicKey,
        signed_payload: &[u8],
    ) -> Result<u32, Error> {
        assertion::verify_assertion(assertion, stored_counter, public_key, signed_payload)
    }

    pub fn verify_assertion_with_store<S: ICounterStore + ?Sized>(
        &self,
        store: &S,
        key_id: &[u8],
        assertion: &AssertionContainer,
        public_key: &EcPublicKey,
        signed_payload: &[u8],
    ) -> Result<u32, Error> {
        assertion::verify_with_store(store, key_id, assertion, public_key, signed_payload)
    }
}
