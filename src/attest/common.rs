// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use ciborium::Value;
use hex_literal::hex;
use openssl::sha::Sha256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The `fmt` value carried by every App Attest attestation object
pub const APP_ATTEST_FORMAT: &str = "apple-appattest";

/// Certificate extension holding the challenge-binding nonce
pub const NONCE_EXTENSION_OID: &str = "1.2.840.113635.100.8.2";

/// DER contents (no tag/length) of id-ecPublicKey, 1.2.840.10045.2.1
pub const OID_EC_PUBLIC_KEY: [u8; 7] = hex!("2a8648ce3d0201");
/// DER contents (no tag/length) of prime256v1, 1.2.840.10045.3.1.7
pub const OID_PRIME256V1: [u8; 8] = hex!("2a8648ce3d030107");

const AAGUID_DEVELOPMENT: [u8; 16] = *b"appattestdevelop";
const AAGUID_PRODUCTION: [u8; 16] = *b"appattest\0\0\0\0\0\0\0";

/// The App Attest environment a key was generated in.  Each one stamps a
/// distinct AAGUID into the authenticator data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    #[serde(rename = "dev", alias = "development")]
    Development,
    #[serde(rename = "prod", alias = "production")]
    Production,
}

impl Environment {
    pub fn aaguid(&self) -> &'static [u8; 16] {
        match self {
            Environment::Development => &AAGUID_DEVELOPMENT,
            Environment::Production => &AAGUID_PRODUCTION,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("dev"),
            Environment::Production => f.write_str("prod"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" | "development" => Ok(Environment::Development),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(format!("unknown environment {other}, expecting dev or prod")),
        }
    }
}

/// App Attest relying-party id: `<team-id>.<bundle-id>`
pub fn app_id(team_id: &str, bundle_id: &str) -> String {
    format!("{team_id}.{bundle_id}")
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    openssl::sha::sha256(data)
}

/// SHA-256 over the concatenation of the supplied parts
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p);
    }
    hasher.finish()
}

pub(crate) fn to_bstr(v: &Value, n: &str) -> Result<Vec<u8>, Error> {
    match v.as_bytes() {
        Some(b) => Ok(b.clone()),
        None => Err(Error::MalformedContainer(format!("{n} MUST be bstr"))),
    }
}

pub(crate) fn to_tstr(v: &Value, n: &str) -> Result<String, Error> {
    match v.as_text() {
        Some(s) => Ok(s.to_string()),
        None => Err(Error::MalformedContainer(format!("{n} MUST be tstr"))),
    }
}

pub(crate) fn to_bstr_array(v: &Value, n: &str) -> Result<Vec<Vec<u8>>, Error> {
    let Some(a) = v.as_array() else {
        return Err(Error::MalformedContainer(format!("{n} MUST be array")));
    };

    a.iter()
        .enumerate()
        .map(|(i, x)| to_bstr(x, &format!("{n}[{i}]")))
        .collect()
}

pub(crate) fn to_map<'a>(v: &'a Value, n: &str) -> Result<&'a Vec<(Value, Value)>, Error> {
    v.as_map()
        .ok_or_else(|| Error::MalformedContainer(format!("{n} MUST be map")))
}
