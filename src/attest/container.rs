// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::base64;
use super::common::*;
use super::errors::Error;
use bitmask::*;
use ciborium::de::from_reader;
use ciborium::Value;

const FMT_KEY: &str = "fmt";
const ATT_STMT_KEY: &str = "attStmt";
const AUTH_DATA_KEY: &str = "authData";
const X5C_KEY: &str = "x5c";
const RECEIPT_KEY: &str = "receipt";

const SIGNATURE_KEY: &str = "signature";
const AUTHENTICATOR_DATA_KEY: &str = "authenticatorData";

bitmask! {
    #[derive(Debug)]
    mask AttestationKeySet: u8 where flags AttestationKey {
        Fmt      = 0x01,
        AttStmt  = 0x02,
        AuthData = 0x04,
        X5c      = 0x08,
        Receipt  = 0x10,
    }
}

bitmask! {
    #[derive(Debug)]
    mask AssertionKeySet: u8 where flags AssertionKey {
        Signature         = 0x01,
        AuthenticatorData = 0x02,
    }
}

/// A decoded App Attest attestation object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationContainer {
    /// The `fmt` tag, expected to be `apple-appattest`
    pub format: String,
    /// `attStmt.x5c`: DER certificates, leaf first
    pub certificates: Vec<Vec<u8>>,
    /// `attStmt.receipt`, opaque
    pub receipt: Option<Vec<u8>>,
    /// Raw `authData`
    pub auth_data: Vec<u8>,

    keys: AttestationKeySet,
}

impl AttestationContainer {
    pub fn new(
        format: &str,
        certificates: Vec<Vec<u8>>,
        receipt: Option<Vec<u8>>,
        auth_data: Vec<u8>,
    ) -> Self {
        Self {
            format: format.to_string(),
            certificates,
            receipt,
            auth_data,
            keys: AttestationKeySet::all(),
        }
    }

    /// Decode a CBOR-encoded attestation object
    pub fn decode<R: std::io::Read>(buf: R) -> Result<Self, Error> {
        let v: Value =
            from_reader(buf).map_err(|e| Error::MalformedContainer(e.to_string()))?;

        let mut c = Self {
            format: Default::default(),
            certificates: Default::default(),
            receipt: None,
            auth_data: Default::default(),
            keys: AttestationKeySet::none(),
        };

        c.parse(to_map(&v, "attestation object")?)?;
        c.validate()?;

        Ok(c)
    }

    /// Decode a base64 (standard alphabet) attestation object, the way
    /// devices hand it over
    pub fn from_base64(s: &str) -> Result<Self, Error> {
        let buf = base64::decode_str(s)?;

        Self::decode(buf.as_slice())
    }

    fn parse(&mut self, contents: &[(Value, Value)]) -> Result<(), Error> {
        for (k, v) in contents.iter() {
            let Some(k) = k.as_text() else {
                // the format only defines text keys
                continue;
            };

            match k {
                FMT_KEY => self.set_format(v)?,
                ATT_STMT_KEY => self.set_att_stmt(v)?,
                AUTH_DATA_KEY => self.set_auth_data(v)?,
                _ => continue,
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), Error> {
        let mandatory_keys = [
            (AttestationKey::Fmt, FMT_KEY),
            (AttestationKey::AttStmt, ATT_STMT_KEY),
            (AttestationKey::AuthData, AUTH_DATA_KEY),
        ];

        for (k, n) in mandatory_keys.iter() {
            if !self.keys.contains(*k) {
                return Err(Error::MalformedContainer(format!("missing {n}")));
            }
        }

        Ok(())
    }

    fn set_format(&mut self, v: &Value) -> Result<(), Error> {
        if self.keys.contains(AttestationKey::Fmt) {
            return Err(duplicated(FMT_KEY));
        }

        self.format = to_tstr(v, FMT_KEY)?;

        self.keys.set(AttestationKey::Fmt);

        Ok(())
    }

    fn set_auth_data(&mut self, v: &Value) -> Result<(), Error> {
        if self.keys.contains(AttestationKey::AuthData) {
            return Err(duplicated(AUTH_DATA_KEY));
        }

        self.auth_data = to_bstr(v, AUTH_DATA_KEY)?;

        self.keys.set(AttestationKey::AuthData);

        Ok(())
    }

    fn set_att_stmt(&mut self, v: &Value) -> Result<(), Error> {
        if self.keys.contains(AttestationKey::AttStmt) {
            return Err(duplicated(ATT_STMT_KEY));
        }

        for (k, v) in to_map(v, ATT_STMT_KEY)?.iter() {
            match k.as_text() {
                Some(X5C_KEY) => {
                    if self.keys.contains(AttestationKey::X5c) {
                        return Err(duplicated(X5C_KEY));
                    }
                    self.certificates = to_bstr_array(v, X5C_KEY)?;
                    self.keys.set(AttestationKey::X5c);
                }
                Some(RECEIPT_KEY) => {
                    if self.keys.contains(AttestationKey::Receipt) {
                        return Err(duplicated(RECEIPT_KEY));
                    }
                    self.receipt = Some(to_bstr(v, RECEIPT_KEY)?);
                    self.keys.set(AttestationKey::Receipt);
                }
                _ => continue,
            }
        }

        // a missing x5c is left to the chain length check
        self.keys.set(AttestationKey::AttStmt);

        Ok(())
    }
}

/// A decoded App Attest assertion object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionContainer {
    /// DER-encoded ECDSA signature
    pub signature: Vec<u8>,
    /// Raw `authenticatorData`
    pub authenticator_data: Vec<u8>,

    keys: AssertionKeySet,
}

impl AssertionContainer {
    pub fn new(signature: Vec<u8>, authenticator_data: Vec<u8>) -> Self {
        Self {
            signature,
            authenticator_data,
            keys: AssertionKeySet::all(),
        }
    }

    /// Decode a CBOR-encoded assertion object
    pub fn decode<R: std::io::Read>(buf: R) -> Result<Self, Error> {
        let v: Value =
            from_reader(buf).map_err(|e| Error::MalformedContainer(e.to_string()))?;

        let mut c = Self {
            signature: Default::default(),
            authenticator_data: Default::default(),
            keys: AssertionKeySet::none(),
        };

        for (k, v) in to_map(&v, "assertion object")?.iter() {
            match k.as_text() {
                Some(SIGNATURE_KEY) => c.set_signature(v)?,
                Some(AUTHENTICATOR_DATA_KEY) => c.set_authenticator_data(v)?,
                _ => continue,
            }
        }

        c.validate()?;

        Ok(c)
    }

    pub fn from_base64(s: &str) -> Result<Self, Error> {
        let buf = base64::decode_str(s)?;

        Self::decode(buf.as_slice())
    }

    fn validate(&self) -> Result<(), Error> {
        let mandatory_keys = [
            (AssertionKey::Signature, SIGNATURE_KEY),
            (AssertionKey::AuthenticatorData, AUTHENTICATOR_DATA_KEY),
        ];

        for (k, n) in mandatory_keys.iter() {
            if !self.keys.contains(*k) {
                return Err(Error::MalformedContainer(format!("missing {n}")));
            }
        }

        Ok(())
    }

    fn set_signature(&mut self, v: &Value) -> Result<(), Error> {
        if self.keys.contains(AssertionKey::Signature) {
            return Err(duplicated(SIGNATURE_KEY));
        }

        self.signature = to_bstr(v, SIGNATURE_KEY)?;

        self.keys.set(AssertionKey::Signature);

        Ok(())
    }

    fn set_authenticator_data(&mut self, v: &Value) -> Result<(), Error> {
        if self.keys.contains(AssertionKey::AuthenticatorData) {
            return Err(duplicated(AUTHENTICATOR_DATA_KEY));
        }

        self.authenticator_data = to_bstr(v, AUTHENTICATOR_DATA_KEY)?;

        self.keys.set(AssertionKey::AuthenticatorData);

        Ok(())
    }
}

fn duplicated(n: &str) -> Error {
    Error::MalformedContainer(format!("duplicated {n}"))
}
