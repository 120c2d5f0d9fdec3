// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-layout decoding of `authenticatorData`.
//!
//! ```text
//!  0                32   33        37         53       55
//!  +----------------+----+---------+----------+--------+----------------+
//!  |   rpIdHash     |flag|signCount|  aaguid  | credLen| credentialId   |
//!  +----------------+----+---------+----------+--------+----------------+
//! ```
//!
//! Assertions only carry the first 37 bytes.

use super::errors::Error;

const RP_ID_HASH_END: usize = 32;
const FLAGS_OFFSET: usize = 32;
const SIGN_COUNT_END: usize = 37;
const AAGUID_END: usize = 53;
const CRED_ID_LEN_END: usize = 55;

pub const FLAG_USER_PRESENT: u8 = 0x01;
pub const FLAG_USER_VERIFIED: u8 = 0x04;
pub const FLAG_ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
pub const FLAG_EXTENSION_DATA: u8 = 0x80;

/// The 37-byte prefix common to attestation and assertion authenticator data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDataHeader {
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub sign_count: u32,
}

impl AuthDataHeader {
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let rp_id_hash: [u8; 32] = field(buf, 0, RP_ID_HASH_END, "rpIdHash")?;
        let flags = field::<1>(buf, FLAGS_OFFSET, FLAGS_OFFSET + 1, "flags")?[0];
        let sign_count = u32::from_be_bytes(field(
            buf,
            FLAGS_OFFSET + 1,
            SIGN_COUNT_END,
            "signCount",
        )?);

        Ok(Self {
            rp_id_hash,
            flags,
            sign_count,
        })
    }

    pub fn user_present(&self) -> bool {
        self.flags & FLAG_USER_PRESENT != 0
    }

    pub fn user_verified(&self) -> bool {
        self.flags & FLAG_USER_VERIFIED != 0
    }

    pub fn has_attested_credential_data(&self) -> bool {
        self.flags & FLAG_ATTESTED_CREDENTIAL_DATA != 0
    }

    pub fn has_extension_data(&self) -> bool {
        self.flags & FLAG_EXTENSION_DATA != 0
    }
}

/// Authenticator data as found in an attestation object, i.e. including the
/// attested credential data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub sign_count: u32,
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
}

impl AuthenticatorData {
    /// Decode the fixed-layout fields.  Trailing bytes after the credential id
    /// (the COSE key and any extensions) are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let header = AuthDataHeader::decode(buf)?;

        let aaguid: [u8; 16] = field(buf, SIGN_COUNT_END, AAGUID_END, "aaguid")?;
        let cred_id_len =
            u16::from_be_bytes(field(buf, AAGUID_END, CRED_ID_LEN_END, "credentialIdLength")?)
                as usize;

        let end = CRED_ID_LEN_END + cred_id_len;
        let credential_id = buf
            .get(CRED_ID_LEN_END..end)
            .ok_or_else(|| {
                Error::MalformedAuthData(format!(
                    "credentialId: expecting {cred_id_len} bytes, got {}",
                    buf.len().saturating_sub(CRED_ID_LEN_END)
                ))
            })?
            .to_vec();

        Ok(Self {
            rp_id_hash: header.rp_id_hash,
            flags: header.flags,
            sign_count: header.sign_count,
            aaguid,
            credential_id,
        })
    }

    pub fn header(&self) -> AuthDataHeader {
        AuthDataHeader {
            rp_id_hash: self.rp_id_hash,
            flags: self.flags,
            sign_count: self.sign_count,
        }
    }
}

fn field<const N: usize>(
    buf: &[u8],
    start: usize,
    end: usize,
    n: &str,
) -> Result<[u8; N], Error> {
    buf.get(start..end)
        .and_then(|s| <[u8; N]>::try_from(s).ok())
        .ok_or_else(|| {
            Error::MalformedAuthData(format!(
                "{n}: need {end} bytes, buffer holds {}",
                buf.len()
            ))
        })
}
