// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! A minimal BER/DER TLV walker that digs the 32-byte nonce out of the App
//! Attest nonce extension.
//!
//! The extension value is usually `SEQUENCE { [1] { OCTET STRING (32) } }`,
//! but the walker does not depend on that exact shape: it returns the first
//! 32-byte OCTET STRING found in a depth-first scan.  Truncated or otherwise
//! malformed TLVs end the scan of the enclosing level without panicking.

use super::errors::Error;

const TAG_OCTET_STRING: u8 = 0x04;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;
const CONSTRUCTED: u8 = 0x20;

const NONCE_LEN: usize = 32;
const MAX_DEPTH: usize = 10;

/// Locate the 32-byte nonce nested anywhere within `payload`
pub fn extract_nonce(payload: &[u8]) -> Result<[u8; 32], Error> {
    find_octet32(payload, 0).ok_or_else(|| {
        Error::NonceNotFound("no 32-byte OCTET STRING in extension payload".to_string())
    })
}

fn find_octet32(buf: &[u8], depth: usize) -> Option<[u8; 32]> {
    if depth > MAX_DEPTH || buf.len() < 2 {
        return None;
    }

    let mut offset = 0;

    while let Some((tag, value, next)) = read_tlv(buf, offset) {
        if tag == TAG_OCTET_STRING && value.len() == NONCE_LEN {
            return <[u8; 32]>::try_from(value).ok();
        }

        // OCTET STRINGs are also descended into: they may encapsulate DER
        if tag & CONSTRUCTED != 0 || matches!(tag, TAG_SEQUENCE | TAG_SET | TAG_OCTET_STRING) {
            if let Some(nonce) = find_octet32(value, depth + 1) {
                return Some(nonce);
            }
        }

        offset = next;
    }

    None
}

/// Read the TLV starting at `offset`, returning tag, value and the offset of
/// the next TLV.  `None` if the buffer is exhausted or the TLV is malformed.
fn read_tlv(buf: &[u8], offset: usize) -> Option<(u8, &[u8], usize)> {
    let tag = *buf.get(offset)?;
    let first = *buf.get(offset + 1)? as usize;
    let mut pos = offset + 2;

    let len = if first & 0x80 == 0 {
        first
    } else {
        let n = first & 0x7f;
        // indefinite length (n == 0) is not DER, and anything wider than
        // usize cannot be addressed anyway
        if n == 0 || n > std::mem::size_of::<usize>() {
            return None;
        }
        let bytes = buf.get(pos..pos.checked_add(n)?)?;
        pos += n;
        bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize)
    };

    let end = pos.checked_add(len)?;
    let value = buf.get(pos..end)?;

    Some((tag, value, end))
}
