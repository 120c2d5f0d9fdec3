// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::base64::{self, Bytes};
use super::common::{sha256, OID_EC_PUBLIC_KEY, OID_PRIME256V1};
use super::errors::Error;
use jsonwebtoken::jwk;
use openssl::bn::{BigNum, BigNumContext, BigNumRef};
use openssl::ec::{EcGroup, EcKey, EcPoint};
use openssl::nid::Nid;
use openssl::pkey::{PKey, PKeyRef, Public};
use openssl::x509::{X509Ref, X509};
use serde::{Deserialize, Serialize};

const TAG_SEQUENCE: u8 = 0x30;
const TAG_OID: u8 = 0x06;
const TAG_BIT_STRING: u8 = 0x03;
const UNCOMPRESSED_POINT: u8 = 0x04;

/// A P-256 public key as its affine coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcPublicKey {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl EcPublicKey {
    /// Build from raw coordinates, checking the point is on P-256
    pub fn from_coordinates(x: &[u8], y: &[u8]) -> Result<Self, Error> {
        let x: [u8; 32] = x
            .try_into()
            .map_err(|_| Error::InvalidKey(format!("x: expecting 32 bytes, got {}", x.len())))?;
        let y: [u8; 32] = y
            .try_into()
            .map_err(|_| Error::InvalidKey(format!("y: expecting 32 bytes, got {}", y.len())))?;

        let k = Self { x, y };
        k.to_pkey()?;

        Ok(k)
    }

    /// Build from the 65-byte `0x04 || x || y` encoding
    pub fn from_uncompressed(data: &[u8]) -> Result<Self, Error> {
        if data.len() != 65 || data[0] != UNCOMPRESSED_POINT {
            return Err(Error::InvalidKey(
                "expecting a 65-byte uncompressed point".to_string(),
            ));
        }

        let group = p256()?;
        let mut ctx = BigNumContext::new()?;
        let point = EcPoint::from_bytes(&group, data, &mut ctx)
            .map_err(|e| Error::InvalidKey(format!("point not on P-256: {e}")))?;

        let ec = EcKey::from_public_key(&group, &point)?;
        Self::from_ec_key(&ec)
    }

    /// Parse a DER `SubjectPublicKeyInfo`
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let pkey = PKey::public_key_from_der(der)
            .map_err(|e| Error::InvalidKey(format!("SubjectPublicKeyInfo: {e}")))?;

        Self::from_pkey(&pkey)
    }

    /// Extract the subject key of `cert`, which must be on P-256
    pub fn from_certificate(cert: &X509Ref) -> Result<Self, Error> {
        let pkey = cert
            .public_key()
            .map_err(|e| Error::NonECKey(format!("cannot load subject key: {e}")))?;

        Self::from_pkey(&pkey)
    }

    pub fn from_certificate_der(der: &[u8]) -> Result<Self, Error> {
        let cert = X509::from_der(der)
            .map_err(|e| Error::MalformedContainer(format!("certificate: {e}")))?;

        Self::from_certificate(&cert)
    }

    /// Build from an ES256 / P-256 JWK
    pub fn from_jwk(key: &jwk::Jwk) -> Result<Self, Error> {
        match &key.algorithm {
            jwk::AlgorithmParameters::EllipticCurve(ec_params) => {
                if ec_params.curve != jwk::EllipticCurve::P256 {
                    return Err(Error::InvalidKey(format!(
                        "invalid EC curve {:?}",
                        ec_params.curve
                    )));
                }

                Self::from_coordinates(
                    &base64::decode_url(ec_params.x.as_str())?,
                    &base64::decode_url(ec_params.y.as_str())?,
                )
            }
            a => Err(Error::InvalidKey(format!(
                "unsupported algorithm params {a:?}"
            ))),
        }
    }

    fn from_pkey(pkey: &PKeyRef<Public>) -> Result<Self, Error> {
        let ec = pkey
            .ec_key()
            .map_err(|_| Error::NonECKey("subject key is not an EC key".to_string()))?;

        Self::from_ec_key(&ec)
    }

    fn from_ec_key(ec: &EcKey<Public>) -> Result<Self, Error> {
        let group = ec.group();

        if group.curve_name() != Some(Nid::X9_62_PRIME256V1) {
            let curve = group
                .curve_name()
                .and_then(|n| n.short_name().ok())
                .unwrap_or("unnamed curve");
            return Err(Error::NonECKey(format!("unexpected curve {curve}")));
        }

        let mut ctx = BigNumContext::new()?;
        let mut x = BigNum::new()?;
        let mut y = BigNum::new()?;
        ec.public_key()
            .affine_coordinates(group, &mut x, &mut y, &mut ctx)?;

        Ok(Self {
            x: to_coordinate(&x)?,
            y: to_coordinate(&y)?,
        })
    }

    /// `0x04 || x || y`
    pub fn uncompressed(&self) -> [u8; 65] {
        let mut v = [0u8; 65];
        v[0] = UNCOMPRESSED_POINT;
        v[1..33].copy_from_slice(&self.x);
        v[33..].copy_from_slice(&self.y);
        v
    }

    /// SHA-256 of the uncompressed point; App Attest uses it as the credential id
    pub fn key_id(&self) -> [u8; 32] {
        sha256(&self.uncompressed())
    }

    /// DER `SubjectPublicKeyInfo` for an id-ecPublicKey on prime256v1
    pub fn to_der(&self) -> Vec<u8> {
        let algorithm = der_tlv(
            TAG_SEQUENCE,
            &[
                der_tlv(TAG_OID, &OID_EC_PUBLIC_KEY),
                der_tlv(TAG_OID, &OID_PRIME256V1),
            ]
            .concat(),
        );

        // leading zero: no unused bits
        let mut bits = vec![0x00];
        bits.extend_from_slice(&self.uncompressed());

        der_tlv(
            TAG_SEQUENCE,
            &[algorithm, der_tlv(TAG_BIT_STRING, &bits)].concat(),
        )
    }

    pub fn to_pkey(&self) -> Result<PKey<Public>, Error> {
        let group = p256()?;
        let x = BigNum::from_slice(&self.x)?;
        let y = BigNum::from_slice(&self.y)?;

        let ec = EcKey::from_public_key_affine_coordinates(&group, &x, &y)
            .map_err(|e| Error::InvalidKey(format!("point not on P-256: {e}")))?;

        Ok(PKey::from_ec_key(ec)?)
    }

    pub fn to_jwk(&self) -> jwk::Jwk {
        jwk::Jwk {
            common: jwk::CommonParameters {
                key_algorithm: Some(jwk::KeyAlgorithm::ES256),
                key_id: Some(base64::encode(&self.key_id())),
                ..Default::default()
            },
            algorithm: jwk::AlgorithmParameters::EllipticCurve(jwk::EllipticCurveKeyParameters {
                key_type: jwk::EllipticCurveKeyType::EC,
                curve: jwk::EllipticCurve::P256,
                x: base64::encode_url(&self.x),
                y: base64::encode_url(&self.y),
            }),
        }
    }

    /// Every supported serialisation of the key, ready to be persisted
    pub fn export(&self) -> KeyExport {
        let key_id = self.key_id();
        let uncompressed = self.uncompressed();
        let der = self.to_der();

        KeyExport {
            key_id: Bytes::from(&key_id[..]),
            key_id_hex: key_id.to_vec(),
            public_key: PublicKeyFormats {
                uncompressed: uncompressed.to_vec(),
                uncompressed_b64: Bytes::from(&uncompressed[..]),
                der_b64: Bytes::from(der.as_slice()),
                der,
                x: self.x.to_vec(),
                y: self.y.to_vec(),
                x_b64: Bytes::from(&self.x[..]),
                y_b64: Bytes::from(&self.y[..]),
                jwk: self.to_jwk(),
            },
        }
    }
}

/// Persistable form of an enrolled key
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExport {
    pub key_id: Bytes,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub key_id_hex: Vec<u8>,
    pub public_key: PublicKeyFormats,
}

#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyFormats {
    #[serde_as(as = "serde_with::hex::Hex")]
    pub uncompressed: Vec<u8>,
    pub uncompressed_b64: Bytes,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub der: Vec<u8>,
    pub der_b64: Bytes,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub x: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub y: Vec<u8>,
    pub x_b64: Bytes,
    pub y_b64: Bytes,
    pub jwk: jwk::Jwk,
}

impl KeyExport {
    /// Recover the key, preferring the DER form
    pub fn public_key(&self) -> Result<EcPublicKey, Error> {
        EcPublicKey::from_der(&self.public_key.der)
    }
}

fn p256() -> Result<EcGroup, Error> {
    Ok(EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?)
}

fn to_coordinate(n: &BigNumRef) -> Result<[u8; 32], Error> {
    n.to_vec_padded(32)?
        .try_into()
        .map_err(|_| Error::InvalidKey("coordinate wider than 32 bytes".to_string()))
}

fn der_len(len: usize) -> Vec<u8> {
    match len {
        0..=127 => vec![len as u8],
        128..=255 => vec![0x81, len as u8],
        _ => vec![0x82, (len >> 8) as u8, len as u8],
    }
}

fn der_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut v = vec![tag];
    v.extend(der_len(content.len()));
    v.extend_from_slice(content);
    v
}
