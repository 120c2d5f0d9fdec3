// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Fixtures shared by the unit tests: a throwaway App Attest style CA
//! hierarchy able to mint attestations and assertions on demand, plus
//! objects captured from a real device.

use super::authdata::FLAG_ATTESTED_CREDENTIAL_DATA;
use super::common::*;
use super::container::{AssertionContainer, AttestationContainer};
use super::pubkey::EcPublicKey;
use crate::store::TrustAnchor;
use ciborium::ser::into_writer;
use ciborium::Value;
use hex_literal::hex;
use openssl::asn1::{Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{HasPublic, PKey, PKeyRef, Private};
use openssl::sign::Signer;
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Builder, X509Extension, X509NameBuilder, X509Ref, X509};

pub const RP_ID: &str = "TEAMID1234.com.example.app";
pub const CHALLENGE: &[u8] = b"5b3b2303-e650-4a56-a9ec-33e3e2a90d14";

/// App id of the real device captures below
pub const REAL_RP_ID: &str = "762U5G7236.network.gandalf.connect";

/// Production attestation from an iOS device.  The challenge it was issued
/// for is unknown.
pub const REAL_ATTESTATION_B64: &str = concat!(
    "o2NmbXRvYXBwbGUtYXBwYXR0ZXN0Z2F0dFN0bXSiY3g1Y4JZAzEwggMtMIICs6ADAgECAgYBkGqx",
    "bE8wCgYIKoZIzj0EAwIwTzEjMCEGA1UEAwwaQXBwbGUgQXBwIEF0dGVzdGF0aW9uIENBIDExEzAR",
    "BgNVBAoMCkFwcGxlIEluYy4xEzARBgNVBAgMCkNhbGlmb3JuaWEwHhcNMjQwNjI5MTk0ODUwWhcN",
    "MjUwMTI0MDcyNzUwWjCBkTFJMEcGA1UEAwxAMWI3NzlmZjY5MWVkZjRkZTAzYzU0OGU4ZmUxOTYy",
    "ZjZkNTc5ODA2MGNhNjgzZGQ0N2JiMmJjNzJhNzhkZmViZjEaMBgGA1UECwwRQUFBIENlcnRpZmlj",
    "YXRpb24xEzARBgNVBAoMCkFwcGxlIEluYy4xEzARBgNVBAgMCkNhbGlmb3JuaWEwWTATBgcqhkjO",
    "PQIBBggqhkjOPQMBBwNCAATVrgv9TJ/pAmgUQYA0gtXDRV9vw3TRJv8C1qtpFZ4POMIBHcByLUsD",
    "ZSFPJQQxM3nRmKD1ELEfd0RXzKZrhhXno4IBNjCCATIwDAYDVR0TAQH/BAIwADAOBgNVHQ8BAf8E",
    "BAMCBPAwgYMGCSqGSIb3Y2QIBQR2MHSkAwIBCr+JMAMCAQG/iTEDAgEAv4kyAwIBAb+JMwMCAQG/",
    "iTQkBCI3NjJVNUc3MjM2Lm5ldHdvcmsuZ2FuZGFsZi5jb25uZWN0pQYEBHNrcyC/iTYDAgEFv4k3",
    "AwIBAL+JOQMCAQC/iToDAgEAv4k7AwIBADBXBgkqhkiG92NkCAcESjBIv4p4CAQGMTcuNS4xv4hQ",
    "BwIFAP////+/insHBAUyMUY5ML+KfQgEBjE3LjUuMb+KfgMCAQC/iwwPBA0yMS42LjkwLjAuMCww",
    "MDMGCSqGSIb3Y2QIAgQmMCShIgQgFsrz55cr5FuBWoLw3/BtAxUNXVwuG1+YrqHb3a4nl38wCgYI",
    "KoZIzj0EAwIDaAAwZQIwMXgjaRv1XCpl2b47xoScDqeR8uwsKpG5gPsQVr7Am3rXNxPyWbN/QHSu",
    "v4xWARI8AjEAvXdy8jQvyX1RVZCg2acUw31ptSOee3CDEWMcSmv24iRETKo96TdMPYNN864cpUHp",
    "WQJHMIICQzCCAcigAwIBAgIQCbrF4bxAGtnUU5W8OBoIVDAKBggqhkjOPQQDAzBSMSYwJAYDVQQD",
    "DB1BcHBsZSBBcHAgQXR0ZXN0YXRpb24gUm9vdCBDQTETMBEGA1UECgwKQXBwbGUgSW5jLjETMBEG",
    "A1UECAwKQ2FsaWZvcm5pYTAeFw0yMDAzMTgxODM5NTVaFw0zMDAzMTMwMDAwMDBaME8xIzAhBgNV",
    "BAMMGkFwcGxlIEFwcCBBdHRlc3RhdGlvbiBDQSAxMRMwEQYDVQQKDApBcHBsZSBJbmMuMRMwEQYD",
    "VQQIDApDYWxpZm9ybmlhMHYwEAYHKoZIzj0CAQYFK4EEACIDYgAErls3oHdNebI1j0Dn0fImJvHC",
    "X+8XgC3qs4JqWYdP+NKtFSV4mqJmBBkSSLY8uWcGnpjTY71eNw+/oI4ynoBzqYXndG6jWaL2bynb",
    "Mq9FXiEWWNVnr54mfrJhTcIaZs6Zo2YwZDASBgNVHRMBAf8ECDAGAQH/AgEAMB8GA1UdIwQYMBaA",
    "FKyREFMzvb5oQf+nDKnl+url5YqhMB0GA1UdDgQWBBQ+410cBBmpybQx+IR01uHhV3LjmzAOBgNV",
    "HQ8BAf8EBAMCAQYwCgYIKoZIzj0EAwMDaQAwZgIxALu+iI1zjQUCz7z9Zm0JV1A1vNaHLD+EMEkm",
    "Ke3R+RToeZkcmui1rvjTqFQz97YNBgIxAKs47dDMge0ApFLDukT5k2NlU/7MKX8utN+fXr5aSsq2",
    "mVxLgg35BDhveAe7WJQ5t2dyZWNlaXB0WQ6lMIAGCSqGSIb3DQEHAqCAMIACAQExDzANBglghkgB",
    "ZQMEAgEFADCABgkqhkiG9w0BBwGggCSABIID6DGCBF8wKgIBAgIBAQQiNzYyVTVHNzIzNi5uZXR3",
    "b3JrLmdhbmRhbGYuY29ubmVjdDCCAzsCAQMCAQEEggMxMIIDLTCCArOgAwIBAgIGAZBqsWxPMAoG",
    "CCqGSM49BAMCME8xIzAhBgNVBAMMGkFwcGxlIEFwcCBBdHRlc3RhdGlvbiBDQSAxMRMwEQYDVQQK",
    "DApBcHBsZSBJbmMuMRMwEQYDVQQIDApDYWxpZm9ybmlhMB4XDTI0MDYyOTE5NDg1MFoXDTI1MDEy",
    "NDA3Mjc1MFowgZExSTBHBgNVBAMMQDFiNzc5ZmY2OTFlZGY0ZGUwM2M1NDhlOGZlMTk2MmY2ZDU3",
    "OTgwNjBjYTY4M2RkNDdiYjJiYzcyYTc4ZGZlYmYxGjAYBgNVBAsMEUFBQSBDZXJ0aWZpY2F0aW9u",
    "MRMwEQYDVQQKDApBcHBsZSBJbmMuMRMwEQYDVQQIDApDYWxpZm9ybmlhMFkwEwYHKoZIzj0CAQYI",
    "KoZIzj0DAQcDQgAE1a4L/Uyf6QJoFEGANILVw0Vfb8N00Sb/AtaraRWeDzjCAR3Aci1LA2UhTyUE",
    "MTN50Zig9RCxH3dEV8yma4YV56OCATYwggEyMAwGA1UdEwEB/wQCMAAwDgYDVR0PAQH/BAQDAgTw",
    "MIGDBgkqhkiG92NkCAUEdjB0pAMCAQq/iTADAgEBv4kxAwIBAL+JMgMCAQG/iTMDAgEBv4k0JAQi",
    "NzYyVTVHNzIzNi5uZXR3b3JrLmdhbmRhbGYuY29ubmVjdKUGBARza3Mgv4k2AwIBBb+JNwMCAQC/",
    "iTkDAgEAv4k6AwIBAL+JOwMCAQAwVwYJKoZIhvdjZAgHBEowSL+KeAgEBjE3LjUuMb+IUAcCBQD/",
    "////v4p7BwQFMjFGOTC/in0IBAYxNy41LjG/in4DAgEAv4sMDwQNMjEuNi45MC4wLjAsMDAzBgkq",
    "hkiG92NkCAIEJjAkoSIEIBbK8+eXK+RbgVqC8N/wbQMVDV1cLhtfmK6h292uJ5d/MAoGCCqGSM49",
    "BAMCA2gAMGUCMDF4I2kb9VwqZdm+O8aEnA6nkfLsLCqRuYD7EFa+wJt61zcT8lmzf0B0rr+MVgES",
    "PAIxAL13cvI0L8l9UVWQoNmnFMN9abUjnntwgxFjHEpr9uIkREyqPek3TD2DTfOuHKVB6TAoAgEE",
    "AgEBBCBHxKY1WEfoCPE422InvhV7p1EScBHkMnbFOIPiq0iieDBgAgEFAgEBBFhXdDhMSmp4aFVF",
    "dnBzREhCOU5zQU9KUkpsTVBuc3BQMTBBcGdWNkwvcDBlRXJwZGRYL0t5bDYwdUpheTdtb2VYODZ0",
    "cTUEe2dLTjROOW9haGtCWjlhQ0VBPT0wDgIBBgIBAQQGQVRURVNUMBICAQcCAQEECnByb2R1Y3Rp",
    "b24wIAIBDAIBAQQYMjAyNC0wNi0zMFQxOTo0ODo1MC45MzRaMCACARUCAQEEGDIwMjQtMDktMjhU",
    "MTk6NDg6NTAuOTM0WgAAAAAAAKCAMIIDrjCCA1SgAwIBAgIQfgISYNjOd6typZ3waCe+/TAKBggq",
    "hkjOPQQDAjB8MTAwLgYDVQQDDCdBcHBsZSBBcHBsaWNhdGlvbiBJbnRlZ3JhdGlvbiBDQSA1IC0g",
    "RzExJjAkBgNVBAsMHUFwcGxlIENlcnRpZmljYXRpb24gQXV0aG9yaXR5MRMwEQYDVQQKDApBcHBs",
    "ZSBJbmMuMQswCQYDVQQGEwJVUzAeFw0yNDAyMjcxODM5NTJaFw0yNTAzMjgxODM5NTFaMFoxNjA0",
    "BgNVBAMMLUFwcGxpY2F0aW9uIEF0dGVzdGF0aW9uIEZyYXVkIFJlY2VpcHQgU2lnbmluZzETMBEG",
    "A1UECgwKQXBwbGUgSW5jLjELMAkGA1UEBhMCVVMwWTATBgcqhkjOPQIBBggqhkjOPQMBBwNCAARU",
    "N7iCxk/FE+l6UecSdFXhSxqQC5mL19QWh2k/C9iTyos16j1YI8lqda38TLd/kswpmZCT2cbcLRgA",
    "yQMg9HtEo4IB2DCCAdQwDAYDVR0TAQH/BAIwADAfBgNVHSMEGDAWgBTZF/5LZ5A4S5L0287VV4AU",
    "C489yTBDBggrBgEFBQcBAQQ3MDUwMwYIKwYBBQUHMAGGJ2h0dHA6Ly9vY3NwLmFwcGxlLmNvbS9v",
    "Y3NwMDMtYWFpY2E1ZzEwMTCCARwGA1UdIASCARMwggEPMIIBCwYJKoZIhvdjZAUBMIH9MIHDBggr",
    "BgEFBQcCAjCBtgyBs1JlbGlhbmNlIG9uIHRoaXMgY2VydGlmaWNhdGUgYnkgYW55IHBhcnR5IGFz",
    "c3VtZXMgYWNjZXB0YW5jZSBvZiB0aGUgdGhlbiBhcHBsaWNhYmxlIHN0YW5kYXJkIHRlcm1zIGFu",
    "ZCBjb25kaXRpb25zIG9mIHVzZSwgY2VydGlmaWNhdGUgcG9saWN5IGFuZCBjZXJ0aWZpY2F0aW9u",
    "IHByYWN0aWNlIHN0YXRlbWVudHMuMDUGCCsGAQUFBwIBFilodHRwOi8vd3d3LmFwcGxlLmNvbS9j",
    "ZXJ0aWZpY2F0ZWF1dGhvcml0eTAdBgNVHQ4EFgQUK89JHvvPG3kO8K8CKRO1ARbheTQwDgYDVR0P",
    "AQH/BAQDAgeAMA8GCSqGSIb3Y2QMDwQCBQAwCgYIKoZIzj0EAwIDSAAwRQIhAIeoCSt0X5hAxTqU",
    "IUEaXYuqCYDUhpLV1tKZmdB4x8q1AiA/ZVOMEyzPiDA0sEd16JdTz8/T90SDVbqXVlx9igaBHDCC",
    "AvkwggJ/oAMCAQICEFb7g9Qr/43DN5kjtVqubr0wCgYIKoZIzj0EAwMwZzEbMBkGA1UEAwwSQXBw",
    "bGUgUm9vdCBDQSAtIEczMSYwJAYDVQQLDB1BcHBsZSBDZXJ0aWZpY2F0aW9uIEF1dGhvcml0eTET",
    "MBEGA1UECgwKQXBwbGUgSW5jLjELMAkGA1UEBhMCVVMwHhcNMTkwMzIyMTc1MzMzWhcNMzQwMzIy",
    "MDAwMDAwWjB8MTAwLgYDVQQDDCdBcHBsZSBBcHBsaWNhdGlvbiBJbnRlZ3JhdGlvbiBDQSA1IC0g",
    "RzExJjAkBgNVBAsMHUFwcGxlIENlcnRpZmljYXRpb24gQXV0aG9yaXR5MRMwEQYDVQQKDApBcHBs",
    "ZSBJbmMuMQswCQYDVQQGEwJVUzBZMBMGByqGSM49AgEGCCqGSM49AwEHA0IABJLOY719hrGrKAo7",
    "HOGv+wSUgJGs9jHfpssoNW9ES+Eh5VfdEo2NuoJ8lb5J+r4zyq7NBBnxL0Ml+vS+s8uDfrqjgfcw",
    "gfQwDwYDVR0TAQH/BAUwAwEB/zAfBgNVHSMEGDAWgBS7sN6hWDOImqSKmd6+veuv2sskqzBGBggr",
    "BgEFBQcBAQQ6MDgwNgYIKwYBBQUHMAGGKmh0dHA6Ly9vY3NwLmFwcGxlLmNvbS9vY3NwMDMtYXBw",
    "bGVyb290Y2FnMzA3BgNVHR8EMDAuMCygKqAohiZodHRwOi8vY3JsLmFwcGxlLmNvbS9hcHBsZXJv",
    "b3RjYWczLmNybDAdBgNVHQ4EFgQU2Rf+S2eQOEuS9NvO1VeAFAuPPckwDgYDVR0PAQH/BAQDAgEG",
    "MBAGCiqGSIb3Y2QGAgMEAgUAMAoGCCqGSM49BAMDA2gAMGUCMQCNb6afoeDk7FtOc4qSfz14U5iP",
    "9NofWB7DdUr+OKhMKoMaGqoNpmRt4bmT6NFVTO0CMGc7LLTh6DcHd8vV7HaoGjpVOz81asjF5pKw",
    "4WG+gElp5F8rqWzhEQKqzGHZOLdzSjCCAkMwggHJoAMCAQICCC3F/IjSxUuVMAoGCCqGSM49BAMD",
    "MGcxGzAZBgNVBAMMEkFwcGxlIFJvb3QgQ0EgLSBHMzEmMCQGA1UECwwdQXBwbGUgQ2VydGlmaWNh",
    "dGlvbiBBdXRob3JpdHkxEzARBgNVBAoMCkFwcGxlIEluYy4xCzAJBgNVBAYTAlVTMB4XDTE0MDQz",
    "MDE4MTkwNloXDTM5MDQzMDE4MTkwNlowZzEbMBkGA1UEAwwSQXBwbGUgUm9vdCBDQSAtIEczMSYw",
    "JAYDVQQLDB1BcHBsZSBDZXJ0aWZpY2F0aW9uIEF1dGhvcml0eTETMBEGA1UECgwKQXBwbGUgSW5j",
    "LjELMAkGA1UEBhMCVVMwdjAQBgcqhkjOPQIBBgUrgQQAIgNiAASY6S89QHKk7ZMicoETHN0QlfHF",
    "o05x3BQW2Q7lpgUqd2R7X04407scRLV/9R+2MmJdyemEW08wTxFaAP1YWAyl9Q8sTQdHE3Xal5eX",
    "bzFc7SudeyA72LlU2V6ZpDpRCjGjQjBAMB0GA1UdDgQWBBS7sN6hWDOImqSKmd6+veuv2sskqzAP",
    "BgNVHRMBAf8EBTADAQH/MA4GA1UdDwEB/wQEAwIBBjAKBggqhkjOPQQDAwNoADBlAjEAg+nBxBZe",
    "Gl00GNnt7/RsDgBGS7jfskYRxQ/95nqMoaZrzsID1Jz1k8Z0uGrfqiMVAjBtZooQytQN1E/NjUM+",
    "tIpjpTNu423aF7dkH8hTJvmIYnQ5Cxdby1GoDOgYA+eisigAADGB/TCB+gIBATCBkDB8MTAwLgYD",
    "VQQDDCdBcHBsZSBBcHBsaWNhdGlvbiBJbnRlZ3JhdGlvbiBDQSA1IC0gRzExJjAkBgNVBAsMHUFw",
    "cGxlIENlcnRpZmljYXRpb24gQXV0aG9yaXR5MRMwEQYDVQQKDApBcHBsZSBJbmMuMQswCQYDVQQG",
    "EwJVUwIQfgISYNjOd6typZ3waCe+/TANBglghkgBZQMEAgEFADAKBggqhkjOPQQDAgRHMEUCIDzo",
    "dg4szIkkk6IxaqaR/NcsLQO3LtXn9DDBt/yoESUYAiEApRtfQvovTtktiicXHCiBke0Dzlyk14nu",
    "YQUnNNumVR0AAAAAAABoYXV0aERhdGFYpKRc2WwGuoniZEqtF+kolObjxcczFdDxbrhJR/nT8ehT",
    "QAAAAABhcHBhdHRlc3QAAAAAAAAAACAbd5/2ke303gPFSOj+GWL21XmAYMpoPdR7srxyp43+v6UB",
    "AgMmIAEhWCDVrgv9TJ/pAmgUQYA0gtXDRV9vw3TRJv8C1qtpFZ4POCJYIMIBHcByLUsDZSFPJQQx",
    "M3nRmKD1ELEfd0RXzKZrhhXn",
);

/// Assertion with counter 2, made with the key below
pub const REAL_ASSERTION_B64: &str = "omlzaWduYXR1cmVYRjBEAiAImFuY4+UbGZ5/ZbjAJpjQ3bd8GxaKFpMEo58WMEUGbwIgaqdDJnVS8/3oJCz16O5Zp4Qga5g6zrFF7eoiYEWkdtNxYXV0aGVudGljYXRvckRhdGFYJaRc2WwGuoniZEqtF+kolObjxcczFdDxbrhJR/nT8ehTQAAAAAI=";
pub const REAL_ASSERTION_PUBLIC_KEY_B64: &str =
    "BLROJkpk8NoHVHAnkLOKWUrc4MhyMkATpDyDwjEk82o+uf+KCQiDoHZdlcJ1ff5HPgK7Jd/pTA3cyKOq5MYM6Gs=";

// SEQUENCE { [1] { OCTET STRING (32) } }
const NONCE_EXTENSION_PREFIX: [u8; 6] = hex!("3024a1220420");

pub fn real_attestation() -> AttestationContainer {
    AttestationContainer::from_base64(REAL_ATTESTATION_B64).unwrap()
}

fn generate_ec(nid: Nid) -> PKey<Private> {
    let group = EcGroup::from_curve_name(nid).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn ca_constraints() -> X509Extension {
    BasicConstraints::new().critical().ca().build().unwrap()
}

#[allow(clippy::too_many_arguments)]
fn certificate<T: HasPublic>(
    cn: &str,
    serial: u32,
    subject_key: &PKeyRef<T>,
    issuer: Option<&X509Ref>,
    signing_key: &PKeyRef<Private>,
    digest: MessageDigest,
    extensions: Vec<X509Extension>,
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
    let name = name.build();

    let mut b = X509Builder::new().unwrap();
    b.set_version(2).unwrap();
    b.set_serial_number(&BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap())
        .unwrap();
    b.set_subject_name(&name).unwrap();
    match issuer {
        Some(i) => b.set_issuer_name(i.subject_name()).unwrap(),
        None => b.set_issuer_name(&name).unwrap(),
    }
    b.set_pubkey(subject_key).unwrap();
    b.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    b.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    for e in extensions {
        b.append_extension(e).unwrap();
    }
    b.sign(signing_key, digest).unwrap();

    b.build()
}

/// A P-384 root and intermediate, like Apple's, and a P-256 device key
pub struct Device {
    pub anchor: TrustAnchor,
    pub intermediate: X509,
    intermediate_key: PKey<Private>,
    key: PKey<Private>,
}

impl Device {
    pub fn new() -> Self {
        let root_key = generate_ec(Nid::SECP384R1);
        let root = certificate(
            "Test App Attestation Root CA",
            1,
            &root_key,
            None,
            &root_key,
            MessageDigest::sha384(),
            vec![ca_constraints()],
        );

        let intermediate_key = generate_ec(Nid::SECP384R1);
        let intermediate = certificate(
            "Test App Attestation CA 1",
            2,
            &intermediate_key,
            Some(&*root),
            &root_key,
            MessageDigest::sha384(),
            vec![ca_constraints()],
        );

        Self {
            anchor: TrustAnchor::from_der(&root.to_der().unwrap()).unwrap(),
            intermediate,
            intermediate_key,
            key: generate_ec(Nid::X9_62_PRIME256V1),
        }
    }

    pub fn public_key(&self) -> EcPublicKey {
        EcPublicKey::from_der(&self.key.public_key_to_der().unwrap()).unwrap()
    }

    pub fn attestation(&self) -> AttestationBuilder<'_> {
        AttestationBuilder {
            device: self,
            format: APP_ATTEST_FORMAT.to_string(),
            rp_id: RP_ID.to_string(),
            flags: FLAG_ATTESTED_CREDENTIAL_DATA,
            sign_count: 0,
            environment: Environment::Production,
            credential_id: None,
            raw_challenge: false,
            leaf_key: None,
            nonce_extension: true,
        }
    }

    /// Sign `payload` the way the device does: ECDSA over
    /// SHA-256(authData || SHA-256(payload))
    pub fn assertion(&self, counter: u32, payload: &[u8]) -> AssertionContainer {
        let mut auth_data = sha256(RP_ID.as_bytes()).to_vec();
        auth_data.push(FLAG_ATTESTED_CREDENTIAL_DATA);
        auth_data.extend_from_slice(&counter.to_be_bytes());

        let nonce = sha256_concat(&[&auth_data, &sha256(payload)]);

        let mut signer = Signer::new(MessageDigest::sha256(), &self.key).unwrap();
        signer.update(&nonce).unwrap();

        AssertionContainer::new(signer.sign_to_vec().unwrap(), auth_data)
    }
}

/// Attestation object factory; every field defaults to a valid value
pub struct AttestationBuilder<'a> {
    device: &'a Device,
    format: String,
    rp_id: String,
    flags: u8,
    sign_count: u32,
    environment: Environment,
    credential_id: Option<Vec<u8>>,
    raw_challenge: bool,
    leaf_key: Option<PKey<Private>>,
    nonce_extension: bool,
}

impl AttestationBuilder<'_> {
    pub fn format(mut self, v: &str) -> Self {
        self.format = v.to_string();
        self
    }

    pub fn rp_id(mut self, v: &str) -> Self {
        self.rp_id = v.to_string();
        self
    }

    pub fn flags(mut self, v: u8) -> Self {
        self.flags = v;
        self
    }

    pub fn sign_count(mut self, v: u32) -> Self {
        self.sign_count = v;
        self
    }

    pub fn environment(mut self, v: Environment) -> Self {
        self.environment = v;
        self
    }

    pub fn credential_id(mut self, v: Vec<u8>) -> Self {
        self.credential_id = Some(v);
        self
    }

    /// bind the nonce to the challenge itself rather than to its digest
    pub fn raw_challenge(mut self) -> Self {
        self.raw_challenge = true;
        self
    }

    /// certify this key instead of the device key
    pub fn leaf_key(mut self, v: PKey<Private>) -> Self {
        self.leaf_key = Some(v);
        self
    }

    pub fn without_nonce_extension(mut self) -> Self {
        self.nonce_extension = false;
        self
    }

    pub fn build(self) -> AttestationContainer {
        let device = self.device;
        let leaf_key = self.leaf_key.as_ref().unwrap_or(&device.key);

        let credential_id = self.credential_id.clone().unwrap_or_else(|| {
            EcPublicKey::from_der(&leaf_key.public_key_to_der().unwrap())
                .map(|k| k.key_id().to_vec())
                .unwrap_or_else(|_| vec![0u8; 32])
        });

        let mut auth_data = sha256(self.rp_id.as_bytes()).to_vec();
        auth_data.push(self.flags);
        auth_data.extend_from_slice(&self.sign_count.to_be_bytes());
        auth_data.extend_from_slice(self.environment.aaguid());
        auth_data.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
        auth_data.extend_from_slice(&credential_id);

        let nonce = if self.raw_challenge {
            sha256_concat(&[&auth_data, CHALLENGE])
        } else {
            sha256_concat(&[&auth_data, &sha256(CHALLENGE)])
        };

        let mut extensions = vec![];
        if self.nonce_extension {
            let value = [&NONCE_EXTENSION_PREFIX[..], &nonce[..]].concat();
            extensions.push(
                X509Extension::new_from_der(
                    &Asn1Object::from_str(NONCE_EXTENSION_OID).unwrap(),
                    false,
                    &Asn1OctetString::new_from_bytes(&value).unwrap(),
                )
                .unwrap(),
            );
        }

        let leaf = certificate(
            "device key",
            3,
            leaf_key,
            Some(&*device.intermediate),
            &device.intermediate_key,
            MessageDigest::sha256(),
            extensions,
        );

        AttestationContainer::new(
            &self.format,
            vec![
                leaf.to_der().unwrap(),
                device.intermediate.to_der().unwrap(),
            ],
            Some(b"receipt".to_vec()),
            auth_data,
        )
    }

    /// CBOR attestation object, as sent by the device
    pub fn encode(self) -> Vec<u8> {
        let c = self.build();

        let text = |s: &str| Value::Text(s.to_string());
        let mut att_stmt = vec![(
            text("x5c"),
            Value::Array(c.certificates.into_iter().map(Value::Bytes).collect()),
        )];
        if let Some(r) = c.receipt {
            att_stmt.push((text("receipt"), Value::Bytes(r)));
        }

        let v = Value::Map(vec![
            (text("fmt"), Value::Text(c.format)),
            (text("attStmt"), Value::Map(att_stmt)),
            (text("authData"), Value::Bytes(c.auth_data)),
        ]);

        let mut buf = Vec::new();
        into_writer(&v, &mut buf).unwrap();
        buf
    }
}
