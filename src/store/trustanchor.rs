// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use openssl::nid::Nid;
use openssl::x509::{X509Ref, X509};
use std::fmt;

/// Apple App Attestation Root CA, as published at
/// https://www.apple.com/certificateauthority/Apple_App_Attestation_Root_CA.pem
pub const APPLE_APP_ATTESTATION_ROOT_CA: &str = "-----BEGIN CERTIFICATE-----
MIICITCCAaegAwIBAgIQC/O+DvHN0uD7jG5yH2IXmDAKBggqhkjOPQQDAzBSMSYw
JAYDVQQDDB1BcHBsZSBBcHAgQXR0ZXN0YXRpb24gUm9vdCBDQTETMBEGA1UECgwK
QXBwbGUgSW5jLjETMBEGA1UECAwKQ2FsaWZvcm5pYTAeFw0yMDAzMTgxODMyNTNa
Fw00NTAzMTUwMDAwMDBaMFIxJjAkBgNVBAMMHUFwcGxlIEFwcCBBdHRlc3RhdGlv
biBSb290IENBMRMwEQYDVQQKDApBcHBsZSBJbmMuMRMwEQYDVQQIDApDYWxpZm9y
bmlhMHYwEAYHKoZIzj0CAQYFK4EEACIDYgAERTHhmLW07ATaFQIEVwTtT4dyctdh
NbJhFs/Ii2FdCgAHGbpphY3+d8qjuDngIN3WVhQUBHAoMeQ/cLiP1sOUtgjqK9au
Yen1mMEvRq9Sk3Jm5X8U62H+xTD3FE9TgS41o0IwQDAPBgNVHRMBAf8EBTADAQH/
MB0GA1UdDgQWBBSskRBTM72+aEH/pwyp5frq5eWKoTAOBgNVHQ8BAf8EBAMCAQYw
CgYIKoZIzj0EAwMDaAAwZQIwQgFGnByvsiVbpTKwSga0kP0e8EeDS4+sQmTvb7vn
53O5+FRXgeLhpJ06ysC5PrOyAjEAp5U4xDgEgllF7En3VcE3iexZZtKeYnpqtijV
oyFraWVIyd/dganmrduC1bmTBGwD
-----END CERTIFICATE-----
";

/// The pinned root of trust for attestation certificate chains.  Build it
/// once at start-up and hand a reference to every verification call.
#[derive(Clone)]
pub struct TrustAnchor {
    cert: X509,
}

impl TrustAnchor {
    /// The Apple App Attestation Root CA
    pub fn apple_app_attest() -> Result<Self, Error> {
        Self::from_pem(APPLE_APP_ATTESTATION_ROOT_CA.as_bytes())
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
        let cert = X509::from_pem(pem).map_err(|e| Error::Syntax(e.to_string()))?;

        Ok(Self { cert })
    }

    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let cert = X509::from_der(der).map_err(|e| Error::Syntax(e.to_string()))?;

        Ok(Self { cert })
    }

    pub fn certificate(&self) -> &X509Ref {
        &self.cert
    }

    /// Subject common name, for diagnostics
    pub fn common_name(&self) -> Option<String> {
        self.cert
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|e| e.data().as_utf8().ok())
            .map(|s| s.to_string())
    }
}

impl fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustAnchor")
            .field("subject", &self.common_name())
            .finish()
    }
}
