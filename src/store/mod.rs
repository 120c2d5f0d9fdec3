// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Verification collaborators that outlive a single call: the pinned root
//! certificate and the per-key replay counters.

pub use self::errors::Error;
pub use self::icounterstore::ICounterStore;
pub use self::memo_counterstore::MemoCounterStore;
pub use self::trustanchor::TrustAnchor;
pub use self::trustanchor::APPLE_APP_ATTESTATION_ROOT_CA;

mod errors;
mod icounterstore;
mod memo_counterstore;
mod trustanchor;
