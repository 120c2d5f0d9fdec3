// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;

/// Interface to the store where the per-credential assertion counters are
/// persisted.  Implementations must make `conditional_write` atomic with
/// respect to concurrent callers on the same key id.
pub trait ICounterStore {
    /// Return the last accepted counter for the given key id
    fn read(&self, key_id: &[u8]) -> Result<u32, Error>;

    /// Set the counter for the given key id to `new`, provided it still holds
    /// `expected_old`.  Fails with [`Error::Conflict`] otherwise.
    fn conditional_write(&self, key_id: &[u8], expected_old: u32, new: u32) -> Result<(), Error>;
}
