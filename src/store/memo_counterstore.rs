// Copyright 2023-2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::ICounterStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

#[serde_with::serde_as]
#[derive(Debug, Serialize, Deserialize)]
struct CounterRecord {
    #[serde(rename = "key-id")]
    #[serde_as(as = "serde_with::hex::Hex")]
    key_id: Vec<u8>,
    counter: u32,
}

/// In-memory counter store.  Counters are indexed by key id.
#[derive(Debug, Default)]
pub struct MemoCounterStore {
    p: RwLock<HashMap<Vec<u8>, u32>>,
}

impl MemoCounterStore {
    /// Returns a new empty MemoCounterStore
    pub fn new() -> Self {
        Self {
            p: Default::default(),
        }
    }

    /// Register a freshly attested key id with counter 0.  Returns false (and
    /// leaves the stored counter alone) if the key id is already known.
    pub fn enroll(&self, key_id: &[u8]) -> bool {
        let mut p = self.write();

        if p.contains_key(key_id) {
            return false;
        }

        p.insert(key_id.to_vec(), 0);
        true
    }

    /// Add to an existing (and possibly empty) MemoCounterStore the counters
    /// loaded from the given JSON document
    pub fn load_json(&mut self, j: &str) -> Result<(), Error> {
        let records: Vec<CounterRecord> =
            serde_json::from_str(j).map_err(|e| Error::Syntax(e.to_string()))?;

        let mut p = self.write();
        for r in records {
            p.insert(r.key_id, r.counter);
        }

        Ok(())
    }

    /// Serialise the store to the same JSON layout accepted by `load_json`
    pub fn to_json(&self) -> Result<String, Error> {
        let mut records: Vec<CounterRecord> = self
            .read_lock()
            .iter()
            .map(|(k, v)| CounterRecord {
                key_id: k.clone(),
                counter: *v,
            })
            .collect();
        records.sort_by(|a, b| a.key_id.cmp(&b.key_id));

        serde_json::to_string_pretty(&records).map_err(|e| Error::Syntax(e.to_string()))
    }

    // the map holds no cross-entry invariant, so a poisoned lock is still usable
    fn read_lock(&self) -> RwLockReadGuard<'_, HashMap<Vec<u8>, u32>> {
        self.p.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Vec<u8>, u32>> {
        self.p.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ICounterStore for MemoCounterStore {
    fn read(&self, key_id: &[u8]) -> Result<u32, Error> {
        self.read_lock()
            .get(key_id)
            .copied()
            .ok_or_else(|| Error::UnknownKey(hex::encode(key_id)))
    }

    fn conditional_write(&self, key_id: &[u8], expected_old: u32, new: u32) -> Result<(), Error> {
        let mut p = self.write();

        let Some(current) = p.get_mut(key_id) else {
            return Err(Error::UnknownKey(hex::encode(key_id)));
        };

        if *current != expected_old {
            warn!(
                key_id = %hex::encode(key_id),
                expected = expected_old,
                found = *current,
                "counter changed under a concurrent update"
            );
            return Err(Error::Conflict {
                expected: expected_old,
                found: *current,
            });
        }

        *current = new;

        Ok(())
    }
}
