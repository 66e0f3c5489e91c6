//! Compressed, integrity-checked broker checkpoints.
//!
//! Snapshots are bincode-serialized, zstd-compressed, and hashed with
//! blake3 so a corrupted checkpoint fails loudly on restore instead of
//! silently resuming from bad state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Full broker state at a point in canonical time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BrokerSnapshot {
    /// Canonical time of the snapshot.
    pub time: f64,
    /// Opaque per-adapter state, keyed by adapter name.
    pub adapters: BTreeMap<String, Vec<u8>>,
}

/// A single stored checkpoint.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    /// Canonical time at which the snapshot was taken.
    pub time: f64,
    data: Vec<u8>,
    hash: [u8; 32],
}

impl Checkpoint {
    /// Serialize, compress, and hash a snapshot.
    pub(crate) fn create(snapshot: &BrokerSnapshot, level: i32) -> SimResult<Self> {
        let serialized = bincode::serialize(snapshot)
            .map_err(|e| SimError::serialization(format!("checkpoint encode: {e}")))?;
        let data = zstd::encode_all(&serialized[..], level)?;
        let hash = *blake3::hash(&data).as_bytes();
        Ok(Self {
            time: snapshot.time,
            data,
            hash,
        })
    }

    /// Verify integrity and decode the snapshot.
    pub(crate) fn restore(&self) -> SimResult<BrokerSnapshot> {
        let actual = *blake3::hash(&self.data).as_bytes();
        if actual != self.hash {
            return Err(SimError::CheckpointIntegrity);
        }
        let serialized = zstd::decode_all(&self.data[..])?;
        bincode::deserialize(&serialized)
            .map_err(|e| SimError::serialization(format!("checkpoint decode: {e}")))
    }

    /// Compressed payload size in bytes.
    #[must_use]
    pub fn compressed_size(&self) -> usize {
        self.data.len()
    }
}
