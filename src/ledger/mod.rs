use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::Path,
};

use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    config::ChaincodeConfig,
    shim::{ChaincodeStub, StateError},
};

pub type Key = String;
pub type TxId = String;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("transaction {tx_id} was already committed")]
    DuplicateTransaction { tx_id: TxId },
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot merkle root does not match its entries")]
    CorruptSnapshot,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SnapshotMetadata {
    pub height: u64,
    pub timestamp: u64,
    pub last_tx_id: Option<TxId>,
    /// Settings of the chaincode deployed on this ledger, once known.
    #[serde(default)]
    pub deployment: Option<ChaincodeConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    StateWritten {
        tx_id: TxId,
        key: Key,
        bytes: usize,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: SnapshotMetadata,
    #[serde(with = "serde_hex_map")]
    pub entries: BTreeMap<Key, Vec<u8>>,
    pub applied_txs: BTreeSet<TxId>,
    pub events: Vec<LedgerEvent>,
    #[serde(with = "serde_hash")]
    pub merkle_root: [u8; 32],
}

/// Keys and values staged by one transaction, ready for [`WorldState::commit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteSet {
    pub tx_id: TxId,
    pub writes: BTreeMap<Key, Vec<u8>>,
}

/// Committed key-value state hosting the chaincode.
///
/// Transactions run against a [`TxContext`] obtained from [`WorldState::begin`].
/// Reads through the context always see committed values; writes are staged
/// and only land here once the write set is committed.
#[derive(Default)]
pub struct WorldState {
    pub meta: SnapshotMetadata,
    entries: BTreeMap<Key, Vec<u8>>,
    events: Vec<LedgerEvent>,
    applied_txs: BTreeSet<TxId>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn begin(
        &self,
        tx_id: impl Into<TxId>,
        function: impl Into<String>,
        params: Vec<String>,
    ) -> TxContext<'_> {
        TxContext {
            state: self,
            tx_id: tx_id.into(),
            function: function.into(),
            params,
            writes: BTreeMap::new(),
        }
    }

    pub fn commit(&mut self, write_set: WriteSet, timestamp: u64) -> Result<(), LedgerError> {
        if self.applied_txs.contains(&write_set.tx_id) {
            return Err(LedgerError::DuplicateTransaction {
                tx_id: write_set.tx_id,
            });
        }

        let WriteSet { tx_id, writes } = write_set;
        for (key, value) in writes {
            debug!("commit {tx_id}: {key} ({} bytes)", value.len());
            self.events.push(LedgerEvent::StateWritten {
                tx_id: tx_id.clone(),
                key: key.clone(),
                bytes: value.len(),
            });
            self.entries.insert(key, value);
        }

        self.meta.height += 1;
        self.meta.timestamp = timestamp;
        self.meta.last_tx_id = Some(tx_id.clone());
        self.applied_txs.insert(tx_id);
        Ok(())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: self.meta.clone(),
            entries: self.entries.clone(),
            applied_txs: self.applied_txs.clone(),
            events: self.events.clone(),
            merkle_root: compute_merkle_root(&self.entries),
        }
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        if compute_merkle_root(&snapshot.entries) != snapshot.merkle_root {
            return Err(LedgerError::CorruptSnapshot);
        }
        Ok(Self {
            meta: snapshot.meta,
            entries: snapshot.entries,
            events: snapshot.events,
            applied_txs: snapshot.applied_txs,
        })
    }

    /// Load a state file written by [`WorldState::save`]. A missing file is
    /// an empty ledger.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        if !path.exists() {
            debug!("no state file at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let bytes = fs::read(path)?;
        let snapshot: LedgerSnapshot = serde_json::from_slice(&bytes)?;
        Self::from_snapshot(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec_pretty(&self.snapshot())?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

/// A single transaction's view of the [`WorldState`].
pub struct TxContext<'a> {
    state: &'a WorldState,
    tx_id: TxId,
    function: String,
    params: Vec<String>,
    writes: BTreeMap<Key, Vec<u8>>,
}

impl TxContext<'_> {
    pub fn writes(&self) -> &BTreeMap<Key, Vec<u8>> {
        &self.writes
    }

    pub fn into_write_set(self) -> WriteSet {
        WriteSet {
            tx_id: self.tx_id,
            writes: self.writes,
        }
    }
}

impl ChaincodeStub for TxContext<'_> {
    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn function_and_parameters(&self) -> (String, Vec<String>) {
        (self.function.clone(), self.params.clone())
    }

    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        if key.is_empty() {
            return Err(StateError::EmptyKey);
        }
        Ok(self.state.get(key).map(<[u8]>::to_vec))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), StateError> {
        if key.is_empty() {
            return Err(StateError::EmptyKey);
        }
        self.writes.insert(key.to_string(), value);
        Ok(())
    }
}

fn compute_merkle_root(entries: &BTreeMap<Key, Vec<u8>>) -> [u8; 32] {
    let leaves = entries
        .iter()
        .map(|(key, value)| {
            let mut hasher = Sha256::new();
            hasher.update(b"kv");
            hasher.update((key.len() as u64).to_le_bytes());
            hasher.update(key.as_bytes());
            hasher.update(value);
            hasher.finalize().into()
        })
        .collect();
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"instaid-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

mod serde_hash {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("merkle root must be 32 bytes"))
    }
}

mod serde_hex_map {
    use std::collections::BTreeMap;

    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &BTreeMap<String, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded: BTreeMap<&str, String> = value
            .iter()
            .map(|(key, bytes)| (key.as_str(), hex::encode(bytes)))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(key, hex_value)| {
                hex::decode(&hex_value)
                    .map(|bytes| (key, bytes))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}
