//! The history archive state manifest.
//!
//! Each checkpoint publishes a manifest naming the buckets live at that
//! point; the root manifest additionally delimits the archive's valid
//! range. The wire form is indented JSON with stable field order, but
//! readers accept any equivalent encoding and ignore unknown fields.

use crate::hash::Hash;
use crate::range::{prev_checkpoint, CheckpointRange, CHECKPOINT_FREQUENCY};
use serde::{Deserialize, Serialize};

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryArchiveState {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    #[serde(rename = "currentLedger")]
    pub current_ledger: u32,

    #[serde(rename = "currentBuckets")]
    pub current_buckets: Vec<Hash>,
}

impl HistoryArchiveState {
    pub fn new(current_ledger: u32, current_buckets: Vec<Hash>) -> Self {
        HistoryArchiveState {
            version: default_version(),
            server: None,
            current_ledger,
            current_buckets,
        }
    }

    /// The buckets this manifest references. Empty slots carry the all-zero
    /// hash and name nothing.
    pub fn buckets(&self) -> Vec<Hash> {
        self.current_buckets
            .iter()
            .copied()
            .filter(|hash| !hash.is_zero())
            .collect()
    }

    /// The checkpoint range this manifest vouches for: everything from the
    /// first checkpoint up to the one at or below `currentLedger`.
    pub fn range(&self) -> CheckpointRange {
        let low = CHECKPOINT_FREQUENCY - 1;
        let high = prev_checkpoint(self.current_ledger);
        if high < low {
            CheckpointRange::empty()
        } else {
            CheckpointRange::covering(low, high)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> Hash {
        Hash::from_bytes([byte; 32])
    }

    #[test]
    fn encode_decode_idempotent() {
        let has = HistoryArchiveState::new(0x7f, vec![hash(1), hash(2)]);
        let encoded = serde_json::to_vec_pretty(&has).expect("encode");
        let decoded: HistoryArchiveState = serde_json::from_slice(&encoded).expect("decode");
        assert_eq!(decoded, has);
        let re_encoded = serde_json::to_vec_pretty(&decoded).expect("re-encode");
        assert_eq!(re_encoded, encoded);
    }

    #[test]
    fn tolerates_unknown_and_missing_fields() {
        let doc = r#"{
            "currentLedger": 127,
            "currentBuckets": [],
            "networkPassphrase": "test",
            "futureField": {"nested": true}
        }"#;
        let has: HistoryArchiveState = serde_json::from_str(doc).expect("decode");
        assert_eq!(has.version, 1);
        assert_eq!(has.server, None);
        assert_eq!(has.current_ledger, 127);
    }

    #[test]
    fn buckets_skip_zero_slots() {
        let has = HistoryArchiveState::new(63, vec![hash(1), Hash::ZERO, hash(2), Hash::ZERO]);
        assert_eq!(has.buckets(), vec![hash(1), hash(2)]);
    }

    #[test]
    fn range_covers_up_to_current_ledger() {
        assert_eq!(
            HistoryArchiveState::new(0x7f, vec![]).range(),
            CheckpointRange::covering(63, 127)
        );
        // A mid-span ledger vouches only for the checkpoint below it.
        assert_eq!(
            HistoryArchiveState::new(0x80, vec![]).range(),
            CheckpointRange::covering(63, 127)
        );
    }

    #[test]
    fn range_is_empty_before_first_checkpoint() {
        assert!(HistoryArchiveState::new(0, vec![]).range().is_empty());
        assert!(HistoryArchiveState::new(62, vec![]).range().is_empty());
        assert!(!HistoryArchiveState::new(63, vec![]).range().is_empty());
    }
}
