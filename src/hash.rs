use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 32-byte content identifier, rendered as 64 lowercase hex characters.
///
/// Hashes are opaque names: equality is bytewise and nothing in this crate
/// ever inspects the bytes beyond the directory-sharding prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

/// The all-zero hash marks an empty bucket slot in a manifest.
impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Hash::ZERO
    }

    /// The first three bytes, which determine the artifact's directory shard.
    pub fn prefix_bytes(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid hash '{input}': expected 64 hex characters")]
pub struct HashParseError {
    input: String,
}

impl FromStr for Hash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| HashParseError { input: s.into() })?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| HashParseError { input: s.into() })?;
        Ok(Hash(bytes))
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "e113f8cc5468579cb57538e3204c8d3ecce59a0cdb47f6fa7e87ab4d9d8146fd";

    #[test]
    fn hex_round_trip() {
        let hash: Hash = SAMPLE.parse().expect("valid hash");
        assert_eq!(hash.to_string(), SAMPLE);
        assert_eq!(hash.prefix_bytes(), [0xe1, 0x13, 0xf8]);
    }

    #[test]
    fn rejects_bad_input() {
        assert!("".parse::<Hash>().is_err());
        assert!("e113f8".parse::<Hash>().is_err());
        assert!(format!("{SAMPLE}00").parse::<Hash>().is_err());
        assert!(SAMPLE.replace('e', "x").parse::<Hash>().is_err());
    }

    #[test]
    fn serde_as_hex_string() {
        let hash: Hash = SAMPLE.parse().expect("valid hash");
        let json = serde_json::to_string(&hash).expect("serialize");
        assert_eq!(json, format!("\"{SAMPLE}\""));
        let back: Hash = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, hash);
    }

    #[test]
    fn zero_hash_sentinel() {
        assert!(Hash::ZERO.is_zero());
        let zero: Hash = "0".repeat(64).parse().expect("zero hash");
        assert!(zero.is_zero());
        assert!(!SAMPLE.parse::<Hash>().expect("valid hash").is_zero());
    }
}
