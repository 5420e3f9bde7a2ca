use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::StoreError;

/// Length in bytes of a SHA-256 digest.
pub const OBJECT_ID_LENGTH: usize = 32;

/// Length of the hex string form of an object id.
pub const OBJECT_ID_STRING_LENGTH: usize = OBJECT_ID_LENGTH * 2;

/// The SHA-256 content identifier of a large object.
///
/// The id is both the name of an object and the promise about its content: an upload
/// addressed to an id is only accepted when the received bytes hash to that id.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LongObjectId([u8; OBJECT_ID_LENGTH]);

impl LongObjectId {
    pub const fn from_bytes(bytes: [u8; OBJECT_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_LENGTH] {
        &self.0
    }

    /// Computes the id of an in-memory blob.
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Parses a 64 character hex string, upper or lower case.
    pub fn from_hex(s: &str) -> Result<Self, StoreError> {
        if s.len() != OBJECT_ID_STRING_LENGTH {
            return Err(StoreError::invalid_object_id(format!(
                "expected {OBJECT_ID_STRING_LENGTH} hex chars, got {}",
                s.len()
            )));
        }

        let mut bytes = [0u8; OBJECT_ID_LENGTH];
        hex::decode_to_slice(s, &mut bytes).map_err(StoreError::invalid_object_id)?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<Sha256> for LongObjectId {
    fn from(hasher: Sha256) -> Self {
        Self(hasher.finalize().into())
    }
}

impl FromStr for LongObjectId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for LongObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for LongObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LongObjectId({})", self.to_hex())
    }
}

impl Serialize for LongObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for LongObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
