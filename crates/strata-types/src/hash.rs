use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::object::ObjectType;

/// Content-addressed identifier for a stored ledger object.
///
/// An `ObjectHash` is the BLAKE3 hash of an object's payload, domain-separated
/// by the object's type tag. Two objects with the same hash are assumed
/// bit-identical; the hash is the object's globally unique identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHash([u8; 32]);

impl ObjectHash {
    /// Compute the content hash for a payload of the given type.
    ///
    /// The type tag is folded into the hash so that identical bytes stored
    /// under different object types never collide.
    pub fn compute(object_type: ObjectType, payload: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(object_type.domain().as_bytes());
        hasher.update(b":");
        hasher.update(payload);
        Self(*hasher.finalize().as_bytes())
    }

    /// Wrap a pre-computed 32-byte hash.
    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The null hash (all zeros). Represents "no object".
    pub const fn null() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if this is the null hash.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters), for log lines.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", self.short_hex())
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for ObjectHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<ObjectHash> for [u8; 32] {
    fn from(hash: ObjectHash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic() {
        let payload = b"ledger header bytes";
        let h1 = ObjectHash::compute(ObjectType::Ledger, payload);
        let h2 = ObjectHash::compute(ObjectType::Ledger, payload);
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_payloads_produce_different_hashes() {
        let h1 = ObjectHash::compute(ObjectType::Ledger, b"alpha");
        let h2 = ObjectHash::compute(ObjectType::Ledger, b"beta");
        assert_ne!(h1, h2);
    }

    #[test]
    fn type_tag_separates_identical_payloads() {
        let payload = b"same bytes";
        let ledger = ObjectHash::compute(ObjectType::Ledger, payload);
        let account = ObjectHash::compute(ObjectType::AccountNode, payload);
        let tx = ObjectHash::compute(ObjectType::TransactionNode, payload);
        assert_ne!(ledger, account);
        assert_ne!(ledger, tx);
        assert_ne!(account, tx);
    }

    #[test]
    fn null_is_all_zeros() {
        let null = ObjectHash::null();
        assert!(null.is_null());
        assert_eq!(null.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn computed_hash_is_not_null() {
        let h = ObjectHash::compute(ObjectType::AccountNode, b"");
        assert!(!h.is_null());
    }

    #[test]
    fn hex_roundtrip() {
        let h = ObjectHash::compute(ObjectType::TransactionNode, b"tx");
        let parsed = ObjectHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn from_hex_rejects_bad_length() {
        let err = ObjectHash::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn from_hex_rejects_non_hex() {
        let err = ObjectHash::from_hex("zz").unwrap_err();
        assert!(matches!(err, TypeError::InvalidHex(_)));
    }

    #[test]
    fn short_hex_is_8_chars() {
        let h = ObjectHash::compute(ObjectType::Ledger, b"short");
        assert_eq!(h.short_hex().len(), 8);
    }

    #[test]
    fn display_is_full_hex() {
        let h = ObjectHash::compute(ObjectType::Ledger, b"display");
        let display = format!("{h}");
        assert_eq!(display.len(), 64);
        assert_eq!(display, h.to_hex());
    }

    #[test]
    fn serde_roundtrip() {
        let h = ObjectHash::compute(ObjectType::AccountNode, b"serde");
        let json = serde_json::to_string(&h).unwrap();
        let parsed: ObjectHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn ordering_is_consistent() {
        let h1 = ObjectHash::from_hash([0; 32]);
        let h2 = ObjectHash::from_hash([1; 32]);
        assert!(h1 < h2);
    }
}
