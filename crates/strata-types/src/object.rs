use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::ObjectHash;

/// The kind of ledger data an object holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    /// Data whose type was not recorded (imports from older stores).
    Unknown,
    /// A ledger header.
    Ledger,
    /// A node in the account-state tree.
    AccountNode,
    /// A node in the transaction tree.
    TransactionNode,
}

impl ObjectType {
    /// Domain tag folded into the content hash for this type.
    pub const fn domain(&self) -> &'static str {
        match self {
            Self::Unknown => "strata-unknown-v1",
            Self::Ledger => "strata-ledger-v1",
            Self::AccountNode => "strata-account-node-v1",
            Self::TransactionNode => "strata-transaction-node-v1",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Ledger => write!(f, "ledger"),
            Self::AccountNode => write!(f, "account-node"),
            Self::TransactionNode => write!(f, "transaction-node"),
        }
    }
}

/// An immutable ledger object: type tag + content hash + payload.
///
/// `NodeObject` is the unit of storage. Once constructed it is never mutated;
/// re-storing the same hash is a no-op and removal happens only through
/// backend-level compaction. The store never interprets the payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeObject {
    /// What kind of ledger data this object holds.
    object_type: ObjectType,
    /// Content hash identifying this object.
    hash: ObjectHash,
    /// The opaque payload bytes.
    data: Vec<u8>,
}

impl NodeObject {
    /// Construct an object from a hash computed by the caller.
    ///
    /// Rejects the null hash: it is the "no object" sentinel and must never
    /// identify real data.
    pub fn new(object_type: ObjectType, data: Vec<u8>, hash: ObjectHash) -> Result<Self, TypeError> {
        if hash.is_null() {
            return Err(TypeError::NullHash);
        }
        Ok(Self {
            object_type,
            hash,
            data,
        })
    }

    /// Construct an object, computing its content hash from type and payload.
    pub fn from_payload(object_type: ObjectType, data: Vec<u8>) -> Self {
        let hash = ObjectHash::compute(object_type, &data);
        Self {
            object_type,
            hash,
            data,
        }
    }

    /// The object's type tag.
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// The object's content hash.
    pub fn hash(&self) -> &ObjectHash {
        &self.hash
    }

    /// The payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Recompute the hash from type and payload and compare to the stored one.
    pub fn verify(&self) -> bool {
        ObjectHash::compute(self.object_type, &self.data) == self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_payload_computes_matching_hash() {
        let obj = NodeObject::from_payload(ObjectType::Ledger, b"header".to_vec());
        assert_eq!(*obj.hash(), ObjectHash::compute(ObjectType::Ledger, b"header"));
        assert!(obj.verify());
    }

    #[test]
    fn new_accepts_external_hash() {
        let hash = ObjectHash::compute(ObjectType::AccountNode, b"state");
        let obj = NodeObject::new(ObjectType::AccountNode, b"state".to_vec(), hash).unwrap();
        assert_eq!(obj.hash(), &hash);
        assert_eq!(obj.data(), b"state");
    }

    #[test]
    fn new_rejects_null_hash() {
        let err = NodeObject::new(ObjectType::Ledger, b"data".to_vec(), ObjectHash::null())
            .unwrap_err();
        assert_eq!(err, TypeError::NullHash);
    }

    #[test]
    fn verify_detects_mismatched_hash() {
        let wrong = ObjectHash::compute(ObjectType::Ledger, b"other");
        let obj = NodeObject::new(ObjectType::Ledger, b"data".to_vec(), wrong).unwrap();
        assert!(!obj.verify());
    }

    #[test]
    fn size_matches_payload() {
        let obj = NodeObject::from_payload(ObjectType::TransactionNode, vec![0u8; 40]);
        assert_eq!(obj.size(), 40);
    }

    #[test]
    fn serde_roundtrip() {
        let obj = NodeObject::from_payload(ObjectType::AccountNode, b"roundtrip".to_vec());
        let json = serde_json::to_string(&obj).unwrap();
        let parsed: NodeObject = serde_json::from_str(&json).unwrap();
        assert_eq!(obj, parsed);
    }

    #[test]
    fn object_type_display() {
        assert_eq!(format!("{}", ObjectType::Unknown), "unknown");
        assert_eq!(format!("{}", ObjectType::Ledger), "ledger");
        assert_eq!(format!("{}", ObjectType::AccountNode), "account-node");
        assert_eq!(format!("{}", ObjectType::TransactionNode), "transaction-node");
    }
}
