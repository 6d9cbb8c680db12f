//! Core chain primitives

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 20-byte account address, derived from the owner's public key
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address, returned where no valid address exists
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Parse an address from its base58 string form
    pub fn from_base58(s: &str) -> anyhow::Result<Self> {
        let bytes = bs58::decode(s).into_vec()?;
        let arr: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("address must decode to 20 bytes"))?;
        Ok(Self(arr))
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// A 32-byte content hash
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash arbitrary bytes with blake3
    pub fn digest(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

/// Block header
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Header {
    /// Block height
    pub number: u64,
    /// Hash of the parent block's header
    pub parent_hash: Hash,
    /// Unix timestamp (seconds)
    pub timestamp: u64,
}

impl Header {
    /// Compute the header hash
    pub fn hash(&self) -> Hash {
        let bytes = borsh::to_vec(self).expect("header serialization should not fail");
        Hash::digest(&bytes)
    }
}

/// A full block: header plus raw transaction payloads
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Vec<u8>>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Vec<u8>>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// The genesis block at height 0
    pub fn genesis() -> Self {
        Self {
            header: Header {
                number: 0,
                parent_hash: Hash::ZERO,
                timestamp: 0,
            },
            transactions: Vec::new(),
        }
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Block identity is the header hash
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// A copy of this block without its transaction bodies
    pub fn without_body(&self) -> Self {
        Self {
            header: self.header.clone(),
            transactions: Vec::new(),
        }
    }
}
