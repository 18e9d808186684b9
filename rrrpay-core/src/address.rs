//! 32-byte ledger keys in their base58 text form

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Length of a ledger public key in bytes
pub const ADDRESS_LEN: usize = 32;

/// A ledger public key: wallet, token mint or reference tag
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LedgerAddress([u8; ADDRESS_LEN]);

impl LedgerAddress {
    /// Wrap raw key bytes
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Base58 text form
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Parse a base58 key of exactly 32 bytes
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidAddress("empty address".to_string()));
        }

        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", trimmed, e)))?;

        if bytes.len() != ADDRESS_LEN {
            return Err(Error::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_LEN,
                bytes.len()
            )));
        }

        let mut key = [0u8; ADDRESS_LEN];
        key.copy_from_slice(&bytes);
        Ok(Self(key))
    }
}

impl FromStr for LedgerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerAddress({})", self.to_base58())
    }
}

impl Serialize for LedgerAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for LedgerAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    #[test]
    fn test_parse_known_mint() {
        let mint = LedgerAddress::parse(USDC_MINT).unwrap();
        assert_eq!(mint.to_base58(), USDC_MINT);
        assert_eq!(mint.to_string(), USDC_MINT);
    }

    #[test]
    fn test_system_program_is_all_zero() {
        let zero = LedgerAddress::parse("11111111111111111111111111111111").unwrap();
        assert_eq!(zero.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(LedgerAddress::parse("").is_err());
        assert!(LedgerAddress::parse("not-base58-0OIl").is_err());
        // 31 bytes
        assert!(LedgerAddress::parse(&bs58::encode([7u8; 31]).into_string()).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let mint = LedgerAddress::parse(USDC_MINT).unwrap();
        let json = serde_json::to_string(&mint).unwrap();
        assert_eq!(json, format!("\"{}\"", USDC_MINT));
        let back: LedgerAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mint);
    }
}
