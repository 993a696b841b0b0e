use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CommonError;

pub const ADDRESS_LENGTH: usize = 20;

/// Opaque account identity. Only equality is meaningful.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// The reserved null identity, used as the symbolic source of minted units.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CommonError> {
        if bytes.len() != ADDRESS_LENGTH {
            return Err(CommonError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_LENGTH,
                bytes.len()
            )));
        }
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(bytes);
        Ok(Address(arr))
    }

    /// Address whose last byte is `n`. Handy for fixtures.
    pub fn from_low_u64(n: u64) -> Self {
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr[ADDRESS_LENGTH - 8..].copy_from_slice(&n.to_be_bytes());
        Address(arr)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(hex_part)
            .map_err(|e| CommonError::InvalidAddress(format!("{}: {}", s, e)))?;
        Address::from_slice(&bytes)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
