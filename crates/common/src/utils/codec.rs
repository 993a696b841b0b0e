use num_bigint::BigUint;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

use crate::error::CommonError;

/// Parse a base-10 unsigned amount of arbitrary size.
pub fn parse_amount(s: &str) -> Result<BigUint, CommonError> {
    let trimmed = s.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommonError::InvalidAmount(format!(
            "'{}' is not a non-negative decimal integer",
            s
        )));
    }
    trimmed
        .parse::<BigUint>()
        .map_err(|e| CommonError::InvalidAmount(format!("{}: {}", s, e)))
}

/// `10^exp` as an unbounded integer.
pub fn pow10(exp: u32) -> BigUint {
    num_traits::pow(BigUint::from(10u32), exp as usize)
}

/// Serde adapter that writes `BigUint` values as decimal strings.
///
/// JSON numbers cannot carry the full range, so strings are emitted;
/// plain integers are still accepted on input.
pub mod decimal {
    use super::*;

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DecimalVisitor)
    }

    struct DecimalVisitor;

    impl<'de> Visitor<'de> for DecimalVisitor {
        type Value = BigUint;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative decimal integer string or integer")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<BigUint, E> {
            parse_amount(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigUint, E> {
            Ok(BigUint::from(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigUint, E> {
            u64::try_from(v)
                .map(BigUint::from)
                .map_err(|_| E::custom("amount must not be negative"))
        }
    }
}
