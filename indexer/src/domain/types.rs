//! Value types shared by every record

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Block height, the primary indexing axis
pub type Height = i64;

/// Era ordinal
pub type Era = i64;

/// Session ordinal
pub type Session = i64;

/// Opaque JSON payload carried by events and system events
pub type Payload = serde_json::Value;

/// Arbitrary-precision quantity (balances, stakes, reward amounts)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Quantity(BigInt);

impl Quantity {
    pub fn new(value: BigInt) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    /// A quantity is valid unless it is negative
    pub fn valid(&self) -> bool {
        self.0.sign() != Sign::Minus
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    /// Lossy conversion used for ratios and percentages
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::MAX)
    }

    /// Integer division, `None` on a zero divisor
    pub fn div_floor(&self, divisor: u64) -> Option<Quantity> {
        if divisor == 0 {
            return None;
        }
        Some(Self(&self.0 / BigInt::from(divisor)))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Quantity {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigInt::from_str(s.trim()).map(Self)
    }
}

impl From<i64> for Quantity {
    fn from(value: i64) -> Self {
        Self(BigInt::from(value))
    }
}

impl From<u64> for Quantity {
    fn from(value: u64) -> Self {
        Self(BigInt::from(value))
    }
}

impl Add for &Quantity {
    type Output = Quantity;

    fn add(self, rhs: &Quantity) -> Quantity {
        Quantity(&self.0 + &rhs.0)
    }
}

impl Sub for &Quantity {
    type Output = Quantity;

    fn sub(self, rhs: &Quantity) -> Quantity {
        Quantity(&self.0 - &rhs.0)
    }
}

// Quantities travel as decimal strings so no precision is lost in JSON or SQL.
impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Int(i64),
            Unsigned(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => Quantity::from_str(&s).map_err(serde::de::Error::custom),
            Repr::Int(v) => Ok(Quantity::from(v)),
            Repr::Unsigned(v) => Ok(Quantity::from(v)),
        }
    }
}

/// Block or extrinsic hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash(pub String);

impl Hash {
    pub fn valid(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account or session public key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(pub String);

impl PublicKey {
    pub fn valid(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_validity_follows_sign() {
        assert!(Quantity::from(0i64).valid());
        assert!(Quantity::from(42i64).valid());
        assert!(!Quantity::from(-1i64).valid());
    }

    #[test]
    fn quantity_decimal_string_is_lossless() {
        let text = "123456789012345678901234567890123456789";
        let q = Quantity::from_str(text).unwrap();
        assert_eq!(q.to_string(), text);

        let json = serde_json::to_string(&q).unwrap();
        assert_eq!(json, format!("\"{}\"", text));
        let back: Quantity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q);
    }

    #[test]
    fn quantity_accepts_json_numbers() {
        let q: Quantity = serde_json::from_str("1000").unwrap();
        assert_eq!(q, Quantity::from(1000i64));
    }

    #[test]
    fn quantity_rejects_garbage() {
        assert!(Quantity::from_str("12abc").is_err());
    }
}
