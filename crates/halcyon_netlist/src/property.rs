//! Cell attribute and parameter values.
//!
//! A [`Property`] is either a free-form string or a four-valued bit vector
//! with a cached integer view of its low 64 bits. The cache is recomputed
//! on every mutation, so reading `as_int64` is always O(1).

use halcyon_common::{BitVector, Logic};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A cell attribute or parameter value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    /// A free-form string value.
    String(String),
    /// A bit-vector value with its cached low-64-bit integer view.
    Bits {
        /// The bits, LSB first.
        bits: BitVector,
        /// Cached `bits.low_u64()`; kept in step by all constructors.
        intval: u64,
    },
}

impl Property {
    /// Creates a bit-vector property from the low `width` bits of `value`.
    pub fn from_int(value: u64, width: usize) -> Self {
        let bits = BitVector::from_u64(value, width);
        let intval = bits.low_u64();
        Property::Bits { bits, intval }
    }

    /// Creates a bit-vector property from an existing vector.
    pub fn from_bits(bits: BitVector) -> Self {
        let intval = bits.low_u64();
        Property::Bits { bits, intval }
    }

    /// Creates a string property.
    pub fn from_str_value(s: impl Into<String>) -> Self {
        Property::String(s.into())
    }

    /// Returns whether this is the string arm.
    pub fn is_string(&self) -> bool {
        matches!(self, Property::String(_))
    }

    /// Returns the value as a display string.
    ///
    /// Strings are returned verbatim; bit vectors render as a binary string,
    /// MSB first. [`Property::parse`] inverts this for the bits arm.
    pub fn as_string(&self) -> String {
        match self {
            Property::String(s) => s.clone(),
            Property::Bits { bits, .. } => bits.to_binary_str(),
        }
    }

    /// Returns the cached integer view: the low 64 bits with `x`/`z` as 0.
    ///
    /// The string arm parses on demand (decimal, or `0x`-prefixed hex),
    /// yielding 0 when unparsable.
    pub fn as_int64(&self) -> u64 {
        match self {
            Property::Bits { intval, .. } => *intval,
            Property::String(s) => parse_int_str(s).unwrap_or(0),
        }
    }

    /// Returns the bit width, or the string length for the string arm.
    pub fn size(&self) -> usize {
        match self {
            Property::String(s) => s.len(),
            Property::Bits { bits, .. } => bits.width(),
        }
    }

    /// Extracts `width` bits starting at `offset` (bits arm only;
    /// zero-extends past the end).
    pub fn extract(&self, offset: usize, width: usize) -> Option<Property> {
        match self {
            Property::Bits { bits, .. } => Some(Property::from_bits(bits.extract(offset, width))),
            Property::String(_) => None,
        }
    }

    /// Returns the property with bit order reversed (bits arm only).
    pub fn reversed(&self) -> Option<Property> {
        match self {
            Property::Bits { bits, .. } => Some(Property::from_bits(bits.reversed())),
            Property::String(_) => None,
        }
    }

    /// Parses a property from its display string.
    ///
    /// A non-empty string consisting only of `0`, `1`, `x`, `z` characters
    /// is a bit vector; anything else is a string. This is the inverse of
    /// [`as_string`](Self::as_string) for bit-vector properties.
    pub fn parse(s: &str) -> Property {
        if !s.is_empty() && s.chars().all(|c| Logic::from_char(c).is_some()) {
            if let Some(bits) = BitVector::from_binary_str(s) {
                return Property::from_bits(bits);
            }
        }
        Property::String(s.to_string())
    }

    /// Interprets the property as a `width`-bit vector.
    ///
    /// The bits arm is truncated or zero-extended. The string arm accepts
    /// `0x`/`0b` prefixed and plain decimal integers. Returns `None` when
    /// the string is not numeric.
    pub fn to_bits(&self, width: usize) -> Option<BitVector> {
        match self {
            Property::Bits { bits, .. } => Some(bits.extract(0, width)),
            Property::String(s) => parse_int_str(s).map(|v| BitVector::from_u64(v, width)),
        }
    }
}

fn parse_int_str(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2).ok()
    } else {
        s.parse().ok()
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::String(s) => write!(f, "Property::String({s:?})"),
            Property::Bits { bits, .. } => write!(f, "Property::Bits({bits})"),
        }
    }
}

impl From<&str> for Property {
    fn from(s: &str) -> Self {
        Property::String(s.to_string())
    }
}

impl From<String> for Property {
    fn from(s: String) -> Self {
        Property::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_roundtrip() {
        let p = Property::from_int(0x5555, 16);
        assert_eq!(p.as_int64(), 0x5555);
        assert_eq!(p.size(), 16);
        assert!(!p.is_string());
    }

    #[test]
    fn intval_cache_tracks_bits() {
        let bits = BitVector::from_binary_str("1x10").unwrap();
        let p = Property::from_bits(bits);
        assert_eq!(p.as_int64(), 0b1010);
    }

    #[test]
    fn string_roundtrip() {
        let p = Property::from_str_value("LVCMOS33");
        assert!(p.is_string());
        assert_eq!(p.as_string(), "LVCMOS33");
        assert_eq!(Property::parse("LVCMOS33"), p);
    }

    #[test]
    fn bits_string_roundtrip_law() {
        for v in [0u64, 1, 0x5555, 0xFFFF, 0xA5A5] {
            let p = Property::from_int(v, 16);
            assert_eq!(Property::parse(&p.as_string()), p);
        }
        let with_x = Property::from_bits(BitVector::from_binary_str("10xz").unwrap());
        assert_eq!(Property::parse(&with_x.as_string()), with_x);
    }

    #[test]
    fn extract_and_reverse() {
        let p = Property::from_int(0b1101_0010, 8);
        assert_eq!(p.extract(4, 4).unwrap().as_int64(), 0b1101);
        let r = p.reversed().unwrap();
        assert_eq!(r.as_int64(), 0b0100_1011);
        assert!(Property::from_str_value("s").extract(0, 1).is_none());
    }

    #[test]
    fn string_int_views() {
        assert_eq!(Property::from_str_value("0x20").as_int64(), 32);
        assert_eq!(Property::from_str_value("12").as_int64(), 12);
        assert_eq!(Property::from_str_value("DPRAM").as_int64(), 0);
    }

    #[test]
    fn to_bits_widths() {
        let p = Property::from_int(0xFF, 8);
        assert_eq!(p.to_bits(4).unwrap().low_u64(), 0xF);
        assert_eq!(p.to_bits(16).unwrap().low_u64(), 0xFF);
        let s = Property::from_str_value("0x3");
        assert_eq!(s.to_bits(4).unwrap().low_u64(), 3);
        assert!(Property::from_str_value("abc").to_bits(4).is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let p = Property::from_int(0xBEEF, 16);
        let json = serde_json::to_string(&p).unwrap();
        let back: Property = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
