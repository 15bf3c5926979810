//! Opaque ID newtypes for device graph entities.
//!
//! [`BelId`], [`WireId`], and [`PipId`] are thin `u32` wrappers used as
//! indices into the device graph's arenas. They are `Copy`, `Hash`, and
//! `Serialize`/`Deserialize`.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }

            /// Returns the index as a `usize` for arena access.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a bel (placeable site) in the device graph.
    BelId
);

define_id!(
    /// Opaque, copyable ID for a wire (routing node) in the device graph.
    WireId
);

define_id!(
    /// Opaque, copyable ID for a pip (programmable switch) in the device graph.
    PipId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn roundtrip() {
        assert_eq!(BelId::from_raw(42).as_raw(), 42);
        assert_eq!(WireId::from_raw(99).index(), 99);
        assert_eq!(PipId::from_raw(7).as_raw(), 7);
    }

    #[test]
    fn equality_and_ordering() {
        let a = WireId::from_raw(3);
        let b = WireId::from_raw(3);
        let c = WireId::from_raw(4);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
    }

    #[test]
    fn hash_in_set() {
        let mut set = HashSet::new();
        set.insert(PipId::from_raw(1));
        set.insert(PipId::from_raw(2));
        set.insert(PipId::from_raw(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", BelId::from_raw(17)), "17");
    }

    #[test]
    fn serde_roundtrip() {
        let id = WireId::from_raw(55);
        let json = serde_json::to_string(&id).unwrap();
        let back: WireId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
