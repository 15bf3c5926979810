//! The z-coordinate encoding of logic-tile bel slots.
//!
//! A logic tile holds four slices. Within a slice, slot indices are:
//! two LUTs (0, 1), their paired FFs (2, 3), and (in slice 2 only) the
//! RAM write-control slot (4). The absolute z of a bel is
//! `(slice << 3) | slot`, leaving headroom for family variants with more
//! slots per slice.

/// Slot index of the first LUT in a slice.
pub const LUT0: i32 = 0;
/// Slot index of the second LUT in a slice.
pub const LUT1: i32 = 1;
/// Slot index of the FF paired with LUT0.
pub const FF0: i32 = 2;
/// Slot index of the FF paired with LUT1.
pub const FF1: i32 = 3;
/// Slot index of the RAM write-control bel (slice 2 only).
pub const RAMW: i32 = 4;

/// Number of slices in a logic tile.
pub const SLICES_PER_TILE: i32 = 4;

/// The slice that hosts the RAMW slot.
pub const RAMW_SLICE: i32 = 2;

/// Composes an absolute z from a slice index and a slot index.
pub fn slice_z(slice: i32, slot: i32) -> i32 {
    (slice << 3) | slot
}

/// Decomposes an absolute z into (slice, slot).
pub fn split_z(z: i32) -> (i32, i32) {
    (z >> 3, z & 7)
}
