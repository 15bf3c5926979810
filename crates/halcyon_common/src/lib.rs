//! Shared foundational types for the Halcyon place-and-route core.
//!
//! This crate provides interned identifiers and the well-known constant-id
//! table, the deterministic PRNG used for all tie-breaking, 4-state logic
//! bit vectors, content hashing, frequency values, and common result types.

#![warn(missing_docs)]

pub mod bits;
pub mod frequency;
pub mod hash;
pub mod ident;
pub mod result;
pub mod rng;

pub use bits::{BitVector, Logic};
pub use frequency::Frequency;
pub use hash::ContentHash;
pub use ident::{ConstIds, Ident, IdentList, Interner};
pub use result::{CoreResult, InternalError, PnrError, PnrResult};
pub use rng::DeterministicRng;
