//! The immutable FPGA device graph.
//!
//! A device is a set of **bels** (placeable sites), **wires** (routing
//! nodes), and **pips** (directed programmable switches between wires),
//! together with the incidence between them. The graph is built once,
//! programmatically by an architecture family or loaded from an opaque
//! compressed binary, and never mutated afterwards; everything downstream
//! (packer, placer, router, timing) only queries it.

#![warn(missing_docs)]

pub mod binary;
pub mod graph;
pub mod ids;
pub mod types;

pub use binary::{load_device, save_device, DeviceBinaryError};
pub use graph::{DeviceGraph, DeviceGraphError};
pub use ids::{BelId, PipId, WireId};
pub use types::{Bel, BelPin, Delay, Loc, Pip, PortDir, PseudoPipTag, Wire, WireCategory};
