//! The packer: technology-mapping transforms over the netlist.
//!
//! Packing is an ordered sequence of rewrites that turns the front-end
//! netlist into cells that map one-to-one onto device bels: IO buffers are
//! matched to pads, DSP and RAM macros expand into primitive topologies,
//! carry chains split into slice-sized pieces, FFs and LUTs normalize onto
//! the common slice cell types, constants and inverters legalize against
//! per-pin hardware options, and high-fanout clocks are promoted onto
//! global buffers. Each transform is written against the architecture
//! capability interface; none of them knows the device family.
//!
//! Packer errors are fatal: they abort the run with a user-facing message.

#![warn(missing_docs)]

pub mod bram;
pub mod carry;
pub mod clocks;
pub mod constants;
pub mod dsp;
pub mod globals;
pub mod helpers;
pub mod io;
pub mod iologic;
pub mod lutffs;
pub mod lutram;
pub mod norm;
pub mod prims;
pub mod rules;
pub mod widefn;

pub use rules::{generic_xform, XformRule};

use halcyon_arch::Architecture;
use halcyon_common::PnrResult;
use halcyon_diagnostics::DiagnosticSink;
use halcyon_netlist::Context;

/// Tunables of the packer pipeline.
#[derive(Clone, Debug)]
pub struct PackerConfig {
    /// Whether to fuse fanout-1 LUT→FF pairs into shared slices.
    pub lutff_fusion: bool,
    /// Fraction of FFs allowed to glue onto carry clusters, in [0, 1].
    pub carry_lutff_ratio: f64,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            lutff_fusion: true,
            carry_lutff_ratio: 1.0,
        }
    }
}

/// Runs the full packer pipeline over a context.
pub fn pack<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &mut A,
    sink: &DiagnosticSink,
    config: &PackerConfig,
) -> PnrResult<()> {
    io::pack_io(ctx, arch, sink)?;
    iologic::pack_iologic(ctx, arch, sink)?;
    dsp::pack_dsps(ctx, sink)?;
    prims::convert_prims(ctx, sink)?;
    bram::pack_bram(ctx, sink)?;
    lutram::pack_lutram(ctx, sink)?;
    carry::pack_carries(ctx, sink)?;
    widefn::pack_widefn(ctx, sink)?;
    norm::pack_ffs(ctx, sink)?;
    constants::pack_constants(ctx, arch, sink)?;
    norm::pack_luts(ctx, sink)?;
    if config.lutff_fusion {
        lutffs::pack_lutffs(ctx, sink, config.carry_lutff_ratio)?;
    }
    globals::promote_globals(ctx, arch, sink)?;
    globals::place_globals(ctx, arch, sink)?;
    clocks::generate_constraints(ctx, sink)?;
    Ok(())
}
