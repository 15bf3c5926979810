//! Distributed RAM split.
//!
//! A 16×4 dual-port RAM primitive (`DPR16X4`) becomes one `RAMW` write
//! control cell plus four `SLICE_COMB` cells in DPRAM mode. The write
//! clock/enable/address/data enter the `RAMW` and fan out to the LUTs over
//! internal nets; read addresses go to the LUTs directly with the
//! family's port permutation; the 64-bit `INITVAL` is split by
//! interleaving, bit `4*j+i` of the source becoming bit `j` of child `i`.
//! All five cells are constrained into one cluster at fixed positions,
//! the LUTs on slices 0 and 1 and the `RAMW` on its slice-2 slot.

use crate::helpers::{bus, bus_flat, cells_of_type};
use crate::rules::parse_param_bits;
use halcyon_common::{Ident, PnrResult};
use halcyon_device::PortDir;
use halcyon_diagnostics::DiagnosticSink;
use halcyon_netlist::{Context, Property};

/// Write-data inputs of the `RAMW`, in bit order.
const RAMW_WD: [&str; 4] = ["D1", "C1", "A1", "B1"];
/// Write-address inputs of the `RAMW`, in bit order.
const RAMW_WAD: [&str; 4] = ["D0", "B0", "C0", "A0"];
/// Read-address pin of LUT halves at even positions, per address bit.
const COMB0_RAD: [&str; 4] = ["D", "B", "C", "A"];
/// Read-address pin of LUT halves at odd positions, per address bit.
const COMB1_RAD: [&str; 4] = ["C", "B", "D", "A"];

/// Expands every `DPR16X4` into its write-control/LUT cluster.
pub fn pack_lutram(ctx: &mut Context, _sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    for ci in cells_of_type(ctx, ids.dpr16x4) {
        let ramw = ctx.id(&format!("{}$lutram_ramw$", ctx.name_of(ci)));
        ctx.netlist.create_cell(ramw, ids.ramw).unwrap();
        let mut combs = [Ident::EMPTY; 4];
        for (i, slot) in combs.iter_mut().enumerate() {
            let name = ctx.id(&format!("{}$lutram_comb[{i}]$", ctx.name_of(ci)));
            ctx.netlist.create_cell(name, ids.slice_comb).unwrap();
            *slot = name;
        }

        // External write clock and enable move onto the RAMW.
        ctx.netlist.move_port_to(ci, ids.wck, ramw, ids.clk).unwrap();
        ctx.netlist.move_port_to(ci, ids.wre, ramw, ids.lsr).unwrap();

        // Internal write clock/enable distribution.
        let int_wck = ctx.id(&format!("{}$lutram_wck$", ctx.name_of(ci)));
        let int_wre = ctx.id(&format!("{}$lutram_wre$", ctx.name_of(ci)));
        ctx.netlist.create_net(int_wck).unwrap();
        ctx.netlist.create_net(int_wre).unwrap();
        ctx.netlist.add_port(ramw, ids.wcko, PortDir::Output).unwrap();
        ctx.netlist.add_port(ramw, ids.wreo, PortDir::Output).unwrap();
        ctx.netlist.connect_port(ramw, ids.wcko, int_wck).unwrap();
        ctx.netlist.connect_port(ramw, ids.wreo, int_wre).unwrap();

        let initval = parse_param_bits(ctx, ci, ids.initval, 64, 0)?.as_int64();

        for i in 0..4usize {
            // Write address and data, external side.
            let wad_src = bus(ctx, "WAD", i);
            let wad_dst = ctx.id(RAMW_WAD[i]);
            ctx.netlist.move_port_to(ci, wad_src, ramw, wad_dst).unwrap();
            let di_src = bus(ctx, "DI", i);
            let di_dst = ctx.id(RAMW_WD[i]);
            ctx.netlist.move_port_to(ci, di_src, ramw, di_dst).unwrap();

            // Read data output.
            let do_src = bus(ctx, "DO", i);
            ctx.netlist.move_port_to(ci, do_src, combs[i], ids.f).unwrap();

            // Read address fans out to all four LUTs with the port
            // permutation alternating by LUT parity.
            let rad_src = bus(ctx, "RAD", i);
            if let Some(rad_net) = ctx.cell(ci).unwrap().port_net(rad_src) {
                for (j, comb) in combs.iter().enumerate() {
                    let port = if j % 2 == 1 {
                        ctx.id(COMB1_RAD[i])
                    } else {
                        ctx.id(COMB0_RAD[i])
                    };
                    ctx.netlist.add_port(*comb, port, PortDir::Input).unwrap();
                    ctx.netlist.connect_port(*comb, port, rad_net).unwrap();
                }
                ctx.netlist.disconnect_port(ci, rad_src).unwrap();
            }

            // Write address, internal side.
            let int_wad = ctx.id(&format!("{}$lutram_wad[{i}]$", ctx.name_of(ci)));
            ctx.netlist.create_net(int_wad).unwrap();
            let wado = bus_flat(ctx, "WADO", i);
            ctx.netlist.add_port(ramw, wado, PortDir::Output).unwrap();
            ctx.netlist.connect_port(ramw, wado, int_wad).unwrap();
            for comb in &combs {
                let wad_pin = bus_flat(ctx, "WAD", i);
                ctx.netlist.add_port(*comb, wad_pin, PortDir::Input).unwrap();
                ctx.netlist.connect_port(*comb, wad_pin, int_wad).unwrap();
            }

            // Write data, internal side: one bit per LUT.
            let int_wd = ctx.id(&format!("{}$lutram_wd[{i}]$", ctx.name_of(ci)));
            ctx.netlist.create_net(int_wd).unwrap();
            let wdo = bus_flat(ctx, "WDO", i);
            ctx.netlist.add_port(ramw, wdo, PortDir::Output).unwrap();
            ctx.netlist.connect_port(ramw, wdo, int_wd).unwrap();
            ctx.netlist.add_port(combs[i], ids.wdi, PortDir::Input).unwrap();
            ctx.netlist.connect_port(combs[i], ids.wdi, int_wd).unwrap();

            // Internal clock/enable into each LUT.
            ctx.netlist.add_port(combs[i], ids.wck, PortDir::Input).unwrap();
            ctx.netlist.add_port(combs[i], ids.wre, PortDir::Input).unwrap();
            ctx.netlist.connect_port(combs[i], ids.wck, int_wck).unwrap();
            ctx.netlist.connect_port(combs[i], ids.wre, int_wre).unwrap();

            // Interleaved INIT split.
            let mut split_init: u64 = 0;
            for j in 0..16 {
                if initval & (1u64 << (4 * j + i)) != 0 {
                    split_init |= 1 << j;
                }
            }
            let c = ctx.netlist.cell_mut(combs[i]).unwrap();
            c.params.insert(ids.init, Property::from_int(split_init, 16));
            c.params.insert(ids.mode, Property::from_str_value("DPRAM"));
        }

        // Fixed cluster: LUTs at slice 0/1 LUT slots, RAMW at its slot.
        {
            let c = ctx.netlist.cell_mut(combs[0]).unwrap();
            c.constr_dz = 0;
            c.constr_abs_z = true;
            c.cluster = Some(combs[0]);
        }
        for (i, comb) in combs.iter().enumerate().skip(1) {
            let c = ctx.netlist.cell_mut(*comb).unwrap();
            c.constr_dx = 0;
            c.constr_dy = 0;
            c.constr_dz = ((i as i32 / 2) << 3) | (i as i32 % 2);
            c.constr_abs_z = true;
            c.cluster = Some(combs[0]);
            ctx.netlist.cell_mut(combs[0]).unwrap().constr_children.push(*comb);
        }
        {
            let c = ctx.netlist.cell_mut(ramw).unwrap();
            c.constr_dx = 0;
            c.constr_dy = 0;
            c.constr_dz = (2 << 3) | 4;
            c.constr_abs_z = true;
            c.cluster = Some(combs[0]);
        }
        ctx.netlist.cell_mut(combs[0]).unwrap().constr_children.push(ramw);

        ctx.netlist.remove_cell(ci).unwrap();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_arch::fabric;

    fn build_dpr(ctx: &mut Context) -> Ident {
        let ram = ctx.id("ram0");
        ctx.netlist.create_cell(ram, ctx.ids.dpr16x4).unwrap();
        // Interleaved pattern: set bit 4*j+i for i == j % 4 so each child
        // gets a distinct mask.
        let mut initval: u64 = 0;
        for j in 0..16u64 {
            initval |= 1 << (4 * j + (j % 4));
        }
        ctx.netlist
            .cell_mut(ram)
            .unwrap()
            .params
            .insert(ctx.ids.initval, Property::from_int(initval, 64));

        for (port, net) in [("WCK", "wck"), ("WRE", "wre")] {
            let p = ctx.id(port);
            let n = ctx.id(net);
            ctx.netlist.create_net(n).unwrap();
            ctx.netlist.add_port(ram, p, PortDir::Input).unwrap();
            ctx.netlist.connect_port(ram, p, n).unwrap();
        }
        for i in 0..4 {
            for base in ["WAD", "DI", "RAD"] {
                let p = ctx.id(&format!("{base}[{i}]"));
                let n = ctx.id(&format!("{}_{i}", base.to_lowercase()));
                ctx.netlist.create_net(n).unwrap();
                ctx.netlist.add_port(ram, p, PortDir::Input).unwrap();
                ctx.netlist.connect_port(ram, p, n).unwrap();
            }
            let p = ctx.id(&format!("DO[{i}]"));
            let n = ctx.id(&format!("do_{i}"));
            ctx.netlist.create_net(n).unwrap();
            ctx.netlist.add_port(ram, p, PortDir::Output).unwrap();
            ctx.netlist.connect_port(ram, p, n).unwrap();
        }
        ram
    }

    #[test]
    fn dpr16x4_expands_to_five_cell_cluster() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let sink = DiagnosticSink::new();
        let ram = build_dpr(&mut ctx);
        pack_lutram(&mut ctx, &sink).unwrap();
        assert!(ctx.cell(ram).is_err());

        let root = ctx.id("ram0$lutram_comb[0]$");
        let ramw = ctx.id("ram0$lutram_ramw$");
        assert_eq!(ctx.cell(root).unwrap().constr_children.len(), 4);
        let rw = ctx.cell(ramw).unwrap();
        assert_eq!(rw.cluster, Some(root));
        assert_eq!(rw.constr_dz, (2 << 3) | 4);
        assert!(rw.constr_abs_z);

        for i in 1..4i32 {
            let c = ctx.cell(ctx.id(&format!("ram0$lutram_comb[{i}]$"))).unwrap();
            assert_eq!(c.constr_dz, ((i / 2) << 3) | (i % 2));
            assert_eq!(c.param_str(ctx.ids.mode, ""), "DPRAM");
        }
    }

    #[test]
    fn write_side_moves_to_ramw() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let sink = DiagnosticSink::new();
        build_dpr(&mut ctx);
        pack_lutram(&mut ctx, &sink).unwrap();

        let rw = ctx.cell(ctx.id("ram0$lutram_ramw$")).unwrap();
        assert_eq!(rw.port_net(ctx.ids.clk), Some(ctx.id("wck")));
        assert_eq!(rw.port_net(ctx.ids.lsr), Some(ctx.id("wre")));
        // WAD[0] lands on D0, DI[0] on D1 per the permutation vectors.
        assert_eq!(rw.port_net(ctx.id("D0")), Some(ctx.id("wad_0")));
        assert_eq!(rw.port_net(ctx.id("D1")), Some(ctx.id("di_0")));
    }

    #[test]
    fn read_address_fans_out_with_permutation() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let sink = DiagnosticSink::new();
        build_dpr(&mut ctx);
        pack_lutram(&mut ctx, &sink).unwrap();

        // RAD[0] reaches D on even LUTs and C on odd LUTs.
        let even = ctx.cell(ctx.id("ram0$lutram_comb[0]$")).unwrap();
        let odd = ctx.cell(ctx.id("ram0$lutram_comb[1]$")).unwrap();
        assert_eq!(even.port_net(ctx.ids.d), Some(ctx.id("rad_0")));
        assert_eq!(odd.port_net(ctx.ids.c), Some(ctx.id("rad_0")));
        // RAD[3] reaches A everywhere.
        assert_eq!(even.port_net(ctx.ids.a), Some(ctx.id("rad_3")));
        assert_eq!(odd.port_net(ctx.ids.a), Some(ctx.id("rad_3")));
    }

    #[test]
    fn initval_interleave_split() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let sink = DiagnosticSink::new();
        build_dpr(&mut ctx);
        pack_lutram(&mut ctx, &sink).unwrap();

        // The fixture sets bit 4*j+i exactly when i == j % 4, so child i
        // holds bits {j : j % 4 == i}.
        for i in 0..4u64 {
            let expected = (0..16u64).filter(|j| j % 4 == i).fold(0u64, |acc, j| acc | 1 << j);
            let c = ctx
                .cell(ctx.id(&format!("ram0$lutram_comb[{i}]$")))
                .unwrap();
            assert_eq!(c.param_int(ctx.ids.init, u64::MAX), expected, "child {i}");
        }
    }

    #[test]
    fn internal_write_nets_reach_every_lut() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let sink = DiagnosticSink::new();
        build_dpr(&mut ctx);
        pack_lutram(&mut ctx, &sink).unwrap();

        let wck_net = ctx.net(ctx.id("ram0$lutram_wck$")).unwrap();
        assert_eq!(wck_net.user_count(), 4);
        assert_eq!(
            wck_net.driver.map(|d| d.cell),
            Some(ctx.id("ram0$lutram_ramw$"))
        );
        // Each WDO bit reaches exactly its own LUT.
        let wd0 = ctx.net(ctx.id("ram0$lutram_wd[0]$")).unwrap();
        assert_eq!(wd0.user_count(), 1);
        assert_eq!(
            wd0.users().next().map(|u| u.cell),
            Some(ctx.id("ram0$lutram_comb[0]$"))
        );
    }
}
