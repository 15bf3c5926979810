//! The netlist container and its port-rewiring operations.
//!
//! Cells and nets live in arenas keyed by interned name; ports carry the
//! name of their net rather than a pointer, and net users carry (cell,
//! port) name pairs plus a stable index, so there are no owning cycles and
//! serialization is direct. All rewiring goes through the methods here so
//! that the driver/user cross-references stay consistent.

use crate::cell::{Cell, Port};
use crate::hierarchy::{HierCell, Region};
use crate::net::{Net, PortRef};
use halcyon_common::Ident;
use halcyon_device::PortDir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An error from a netlist structural operation.
#[derive(Debug, thiserror::Error)]
pub enum NetlistError {
    /// A cell with this name already exists.
    #[error("cell already exists")]
    DuplicateCell,
    /// A net with this name already exists.
    #[error("net already exists")]
    DuplicateNet,
    /// No cell with this name exists.
    #[error("unknown cell")]
    UnknownCell,
    /// No net with this name exists.
    #[error("unknown net")]
    UnknownNet,
    /// No such port on the cell.
    #[error("unknown port")]
    UnknownPort,
    /// The port is already connected.
    #[error("port is already connected")]
    PortConnected,
    /// The net already has a driver.
    #[error("net already has a driver")]
    DriverConflict,
}

/// A top-level IO port of the design.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopPort {
    /// Port name.
    pub name: Ident,
    /// Direction as seen from outside the design.
    pub dir: PortDir,
    /// The net attached to the port, once IO preparation resolved it.
    pub net: Option<Ident>,
    /// Constraint-supplied attributes (`LOC`, `IO_TYPE`, ...) copied onto
    /// the real IO buffer during IO preparation.
    pub attrs: BTreeMap<Ident, crate::property::Property>,
}

/// The mutable netlist: cells, nets, top-level ports, hierarchy, regions.
///
/// `BTreeMap` arenas keyed by `Ident` give deterministic iteration order
/// (by handle), which the router's reproducibility guarantee relies on.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Netlist {
    /// All leaf cells by name.
    pub cells: BTreeMap<Ident, Cell>,
    /// All nets by name.
    pub nets: BTreeMap<Ident, Net>,
    /// Top-level design ports by name.
    pub ports: BTreeMap<Ident, TopPort>,
    /// Hierarchy records by full path.
    pub hier_cells: BTreeMap<Ident, HierCell>,
    /// Placement regions by name.
    pub regions: BTreeMap<Ident, Region>,
    /// Design-wide settings (constraint-file global assignments, flow
    /// options).
    pub settings: BTreeMap<Ident, crate::property::Property>,
}

impl Netlist {
    /// Creates an empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cell, failing if the name is taken.
    pub fn create_cell(&mut self, name: Ident, cell_type: Ident) -> Result<&mut Cell, NetlistError> {
        if self.cells.contains_key(&name) {
            return Err(NetlistError::DuplicateCell);
        }
        Ok(self.cells.entry(name).or_insert_with(|| Cell::new(name, cell_type)))
    }

    /// Creates a net, failing if the name is taken.
    pub fn create_net(&mut self, name: Ident) -> Result<&mut Net, NetlistError> {
        if self.nets.contains_key(&name) {
            return Err(NetlistError::DuplicateNet);
        }
        Ok(self.nets.entry(name).or_insert_with(|| Net::new(name)))
    }

    /// Returns the cell with the given name.
    pub fn cell(&self, name: Ident) -> Result<&Cell, NetlistError> {
        self.cells.get(&name).ok_or(NetlistError::UnknownCell)
    }

    /// Returns the cell with the given name, mutably.
    pub fn cell_mut(&mut self, name: Ident) -> Result<&mut Cell, NetlistError> {
        self.cells.get_mut(&name).ok_or(NetlistError::UnknownCell)
    }

    /// Returns the net with the given name.
    pub fn net(&self, name: Ident) -> Result<&Net, NetlistError> {
        self.nets.get(&name).ok_or(NetlistError::UnknownNet)
    }

    /// Returns the net with the given name, mutably.
    pub fn net_mut(&mut self, name: Ident) -> Result<&mut Net, NetlistError> {
        self.nets.get_mut(&name).ok_or(NetlistError::UnknownNet)
    }

    /// Adds a disconnected port to a cell. No-op if the port exists with
    /// the same direction.
    pub fn add_port(&mut self, cell: Ident, port: Ident, dir: PortDir) -> Result<(), NetlistError> {
        let c = self.cell_mut(cell)?;
        c.ports.entry(port).or_insert(Port {
            name: port,
            dir,
            net: None,
            user_idx: None,
        });
        Ok(())
    }

    /// Connects `cell.port` to `net`.
    ///
    /// Output ports become the net's driver; input and inout ports join
    /// the user list. The port must currently be disconnected.
    pub fn connect_port(&mut self, cell: Ident, port: Ident, net: Ident) -> Result<(), NetlistError> {
        if !self.nets.contains_key(&net) {
            return Err(NetlistError::UnknownNet);
        }
        let c = self.cells.get_mut(&cell).ok_or(NetlistError::UnknownCell)?;
        let p = c.ports.get_mut(&port).ok_or(NetlistError::UnknownPort)?;
        if p.net.is_some() {
            return Err(NetlistError::PortConnected);
        }
        let dir = p.dir;
        p.net = Some(net);

        let n = self.nets.get_mut(&net).expect("checked above");
        match dir {
            PortDir::Output => {
                if n.driver.is_some() {
                    // Roll back the port connection before failing.
                    let c = self.cells.get_mut(&cell).expect("cell exists");
                    c.ports.get_mut(&port).expect("port exists").net = None;
                    return Err(NetlistError::DriverConflict);
                }
                n.driver = Some(PortRef::new(cell, port));
            }
            PortDir::Input | PortDir::Inout => {
                let idx = n.add_user(PortRef::new(cell, port));
                let c = self.cells.get_mut(&cell).expect("cell exists");
                c.ports.get_mut(&port).expect("port exists").user_idx = Some(idx);
            }
        }
        Ok(())
    }

    /// Disconnects `cell.port` from whatever net it is on. No-op when
    /// already disconnected.
    pub fn disconnect_port(&mut self, cell: Ident, port: Ident) -> Result<(), NetlistError> {
        let c = self.cells.get_mut(&cell).ok_or(NetlistError::UnknownCell)?;
        let Some(p) = c.ports.get_mut(&port) else {
            return Ok(());
        };
        let Some(net) = p.net.take() else {
            return Ok(());
        };
        let user_idx = p.user_idx.take();
        let dir = p.dir;

        if let Some(n) = self.nets.get_mut(&net) {
            match dir {
                PortDir::Output => {
                    if n.driver == Some(PortRef::new(cell, port)) {
                        n.driver = None;
                    }
                }
                PortDir::Input | PortDir::Inout => {
                    if let Some(idx) = user_idx {
                        n.remove_user(idx);
                    }
                }
            }
        }
        Ok(())
    }

    /// Renames a port, preserving its connection. No-op if absent.
    pub fn rename_port(&mut self, cell: Ident, old: Ident, new: Ident) -> Result<(), NetlistError> {
        if old == new {
            return Ok(());
        }
        let c = self.cell(cell)?;
        let Some(p) = c.ports.get(&old) else {
            return Ok(());
        };
        let dir = p.dir;
        let net = p.net;

        self.disconnect_port(cell, old)?;
        let c = self.cell_mut(cell)?;
        c.ports.remove(&old);
        self.add_port(cell, new, dir)?;
        if let Some(net) = net {
            self.connect_port(cell, new, net)?;
        }
        Ok(())
    }

    /// Moves the connection of `cell.port` onto `dst_cell.dst_port`,
    /// creating the destination port with the same direction.
    pub fn move_port_to(
        &mut self,
        cell: Ident,
        port: Ident,
        dst_cell: Ident,
        dst_port: Ident,
    ) -> Result<(), NetlistError> {
        let c = self.cell(cell)?;
        let Some(p) = c.ports.get(&port) else {
            return Ok(());
        };
        let dir = p.dir;
        let net = p.net;

        self.disconnect_port(cell, port)?;
        self.cell_mut(cell)?.ports.remove(&port);
        self.add_port(dst_cell, dst_port, dir)?;
        if let Some(net) = net {
            self.connect_port(dst_cell, dst_port, net)?;
        }
        Ok(())
    }

    /// Connects `dst_cell.dst_port` to the same net as `cell.port`,
    /// creating the destination port with the same direction. The source
    /// stays connected.
    pub fn copy_port_to(
        &mut self,
        cell: Ident,
        port: Ident,
        dst_cell: Ident,
        dst_port: Ident,
    ) -> Result<(), NetlistError> {
        let c = self.cell(cell)?;
        let Some(p) = c.ports.get(&port) else {
            return Ok(());
        };
        let dir = p.dir;
        let net = p.net;
        self.add_port(dst_cell, dst_port, dir)?;
        if let Some(net) = net {
            self.connect_port(dst_cell, dst_port, net)?;
        }
        Ok(())
    }

    /// Removes a cell, disconnecting all its ports first.
    pub fn remove_cell(&mut self, name: Ident) -> Result<(), NetlistError> {
        let c = self.cell(name)?;
        let ports: Vec<Ident> = c.ports.keys().copied().collect();
        for port in ports {
            self.disconnect_port(name, port)?;
        }
        self.cells.remove(&name);
        Ok(())
    }

    /// Removes a net, disconnecting its driver and users first.
    pub fn remove_net(&mut self, name: Ident) -> Result<(), NetlistError> {
        let n = self.net(name)?;
        let mut endpoints: Vec<PortRef> = n.users().collect();
        if let Some(driver) = n.driver {
            endpoints.push(driver);
        }
        for ep in endpoints {
            if let Some(cell) = self.cells.get_mut(&ep.cell) {
                if let Some(port) = cell.ports.get_mut(&ep.port) {
                    port.net = None;
                    port.user_idx = None;
                }
            }
        }
        self.nets.remove(&name);
        Ok(())
    }

    /// Squeezes tombstoned users out of `net`, updating the stable indices
    /// stored on the surviving user ports.
    pub fn compact_users(&mut self, net: Ident) -> Result<(), NetlistError> {
        let n = self.nets.get_mut(&net).ok_or(NetlistError::UnknownNet)?;
        let live: Vec<PortRef> = n.users().collect();
        n.users.clear();
        for user in live {
            let idx = n.add_user(user);
            if let Some(cell) = self.cells.get_mut(&user.cell) {
                if let Some(port) = cell.ports.get_mut(&user.port) {
                    port.user_idx = Some(idx);
                }
            }
        }
        Ok(())
    }

    /// Returns the number of cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Returns the number of nets.
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }
}
