//! Nets: logical signals with one driver, a tombstoned user list, and a
//! routing tree.

use crate::cell::PlaceStrength;
use crate::property::Property;
use halcyon_common::Ident;
use halcyon_device::{PipId, WireId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A reference to one port of one cell.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct PortRef {
    /// The cell's name.
    pub cell: Ident,
    /// The port's name.
    pub port: Ident,
}

impl PortRef {
    /// Creates a port reference.
    pub fn new(cell: Ident, port: Ident) -> Self {
        Self { cell, port }
    }
}

/// One wire of a net's routing tree: the pip driving this wire (absent on
/// the source wire) and the binding strength.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct WireBinding {
    /// The uphill pip selected to drive this wire; `None` only at the
    /// net's source wire.
    pub pip: Option<PipId>,
    /// The strength of the binding.
    pub strength: PlaceStrength,
}

/// A logical signal: one driver, any number of users, and after routing a
/// tree of physical wires.
///
/// The user list is tombstoned: removing a user leaves a `None` slot so
/// that the `user_idx` stored on every other user's port stays valid.
/// [`compact_users`](crate::netlist::Netlist::compact_users) squeezes the
/// slots back out.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Net {
    /// Net name (unique within the netlist).
    pub name: Ident,
    /// Free-form attributes.
    pub attrs: BTreeMap<Ident, Property>,
    /// The driving cell+port, if any.
    pub driver: Option<PortRef>,
    pub(crate) users: Vec<Option<PortRef>>,
    /// The routing tree: each wire maps to the pip that drives it.
    pub wires: BTreeMap<WireId, WireBinding>,
    /// A clock period constraint in nanoseconds, if this net is a
    /// constrained clock.
    pub clock_constraint: Option<f64>,
}

impl Net {
    /// Creates an empty net.
    pub fn new(name: Ident) -> Self {
        Self {
            name,
            attrs: BTreeMap::new(),
            driver: None,
            users: Vec::new(),
            wires: BTreeMap::new(),
            clock_constraint: None,
        }
    }

    /// Appends a user and returns its stable index.
    pub(crate) fn add_user(&mut self, user: PortRef) -> usize {
        self.users.push(Some(user));
        self.users.len() - 1
    }

    /// Tombstones the user at `idx`.
    pub(crate) fn remove_user(&mut self, idx: usize) {
        self.users[idx] = None;
    }

    /// Iterates over live users.
    pub fn users(&self) -> impl Iterator<Item = PortRef> + '_ {
        self.users.iter().filter_map(|u| *u)
    }

    /// Iterates over live users together with their stable indices.
    pub fn users_indexed(&self) -> impl Iterator<Item = (usize, PortRef)> + '_ {
        self.users
            .iter()
            .enumerate()
            .filter_map(|(i, u)| u.map(|u| (i, u)))
    }

    /// Returns the number of live users.
    pub fn user_count(&self) -> usize {
        self.users.iter().filter(|u| u.is_some()).count()
    }

    /// Returns whether the net has a routing tree.
    pub fn is_routed(&self) -> bool {
        !self.wires.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr(c: u32, p: u32) -> PortRef {
        PortRef::new(Ident::from_raw(c), Ident::from_raw(p))
    }

    #[test]
    fn new_net_is_empty() {
        let n = Net::new(Ident::from_raw(1));
        assert!(n.driver.is_none());
        assert_eq!(n.user_count(), 0);
        assert!(!n.is_routed());
    }

    #[test]
    fn user_indices_survive_removal() {
        let mut n = Net::new(Ident::from_raw(1));
        let i0 = n.add_user(pr(10, 1));
        let i1 = n.add_user(pr(11, 1));
        let i2 = n.add_user(pr(12, 1));
        n.remove_user(i1);
        assert_eq!(n.user_count(), 2);
        // The other indices still address the same users.
        assert_eq!(n.users.get(i0).copied().flatten(), Some(pr(10, 1)));
        assert_eq!(n.users.get(i2).copied().flatten(), Some(pr(12, 1)));
    }

    #[test]
    fn users_indexed_skips_tombstones() {
        let mut n = Net::new(Ident::from_raw(1));
        n.add_user(pr(10, 1));
        let dead = n.add_user(pr(11, 1));
        n.remove_user(dead);
        let live: Vec<_> = n.users_indexed().collect();
        assert_eq!(live, vec![(0, pr(10, 1))]);
    }

    #[test]
    fn routing_tree_presence() {
        let mut n = Net::new(Ident::from_raw(1));
        n.wires.insert(
            WireId::from_raw(0),
            WireBinding {
                pip: None,
                strength: PlaceStrength::Strong,
            },
        );
        assert!(n.is_routed());
    }
}
