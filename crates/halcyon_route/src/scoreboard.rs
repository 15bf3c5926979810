//! Per-wire congestion state, indexed by wire for the hot path.

use halcyon_device::WireId;

/// One wire's negotiation state.
#[derive(Clone, Copy, Debug, Default)]
struct WireScore {
    /// Number of distinct nets currently asserting this wire.
    occupancy: u16,
    /// Accumulated congestion penalty across iterations.
    history: f64,
}

/// Demand and history for every wire in the device.
#[derive(Clone, Debug)]
pub struct Scoreboard {
    wires: Vec<WireScore>,
}

impl Scoreboard {
    /// Creates a scoreboard for a device with `wire_count` wires.
    pub fn new(wire_count: usize) -> Self {
        Self {
            wires: vec![WireScore::default(); wire_count],
        }
    }

    /// Records one more net asserting `wire`.
    pub fn acquire(&mut self, wire: WireId) {
        self.wires[wire.index()].occupancy += 1;
    }

    /// Records one fewer net asserting `wire`.
    pub fn release(&mut self, wire: WireId) {
        let w = &mut self.wires[wire.index()];
        debug_assert!(w.occupancy > 0, "release of an unasserted wire");
        w.occupancy = w.occupancy.saturating_sub(1);
    }

    /// The current number of nets asserting `wire`.
    pub fn occupancy(&self, wire: WireId) -> u16 {
        self.wires[wire.index()].occupancy
    }

    /// The congestion component of routing through `wire`: present
    /// pressure scaled by the iteration's factor, plus accumulated history.
    pub fn congestion_cost(&self, wire: WireId, pressure: f64) -> f64 {
        let w = &self.wires[wire.index()];
        w.occupancy as f64 * pressure + w.history
    }

    /// Number of wires with more than one owner.
    pub fn congested_count(&self) -> usize {
        self.wires.iter().filter(|w| w.occupancy > 1).count()
    }

    /// Adds `step` of history for every unit of overuse on every wire.
    pub fn bump_history(&mut self, step: f64) {
        for w in &mut self.wires {
            if w.occupancy > 1 {
                w.history += (w.occupancy - 1) as f64 * step;
            }
        }
    }
}
