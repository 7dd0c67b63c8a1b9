// ==============================================================================
// spawn.rs — STARTING GRID ALLOCATION
// ------------------------------------------------------------------------------
// Two lanes side by side behind the grid origin. Each new vehicle joins the
// lane with fewer cars (Left on a tie) and takes that lane's frontmost free
// row. Released rows are reused before new rows are opened.
//
// Grid frame follows the chassis frame: forward = +Z, left = +X. Rows extend
// backwards along -Z.
// ==============================================================================

use std::collections::HashMap;

use log::debug;
use rapier3d::prelude::*;
use serde::Serialize;

use crate::physics::VehicleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Left,
    Right,
}

impl Lane {
    pub fn as_str(&self) -> &str {
        match self {
            Lane::Left => "left",
            Lane::Right => "right",
        }
    }

    fn side(&self) -> Real {
        match self {
            Lane::Left => 1.0,
            Lane::Right => -1.0,
        }
    }
}

/// Where a vehicle starts, and where it goes back to on reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSlot {
    pub lane: Lane,
    pub row: usize,
    pub pose: Isometry<Real>,
}

#[derive(Debug)]
pub struct SpawnGrid {
    origin: Isometry<Real>,
    lane_offset: Real,
    row_spacing: Real,
    occupied: HashMap<VehicleId, (Lane, usize)>,
}

impl Default for SpawnGrid {
    fn default() -> Self {
        Self::new(Isometry::translation(0.0, 1.0, 0.0), 3.0, 7.0)
    }
}

impl SpawnGrid {
    pub fn new(origin: Isometry<Real>, lane_offset: Real, row_spacing: Real) -> Self {
        Self {
            origin,
            lane_offset,
            row_spacing,
            occupied: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }

    fn lane_count(&self, lane: Lane) -> usize {
        self.occupied.values().filter(|(l, _)| *l == lane).count()
    }

    fn choose_lane(&self) -> Lane {
        if self.lane_count(Lane::Left) <= self.lane_count(Lane::Right) {
            Lane::Left
        } else {
            Lane::Right
        }
    }

    fn free_row(&self, lane: Lane) -> usize {
        (0..)
            .find(|row| !self.occupied.values().any(|&(l, r)| l == lane && r == *row))
            .unwrap_or(0)
    }

    pub fn slot_pose(&self, lane: Lane, row: usize) -> Isometry<Real> {
        let local = Isometry::translation(
            lane.side() * self.lane_offset,
            0.0,
            -(row as Real) * self.row_spacing,
        );
        self.origin * local
    }

    /// Reserves a slot for `vehicle`. Allocating twice returns the held slot.
    pub fn allocate(&mut self, vehicle: VehicleId) -> GridSlot {
        if let Some(slot) = self.slot(vehicle) {
            return slot;
        }

        let lane = self.choose_lane();
        let row = self.free_row(lane);
        self.occupied.insert(vehicle, (lane, row));
        debug!("Grid slot {} row {row} -> vehicle {vehicle}", lane.as_str());

        GridSlot { lane, row, pose: self.slot_pose(lane, row) }
    }

    pub fn slot(&self, vehicle: VehicleId) -> Option<GridSlot> {
        let &(lane, row) = self.occupied.get(&vehicle)?;
        Some(GridSlot { lane, row, pose: self.slot_pose(lane, row) })
    }

    pub fn release(&mut self, vehicle: VehicleId) -> Option<GridSlot> {
        let slot = self.slot(vehicle)?;
        self.occupied.remove(&vehicle);
        Some(slot)
    }
}
