// ==============================================================================
// race.rs — MULTI-VEHICLE SESSION OVER ONE WORLD
// ==============================================================================
// Tick phases:
//   1) every vehicle decides and writes actuation (suspension pass included)
//   2) the world integrates once
//   3) every vehicle reads its pose back and resamples its sensors
//   4) strays (out of bounds or non-finite) are put back on their grid slot
//
// All raycasts of phase 3 run after every write of phase 1, so no vehicle sees
// a half-updated world.
// ==============================================================================

use std::collections::BTreeMap;

use log::{error, info, warn};
use rapier3d::prelude::*;

use crate::car::{VehicleDesc, VehicleEntity};
use crate::config::SimConfig;
use crate::control::HumanInput;
use crate::debug_builders::DebugOverlay;
use crate::error::VehicleError;
use crate::physics::{PhysicsWorld, VehicleId};
use crate::spawn::{GridSlot, SpawnGrid};
use crate::state::{RaceSnapshot, VehicleSnapshot};

pub struct Race {
    config: SimConfig,
    world: PhysicsWorld,
    grid: SpawnGrid,
    vehicles: BTreeMap<VehicleId, VehicleEntity>,
    tick: u64,
}

impl Race {
    pub fn new(config: SimConfig) -> Self {
        Self::with_grid(config, SpawnGrid::default())
    }

    pub fn with_grid(config: SimConfig, grid: SpawnGrid) -> Self {
        let world = PhysicsWorld::new(config.gravity());
        info!("Race created (dt = {:.4}s, bound = {})", config.dt(), config.world_bound);
        Self {
            config,
            world,
            grid,
            vehicles: BTreeMap::new(),
            tick: 0,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// For inserting track geometry.
    pub fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    // --------------------------------------------------
    // Vehicles
    // --------------------------------------------------

    /// Builds the vehicle and places it on the next free grid slot.
    pub fn add_vehicle(&mut self, desc: VehicleDesc) -> Result<VehicleId, VehicleError> {
        let mut vehicle = VehicleEntity::new(&mut self.world, desc, &self.config)?;
        let id = vehicle.id();
        let slot = self.grid.allocate(id);

        if let Err(e) = vehicle.reset(&mut self.world, slot.pose) {
            self.grid.release(id);
            vehicle.despawn(&mut self.world);
            return Err(e);
        }

        info!(
            "Vehicle {id} '{}' on grid ({} lane, row {})",
            vehicle.name(),
            slot.lane.as_str(),
            slot.row
        );
        self.vehicles.insert(id, vehicle);
        Ok(id)
    }

    pub fn remove_vehicle(&mut self, id: VehicleId) -> bool {
        let Some(vehicle) = self.vehicles.remove(&id) else {
            return false;
        };
        self.grid.release(id);
        vehicle.despawn(&mut self.world);
        true
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&VehicleEntity> {
        self.vehicles.get(&id)
    }

    pub fn vehicle_mut(&mut self, id: VehicleId) -> Option<&mut VehicleEntity> {
        self.vehicles.get_mut(&id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleEntity> {
        self.vehicles.values()
    }

    pub fn grid_slot(&self, id: VehicleId) -> Option<GridSlot> {
        self.grid.slot(id)
    }

    /// False when the vehicle is gone or not human-driven.
    pub fn set_human_input(&mut self, id: VehicleId, input: HumanInput) -> bool {
        self.vehicles
            .get_mut(&id)
            .is_some_and(|v| v.set_human_input(input))
    }

    /// Puts a vehicle back on its grid slot, at rest.
    pub fn reset_vehicle(&mut self, id: VehicleId) -> Result<(), VehicleError> {
        let slot = self.grid.slot(id).ok_or(VehicleError::BodyMissing(id))?;
        let vehicle = self.vehicles.get_mut(&id).ok_or(VehicleError::BodyMissing(id))?;
        vehicle.reset(&mut self.world, slot.pose)
    }

    // --------------------------------------------------
    // Tick
    // --------------------------------------------------

    pub fn tick(&mut self) {
        let dt = self.config.dt();

        for vehicle in self.vehicles.values_mut() {
            vehicle.pre_step(&mut self.world, dt);
        }

        self.world.step(dt);

        for vehicle in self.vehicles.values_mut() {
            vehicle.post_step(&self.world);
        }

        self.recover_strays();
        self.tick += 1;
    }

    fn in_bounds(&self, pose: &Isometry<Real>) -> bool {
        let bound = self.config.world_bound;
        let t = pose.translation.vector;
        let r = pose.rotation.coords;
        t.iter().all(|c| c.is_finite() && c.abs() <= bound) && r.iter().all(|c| c.is_finite())
    }

    fn recover_strays(&mut self) {
        let strays: Vec<VehicleId> = self
            .vehicles
            .iter()
            .filter(|(_, v)| !self.in_bounds(&v.pose()))
            .map(|(id, _)| *id)
            .collect();

        for id in strays {
            warn!("Vehicle {id} left the world bounds at tick {}; resetting to grid", self.tick);
            if let Err(e) = self.reset_vehicle(id) {
                error!("Could not reset vehicle {id}: {e}");
            }
        }
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        let mut debug = DebugOverlay::default();
        let vehicles = self
            .vehicles
            .values()
            .map(|v| {
                debug.push_vehicle(v);
                VehicleSnapshot::capture(v, &self.world)
            })
            .collect();

        RaceSnapshot {
            tick: self.tick,
            vehicles,
            debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::{GameVersion, placeholder_car};
    use crate::control::{Controller, RaceNet};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn race() -> Race {
        let mut race = Race::new(SimConfig::default());
        race.world_mut().add_ground(300.0, 0.0);
        race
    }

    fn human(name: &str) -> VehicleDesc {
        VehicleDesc::new(name, GameVersion::Nfs4, placeholder_car(), Controller::human())
    }

    #[test]
    fn vehicles_start_on_distinct_grid_slots() {
        let mut race = race();
        let a = race.add_vehicle(human("a")).unwrap();
        let b = race.add_vehicle(human("b")).unwrap();

        let pa = race.vehicle(a).unwrap().pose();
        let pb = race.vehicle(b).unwrap().pose();
        assert_eq!(pa, race.grid_slot(a).unwrap().pose);
        assert_ne!(pa.translation, pb.translation);
        assert_eq!(race.len(), 2);
    }

    #[test]
    fn tick_advances_every_vehicle_once() {
        let mut race = race();
        let a = race.add_vehicle(human("a")).unwrap();
        let mut learned = VehicleDesc::new(
            "b",
            GameVersion::Nfs4,
            placeholder_car(),
            Controller::learned(RaceNet::random(&mut StdRng::seed_from_u64(5))),
        );
        learned.population_id = Some(2);
        let b = race.add_vehicle(learned).unwrap();

        assert!(race.set_human_input(a, HumanInput { accelerate: true, ..HumanInput::default() }));
        assert!(!race.set_human_input(b, HumanInput::default()));

        for _ in 0..30 {
            race.tick();
        }
        assert_eq!(race.tick_count(), 30);
        assert_eq!(race.vehicle(a).unwrap().actuation().engine_force, 3000.0);

        let snapshot = race.snapshot();
        assert_eq!(snapshot.tick, 30);
        assert_eq!(snapshot.vehicles.len(), 2);
        assert_eq!(snapshot.vehicles[1].population_id, Some(2));
        assert_eq!(snapshot.vehicles[0].parts.len(), 6);
        assert_eq!(snapshot.debug.wheels.len(), 8);
        assert_eq!(snapshot.debug.sensor_rays.len(), 8);
    }

    #[test]
    fn stray_vehicles_return_to_their_slot() {
        let mut race = race();
        let id = race.add_vehicle(human("stray")).unwrap();
        let home = race.grid_slot(id).unwrap().pose;

        let far = Isometry::translation(5_000.0, 10.0, 0.0);
        let world = &mut race.world;
        race.vehicles.get_mut(&id).unwrap().set_pose(world, far).unwrap();
        race.tick();

        let pose = race.vehicle(id).unwrap().pose();
        assert!((pose.translation.vector - home.translation.vector).norm() < 1e-4);
        let v = race.vehicle(id).unwrap().linvel(race.world()).unwrap();
        assert_eq!(v, Vector::zeros());
    }

    #[test]
    fn removed_vehicles_free_body_and_slot() {
        let mut race = race();
        let a = race.add_vehicle(human("a")).unwrap();
        let slot = race.grid_slot(a).unwrap();
        assert!(race.remove_vehicle(a));
        assert!(!race.remove_vehicle(a));
        assert_eq!(race.world().vehicle_count(), 0);
        assert!(race.grid_slot(a).is_none());

        let b = race.add_vehicle(human("b")).unwrap();
        assert_eq!(race.grid_slot(b).unwrap().pose, slot.pose);
    }

    #[test]
    fn bad_vehicle_leaves_the_race_untouched() {
        let mut race = race();
        let desc = VehicleDesc::new("nope", GameVersion::Nfs5, placeholder_car(), Controller::human());
        assert!(matches!(race.add_vehicle(desc), Err(VehicleError::UnsupportedVersion(GameVersion::Nfs5))));
        assert!(race.is_empty());
        assert_eq!(race.world().vehicle_count(), 0);
    }
}
