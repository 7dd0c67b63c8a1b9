// ==============================================================================
// entity.rs — VEHICLE ENTITY (COMPOSITION ROOT)
// ==============================================================================
// Owns one chassis, one wheel rig, one sensor, one controller and the posed
// mesh parts of a single car.
//
// Tick order (single vehicle):
//   1) controller decides from the PREVIOUS tick's sensor reading
//   2) actuation written to the rig, suspension pass against the world
//   3) world integrates once
//   4) chassis pose read back, parts re-posed
//   5) sensor resampled for the next tick
//
// Control therefore lags perception by exactly one tick. `pre_step` and
// `post_step` expose the halves separately so a Race can run every vehicle's
// writes before any vehicle's raycasts.
//
// Frames: the body part defines the chassis frame, and the chassis spawns at
// the body part's initial pose. Wheel and misc parts are mounted at their
// initial pose expressed in the body part's frame, so the rest layout of the
// car survives whatever offset the asset gives its body.
// ==============================================================================

use log::{debug, info, warn};
use rapier3d::parry::bounding_volume::Aabb;
use rapier3d::prelude::*;

use super::body::VehicleBody;
use super::classify::{Role, RoleAssignment, classify};
use super::parts::{GameVersion, MeshPart, WheelId, WheelSlots};
use super::rig::{ActuationState, WheelDimensions, WheelRig};
use super::sensor::{EnvironmentSensor, SensorReading};
use crate::config::SimConfig;
use crate::control::{ActuationCommand, Controller, HumanInput};
use crate::error::VehicleError;
use crate::physics::{PhysicsWorld, VehicleId};

/// Everything needed to build one vehicle.
#[derive(Debug, Clone)]
pub struct VehicleDesc {
    pub name: String,
    pub version: GameVersion,
    pub parts: Vec<MeshPart>,
    pub controller: Controller,
    /// Tag owned by the training orchestrator; carried for reporting only.
    pub population_id: Option<u32>,
}

impl VehicleDesc {
    pub fn new(name: impl Into<String>, version: GameVersion, parts: Vec<MeshPart>, controller: Controller) -> Self {
        Self {
            name: name.into(),
            version,
            parts,
            controller,
            population_id: None,
        }
    }
}

pub struct VehicleEntity {
    name: String,
    version: GameVersion,
    population_id: Option<u32>,

    body: VehicleBody,
    rig: WheelRig,
    sensor: EnvironmentSensor,
    controller: Controller,

    body_part: MeshPart,
    wheel_parts: WheelSlots<Option<MeshPart>>,
    misc_parts: Vec<MeshPart>,
    misc_offsets: Vec<Isometry<Real>>,

    command: ActuationCommand,
    pose: Isometry<Real>,
    detached: bool,
}

impl VehicleEntity {
    /// Classifies the parts, builds the chassis and rig, and takes a first
    /// sensor reading. Nothing is left in the world on error.
    pub fn new(world: &mut PhysicsWorld, desc: VehicleDesc, config: &SimConfig) -> Result<Self, VehicleError> {
        let VehicleDesc { name, version, mut parts, controller, population_id } = desc;

        let roles = classify(&parts, version)?;
        check_roles(&name, &roles, config.require_all_wheels)?;
        for (part, enabled) in parts.iter_mut().zip(&roles.enabled) {
            part.enabled = *enabled;
        }

        let part_at = |index: Option<usize>, role: Role| {
            index
                .and_then(|i| parts.get(i).cloned())
                .ok_or_else(|| VehicleError::MissingRole { vehicle: name.clone(), role })
        };
        let body_part = part_at(roles.body, Role::Body)?;
        let front_left = part_at(roles.wheels[WheelId::FL], Role::Wheel(WheelId::FL))?;

        let dimensions = wheel_dimensions(&front_left)?;
        let body_box = body_part
            .bounding_box()
            .ok_or_else(|| VehicleError::EmptyGeometry(body_part.name.clone()))?;
        let hardpoints = wheel_hardpoints(&roles, &parts, &body_part, &body_box, dimensions);

        let body = VehicleBody::build(world, &body_part, version, &config.chassis)?;
        body.apply_damping(world);
        let rig = WheelRig::attach(
            &body,
            hardpoints,
            dimensions,
            &config.suspension,
            &config.steering,
            &config.drivetrain,
        );

        let wheel_parts = roles.wheels.map(|_, index| index.and_then(|i| parts.get(i).cloned()));
        let misc_parts: Vec<MeshPart> = roles
            .misc
            .iter()
            .filter_map(|m| parts.get(m.index).cloned())
            .collect();
        let misc_offsets = misc_parts.iter().map(|p| p.offset_from(&body_part)).collect();

        let pose = *body_part.initial_pose();
        let mut entity = Self {
            name,
            version,
            population_id,
            body,
            rig,
            sensor: EnvironmentSensor::new(&config.sensor),
            controller,
            body_part,
            wheel_parts,
            misc_parts,
            misc_offsets,
            command: ActuationCommand::default(),
            pose,
            detached: false,
        };
        entity.sync_parts(&pose);
        entity.sensor.sample(&pose, world);

        info!(
            "Spawned vehicle {} '{}' ({}, {} controller, {} misc parts)",
            entity.id(),
            entity.name,
            version,
            entity.controller.kind(),
            entity.misc_parts.len()
        );
        Ok(entity)
    }

    // --------------------------------------------------
    // Tick
    // --------------------------------------------------

    /// Phases 1–2: decide from the last reading, drive the wheels.
    pub fn pre_step(&mut self, world: &mut PhysicsWorld, dt: Real) {
        let reading = self.sensor.reading();
        self.command = self.controller.actuate(&reading);
        self.rig.apply(&self.command);
        self.rig.update(world, dt);
    }

    /// Phases 4–5: read the integrated pose back, re-pose parts, resample.
    /// Only reads the world.
    pub fn post_step(&mut self, world: &PhysicsWorld) {
        let Some(pose) = self.body.pose(world) else {
            if !self.detached {
                warn!("Vehicle {} '{}' lost its chassis body; pose frozen", self.id(), self.name);
                self.detached = true;
            }
            return;
        };
        self.sync_parts(&pose);
        self.sensor.sample(&pose, world);
    }

    /// One full tick for a vehicle that owns the world step.
    pub fn tick(&mut self, world: &mut PhysicsWorld, dt: Real) {
        self.pre_step(world, dt);
        world.step(dt);
        self.post_step(world);
    }

    /// Teleport with all motion cleared. Suspension, steering and drive start
    /// from rest; sensors are resampled at the new pose.
    pub fn reset(&mut self, world: &mut PhysicsWorld, pose: Isometry<Real>) -> Result<(), VehicleError> {
        self.body.reset(world, pose)?;
        self.body.apply_damping(world);
        self.rig.reset();
        self.command = ActuationCommand::default();
        self.sync_parts(&pose);
        self.sensor.reset();
        self.sensor.sample(&pose, world);
        debug!("Vehicle {} reset to {:?}", self.id(), pose.translation.vector);
        Ok(())
    }

    /// Teleport keeping current velocities.
    pub fn set_pose(&mut self, world: &mut PhysicsWorld, pose: Isometry<Real>) -> Result<(), VehicleError> {
        self.body.set_pose(world, pose)?;
        self.sync_parts(&pose);
        Ok(())
    }

    pub fn despawn(self, world: &mut PhysicsWorld) {
        info!("Despawned vehicle {} '{}'", self.id(), self.name);
        self.body.despawn(world);
    }

    fn sync_parts(&mut self, chassis: &Isometry<Real>) {
        self.pose = *chassis;
        self.body_part.pose = *chassis;
        for (part, offset) in self.misc_parts.iter_mut().zip(&self.misc_offsets) {
            part.attach_to(chassis, offset);
        }
        for id in WheelId::ALL {
            if let Some(part) = self.wheel_parts[id].as_mut() {
                part.pose = self.rig.wheel_pose(id, chassis);
            }
        }
    }

    // --------------------------------------------------
    // Accessors
    // --------------------------------------------------

    pub fn id(&self) -> VehicleId {
        self.body.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> GameVersion {
        self.version
    }

    pub fn population_id(&self) -> Option<u32> {
        self.population_id
    }

    pub fn set_population_id(&mut self, id: Option<u32>) {
        self.population_id = id;
    }

    /// Chassis pose as of the last sync.
    pub fn pose(&self) -> Isometry<Real> {
        self.pose
    }

    /// Heading about the up axis, degrees; 0 faces +Z.
    pub fn yaw_degrees(&self) -> Real {
        let forward = self.pose.rotation * Vector::z();
        forward.x.atan2(forward.z).to_degrees()
    }

    pub fn linvel(&self, world: &PhysicsWorld) -> Option<Vector<Real>> {
        self.body.linvel(world)
    }

    pub fn angvel(&self, world: &PhysicsWorld) -> Option<Vector<Real>> {
        self.body.angvel(world)
    }

    pub fn mass(&self, world: &PhysicsWorld) -> Option<Real> {
        self.body.mass(world)
    }

    pub fn sensors(&self) -> SensorReading {
        self.sensor.reading()
    }

    pub fn sensor(&self) -> &EnvironmentSensor {
        &self.sensor
    }

    pub fn command(&self) -> ActuationCommand {
        self.command
    }

    pub fn actuation(&self) -> ActuationState {
        self.rig.actuation()
    }

    pub fn rig(&self) -> &WheelRig {
        &self.rig
    }

    pub fn body(&self) -> &VehicleBody {
        &self.body
    }

    pub fn wheel_dimensions(&self) -> WheelDimensions {
        self.rig.dimensions()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn set_human_input(&mut self, input: HumanInput) -> bool {
        self.controller.set_human_input(input)
    }

    pub fn body_part(&self) -> &MeshPart {
        &self.body_part
    }

    pub fn wheel_part(&self, id: WheelId) -> Option<&MeshPart> {
        self.wheel_parts[id].as_ref()
    }

    /// Every renderable part: body, wheels, then misc.
    pub fn parts(&self) -> impl Iterator<Item = &MeshPart> {
        std::iter::once(&self.body_part)
            .chain(self.wheel_parts.0.iter().flatten())
            .chain(self.misc_parts.iter())
    }
}

fn check_roles(name: &str, roles: &RoleAssignment, require_all_wheels: bool) -> Result<(), VehicleError> {
    for role in roles.missing_roles() {
        let required = matches!(role, Role::Body | Role::Wheel(WheelId::FL)) || require_all_wheels;
        if required {
            return Err(VehicleError::MissingRole { vehicle: name.to_string(), role });
        }
        warn!("Vehicle '{name}' has no part for {role}; that wheel will not be drawn");
    }
    Ok(())
}

/// Radius from the front-left wheel's depth, width from its lateral extent.
fn wheel_dimensions(front_left: &MeshPart) -> Result<WheelDimensions, VehicleError> {
    let aabb = front_left
        .bounding_box()
        .ok_or_else(|| VehicleError::EmptyGeometry(front_left.name.clone()))?;
    let half = aabb.half_extents();
    let dims = WheelDimensions { radius: half.z, width: half.x * 2.0 };

    if !(dims.radius > 0.0 && dims.width > 0.0) {
        return Err(VehicleError::DegenerateWheel {
            part: front_left.name.clone(),
            radius: dims.radius,
            width: dims.width,
        });
    }
    Ok(dims)
}

/// Chassis-space suspension mount per wheel. A wheel with its own part mounts
/// at that part's center, seen from the body part; a shared or missing wheel
/// part falls back to the body box corners.
fn wheel_hardpoints(
    roles: &RoleAssignment,
    parts: &[MeshPart],
    body_part: &MeshPart,
    body_box: &Aabb,
    dims: WheelDimensions,
) -> WheelSlots<Point<Real>> {
    let center = body_box.center();
    let half = body_box.half_extents();
    let inset_x = (half.x - dims.width * 0.5).max(0.0);
    let inset_z = (half.z - dims.radius).max(0.0);

    WheelSlots::from_fn(|id| {
        let own = roles.wheels[id]
            .filter(|_| !roles.shares_wheel_part(id))
            .and_then(|i| parts.get(i))
            .and_then(|p| p.bounding_box().map(|b| p.offset_from(body_part) * b.center()));

        own.unwrap_or_else(|| {
            let sx = if id.is_left() { 1.0 } else { -1.0 };
            let sz = if id.is_front() { 1.0 } else { -1.0 };
            point![center.x + sx * inset_x, body_box.mins.y, center.z + sz * inset_z]
        })
    })
}
