// ==============================================================================
// body.rs — CHASSIS RIGID BODY
// ==============================================================================
// Builds the chassis from the body part:
// - cuboid bounding the body geometry
// - wrapped in a compound shape, shifted by a per-version COM offset
// - mass fixed by config, inertia taken from the compound shape
// - seeded from the body part's initial pose
//
// The chassis collides with the track and other chassis. It is registered in
// the world's vehicle registry; the handle pair is released by `despawn`.
// ==============================================================================

use rapier3d::parry::mass_properties::MassProperties;
use rapier3d::prelude::*;

use super::parts::{GameVersion, MeshPart};
use crate::config::ChassisConfig;
use crate::error::VehicleError;
use crate::physics::{GROUP_TRACK, GROUP_VEHICLE, PhysicsWorld, VehicleId};

const MIN_HALF_EXTENT: Real = 0.01;

/// Shift of the collision shape relative to the chassis origin.
pub fn com_offset(version: GameVersion) -> Vector<Real> {
    match version {
        GameVersion::Nfs3 | GameVersion::Nfs4 => vector![0.0, 0.0, 0.0],
        GameVersion::Nfs3Ps1 => vector![0.0, 0.1, 0.0],
        _ => vector![0.0, 0.05, 0.0],
    }
}

#[derive(Debug)]
pub struct VehicleBody {
    id: VehicleId,
    handle: RigidBodyHandle,
    collider: ColliderHandle,
    half_extents: Vector<Real>,
    shape_offset: Vector<Real>,
    linear_damping: Real,
    angular_damping: Real,
}

impl VehicleBody {
    pub fn build(
        world: &mut PhysicsWorld,
        body_part: &MeshPart,
        version: GameVersion,
        config: &ChassisConfig,
    ) -> Result<Self, VehicleError> {
        let aabb = body_part
            .bounding_box()
            .ok_or_else(|| VehicleError::EmptyGeometry(body_part.name.clone()))?;

        let half = aabb.half_extents().map(|h| h.max(MIN_HALF_EXTENT));
        let shape_offset = aabb.center().coords + com_offset(version);

        let shape = SharedShape::compound(vec![(
            Isometry::translation(shape_offset.x, shape_offset.y, shape_offset.z),
            SharedShape::cuboid(half.x, half.y, half.z),
        )]);

        // Fixed mass, centered on the chassis origin; inertia scaled from the
        // shape's own distribution.
        let shape_props = shape.mass_properties(1.0);
        let scale = config.mass / shape_props.mass().max(Real::EPSILON);
        let props = MassProperties::with_principal_inertia_frame(
            Point::origin(),
            config.mass,
            shape_props.principal_inertia() * scale,
            shape_props.principal_inertia_local_frame,
        );

        let rb = RigidBodyBuilder::dynamic()
            .position(*body_part.initial_pose())
            .linear_damping(config.linear_damping)
            .angular_damping(config.angular_damping)
            .ccd_enabled(true)
            .build();

        let collider = ColliderBuilder::new(shape)
            .mass_properties(props)
            .collision_groups(InteractionGroups::new(GROUP_VEHICLE, GROUP_TRACK | GROUP_VEHICLE))
            .friction(config.friction)
            .restitution(0.0)
            .build();

        let (id, handle, collider) = world.insert_vehicle_body(rb, collider);

        Ok(Self {
            id,
            handle,
            collider,
            half_extents: half,
            shape_offset,
            linear_damping: config.linear_damping,
            angular_damping: config.angular_damping,
        })
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn handle(&self) -> RigidBodyHandle {
        self.handle
    }

    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    pub fn half_extents(&self) -> Vector<Real> {
        self.half_extents
    }

    /// Center of the collision box in chassis space.
    pub fn shape_offset(&self) -> Vector<Real> {
        self.shape_offset
    }

    pub fn pose(&self, world: &PhysicsWorld) -> Option<Isometry<Real>> {
        world.bodies.get(self.handle).map(|b| *b.position())
    }

    pub fn linvel(&self, world: &PhysicsWorld) -> Option<Vector<Real>> {
        world.bodies.get(self.handle).map(|b| *b.linvel())
    }

    pub fn angvel(&self, world: &PhysicsWorld) -> Option<Vector<Real>> {
        world.bodies.get(self.handle).map(|b| *b.angvel())
    }

    pub fn mass(&self, world: &PhysicsWorld) -> Option<Real> {
        world.bodies.get(self.handle).map(|b| b.mass())
    }

    /// Teleport. Velocities are left alone; see `reset` for a full stop.
    pub fn set_pose(&self, world: &mut PhysicsWorld, pose: Isometry<Real>) -> Result<(), VehicleError> {
        let body = world
            .bodies
            .get_mut(self.handle)
            .ok_or(VehicleError::BodyMissing(self.id))?;
        body.set_position(pose, true);
        world.refresh_queries();
        Ok(())
    }

    /// Teleport and clear every force and velocity on the chassis.
    pub fn reset(&self, world: &mut PhysicsWorld, pose: Isometry<Real>) -> Result<(), VehicleError> {
        let body = world
            .bodies
            .get_mut(self.handle)
            .ok_or(VehicleError::BodyMissing(self.id))?;
        body.set_position(pose, true);
        body.set_linvel(Vector::zeros(), true);
        body.set_angvel(Vector::zeros(), true);
        body.reset_forces(true);
        body.reset_torques(true);
        world.refresh_queries();
        Ok(())
    }

    /// Re-applies the configured damping constants.
    pub fn apply_damping(&self, world: &mut PhysicsWorld) {
        if let Some(body) = world.bodies.get_mut(self.handle) {
            body.set_linear_damping(self.linear_damping);
            body.set_angular_damping(self.angular_damping);
        }
    }

    pub fn despawn(self, world: &mut PhysicsWorld) {
        world.remove_vehicle_body(self.handle);
    }
}
