// src/physics.rs
// ==============================================================================
// physics.rs — SHARED RAPIER WORLD + VEHICLE REGISTRY
// ------------------------------------------------------------------------------
// Owns every rapier set. Vehicles never hold a pointer back into the world:
// a chassis body is registered under a VehicleId, and raycast hits resolve
// the logical vehicle through that registry.
//
// Collision groups:
// - GROUP_TRACK:   static track geometry (ground, walls, meshes)
// - GROUP_VEHICLE: chassis colliders; collide with the track and each other
// ==============================================================================

use std::collections::HashMap;
use std::fmt;

use log::{debug, info};
use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

pub const GROUP_TRACK: Group = Group::from_bits_truncate(0b0001);
pub const GROUP_VEHICLE: Group = Group::from_bits_truncate(0b0010);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub u32);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub point: Point<Real>,
    pub distance: Real,
    pub collider: ColliderHandle,
    /// Set when the collider belongs to a registered vehicle chassis.
    pub vehicle: Option<VehicleId>,
}

#[inline] pub fn v3(v: Vector<Real>) -> [f32; 3] { [v.x, v.y, v.z] }
#[inline] pub fn p3(p: Point<Real>)  -> [f32; 3] { [p.x, p.y, p.z] }
#[inline] pub fn q4(r: Rotation<Real>) -> [f32; 4] { [r.i, r.j, r.k, r.w] }

pub struct PhysicsWorld {
    pub gravity: Vector<Real>, // gravity vector
    pub pipeline: PhysicsPipeline, // physics pipeline
    pub island_manager: IslandManager, // manages islands of bodies
    pub broad_phase: DefaultBroadPhase, // broad-phase collision detection
    pub narrow_phase: NarrowPhase, // collision detection
    pub bodies: RigidBodySet, // for rigid bodies
    pub colliders: ColliderSet, // for collision shapes
    pub joints: ImpulseJointSet, // for constraints
    pub multibody_joints: MultibodyJointSet,// for articulated bodies
    pub ccd: CCDSolver, // continuous collision detection
    pub query_pipeline: QueryPipeline, // for raycasting
    track_body: RigidBodyHandle, // fixed body carrying all track colliders
    body_to_vehicle: HashMap<RigidBodyHandle, VehicleId>, // chassis handle → vehicle
    next_vehicle: u32,
}

impl PhysicsWorld {
    pub fn new(gravity: Vector<Real>) -> Self {
        let mut bodies = RigidBodySet::new();
        let track_body = bodies.insert(RigidBodyBuilder::fixed().build());

        Self {
            gravity,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders: ColliderSet::new(),
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            track_body,
            body_to_vehicle: HashMap::new(),
            next_vehicle: 0,
        }
    }

    // --------------------------------------------------
    // Track geometry
    // --------------------------------------------------

    fn track_collider(builder: ColliderBuilder) -> Collider {
        builder
            .collision_groups(InteractionGroups::new(GROUP_TRACK, Group::ALL))
            .friction(1.0)
            .restitution(0.0)
            .build()
    }

    fn insert_track(&mut self, collider: Collider) -> ColliderHandle {
        let handle = self
            .colliders
            .insert_with_parent(collider, self.track_body, &mut self.bodies);
        self.refresh_queries();
        handle
    }

    /// Large flat slab whose top surface sits at `height`.
    pub fn add_ground(&mut self, half_extent: Real, height: Real) -> ColliderHandle {
        let collider = Self::track_collider(
            ColliderBuilder::cuboid(half_extent, 1.0, half_extent)
                .translation(vector![0.0, height - 1.0, 0.0]),
        );
        let handle = self.insert_track(collider);
        info!(
            "Ground inserted at y = {height}. Bodies = {}, Colliders = {}",
            self.bodies.len(),
            self.colliders.len()
        );
        handle
    }

    /// Static box obstacle (walls, barriers).
    pub fn add_track_box(&mut self, center: Point<Real>, half_extents: Vector<Real>) -> ColliderHandle {
        let collider = Self::track_collider(
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
                .translation(center.coords),
        );
        self.insert_track(collider)
    }

    /// Triangle soup handed over by the asset collaborator.
    pub fn add_track_mesh(&mut self, vertices: Vec<Point<Real>>, indices: Vec<[u32; 3]>) -> ColliderHandle {
        let triangles = indices.len();
        let collider = Self::track_collider(ColliderBuilder::trimesh(vertices, indices));
        let handle = self.insert_track(collider);
        info!("Track mesh inserted ({triangles} triangles)");
        handle
    }

    // --------------------------------------------------
    // Vehicle registry
    // --------------------------------------------------

    /// Inserts a chassis body + collider and registers it under a fresh id.
    pub fn insert_vehicle_body(
        &mut self,
        body: RigidBody,
        collider: Collider,
    ) -> (VehicleId, RigidBodyHandle, ColliderHandle) {
        let id = VehicleId(self.next_vehicle);
        self.next_vehicle += 1;

        let handle = self.bodies.insert(body);
        let collider = self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
        self.body_to_vehicle.insert(handle, id);
        self.refresh_queries();

        debug!("Registered vehicle {id} (body = {handle:?})");
        (id, handle, collider)
    }

    /// Removes a chassis and its colliders. Returns false if it was already gone.
    pub fn remove_vehicle_body(&mut self, handle: RigidBodyHandle) -> bool {
        let id = self.body_to_vehicle.remove(&handle);
        let removed = self
            .bodies
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some();
        self.refresh_queries();

        if let Some(id) = id {
            debug!("Unregistered vehicle {id} (body = {handle:?})");
        }
        removed
    }

    pub fn vehicle_for_body(&self, handle: RigidBodyHandle) -> Option<VehicleId> {
        self.body_to_vehicle.get(&handle).copied()
    }

    pub fn vehicle_for_collider(&self, handle: ColliderHandle) -> Option<VehicleId> {
        let parent = self.colliders.get(handle)?.parent()?;
        self.vehicle_for_body(parent)
    }

    pub fn vehicle_count(&self) -> usize {
        self.body_to_vehicle.len()
    }

    // --------------------------------------------------
    // Queries
    // --------------------------------------------------

    /// Brings the query pipeline in line with bodies moved outside a step.
    pub fn refresh_queries(&mut self) {
        self.query_pipeline.update(&self.colliders);
    }

    /// Ray test from `origin` to `destination` against colliders whose
    /// membership intersects `mask`. Only fixed bodies are considered when
    /// `fixed_only` is set.
    pub fn cast_segment(
        &self,
        origin: Point<Real>,
        destination: Point<Real>,
        mask: Group,
        fixed_only: bool,
    ) -> Option<RayHit> {
        let dir = destination - origin;
        let length = dir.norm();
        if length <= Real::EPSILON {
            return None;
        }

        let base = if fixed_only { QueryFilter::only_fixed() } else { QueryFilter::default() };
        let filter = base.groups(InteractionGroups::new(Group::ALL, mask));
        let ray = Ray::new(origin, dir / length);

        let (collider, toi) = self.query_pipeline.cast_ray(
            &self.bodies,
            &self.colliders,
            &ray,
            length,
            true,
            filter,
        )?;

        let point = ray.point_at(toi);
        Some(RayHit {
            point,
            distance: (point - origin).norm(),
            collider,
            vehicle: self.vehicle_for_collider(collider),
        })
    }

    // --------------------------------------------------
    // Integration
    // --------------------------------------------------

    pub fn step(&mut self, dt: Real) {
        let hooks = ();
        let events = ();

        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters {
                dt,
                ..IntegrationParameters::default()
            },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &hooks,
            &events,
        );
    }
}
