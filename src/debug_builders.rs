// ==============================================================================
// debug_builders.rs — DEBUG OVERLAY PRIMITIVES (SERVER -> CLIENT)
// ------------------------------------------------------------------------------
// Defines serializable debug primitives:
// - DebugRay: sensor raycasts
// - DebugWheel: per-wheel numeric state (grounded, compression, drive)
// - DebugChassis: collision box of each chassis
//
// Helpers:
// - push_sensor_rays(): copies the last sensor sample into the overlay
// - push_wheel_debug(): pushes DebugWheel snapshots into DebugOverlay
// - push_chassis(): pushes the chassis collision box
//
// This file is purely visualization scaffolding and should not contain physics
// side effects.
// ==============================================================================

use rapier3d::prelude::*;
use serde::Serialize;

use crate::car::{SensorRayKind, VehicleEntity, WheelId};
use crate::physics::{VehicleId, p3, q4, v3};

const RAY_CLEAR: [f32; 3] = [0.2, 0.9, 0.2];
const RAY_HIT: [f32; 3] = [0.95, 0.2, 0.2];

#[derive(Debug, Clone, Default, Serialize)]
pub struct DebugOverlay {
    pub chassis: Vec<DebugChassis>,
    pub sensor_rays: Vec<DebugRay>,
    pub wheels: Vec<DebugWheel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugRay {
    pub vehicle: VehicleId,
    pub kind: SensorRayKind,
    pub origin: [f32; 3],
    pub direction: [f32; 3],
    pub length: f32,
    pub hit: Option<[f32; 3]>,
    pub tip: [f32; 3],
    pub color: [f32; 3],
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugChassis {
    pub vehicle: VehicleId,
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quaternion
    pub half_extents: [f32; 3],
}

impl DebugOverlay {
    pub fn clear(&mut self) {
        self.chassis.clear();
        self.sensor_rays.clear();
        self.wheels.clear();
    }

    /// Everything the overlay shows for one vehicle.
    pub fn push_vehicle(&mut self, vehicle: &VehicleEntity) {
        push_chassis(self, vehicle);
        push_sensor_rays(self, vehicle);
        for id in WheelId::ALL {
            push_wheel_debug(self, vehicle, id);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugWheel {
    pub vehicle: VehicleId,
    pub id: WheelId,

    pub center: [f32; 3],           // in world space
    pub radius: f32,
    pub grounded: bool,
    pub compression: f32,           // rest length minus current length
    pub steer: f32,
    pub steering: bool,
    pub drive: bool,
    pub engine_force: f32,
    pub brake: f32,
}

pub fn push_chassis(overlay: &mut DebugOverlay, vehicle: &VehicleEntity) {
    let body = vehicle.body();
    let offset = body.shape_offset();
    let pose = vehicle.pose() * Isometry::translation(offset.x, offset.y, offset.z);
    overlay.chassis.push(DebugChassis {
        vehicle: vehicle.id(),
        position: v3(pose.translation.vector),
        rotation: q4(pose.rotation),
        half_extents: v3(body.half_extents()),
    });
}

pub fn push_sensor_rays(overlay: &mut DebugOverlay, vehicle: &VehicleEntity) {
    for ray in vehicle.sensor().rays() {
        overlay.sensor_rays.push(DebugRay {
            vehicle: vehicle.id(),
            kind: ray.kind,
            origin: p3(ray.origin),
            direction: v3(ray.direction),
            length: ray.distance,
            hit: ray.hit.map(p3),
            tip: p3(ray.tip),
            color: if ray.hit.is_some() { RAY_HIT } else { RAY_CLEAR },
        });
    }
}

pub fn push_wheel_debug(overlay: &mut DebugOverlay, vehicle: &VehicleEntity, id: WheelId) {
    let rig = vehicle.rig();
    let center = rig.wheel_pose(id, &vehicle.pose()).translation.vector;
    let rest = rig.rest_length();

    overlay.wheels.push(DebugWheel {
        vehicle: vehicle.id(),
        id,
        center: v3(center),
        radius: rig.dimensions().radius,
        grounded: rig.in_contact(id),
        compression: rest - rig.suspension_length(id),
        steer: rig.steering_angles()[id],
        steering: id.is_front(),
        drive: id.is_rear(),
        engine_force: rig.engine_forces()[id],
        brake: rig.brakes()[id],
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::{GameVersion, VehicleDesc, placeholder_car};
    use crate::config::SimConfig;
    use crate::control::Controller;
    use crate::physics::PhysicsWorld;

    #[test]
    fn overlay_covers_chassis_rays_and_wheels() {
        let mut world = PhysicsWorld::new(vector![0.0, -9.81, 0.0]);
        world.add_ground(100.0, 0.0);
        world.add_track_box(point![0.0, 1.0, 20.0], vector![10.0, 3.0, 1.0]);

        let desc = VehicleDesc::new("overlay", GameVersion::Nfs4, placeholder_car(), Controller::human());
        let mut car = VehicleEntity::new(&mut world, desc, &SimConfig::default()).unwrap();
        car.reset(&mut world, Isometry::translation(0.0, 1.0, 0.0)).unwrap();

        let mut overlay = DebugOverlay::default();
        overlay.push_vehicle(&car);

        assert_eq!(overlay.chassis.len(), 1);
        assert_eq!(overlay.sensor_rays.len(), 4);
        assert_eq!(overlay.wheels.len(), 4);

        let forward = overlay.sensor_rays.iter().find(|r| r.kind == SensorRayKind::Forward).unwrap();
        assert!(forward.hit.is_some());
        assert_eq!(forward.color, RAY_HIT);
        let up = overlay.sensor_rays.iter().find(|r| r.kind == SensorRayKind::Up).unwrap();
        assert!(up.hit.is_none());

        assert!(overlay.wheels.iter().filter(|w| w.drive).all(|w| w.id.is_rear()));

        overlay.clear();
        assert!(overlay.wheels.is_empty() && overlay.sensor_rays.is_empty());
    }
}
