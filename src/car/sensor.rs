// ==============================================================================
// sensor.rs — RAYCAST ENVIRONMENT SENSOR
// ==============================================================================
// Four rays from the chassis origin, built from the chassis basis:
//
//   forward = +Z            up    = +Y
//   right   = forward + R   left  = forward - R      (R = chassis right, -X)
//
// Only fixed bodies in GROUP_TRACK are hit. Other vehicles are ghosted so a
// controller's perception never depends on where opponents are.
//
// A miss reports the cast distance itself ("clear"), never infinity.
// ==============================================================================

use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SensorConfig;
use crate::physics::{GROUP_TRACK, PhysicsWorld};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub forward: Real,
    pub up: Real,
    pub left: Real,
    pub right: Real,
}

impl SensorReading {
    /// Every ray clear.
    pub fn clear(cast_distance: Real) -> Self {
        Self {
            forward: cast_distance,
            up: cast_distance,
            left: cast_distance,
            right: cast_distance,
        }
    }

    /// Inputs in the order the learned controller expects.
    pub fn controller_inputs(&self) -> [Real; 3] {
        [self.left, self.right, self.forward]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorRayKind {
    Forward,
    Up,
    Left,
    Right,
}

/// One ray of the last sample, kept for on-screen diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct SensorRay {
    pub kind: SensorRayKind,
    pub origin: Point<Real>,
    pub direction: Vector<Real>,
    /// Point one unit offset along the ray, drawn by the renderer.
    pub tip: Point<Real>,
    pub hit: Option<Point<Real>>,
    pub distance: Real,
}

#[derive(Debug, Clone)]
pub struct EnvironmentSensor {
    config: SensorConfig,
    reading: SensorReading,
    rays: Vec<SensorRay>,
}

impl EnvironmentSensor {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            config: *config,
            reading: SensorReading::clear(config.cast_distance),
            rays: Vec::with_capacity(4),
        }
    }

    pub fn cast_distance(&self) -> Real {
        self.config.cast_distance
    }

    /// Last sampled reading.
    pub fn reading(&self) -> SensorReading {
        self.reading
    }

    pub fn rays(&self) -> &[SensorRay] {
        &self.rays
    }

    pub fn sample(&mut self, chassis: &Isometry<Real>, world: &PhysicsWorld) -> SensorReading {
        let origin = Point::from(chassis.translation.vector);
        let forward = chassis.rotation * Vector::z();
        let up = chassis.rotation * Vector::y();
        let right = chassis.rotation * -Vector::x();

        let directions = [
            (SensorRayKind::Forward, forward),
            (SensorRayKind::Up, up),
            (SensorRayKind::Left, forward - right),
            (SensorRayKind::Right, forward + right),
        ];

        let max = self.config.cast_distance;
        let mut reading = SensorReading::clear(max);
        self.rays.clear();

        for (kind, dir) in directions {
            let dir = dir.normalize();
            let destination = origin + dir * max;
            let hit = world.cast_segment(origin, destination, GROUP_TRACK, true);
            let distance = hit.map_or(max, |h| h.distance.min(max));

            match kind {
                SensorRayKind::Forward => reading.forward = distance,
                SensorRayKind::Up => reading.up = distance,
                SensorRayKind::Left => reading.left = distance,
                SensorRayKind::Right => reading.right = distance,
            }

            self.rays.push(SensorRay {
                kind,
                origin,
                direction: dir,
                tip: origin + dir * self.config.unit_offset,
                hit: hit.map(|h| h.point),
                distance,
            });
        }

        self.reading = reading;
        reading
    }

    /// Forgets the last reading, e.g. after a teleport.
    pub fn reset(&mut self) {
        self.reading = SensorReading::clear(self.config.cast_distance);
        self.rays.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{GROUP_VEHICLE, PhysicsWorld};

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(vector![0.0, -9.81, 0.0])
    }

    fn config() -> SensorConfig {
        SensorConfig { cast_distance: 50.0, unit_offset: 1.0 }
    }

    #[test]
    fn open_space_reports_sentinel_everywhere() {
        let world = world();
        let mut sensor = EnvironmentSensor::new(&config());
        let reading = sensor.sample(&Isometry::identity(), &world);
        assert_eq!(reading, SensorReading::clear(50.0));
        assert!(sensor.rays().iter().all(|r| r.hit.is_none()));
    }

    #[test]
    fn wall_ahead_is_measured_from_chassis_origin() {
        let mut world = world();
        world.add_track_box(point![0.0, 0.0, 20.0], vector![50.0, 5.0, 1.0]);

        let mut sensor = EnvironmentSensor::new(&config());
        let reading = sensor.sample(&Isometry::translation(0.0, 0.0, 4.0), &world);

        assert!((reading.forward - 15.0).abs() < 1e-3, "{reading:?}");
        // Diagonals reach the same wall face at 45°.
        let diagonal = 15.0 * std::f32::consts::SQRT_2;
        assert!((reading.left - diagonal).abs() < 1e-2);
        assert!((reading.right - diagonal).abs() < 1e-2);
        assert_eq!(reading.up, 50.0);
    }

    #[test]
    fn side_walls_map_to_left_and_right() {
        let mut world = world();
        // Left of the chassis is +X.
        world.add_track_box(point![5.0, 0.0, 0.0], vector![0.5, 5.0, 100.0]);

        let mut sensor = EnvironmentSensor::new(&config());
        let reading = sensor.sample(&Isometry::identity(), &world);

        assert!(reading.left < 50.0);
        assert_eq!(reading.right, 50.0);
        assert!((reading.left - 4.5 * std::f32::consts::SQRT_2).abs() < 1e-2);
    }

    #[test]
    fn rotated_chassis_rotates_the_rays() {
        let mut world = world();
        world.add_track_box(point![10.0, 0.0, 0.0], vector![1.0, 5.0, 5.0]);

        // +90° about Y turns forward (+Z) onto +X.
        let pose = Isometry::new(Vector::zeros(), vector![0.0, std::f32::consts::FRAC_PI_2, 0.0]);
        let mut sensor = EnvironmentSensor::new(&config());
        let reading = sensor.sample(&pose, &world);
        assert!((reading.forward - 9.0).abs() < 1e-3, "{reading:?}");
    }

    #[test]
    fn track_mesh_is_sensed() {
        let mut world = world();
        // Upright quad spanning the forward ray, 10 m ahead.
        let vertices = vec![
            point![-5.0, -5.0, 10.0],
            point![5.0, -5.0, 10.0],
            point![5.0, 5.0, 10.0],
            point![-5.0, 5.0, 10.0],
        ];
        world.add_track_mesh(vertices, vec![[0, 1, 2], [0, 2, 3]]);

        let mut sensor = EnvironmentSensor::new(&config());
        let reading = sensor.sample(&Isometry::identity(), &world);

        assert!((reading.forward - 10.0).abs() < 1e-3, "{reading:?}");
        assert_eq!(reading.up, 50.0);
        // The diagonals pass 10 m wide of the quad's 5 m half width.
        assert_eq!(reading.left, 50.0);
        assert_eq!(reading.right, 50.0);
    }

    #[test]
    fn other_vehicles_are_ghosted() {
        let mut world = world();
        let body = RigidBodyBuilder::dynamic().translation(vector![0.0, 0.0, 10.0]).build();
        let collider = ColliderBuilder::cuboid(1.0, 1.0, 1.0)
            .collision_groups(InteractionGroups::new(GROUP_VEHICLE, GROUP_TRACK | GROUP_VEHICLE))
            .build();
        world.insert_vehicle_body(body, collider);

        let mut sensor = EnvironmentSensor::new(&config());
        let reading = sensor.sample(&Isometry::identity(), &world);
        assert_eq!(reading.forward, 50.0);
    }

    #[test]
    fn distances_never_exceed_cast_distance() {
        let mut world = world();
        world.add_ground(100.0, -0.5);
        world.add_track_box(point![0.0, 0.0, 49.99], vector![100.0, 100.0, 0.01]);

        let mut sensor = EnvironmentSensor::new(&config());
        let reading = sensor.sample(&Isometry::identity(), &world);
        for d in [reading.forward, reading.up, reading.left, reading.right] {
            assert!(d <= 50.0);
        }
    }
}
