// ==============================================================================
// rig.rs — RAY-CAST WHEEL RIG (SUSPENSION / STEERING / DRIVETRAIN)
// ==============================================================================
// Responsibilities:
// - Attach four ray-cast wheels to the chassis through rapier's
//   DynamicRayCastVehicleController
// - Turn actuation commands into engine force, brake and steering angle
// - Report per-wheel world transforms for the renderer
// ------------------------------------------------------------------------------
// Chassis frame:
//   forward = +Z, up = +Y, left = +X
//   suspension direction = -Y, axle = -X
//   positive steering angle turns the car left
//
// Drivetrain: rear-wheel drive. Engine force and brake only ever reach RL/RR;
// FL/FR only receive the steering angle.
// ==============================================================================

use rapier3d::control::{DynamicRayCastVehicleController, WheelTuning};
use rapier3d::prelude::*;
use serde::Serialize;

use super::body::VehicleBody;
use super::parts::{WheelId, WheelSlots};
use crate::config::{DrivetrainConfig, SteeringConfig, SuspensionConfig};
use crate::control::ActuationCommand;
use crate::physics::PhysicsWorld;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WheelDimensions {
    pub radius: Real,
    pub width: Real,
}

// --------------------------------------------------
// Steering
// --------------------------------------------------

/// Steering angle stepped by a fixed increment per tick.
///
/// Right input wins over left. With no input the angle walks back to zero by
/// the same increment and stops there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringState {
    angle: Real,
    increment: Real,
    clamp: Real,
}

impl SteeringState {
    pub fn new(config: &SteeringConfig) -> Self {
        Self {
            angle: 0.0,
            increment: config.increment.abs(),
            clamp: config.clamp.abs(),
        }
    }

    pub fn angle(&self) -> Real {
        self.angle
    }

    pub fn clamp(&self) -> Real {
        self.clamp
    }

    pub fn update(&mut self, left: bool, right: bool) -> Real {
        self.angle = if right {
            (self.angle - self.increment).max(-self.clamp)
        } else if left {
            (self.angle + self.increment).min(self.clamp)
        } else if self.angle > 0.0 {
            (self.angle - self.increment).max(0.0)
        } else {
            (self.angle + self.increment).min(0.0)
        };
        self.angle
    }

    pub fn reset(&mut self) {
        self.angle = 0.0;
    }
}

// --------------------------------------------------
// Actuation
// --------------------------------------------------

/// Drive values last written to the wheels; also shown on diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ActuationState {
    pub engine_force: Real,  // N, rear wheels
    pub braking_force: Real, // N, rear wheels
    pub steering: Real,      // rad, front wheels
}

impl ActuationState {
    /// Accelerate wins over reverse. Neither leaves the brake untouched.
    pub fn apply_acceleration(&mut self, accelerate: bool, reverse: bool, max_force: Real) {
        if accelerate {
            self.engine_force = max_force;
            self.braking_force = 0.0;
        } else if reverse {
            self.engine_force = -max_force;
            self.braking_force = 0.0;
        } else {
            self.engine_force = 0.0;
        }
    }

    pub fn apply_braking(&mut self, brake: bool, max_force: Real) {
        self.braking_force = if brake { max_force } else { 0.0 };
    }
}

// --------------------------------------------------
// Rig
// --------------------------------------------------

pub struct WheelRig {
    chassis: RigidBodyHandle,
    controller: DynamicRayCastVehicleController,
    steering: SteeringState,
    actuation: ActuationState,
    drivetrain: DrivetrainConfig,
    dimensions: WheelDimensions,
    rest_length: Real,
    max_length: Real,
    suspension_lengths: WheelSlots<Real>,
}

impl WheelRig {
    pub fn attach(
        body: &VehicleBody,
        hardpoints: WheelSlots<Point<Real>>,
        dimensions: WheelDimensions,
        suspension: &SuspensionConfig,
        steering: &SteeringConfig,
        drivetrain: &DrivetrainConfig,
    ) -> Self {
        let tuning = WheelTuning {
            suspension_stiffness: suspension.stiffness,
            suspension_compression: suspension.compression,
            suspension_damping: suspension.damping,
            max_suspension_travel: suspension.max_travel,
            side_friction_stiffness: 1.0,
            friction_slip: suspension.friction,
            max_suspension_force: suspension.max_force,
        };

        let mut controller = DynamicRayCastVehicleController::new(body.handle());
        controller.index_up_axis = 1;
        controller.index_forward_axis = 2;

        // Insertion order matches WheelId::index().
        for id in WheelId::ALL {
            controller.add_wheel(
                hardpoints[id],
                -Vector::y(),
                -Vector::x(),
                suspension.rest_length,
                dimensions.radius,
                &tuning,
            );
        }

        Self {
            chassis: body.handle(),
            controller,
            steering: SteeringState::new(steering),
            actuation: ActuationState::default(),
            drivetrain: *drivetrain,
            dimensions,
            rest_length: suspension.rest_length,
            max_length: suspension.rest_length + suspension.max_travel,
            suspension_lengths: WheelSlots([suspension.rest_length; 4]),
        }
    }

    /// Writes one tick of actuation onto the wheels.
    pub fn apply(&mut self, command: &ActuationCommand) {
        let max_engine = self.drivetrain.max_engine_force;
        let max_brake = self.drivetrain.max_braking_force;

        self.actuation.apply_acceleration(command.accelerate, command.reverse, max_engine);
        self.actuation.apply_braking(command.brake, max_brake);
        self.actuation.steering = self.steering.update(command.steer_left, command.steer_right);

        let state = self.actuation;
        for (id, wheel) in WheelId::ALL.into_iter().zip(self.controller.wheels_mut()) {
            if id.is_front() {
                wheel.steering = state.steering;
                wheel.engine_force = 0.0;
                wheel.brake = 0.0;
            } else {
                wheel.steering = 0.0;
                wheel.engine_force = state.engine_force;
                wheel.brake = state.braking_force;
            }
        }
    }

    /// Suspension raycasts + wheel impulses onto the chassis. Must run before
    /// the world step of the same tick.
    pub fn update(&mut self, world: &mut PhysicsWorld, dt: Real) {
        let filter = QueryFilter::default()
            .exclude_rigid_body(self.chassis)
            .exclude_sensors();

        self.controller.update_vehicle(
            dt,
            &mut world.bodies,
            &world.colliders,
            &world.query_pipeline,
            filter,
        );

        for (id, wheel) in WheelId::ALL.into_iter().zip(self.controller.wheels()) {
            let len = wheel.raycast_info().suspension_length;
            self.suspension_lengths[id] = if len.is_finite() {
                len.clamp(0.0, self.max_length)
            } else {
                self.rest_length
            };
        }
    }

    /// Zeroes drive and spin, re-centers steering and puts every suspension
    /// back at rest. The controller re-derives hard points from the chassis on
    /// its next update.
    pub fn reset(&mut self) {
        self.steering.reset();
        self.actuation = ActuationState::default();
        for wheel in self.controller.wheels_mut() {
            wheel.engine_force = 0.0;
            wheel.brake = 0.0;
            wheel.steering = 0.0;
            wheel.rotation = 0.0;
        }
        self.suspension_lengths = WheelSlots([self.rest_length; 4]);
    }

    /// World transform of a wheel: hard point pushed down the suspension,
    /// turned by its steering angle, spun about its axle.
    pub fn wheel_pose(&self, id: WheelId, chassis: &Isometry<Real>) -> Isometry<Real> {
        let Some(wheel) = self.controller.wheels().get(id.index()) else {
            return *chassis;
        };
        let local_center =
            wheel.chassis_connection_point_cs + wheel.direction_cs * self.suspension_lengths[id];
        let steer = Rotation::from_axis_angle(&Vector::y_axis(), wheel.steering);
        let spin = Rotation::from_axis_angle(&Vector::x_axis(), wheel.rotation);

        Isometry::from_parts(
            (chassis * local_center).coords.into(),
            chassis.rotation * steer * spin,
        )
    }

    pub fn steering(&self) -> &SteeringState {
        &self.steering
    }

    pub fn actuation(&self) -> ActuationState {
        self.actuation
    }

    pub fn dimensions(&self) -> WheelDimensions {
        self.dimensions
    }

    pub fn engine_forces(&self) -> WheelSlots<Real> {
        WheelSlots::from_fn(|id| self.controller.wheels().get(id.index()).map_or(0.0, |w| w.engine_force))
    }

    pub fn brakes(&self) -> WheelSlots<Real> {
        WheelSlots::from_fn(|id| self.controller.wheels().get(id.index()).map_or(0.0, |w| w.brake))
    }

    pub fn steering_angles(&self) -> WheelSlots<Real> {
        WheelSlots::from_fn(|id| self.controller.wheels().get(id.index()).map_or(0.0, |w| w.steering))
    }

    pub fn rest_length(&self) -> Real {
        self.rest_length
    }

    pub fn suspension_length(&self, id: WheelId) -> Real {
        self.suspension_lengths[id]
    }

    pub fn in_contact(&self, id: WheelId) -> bool {
        self.controller
            .wheels()
            .get(id.index())
            .is_some_and(|w| w.raycast_info().is_in_contact)
    }

    pub fn hardpoint(&self, id: WheelId) -> Option<Point<Real>> {
        self.controller.wheels().get(id.index()).map(|w| w.chassis_connection_point_cs)
    }

    /// Signed forward speed, m/s, as of the last update.
    pub fn forward_speed(&self) -> Real {
        self.controller.current_vehicle_speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steering() -> SteeringState {
        SteeringState::new(&SteeringConfig::default())
    }

    #[test]
    fn steering_never_leaves_the_clamp() {
        let mut s = steering();
        for _ in 0..100 {
            let a = s.update(true, false);
            assert!(a <= s.clamp() + 1e-6);
        }
        assert!((s.angle() - 0.15).abs() < 1e-5);

        for _ in 0..100 {
            let a = s.update(false, true);
            assert!(a >= -s.clamp() - 1e-6);
        }
        assert!((s.angle() + 0.15).abs() < 1e-5);
    }

    #[test]
    fn right_takes_precedence_over_left() {
        let mut s = steering();
        s.update(true, true);
        assert!(s.angle() < 0.0);
    }

    #[test]
    fn relaxation_is_monotonic_and_never_overshoots() {
        for start_left in [true, false] {
            let mut s = steering();
            for _ in 0..7 {
                s.update(start_left, !start_left);
            }
            let sign = s.angle().signum();
            let mut previous = s.angle().abs();
            for _ in 0..50 {
                let a = s.update(false, false);
                assert!(a.abs() <= previous + 1e-7);
                assert!(a == 0.0 || a.signum() == sign);
                previous = a.abs();
            }
            assert_eq!(s.angle(), 0.0);
        }
    }

    #[test]
    fn accelerate_sets_max_force_and_releases_brake() {
        let mut a = ActuationState { engine_force: 0.0, braking_force: 1000.0, steering: 0.0 };
        a.apply_acceleration(true, false, 3000.0);
        assert_eq!(a.engine_force, 3000.0);
        assert_eq!(a.braking_force, 0.0);

        a.apply_acceleration(false, true, 3000.0);
        assert_eq!(a.engine_force, -3000.0);
    }

    #[test]
    fn coasting_cuts_engine_but_keeps_brake() {
        let mut a = ActuationState { engine_force: 3000.0, braking_force: 1000.0, steering: 0.0 };
        a.apply_acceleration(false, false, 3000.0);
        assert_eq!(a.engine_force, 0.0);
        assert_eq!(a.braking_force, 1000.0);

        a.apply_braking(false, 1000.0);
        assert_eq!(a.braking_force, 0.0);
        a.apply_braking(true, 1000.0);
        assert_eq!(a.braking_force, 1000.0);
    }
}
