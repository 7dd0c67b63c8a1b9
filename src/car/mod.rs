//! Vehicle core: part classification, chassis, wheel rig, sensors and the
//! entity tying them together.

pub mod body;
pub mod classify;
pub mod entity;
pub mod parts;
pub mod rig;
pub mod sensor;

pub use body::VehicleBody;
pub use classify::{MiscPart, Role, RoleAssignment, classify, is_supported};
pub use entity::{VehicleDesc, VehicleEntity};
pub use parts::{GameVersion, MeshPart, WheelId, WheelSlots, placeholder_car};
pub use rig::{ActuationState, SteeringState, WheelDimensions, WheelRig};
pub use sensor::{EnvironmentSensor, SensorRay, SensorRayKind, SensorReading};
