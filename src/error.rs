use thiserror::Error;

use crate::car::{GameVersion, Role};
use crate::physics::VehicleId;

/// Errors raised while assembling a vehicle from its mesh parts.
///
/// Nothing on the per-tick path returns these; a vehicle that was built
/// successfully only ever logs.
#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("no part classification rules exist for game version {0}")]
    UnsupportedVersion(GameVersion),

    #[error("vehicle '{vehicle}' has no part classified as {role}")]
    MissingRole { vehicle: String, role: Role },

    #[error("part '{0}' has no geometry")]
    EmptyGeometry(String),

    #[error("wheel part '{part}' is degenerate (radius {radius}, width {width})")]
    DegenerateWheel { part: String, radius: f32, width: f32 },

    #[error("vehicle {0} has no rigid body in the physics world")]
    BodyMissing(VehicleId),
}
