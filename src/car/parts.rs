// ==============================================================================
// parts.rs — MESH PARTS, GAME VERSIONS, WHEEL SLOTS
// ------------------------------------------------------------------------------
// A MeshPart is what the asset collaborator hands over: a name, a vertex
// buffer in the part's local frame, a texture reference, and the placement of
// the part relative to the chassis origin (its initial offset). Pose
// propagation writes `pose` every tick; `initial` never changes.
// ==============================================================================

use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

use rapier3d::parry::bounding_volume::Aabb;
use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================
// Game versions
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameVersion {
    Nfs1,
    Nfs2Ps1,
    Nfs2Se,
    Nfs2,
    Nfs3Ps1,
    Nfs3,
    Nfs4,
    Nfs5,
    Unknown,
}

impl GameVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameVersion::Nfs1 => "NFS_1",
            GameVersion::Nfs2Ps1 => "NFS_2_PS1",
            GameVersion::Nfs2Se => "NFS_2_SE",
            GameVersion::Nfs2 => "NFS_2",
            GameVersion::Nfs3Ps1 => "NFS_3_PS1",
            GameVersion::Nfs3 => "NFS_3",
            GameVersion::Nfs4 => "NFS_4",
            GameVersion::Nfs5 => "NFS_5",
            GameVersion::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Wheel identification
// ============================================

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum WheelId { FL, FR, RL, RR }

impl WheelId {
    pub const ALL: [WheelId; 4] = [WheelId::FL, WheelId::FR, WheelId::RL, WheelId::RR];

    pub fn index(&self) -> usize {
        match self {
            WheelId::FL => 0,
            WheelId::FR => 1,
            WheelId::RL => 2,
            WheelId::RR => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WheelId::FL => "FL",
            WheelId::FR => "FR",
            WheelId::RL => "RL",
            WheelId::RR => "RR",
        }
    }

    pub fn is_front(&self) -> bool {
        matches!(self, WheelId::FL | WheelId::FR)
    }

    pub fn is_rear(&self) -> bool {
        matches!(self, WheelId::RL | WheelId::RR)
    }

    pub fn is_left(&self) -> bool {
        matches!(self, WheelId::FL | WheelId::RL)
    }
}

impl fmt::Display for WheelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One value per wheel, addressed by `WheelId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WheelSlots<T>(pub [T; 4]);

impl<T> WheelSlots<T> {
    pub fn from_fn(mut f: impl FnMut(WheelId) -> T) -> Self {
        WheelSlots(WheelId::ALL.map(&mut f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (WheelId, &T)> {
        WheelId::ALL.into_iter().zip(self.0.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(WheelId, &T) -> U) -> WheelSlots<U> {
        WheelSlots::from_fn(|id| f(id, &self[id]))
    }
}

impl<T> Index<WheelId> for WheelSlots<T> {
    type Output = T;
    fn index(&self, id: WheelId) -> &T {
        &self.0[id.index()]
    }
}

impl<T> IndexMut<WheelId> for WheelSlots<T> {
    fn index_mut(&mut self, id: WheelId) -> &mut T {
        &mut self.0[id.index()]
    }
}

// ============================================
// Mesh parts
// ============================================

#[derive(Debug, Clone)]
pub struct MeshPart {
    pub name: String,
    pub version: GameVersion,
    pub vertices: Arc<[Point<Real>]>,
    pub texture: Option<u32>,
    pub enabled: bool,
    pub pose: Isometry<Real>,
    initial: Isometry<Real>,
}

impl MeshPart {
    pub fn new(name: impl Into<String>, version: GameVersion, vertices: Vec<Point<Real>>) -> Self {
        Self {
            name: name.into(),
            version,
            vertices: vertices.into(),
            texture: None,
            enabled: false,
            pose: Isometry::identity(),
            initial: Isometry::identity(),
        }
    }

    /// Box-shaped part centered on its local origin. Stands in for decoded
    /// geometry in the demo server and in tests.
    pub fn cuboid(
        name: impl Into<String>,
        version: GameVersion,
        offset: Vector<Real>,
        half_extents: Vector<Real>,
    ) -> Self {
        let h = half_extents;
        let mut vertices = Vec::with_capacity(8);
        for sx in [-1.0, 1.0] {
            for sy in [-1.0, 1.0] {
                for sz in [-1.0, 1.0] {
                    vertices.push(point![sx * h.x, sy * h.y, sz * h.z]);
                }
            }
        }
        Self::new(name, version, vertices).with_initial_pose(Isometry::translation(offset.x, offset.y, offset.z))
    }

    pub fn with_initial_pose(mut self, initial: Isometry<Real>) -> Self {
        self.initial = initial;
        self.pose = initial;
        self
    }

    pub fn with_texture(mut self, texture: u32) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn initial_pose(&self) -> &Isometry<Real> {
        &self.initial
    }

    /// Local-frame bounds of the vertex buffer, or `None` for an empty part.
    pub fn bounding_box(&self) -> Option<Aabb> {
        if self.vertices.is_empty() {
            return None;
        }
        let mut aabb = Aabb::new_invalid();
        for v in self.vertices.iter() {
            aabb.take_point(*v);
        }
        Some(aabb)
    }

    /// This part's placement in `frame`'s local space, from both initial poses.
    pub fn offset_from(&self, frame: &MeshPart) -> Isometry<Real> {
        frame.initial.inv_mul(&self.initial)
    }

    /// Places the part rigidly at `offset` within a chassis transform.
    pub fn attach_to(&mut self, chassis: &Isometry<Real>, offset: &Isometry<Real>) {
        self.pose = chassis * offset;
    }
}

/// Five-part NFS_4 car built from boxes, with stable short part codes.
pub fn placeholder_car() -> Vec<MeshPart> {
    let v = GameVersion::Nfs4;
    let wheel = vector![0.12, 0.33, 0.33];
    vec![
        MeshPart::cuboid(":HB", v, vector![0.0, 0.0, 0.0], vector![0.9, 0.35, 2.1]).with_texture(0),
        MeshPart::cuboid(":HLFW", v, vector![0.8, -0.35, 1.4], wheel).with_texture(1),
        MeshPart::cuboid(":HRFW", v, vector![-0.8, -0.35, 1.4], wheel).with_texture(1),
        MeshPart::cuboid(":HLRW", v, vector![0.8, -0.35, -1.4], wheel).with_texture(1),
        MeshPart::cuboid(":HRRW", v, vector![-0.8, -0.35, -1.4], wheel).with_texture(1),
        MeshPart::cuboid(":OT", v, vector![0.0, 0.4, -1.9], vector![0.8, 0.05, 0.15]).with_texture(2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_bounds_are_centered() {
        let part = MeshPart::cuboid("box", GameVersion::Nfs4, vector![1.0, 2.0, 3.0], vector![0.5, 0.25, 2.0]);
        let aabb = part.bounding_box().unwrap();
        assert_eq!(aabb.center(), point![0.0, 0.0, 0.0]);
        assert_eq!(aabb.half_extents(), vector![0.5, 0.25, 2.0]);
        assert_eq!(part.pose.translation.vector, vector![1.0, 2.0, 3.0]);
    }

    #[test]
    fn empty_part_has_no_bounds() {
        let part = MeshPart::new("empty", GameVersion::Nfs3, Vec::new());
        assert!(part.bounding_box().is_none());
    }

    #[test]
    fn attach_follows_chassis_and_keeps_offset() {
        let body = MeshPart::cuboid("body", GameVersion::Nfs4, vector![0.0, 0.0, 0.0], vector![1.0, 0.5, 2.0]);
        let mut part = MeshPart::cuboid("spoiler", GameVersion::Nfs4, vector![0.0, 0.5, -2.0], vector![0.5, 0.1, 0.1]);
        let chassis = Isometry::new(vector![10.0, 0.0, 0.0], vector![0.0, std::f32::consts::FRAC_PI_2, 0.0]);
        let offset = part.offset_from(&body);
        part.attach_to(&chassis, &offset);

        // +90° about Y maps local -Z onto world -X.
        let p = part.pose.translation.vector;
        assert!((p - vector![8.0, 0.5, 0.0]).norm() < 1e-5, "{p:?}");
        assert_eq!(part.initial_pose().translation.vector, vector![0.0, 0.5, -2.0]);
    }

    #[test]
    fn offsets_are_taken_relative_to_the_frame_part() {
        let lift = Isometry::new(vector![0.0, 1.0, 0.5], vector![0.0, 0.3, 0.0]);
        let body = MeshPart::new("body", GameVersion::Nfs4, Vec::new()).with_initial_pose(lift);
        let wheel = MeshPart::new("wheel", GameVersion::Nfs4, Vec::new())
            .with_initial_pose(lift * Isometry::translation(0.8, -0.35, 1.4));

        let offset = wheel.offset_from(&body);
        assert!((offset.translation.vector - vector![0.8, -0.35, 1.4]).norm() < 1e-5, "{offset:?}");
        assert!(offset.rotation.angle() < 1e-5);
    }

    #[test]
    fn wheel_slots_compare_by_value() {
        fn assert_eq_impl<T: Eq>(_: &T) {}
        let slots = WheelSlots([Some(1usize), None, Some(3), None]);
        assert_eq_impl(&slots);
        assert_eq!(slots, WheelSlots([Some(1), None, Some(3), None]));
        assert_ne!(slots, WheelSlots([None; 4]));
    }

    #[test]
    fn wheel_slots_index_by_role() {
        let mut slots = WheelSlots::from_fn(|id| id.index() as f32);
        slots[WheelId::RR] = 9.0;
        assert_eq!(slots[WheelId::FL], 0.0);
        assert_eq!(slots[WheelId::RR], 9.0);
        let rear: Vec<_> = slots.iter().filter(|(id, _)| id.is_rear()).map(|(_, v)| *v).collect();
        assert_eq!(rear, vec![2.0, 9.0]);
    }
}
