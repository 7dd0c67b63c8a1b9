// ==============================================================================
// classify.rs — PART ROLE CLASSIFICATION (TABLE DRIVEN)
// ==============================================================================
// Responsibilities:
// - Map an ordered list of mesh parts to roles: one body, up to four wheels,
//   any number of miscellaneous parts
// - Decide which parts are enabled (visible + physically active)
// ------------------------------------------------------------------------------
// Each game release names its parts differently. Rather than branching per
// version, every supported version owns a `VersionRules` entry in RULE_TABLE:
//
//   version → tiers (selected by part count) → positional slots + name rules
//
// Within a tier:
// - positional slots claim fixed indices first (a single part may feed all
//   four wheel slots on the low-detail models)
// - every other part walks the name rules in order; first match wins
// - parts sharing a positional part's name are skipped (duplicate LODs)
// - anything left over becomes a disabled misc part
//
// Classification only reads its inputs, so it is deterministic.
// ==============================================================================

use std::fmt;

use log::debug;

use super::parts::{GameVersion, MeshPart, WheelId, WheelSlots};
use crate::error::VehicleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Body,
    Wheel(WheelId),
    Misc,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Body => write!(f, "body"),
            Role::Wheel(id) => write!(f, "wheel {id}"),
            Role::Misc => write!(f, "misc"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiscPart {
    pub index: usize,
    pub enabled: bool,
}

/// Indices into the classified part list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub version: GameVersion,
    pub body: Option<usize>,
    pub wheels: WheelSlots<Option<usize>>,
    pub misc: Vec<MiscPart>,
    /// Enabled flag per input part, parallel to the part list.
    pub enabled: Vec<bool>,
}

impl RoleAssignment {
    fn empty(version: GameVersion, part_count: usize) -> Self {
        Self {
            version,
            body: None,
            wheels: WheelSlots([None; 4]),
            misc: Vec::new(),
            enabled: vec![false; part_count],
        }
    }

    /// Roles no part was assigned to.
    pub fn missing_roles(&self) -> Vec<Role> {
        let mut missing = Vec::new();
        if self.body.is_none() {
            missing.push(Role::Body);
        }
        for (id, slot) in self.wheels.iter() {
            if slot.is_none() {
                missing.push(Role::Wheel(id));
            }
        }
        missing
    }

    /// True when one part feeds more than one wheel slot.
    pub fn shares_wheel_part(&self, id: WheelId) -> bool {
        let Some(index) = self.wheels[id] else { return false };
        self.wheels.iter().filter(|(_, s)| **s == Some(index)).count() > 1
    }

    fn assign(&mut self, index: usize, role: Role, enable: bool) {
        match role {
            Role::Body => self.body = Some(index),
            Role::Wheel(id) => self.wheels[id] = Some(index),
            Role::Misc => self.misc.push(MiscPart { index, enabled: enable }),
        }
        if let Some(flag) = self.enabled.get_mut(index) {
            *flag |= enable;
        }
    }

    fn is_free(&self, role: Role) -> bool {
        match role {
            Role::Body => self.body.is_none(),
            Role::Wheel(id) => self.wheels[id].is_none(),
            Role::Misc => true,
        }
    }
}

// ============================================
// Rule tables
// ============================================

#[derive(Debug, Clone, Copy)]
enum Matcher {
    Exact(&'static str),
    Contains(&'static str),
    ContainsWithout(&'static str, &'static str),
}

impl Matcher {
    fn matches(&self, name: &str) -> bool {
        match *self {
            Matcher::Exact(s) => name == s,
            Matcher::Contains(s) => name.contains(s),
            Matcher::ContainsWithout(s, without) => name.contains(s) && !name.contains(without),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct NameRule {
    matcher: Matcher,
    role: Role,
    enable: bool,
}

const fn rule(matcher: Matcher, role: Role) -> NameRule {
    NameRule { matcher, role, enable: true }
}

const fn detail(matcher: Matcher) -> NameRule {
    NameRule { matcher, role: Role::Misc, enable: true }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Body,
    AllWheels,
}

#[derive(Debug)]
struct Tier {
    /// Applies while the part count is below this bound.
    below: Option<usize>,
    positional: &'static [(usize, Slot)],
    rules: &'static [NameRule],
}

#[derive(Debug)]
struct VersionRules {
    versions: &'static [GameVersion],
    tiers: &'static [Tier],
}

use Matcher::{Contains, ContainsWithout, Exact};

const NFS2_MEDIUM: &[NameRule] = &[
    rule(Exact("Medium Main Body Part"), Role::Body),
    detail(ContainsWithout("Medium", "Wheel")),
];

const NFS2_HIGH: &[NameRule] = &[
    rule(Exact("High Main Body Part"), Role::Body),
    rule(Contains("High Front Left Wheel Part"), Role::Wheel(WheelId::FL)),
    rule(Contains("High Front Right Wheel Part"), Role::Wheel(WheelId::FR)),
    rule(Contains("High Rear Left Wheel Part"), Role::Wheel(WheelId::RL)),
    rule(Contains("High Rear Right Wheel Part"), Role::Wheel(WheelId::RR)),
    detail(Contains("High")),
];

const NFS3_MEDIUM: &[NameRule] = &[
    rule(Contains("medium l front wheel"), Role::Wheel(WheelId::FL)),
    rule(Contains("medium r front wheel"), Role::Wheel(WheelId::FR)),
    rule(Contains("medium l rear wheel"), Role::Wheel(WheelId::RL)),
    rule(Contains("medium r rear wheel"), Role::Wheel(WheelId::RR)),
];

const NFS3_HIGH: &[NameRule] = &[
    rule(Exact("high body"), Role::Body),
    rule(Contains("left front wheel"), Role::Wheel(WheelId::FL)),
    rule(Contains("right front wheel"), Role::Wheel(WheelId::FR)),
    rule(Contains("left rear wheel"), Role::Wheel(WheelId::RL)),
    rule(Contains("right rear wheel"), Role::Wheel(WheelId::RR)),
];

const NFS4_CODES: &[NameRule] = &[
    rule(Exact(":HB"), Role::Body),
    rule(Exact(":HLFW"), Role::Wheel(WheelId::FL)),
    rule(Exact(":HRFW"), Role::Wheel(WheelId::FR)),
    rule(Exact(":HLRW"), Role::Wheel(WheelId::RL)),
    rule(Exact(":HRRW"), Role::Wheel(WheelId::RR)),
    detail(Contains("O")),
];

static RULE_TABLE: &[VersionRules] = &[
    VersionRules {
        versions: &[GameVersion::Nfs2, GameVersion::Nfs2Se, GameVersion::Nfs3Ps1],
        tiers: &[
            Tier { below: Some(3), positional: &[(0, Slot::AllWheels), (1, Slot::Body)], rules: &[] },
            Tier { below: Some(20), positional: &[(2, Slot::AllWheels)], rules: NFS2_MEDIUM },
            Tier { below: None, positional: &[], rules: NFS2_HIGH },
        ],
    },
    VersionRules {
        versions: &[GameVersion::Nfs3],
        tiers: &[
            Tier { below: Some(5), positional: &[(0, Slot::Body)], rules: NFS3_MEDIUM },
            Tier { below: None, positional: &[], rules: NFS3_HIGH },
        ],
    },
    VersionRules {
        versions: &[GameVersion::Nfs4],
        tiers: &[Tier { below: None, positional: &[], rules: NFS4_CODES }],
    },
];

fn rules_for(version: GameVersion) -> Option<&'static VersionRules> {
    RULE_TABLE.iter().find(|r| r.versions.contains(&version))
}

pub fn is_supported(version: GameVersion) -> bool {
    rules_for(version).is_some()
}

// ============================================
// Classification
// ============================================

pub fn classify(parts: &[MeshPart], version: GameVersion) -> Result<RoleAssignment, VehicleError> {
    let rules = rules_for(version).ok_or(VehicleError::UnsupportedVersion(version))?;
    let tier = rules
        .tiers
        .iter()
        .find(|t| t.below.is_none_or(|bound| parts.len() < bound))
        .ok_or(VehicleError::UnsupportedVersion(version))?;

    let mut out = RoleAssignment::empty(version, parts.len());
    let mut positional_names: Vec<&str> = Vec::new();

    for &(index, slot) in tier.positional {
        let Some(part) = parts.get(index) else {
            debug!("{version}: positional part {index} absent ({} parts)", parts.len());
            continue;
        };
        match slot {
            Slot::Body => out.assign(index, Role::Body, true),
            Slot::AllWheels => {
                for id in WheelId::ALL {
                    out.assign(index, Role::Wheel(id), true);
                }
            }
        }
        positional_names.push(part.name.as_str());
    }

    for (index, part) in parts.iter().enumerate() {
        if tier.positional.iter().any(|&(i, _)| i == index)
            || positional_names.contains(&part.name.as_str())
        {
            continue;
        }

        let matched = tier.rules.iter().find(|r| r.matcher.matches(&part.name));
        match matched {
            Some(r) if out.is_free(r.role) => out.assign(index, r.role, r.enable),
            Some(r) => {
                debug!("{version}: '{}' duplicates {}, filed as misc", part.name, r.role);
                out.assign(index, Role::Misc, false);
            }
            None => out.assign(index, Role::Misc, false),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude::*;

    fn named(version: GameVersion, names: &[&str]) -> Vec<MeshPart> {
        names
            .iter()
            .map(|n| MeshPart::cuboid(*n, version, vector![0.0, 0.0, 0.0], vector![0.5, 0.5, 0.5]))
            .collect()
    }

    fn assert_body_not_filed_as_misc(a: &RoleAssignment) {
        assert!(a.body.is_some(), "a body part is expected");
        if let Some(body) = a.body {
            assert!(a.misc.iter().all(|m| m.index != body));
        }
    }

    #[test]
    fn nfs4_short_codes_map_exactly() {
        let parts = named(GameVersion::Nfs4, &[":HB", ":HLFW", ":HRFW", ":HLRW", ":HRRW", ":OT", ":MB", ":HLMIR"]);
        let a = classify(&parts, GameVersion::Nfs4).unwrap();

        assert_eq!(a.body, Some(0));
        assert_eq!(a.wheels, WheelSlots([Some(1), Some(2), Some(3), Some(4)]));
        assert_eq!(a.misc, vec![
            MiscPart { index: 5, enabled: true },
            MiscPart { index: 6, enabled: false },
            MiscPart { index: 7, enabled: false },
        ]);
        assert_eq!(a.enabled, vec![true, true, true, true, true, true, false, false]);
        assert!(a.missing_roles().is_empty());
    }

    #[test]
    fn nfs2_tiny_models_share_one_wheel_part() {
        let parts = named(GameVersion::Nfs2, &["wheels", "body"]);
        let a = classify(&parts, GameVersion::Nfs2).unwrap();

        assert_eq!(a.body, Some(1));
        assert_eq!(a.wheels, WheelSlots([Some(0); 4]));
        assert!(a.shares_wheel_part(WheelId::RL));
        assert!(a.misc.is_empty());
        assert_eq!(a.enabled, vec![true, true]);
    }

    #[test]
    fn nfs2_medium_tier_uses_positional_wheel_and_keyword_body() {
        let parts = named(GameVersion::Nfs2Se, &[
            "Medium Main Body Part",
            "Medium Spoiler",
            "Medium Wheel Part",
            "Low Main Body Part",
            "Medium Wheel Part",
        ]);
        let a = classify(&parts, GameVersion::Nfs2Se).unwrap();

        assert_eq!(a.body, Some(0));
        assert_eq!(a.wheels, WheelSlots([Some(2); 4]));
        // The second "Medium Wheel Part" duplicates the positional wheel and is skipped.
        assert_eq!(a.misc, vec![
            MiscPart { index: 1, enabled: true },
            MiscPart { index: 3, enabled: false },
        ]);
        assert_eq!(a.enabled, vec![true, true, true, false, false]);
    }

    #[test]
    fn nfs2_high_tier_matches_keywords() {
        let mut names = vec![
            "High Main Body Part",
            "High Front Left Wheel Part",
            "High Front Right Wheel Part",
            "High Rear Left Wheel Part",
            "High Rear Right Wheel Part",
            "High Headlights",
        ];
        let fillers: Vec<String> = (0..16).map(|i| format!("Low Detail {i}")).collect();
        names.extend(fillers.iter().map(String::as_str));
        let parts = named(GameVersion::Nfs3Ps1, &names);

        let a = classify(&parts, GameVersion::Nfs3Ps1).unwrap();
        assert_body_not_filed_as_misc(&a);
        assert_eq!(a.body, Some(0));
        assert_eq!(a.wheels, WheelSlots([Some(1), Some(2), Some(3), Some(4)]));
        assert!(a.misc.contains(&MiscPart { index: 5, enabled: true }));
        assert_eq!(a.misc.iter().filter(|m| !m.enabled).count(), 16);
    }

    #[test]
    fn nfs3_tiers_follow_part_count() {
        let medium = named(GameVersion::Nfs3, &[
            "medium body",
            "medium l front wheel",
            "medium r front wheel",
            "medium l rear wheel",
        ]);
        let a = classify(&medium, GameVersion::Nfs3).unwrap();
        assert_eq!(a.body, Some(0));
        assert_eq!(a.wheels, WheelSlots([Some(1), Some(2), Some(3), None]));
        assert_eq!(a.missing_roles(), vec![Role::Wheel(WheelId::RR)]);

        let high = named(GameVersion::Nfs3, &[
            "high body",
            "left front wheel",
            "right front wheel",
            "left rear wheel",
            "right rear wheel",
            "medium body",
        ]);
        let a = classify(&high, GameVersion::Nfs3).unwrap();
        assert_eq!(a.body, Some(0));
        assert_eq!(a.wheels, WheelSlots([Some(1), Some(2), Some(3), Some(4)]));
        assert_eq!(a.misc, vec![MiscPart { index: 5, enabled: false }]);
    }

    #[test]
    fn duplicate_wheel_names_keep_the_first_occupant() {
        let parts = named(GameVersion::Nfs4, &[":HB", ":HLFW", ":HLFW", ":HRFW", ":HLRW", ":HRRW"]);
        let a = classify(&parts, GameVersion::Nfs4).unwrap();
        assert_eq!(a.wheels[WheelId::FL], Some(1));
        assert_eq!(a.misc, vec![MiscPart { index: 2, enabled: false }]);
    }

    #[test]
    fn classification_is_idempotent() {
        let fillers: Vec<String> = (0..16).map(|i| format!("Low Detail {i}")).collect();
        let mut nfs3_ps1_high = vec![
            "High Main Body Part",
            "High Front Left Wheel Part",
            "High Front Right Wheel Part",
            "High Rear Left Wheel Part",
            "High Rear Right Wheel Part",
            "High Headlights",
        ];
        nfs3_ps1_high.extend(fillers.iter().map(String::as_str));

        let cases: Vec<(GameVersion, Vec<&str>)> = vec![
            (GameVersion::Nfs2, vec!["wheels", "body"]),
            (GameVersion::Nfs2Se, vec![
                "Medium Main Body Part",
                "Medium Spoiler",
                "Medium Wheel Part",
                "Low Main Body Part",
            ]),
            (GameVersion::Nfs3Ps1, nfs3_ps1_high),
            (GameVersion::Nfs3, vec!["medium body", "medium l front wheel", "medium r front wheel"]),
            (GameVersion::Nfs3, vec![
                "high body",
                "left front wheel",
                "right front wheel",
                "left rear wheel",
                "right rear wheel",
                "medium body",
            ]),
            (GameVersion::Nfs4, vec![":HB", ":HLFW", ":HRFW", ":HLRW", ":HRRW", ":OT"]),
        ];

        for (version, names) in cases {
            let parts = named(version, &names);
            let first = classify(&parts, version).unwrap();
            assert_body_not_filed_as_misc(&first);
            assert!(
                first.wheels.iter().all(|(_, slot)| *slot != first.body),
                "{version}: body doubles as a wheel"
            );
            for _ in 0..5 {
                assert_eq!(classify(&parts, version).unwrap(), first, "{version}");
            }
        }
    }

    #[test]
    fn unsupported_versions_are_rejected() {
        for version in [GameVersion::Nfs1, GameVersion::Nfs2Ps1, GameVersion::Nfs5, GameVersion::Unknown] {
            let parts = named(version, &["body"]);
            assert!(!is_supported(version));
            assert!(matches!(
                classify(&parts, version),
                Err(VehicleError::UnsupportedVersion(v)) if v == version
            ));
        }
    }

    #[test]
    fn missing_positional_body_is_reported() {
        let parts = named(GameVersion::Nfs2, &["wheels"]);
        let a = classify(&parts, GameVersion::Nfs2).unwrap();
        assert_eq!(a.body, None);
        assert_eq!(a.missing_roles(), vec![Role::Body]);
    }
}
