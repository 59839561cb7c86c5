//! Rule-system entry types.
//!
//! Every persisted document carries one of these tags. Four of them are
//! actors (they own an inventory); the rest are items.

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Which host document class stores an entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Actor,
    Item,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Actor => write!(f, "Actor"),
            Self::Item => write!(f, "Item"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    CoreBonus,
    Deployable,
    Environment,
    Faction,
    Frame,
    License,
    Manufacturer,
    Mech,
    MechSystem,
    MechWeapon,
    Npc,
    NpcClass,
    NpcFeature,
    NpcTemplate,
    Organization,
    Pilot,
    PilotArmor,
    PilotGear,
    PilotWeapon,
    Quirk,
    Reserve,
    Sitrep,
    Skill,
    Status,
    Tag,
    Talent,
    WeaponMod,
}

impl EntryType {
    pub const ALL: [EntryType; 27] = [
        Self::CoreBonus,
        Self::Deployable,
        Self::Environment,
        Self::Faction,
        Self::Frame,
        Self::License,
        Self::Manufacturer,
        Self::Mech,
        Self::MechSystem,
        Self::MechWeapon,
        Self::Npc,
        Self::NpcClass,
        Self::NpcFeature,
        Self::NpcTemplate,
        Self::Organization,
        Self::Pilot,
        Self::PilotArmor,
        Self::PilotGear,
        Self::PilotWeapon,
        Self::Quirk,
        Self::Reserve,
        Self::Sitrep,
        Self::Skill,
        Self::Status,
        Self::Tag,
        Self::Talent,
        Self::WeaponMod,
    ];

    /// Iterate over every entry type in declaration order.
    pub fn all() -> impl Iterator<Item = EntryType> {
        Self::ALL.into_iter()
    }

    pub fn is_actor(&self) -> bool {
        matches!(self, Self::Deployable | Self::Mech | Self::Npc | Self::Pilot)
    }

    pub fn document_kind(&self) -> DocumentKind {
        if self.is_actor() {
            DocumentKind::Actor
        } else {
            DocumentKind::Item
        }
    }

    /// Pilot-carried gear. These never receive mech bonuses.
    pub fn is_pilot_equipment(&self) -> bool {
        matches!(self, Self::PilotArmor | Self::PilotGear | Self::PilotWeapon)
    }

    /// Stable lowercase name, also used as the core collection suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoreBonus => "core_bonus",
            Self::Deployable => "deployable",
            Self::Environment => "environment",
            Self::Faction => "faction",
            Self::Frame => "frame",
            Self::License => "license",
            Self::Manufacturer => "manufacturer",
            Self::Mech => "mech",
            Self::MechSystem => "mech_system",
            Self::MechWeapon => "mech_weapon",
            Self::Npc => "npc",
            Self::NpcClass => "npc_class",
            Self::NpcFeature => "npc_feature",
            Self::NpcTemplate => "npc_template",
            Self::Organization => "organization",
            Self::Pilot => "pilot",
            Self::PilotArmor => "pilot_armor",
            Self::PilotGear => "pilot_gear",
            Self::PilotWeapon => "pilot_weapon",
            Self::Quirk => "quirk",
            Self::Reserve => "reserve",
            Self::Sitrep => "sitrep",
            Self::Skill => "skill",
            Self::Status => "status",
            Self::Tag => "tag",
            Self::Talent => "talent",
            Self::WeaponMod => "weapon_mod",
        }
    }

    pub fn friendly_name(&self) -> &'static str {
        match self {
            Self::CoreBonus => "Core Bonus",
            Self::Deployable => "Deployable",
            Self::Environment => "Environment",
            Self::Faction => "Faction",
            Self::Frame => "Frame",
            Self::License => "License",
            Self::Manufacturer => "Manufacturer",
            Self::Mech => "Mech",
            Self::MechSystem => "Mech System",
            Self::MechWeapon => "Mech Weapon",
            Self::Npc => "Npc",
            Self::NpcClass => "Npc Class",
            Self::NpcFeature => "Npc Feature",
            Self::NpcTemplate => "Npc Template",
            Self::Organization => "Organization",
            Self::Pilot => "Pilot Preset",
            Self::PilotArmor => "Pilot Armor",
            Self::PilotGear => "Pilot Gear",
            Self::PilotWeapon => "Pilot Weapon",
            Self::Quirk => "Quirk",
            Self::Reserve => "Reserve",
            Self::Sitrep => "Sitrep",
            Self::Skill => "Skill",
            Self::Status => "Status/Condition",
            Self::Tag => "Tag",
            Self::Talent => "Talent",
            Self::WeaponMod => "Weapon Mod",
        }
    }

    pub fn friendly_name_plural(&self) -> &'static str {
        match self {
            Self::CoreBonus => "Core Bonuses",
            Self::Deployable => "Deployables",
            Self::Environment => "Environments",
            Self::Faction => "Factions",
            Self::Frame => "Frames",
            Self::License => "Licenses",
            Self::Manufacturer => "Manufacturers",
            Self::Mech => "Mechs",
            Self::MechSystem => "Mech Systems",
            Self::MechWeapon => "Mech Weapons",
            Self::Npc => "Npcs",
            Self::NpcClass => "Npc Classes",
            Self::NpcFeature => "Npc Features",
            Self::NpcTemplate => "Npc Templates",
            Self::Organization => "Organizations",
            Self::Pilot => "Pilot Presets",
            Self::PilotArmor => "Pilot Armor",
            Self::PilotGear => "Pilot Gear",
            Self::PilotWeapon => "Pilot Weapons",
            Self::Quirk => "Quirks",
            Self::Reserve => "Reserves",
            Self::Sitrep => "Sitreps",
            Self::Skill => "Skills",
            Self::Status => "Statuses / Conditions",
            Self::Tag => "Tags",
            Self::Talent => "Talents",
            Self::WeaponMod => "Weapon Mods",
        }
    }

    /// Display name for `count` entries of this type.
    pub fn friendly_name_for(&self, count: usize) -> &'static str {
        if count > 1 {
            self.friendly_name_plural()
        } else {
            self.friendly_name()
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::all()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| DomainError::parse(format!("Unknown entry type: {}", s)))
    }
}
