//! Core compendium collection naming.
//!
//! Imported content lives in one collection per entry type, named
//! `world.<entry_type>`. Any other collection is a secondary compendium.

use crate::{CollectionId, EntryType};

/// Package scope that owns the core collections.
pub const CORE_COLLECTION_SCOPE: &str = "world";

pub fn core_collection_id(entry_type: EntryType) -> CollectionId {
    CollectionId::new(format!("{}.{}", CORE_COLLECTION_SCOPE, entry_type.as_str()))
}

/// True when the part of `name` after the first `.` names an entry type.
///
/// A name without a `.` is compared whole.
pub fn is_core_collection_name(name: &str) -> bool {
    let suffix = match name.find('.') {
        Some(idx) => &name[idx + 1..],
        None => name,
    };
    EntryType::all().any(|t| t.as_str() == suffix)
}

/// Entry type stored in a core collection, if `name` is one.
pub fn core_collection_entry_type(name: &str) -> Option<EntryType> {
    let suffix = match name.find('.') {
        Some(idx) => &name[idx + 1..],
        None => name,
    };
    EntryType::all().find(|t| t.as_str() == suffix)
}

impl CollectionId {
    pub fn is_core(&self) -> bool {
        is_core_collection_name(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_collection_names_follow_entry_types() {
        assert_eq!(core_collection_id(EntryType::MechWeapon).as_str(), "world.mech_weapon");
        assert!(core_collection_id(EntryType::MechWeapon).is_core());
    }

    #[test]
    fn any_package_prefix_counts_as_core() {
        assert!(is_core_collection_name("beacon.frame"));
        assert!(is_core_collection_name("frame"));
        assert!(!is_core_collection_name("world.homebrew-frames"));
        assert!(!is_core_collection_name("world.frame.extra"));
    }

    #[test]
    fn entry_type_is_recovered_from_core_name() {
        assert_eq!(core_collection_entry_type("world.talent"), Some(EntryType::Talent));
        assert_eq!(core_collection_entry_type("world.homebrew"), None);
    }
}
