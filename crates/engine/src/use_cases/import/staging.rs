//! Transient staging of a content pack before ingestion.

use std::collections::{BTreeMap, HashSet};

use beacon_domain::{ContentPack, EntryType, Lid, PackEntry};

/// A pack with duplicate lids collapsed per entry type.
///
/// Staging never touches storage; it only establishes what would be
/// ingested and how many entries that is.
#[derive(Debug, Default)]
pub struct StagedPack<'a> {
    entries: BTreeMap<EntryType, Vec<&'a PackEntry>>,
    duplicates: usize,
}

impl<'a> StagedPack<'a> {
    pub fn stage(pack: &'a ContentPack) -> Self {
        let mut staged = Self::default();
        for (entry_type, entries) in &pack.entries {
            let mut seen: HashSet<&Lid> = HashSet::new();
            let slot = staged.entries.entry(*entry_type).or_default();
            for entry in entries {
                if seen.insert(&entry.lid) {
                    slot.push(entry);
                } else {
                    staged.duplicates += 1;
                    tracing::warn!(
                        pack = %pack.id,
                        entry_type = %entry_type,
                        lid = %entry.lid,
                        "Duplicate lid in content pack, keeping the first"
                    );
                }
            }
        }
        staged
    }

    /// Entries that would be ingested, duplicates excluded.
    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryType, &'a PackEntry)> + '_ {
        self.entries
            .iter()
            .flat_map(|(t, entries)| entries.iter().map(move |e| (*t, *e)))
    }
}
