//! Externally authored content packs.
//!
//! A pack groups entries by entry type. Each entry is keyed by its logical
//! id, which stays stable across re-imports of the same pack.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{DomainError, EntryType, Lid};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackEntry {
    pub lid: Lid,
    pub name: String,
    /// Raw entry body as authored. The logical id is merged in by [`PackEntry::payload`].
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PackEntry {
    pub fn new(lid: impl Into<Lid>, name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            lid: lid.into(),
            name: name.into(),
            data,
        }
    }

    /// Document payload for this entry, always an object carrying `lid`.
    pub fn payload(&self) -> serde_json::Value {
        let mut map = match &self.data {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        map.insert(
            "lid".to_string(),
            serde_json::Value::String(self.lid.as_str().to_string()),
        );
        serde_json::Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentPack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub entries: BTreeMap<EntryType, Vec<PackEntry>>,
}

impl ContentPack {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: String::new(),
            entries: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, entry_type: EntryType, entry: PackEntry) -> Self {
        self.push(entry_type, entry);
        self
    }

    pub fn push(&mut self, entry_type: EntryType, entry: PackEntry) {
        self.entries.entry(entry_type).or_default().push(entry);
    }

    /// Every entry, grouped by type in type order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryType, &PackEntry)> {
        self.entries
            .iter()
            .flat_map(|(t, entries)| entries.iter().map(move |e| (*t, e)))
    }

    pub fn entries_of(&self, entry_type: EntryType) -> &[PackEntry] {
        self.entries
            .get(&entry_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Raw entry count, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject packs with entries that cannot be keyed.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.trim().is_empty() {
            return Err(DomainError::validation("Content pack id cannot be empty"));
        }
        for (entry_type, entry) in self.iter() {
            if entry.lid.as_str().trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "{} '{}' in pack '{}' has an empty lid",
                    entry_type.friendly_name(),
                    entry.name,
                    self.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn payload_merges_lid_into_object() {
        let entry = PackEntry::new("mf_everest", "Everest", json!({ "mechtype": ["Balanced"] }));
        assert_eq!(
            entry.payload(),
            json!({ "lid": "mf_everest", "mechtype": ["Balanced"] })
        );
    }

    #[test]
    fn deserializes_grouped_entries() {
        let pack: ContentPack = serde_json::from_value(json!({
            "id": "core",
            "name": "Core Book",
            "entries": {
                "frame": [{ "lid": "mf_everest", "name": "Everest" }],
                "skill": [
                    { "lid": "sk_act_unseen", "name": "Act Unseen", "data": { "family": "Hide" } }
                ]
            }
        }))
        .unwrap();

        assert_eq!(pack.len(), 2);
        assert_eq!(pack.entries_of(EntryType::Skill)[0].lid, Lid::new("sk_act_unseen"));
        assert!(pack.entries_of(EntryType::Talent).is_empty());
    }

    #[test]
    fn empty_lid_fails_validation() {
        let pack = ContentPack::new("core", "Core")
            .with_entry(EntryType::Tag, PackEntry::new("", "Heat", json!({})));
        let err = pack.validate().unwrap_err();
        assert!(err.to_string().contains("empty lid"));
    }
}
