//! Rule-system entity factories.
//!
//! A factory validates a document payload for one entry type and produces
//! the normalized data held by the live entity.

use std::collections::HashMap;
use std::sync::Arc;

use beacon_domain::{Document, EntryType, ScopeDescriptor};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has no string lid")]
    MissingLid,
    #[error("payload is missing required field '{0}'")]
    MissingField(&'static str),
}

#[cfg_attr(test, mockall::automock)]
pub trait EntityFactory: Send + Sync {
    fn build(
        &self,
        scope: &ScopeDescriptor,
        doc: &Document,
    ) -> Result<serde_json::Value, FactoryError>;
}

/// Accepts any object payload with a string `lid` and the listed fields.
#[derive(Debug, Clone, Default)]
pub struct StandardFactory {
    required: &'static [&'static str],
}

impl StandardFactory {
    pub fn new(required: &'static [&'static str]) -> Self {
        Self { required }
    }

    pub fn for_type(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::License => Self::new(&["key"]),
            _ => Self::default(),
        }
    }
}

impl EntityFactory for StandardFactory {
    fn build(
        &self,
        _scope: &ScopeDescriptor,
        doc: &Document,
    ) -> Result<serde_json::Value, FactoryError> {
        let object = doc.payload.as_object().ok_or(FactoryError::NotAnObject)?;
        if !object.get("lid").is_some_and(|v| v.is_string()) {
            return Err(FactoryError::MissingLid);
        }
        if let Some(missing) = self.required.iter().find(|f| !object.contains_key(**f)) {
            return Err(FactoryError::MissingField(*missing));
        }
        Ok(doc.payload.clone())
    }
}

/// Factory lookup by entry type, falling back to [`StandardFactory`].
#[derive(Clone)]
pub struct FactorySet {
    factories: HashMap<EntryType, Arc<dyn EntityFactory>>,
}

impl FactorySet {
    pub fn standard() -> Self {
        let factories = EntryType::all()
            .map(|t| (t, Arc::new(StandardFactory::for_type(t)) as Arc<dyn EntityFactory>))
            .collect();
        Self { factories }
    }

    /// Replace the factory for one entry type.
    pub fn with(mut self, entry_type: EntryType, factory: Arc<dyn EntityFactory>) -> Self {
        self.factories.insert(entry_type, factory);
        self
    }

    pub fn get(&self, entry_type: EntryType) -> Arc<dyn EntityFactory> {
        self.factories
            .get(&entry_type)
            .cloned()
            .unwrap_or_else(|| Arc::new(StandardFactory::for_type(entry_type)))
    }
}

impl Default for FactorySet {
    fn default() -> Self {
        Self::standard()
    }
}
