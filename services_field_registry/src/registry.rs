//! Field name to `ChunksField` map

use chunk_types::{FieldName, RequestId};
use services_chunks_field::ChunksField;
use std::collections::BTreeMap;

/// Attached fields by name
///
/// Owned by the widget controller and passed down explicitly; there is no
/// process-wide instance.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    fields: BTreeMap<FieldName, ChunksField>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a field, returning the one it displaced
    pub fn insert(&mut self, field: ChunksField) -> Option<ChunksField> {
        self.fields.insert(field.name().clone(), field)
    }

    pub fn get(&self, name: &FieldName) -> Option<&ChunksField> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &FieldName) -> Option<&mut ChunksField> {
        self.fields.get_mut(name)
    }

    pub fn remove(&mut self, name: &FieldName) -> Option<ChunksField> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &FieldName) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> Vec<FieldName> {
        self.fields.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunksField> {
        self.fields.values()
    }

    /// Field waiting on `request`
    pub fn owner_of(&self, request: RequestId) -> Option<&FieldName> {
        self.fields
            .values()
            .find(|f| f.in_flight() == Some(request))
            .map(|f| f.name())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
