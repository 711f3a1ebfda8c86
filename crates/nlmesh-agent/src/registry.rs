//! In-memory model registry with a single version token
//!
//! The record map and the current [`StateToken`] live behind one lock, so a
//! reader never observes a token that does not belong to the record set it
//! sees.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    error::RegistryError,
    models::{ModelId, ModelInfo, ModelRecord, StateToken},
};

#[derive(Debug)]
struct RegistryState {
    records: HashMap<ModelId, Arc<ModelRecord>>,
    token: StateToken,
}

impl RegistryState {
    /// Installs a fresh token, distinct from the one it replaces.
    fn advance(&mut self) -> StateToken {
        let mut next = StateToken::new();
        while next == self.token {
            next = StateToken::new();
        }
        self.token = next;
        next
    }
}

/// Thread-safe store of registered models
///
/// Every mutating operation (`register`, `reregister`, `release` of a present
/// id) installs a new state token as part of the same write. Callers use the
/// token for optimistic concurrency: a request that carries an older token is
/// rejected by the orchestrator.
///
/// # Examples
///
/// ```ignore
/// use nlmesh_agent::ModelRegistry;
///
/// let registry = ModelRegistry::new();
/// let before = registry.current_token();
/// let (id, token) = registry.register(record);
/// assert_ne!(before, token);
/// ```
#[derive(Debug)]
pub struct ModelRegistry {
    state: RwLock<RegistryState>,
}

impl ModelRegistry {
    /// Create an empty registry with an initial token
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                records: HashMap::new(),
                token: StateToken::new(),
            }),
        }
    }

    /// Register a record under a fresh id
    ///
    /// Any id already present on `record` is replaced.
    ///
    /// # Returns
    ///
    /// The assigned id and the newly installed state token
    pub fn register(&self, mut record: ModelRecord) -> (ModelId, StateToken) {
        let mut state = self.state.write();

        let mut id = ModelId::new();
        while state.records.contains_key(&id) {
            id = ModelId::new();
        }
        record.id = id;

        state.records.insert(id, Arc::new(record));
        let token = state.advance();

        info!(model_id = %id, state_token = %token, "Model registered");
        (id, token)
    }

    /// Replace the record stored under `id`
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] without side effects when `id` is
    /// not registered.
    pub fn reregister(&self, id: &ModelId, mut record: ModelRecord) -> Result<StateToken, RegistryError> {
        let mut state = self.state.write();
        if !state.records.contains_key(id) {
            return Err(RegistryError::NotFound(*id));
        }

        record.id = *id;
        state.records.insert(*id, Arc::new(record));
        let token = state.advance();

        info!(model_id = %id, state_token = %token, "Model re-registered");
        Ok(token)
    }

    /// Look up a record
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when `id` is not registered.
    pub fn lookup(&self, id: &ModelId) -> Result<Arc<ModelRecord>, RegistryError> {
        self.state
            .read()
            .records
            .get(id)
            .cloned()
            .ok_or(RegistryError::NotFound(*id))
    }

    /// Remove a record
    ///
    /// # Returns
    ///
    /// `true` when a record was removed and a new token installed; `false`
    /// (with no token change) when `id` was absent.
    pub fn release(&self, id: &ModelId) -> bool {
        self.take(id).is_some()
    }

    /// Remove a record and hand it back, advancing the token when present
    pub fn take(&self, id: &ModelId) -> Option<Arc<ModelRecord>> {
        let mut state = self.state.write();
        let removed = state.records.remove(id)?;
        let token = state.advance();
        info!(model_id = %id, state_token = %token, "Model released");
        Some(removed)
    }

    /// The token describing the current contents
    pub fn current_token(&self) -> StateToken {
        self.state.read().token
    }

    /// Token and record read under one lock
    pub fn snapshot(&self, id: &ModelId) -> (StateToken, Option<Arc<ModelRecord>>) {
        let state = self.state.read();
        (state.token, state.records.get(id).cloned())
    }

    /// Summaries of all records, oldest registration first
    pub fn list(&self) -> Vec<ModelInfo> {
        let mut infos: Vec<ModelInfo> = self
            .state
            .read()
            .records
            .values()
            .map(|record| record.info())
            .collect();
        infos.sort_by(|a, b| {
            a.metadata
                .registered_at
                .cmp(&b.metadata.registered_at)
                .then_with(|| a.model_id.to_string().cmp(&b.model_id.to_string()))
        });
        debug!(count = infos.len(), "Listed models");
        infos
    }

    /// Number of registered models
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Whether no model is registered
    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use nlmesh_mesh::{BoundingBox, MeshHandle};

    use super::*;
    use crate::models::{ModelFormat, ModelMetadata};

    fn record(name: &str) -> ModelRecord {
        ModelRecord::new(
            MeshHandle::new(),
            ModelMetadata {
                file_name: name.to_string(),
                format: ModelFormat::Stl,
                file_size: 1024,
                vertex_count: 8,
                face_count: 12,
                bounding_box: BoundingBox::default(),
                registered_at: Utc::now(),
            },
        )
    }

    #[test]
    fn register_assigns_fresh_id_and_token() {
        let registry = ModelRegistry::new();
        let initial = registry.current_token();

        let placeholder = record("a.stl");
        let placeholder_id = placeholder.id;
        let (id, token) = registry.register(placeholder);

        assert_ne!(id, placeholder_id);
        assert_ne!(token, initial);
        assert_eq!(registry.current_token(), token);
        assert_eq!(registry.lookup(&id).unwrap().id, id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn release_of_absent_id_has_no_side_effects() {
        let registry = ModelRegistry::new();
        let before = registry.current_token();
        assert!(!registry.release(&ModelId::new()));
        assert!(registry.take(&ModelId::new()).is_none());
        assert_eq!(registry.current_token(), before);
    }

    #[test]
    fn release_removes_and_advances() {
        let registry = ModelRegistry::new();
        let (id, token) = registry.register(record("a.stl"));
        assert!(registry.release(&id));
        assert_ne!(registry.current_token(), token);
        assert_eq!(registry.lookup(&id), Err(RegistryError::NotFound(id)));
        assert!(registry.is_empty());
    }

    #[test]
    fn reregister_keeps_id() {
        let registry = ModelRegistry::new();
        let (id, token) = registry.register(record("a.stl"));

        let new_token = registry.reregister(&id, record("b.stl")).unwrap();
        assert_ne!(new_token, token);
        let stored = registry.lookup(&id).unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.metadata.file_name, "b.stl");

        let missing = ModelId::new();
        assert_eq!(
            registry.reregister(&missing, record("c.stl")),
            Err(RegistryError::NotFound(missing))
        );
        assert_eq!(registry.current_token(), new_token);
    }

    #[test]
    fn list_returns_every_record() {
        let registry = ModelRegistry::new();
        let (a, _) = registry.register(record("a.stl"));
        let (b, _) = registry.register(record("b.stl"));
        let ids: Vec<ModelId> = registry.list().into_iter().map(|info| info.model_id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a));
        assert!(ids.contains(&b));
    }

    #[test]
    fn snapshot_is_consistent() {
        let registry = ModelRegistry::new();
        let (id, token) = registry.register(record("a.stl"));
        let (current, found) = registry.snapshot(&id);
        assert_eq!(current, token);
        assert!(found.is_some());
    }
}
