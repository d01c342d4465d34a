use crate::store::{VariableStore, VariableStoreError, VariableStoreResult, VariableWriter};
use crate::types::{
    Collection, CollectionId, Color, CreatedCollection, Mode, ModeId, ResolvedType, Variable,
    VariableId, VariableValue,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct MemoryState {
    pub next_collection_seq: u64,
    pub next_variable_seq: u64,
    pub collections: Vec<CollectionState>,
    pub variables: BTreeMap<VariableId, Variable>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub(crate) struct CollectionState {
    pub seq: u64,
    pub next_mode_seq: u64,
    pub collection: Collection,
}

impl MemoryState {
    fn allocate_collection_seq(&mut self) -> u64 {
        if self.next_collection_seq == 0 {
            self.next_collection_seq = 1;
        }
        let seq = self.next_collection_seq;
        self.next_collection_seq += 1;
        seq
    }

    fn allocate_variable_id(&mut self) -> VariableId {
        if self.next_variable_seq == 0 {
            self.next_variable_seq = 1;
        }
        let seq = self.next_variable_seq;
        self.next_variable_seq += 1;
        format!("VariableID:{seq}")
    }

    fn collection(&self, collection_id: &str) -> VariableStoreResult<&CollectionState> {
        self.collections
            .iter()
            .find(|state| state.collection.id == collection_id)
            .ok_or_else(|| VariableStoreError::NotFound {
                resource: "collection",
                id: collection_id.to_string(),
            })
    }

    fn collection_mut(&mut self, collection_id: &str) -> VariableStoreResult<&mut CollectionState> {
        self.collections
            .iter_mut()
            .find(|state| state.collection.id == collection_id)
            .ok_or_else(|| VariableStoreError::NotFound {
                resource: "collection",
                id: collection_id.to_string(),
            })
    }

    fn variable(&self, variable_id: &str) -> VariableStoreResult<&Variable> {
        self.variables
            .get(variable_id)
            .ok_or_else(|| VariableStoreError::NotFound {
                resource: "variable",
                id: variable_id.to_string(),
            })
    }

    fn check_value(&self, variable: &Variable, value: &VariableValue) -> VariableStoreResult<()> {
        let value_type = match value {
            VariableValue::Alias { id } => {
                if id == &variable.id {
                    return Err(VariableStoreError::Conflict(format!(
                        "variable {} cannot alias itself",
                        variable.id
                    )));
                }
                self.variable(id)?.resolved_type
            }
            VariableValue::Color(color) => {
                check_color(color)?;
                ResolvedType::Color
            }
            concrete => concrete.concrete_type().unwrap_or(variable.resolved_type),
        };

        if value_type != variable.resolved_type {
            return Err(VariableStoreError::InvalidInput(format!(
                "value of type {value_type} does not match variable {} of type {}",
                variable.name, variable.resolved_type
            )));
        }
        Ok(())
    }
}

impl MemoryState {
    /// Checks a loaded snapshot for cross-references the mutating methods
    /// would never produce.
    pub(crate) fn validate(&self) -> VariableStoreResult<()> {
        let corrupt = |detail: String| {
            VariableStoreError::Serialization(format!("inconsistent state snapshot: {detail}"))
        };

        for state in &self.collections {
            let collection = &state.collection;
            if state.seq >= self.next_collection_seq {
                return Err(corrupt(format!(
                    "collection {} is ahead of the collection sequence",
                    collection.id
                )));
            }
            for variable_id in &collection.variable_ids {
                let owned = self
                    .variables
                    .get(variable_id)
                    .is_some_and(|variable| variable.collection_id == collection.id);
                if !owned {
                    return Err(corrupt(format!(
                        "collection {} lists unknown variable {variable_id}",
                        collection.id
                    )));
                }
            }
        }

        for (variable_id, variable) in &self.variables {
            let seq = variable_id
                .strip_prefix("VariableID:")
                .and_then(|seq| seq.parse::<u64>().ok());
            let in_sequence = seq.is_some_and(|seq| seq < self.next_variable_seq);
            if variable.id != *variable_id || !in_sequence {
                return Err(corrupt(format!("variable id {variable_id} is malformed")));
            }
            let collection = self
                .collection(&variable.collection_id)
                .map_err(|_| corrupt(format!("variable {variable_id} has no collection")))?;
            if !collection.collection.variable_ids.contains(variable_id) {
                return Err(corrupt(format!(
                    "variable {variable_id} is missing from collection {}",
                    variable.collection_id
                )));
            }
            for (mode_id, value) in &variable.values_by_mode {
                if !collection.collection.has_mode(mode_id) {
                    return Err(corrupt(format!(
                        "variable {variable_id} has a value for foreign mode {mode_id}"
                    )));
                }
                if let Some(target) = value.alias_target() {
                    if !self.variables.contains_key(target) {
                        return Err(corrupt(format!(
                            "variable {variable_id} aliases missing variable {target}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_color(color: &Color) -> VariableStoreResult<()> {
    let channels = [color.r, color.g, color.b, color.a];
    if channels
        .iter()
        .all(|channel| channel.is_finite() && (0.0..=1.0).contains(channel))
    {
        Ok(())
    } else {
        Err(VariableStoreError::InvalidInput(format!(
            "color channels must lie in [0, 1]: {color:?}"
        )))
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryVariableStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: MemoryState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn snapshot(&self) -> VariableStoreResult<MemoryState> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> VariableStoreResult<MutexGuard<'_, MemoryState>> {
        self.inner.lock().map_err(|_| {
            VariableStoreError::Backend("memory variable store mutex poisoned".to_string())
        })
    }
}

#[async_trait::async_trait]
impl VariableStore for MemoryVariableStore {
    async fn list_collections(&self) -> VariableStoreResult<Vec<Collection>> {
        let state = self.lock()?;
        Ok(state
            .collections
            .iter()
            .map(|state| state.collection.clone())
            .collect())
    }

    async fn get_collection_by_id(&self, id: &CollectionId) -> VariableStoreResult<Collection> {
        let state = self.lock()?;
        Ok(state.collection(id)?.collection.clone())
    }

    async fn get_variable_by_id(&self, id: &VariableId) -> VariableStoreResult<Option<Variable>> {
        let state = self.lock()?;
        Ok(state.variables.get(id).cloned())
    }
}

#[async_trait::async_trait]
impl VariableWriter for MemoryVariableStore {
    async fn create_collection(&self, name: &str) -> VariableStoreResult<CreatedCollection> {
        if name.trim().is_empty() {
            return Err(VariableStoreError::InvalidInput(
                "collection name must not be empty".to_string(),
            ));
        }

        let mut state = self.lock()?;
        let seq = state.allocate_collection_seq();
        let collection_id = format!("VariableCollectionId:{seq}");
        let default_mode_id = format!("{seq}:0");
        state.collections.push(CollectionState {
            seq,
            next_mode_seq: 1,
            collection: Collection {
                id: collection_id.clone(),
                name: name.to_string(),
                modes: vec![Mode {
                    mode_id: default_mode_id.clone(),
                    name: "Mode 1".to_string(),
                }],
                variable_ids: Vec::new(),
            },
        });

        Ok(CreatedCollection {
            collection_id,
            default_mode_id,
        })
    }

    async fn add_mode(
        &self,
        collection_id: &CollectionId,
        name: &str,
    ) -> VariableStoreResult<ModeId> {
        let mut state = self.lock()?;
        let collection = state.collection_mut(collection_id)?;
        if collection.collection.mode_by_name(name).is_some() {
            return Err(VariableStoreError::Conflict(format!(
                "collection {collection_id} already has a mode named '{name}'"
            )));
        }

        let mode_id = format!("{}:{}", collection.seq, collection.next_mode_seq);
        collection.next_mode_seq += 1;
        collection.collection.modes.push(Mode {
            mode_id: mode_id.clone(),
            name: name.to_string(),
        });
        Ok(mode_id)
    }

    async fn rename_mode(
        &self,
        collection_id: &CollectionId,
        mode_id: &ModeId,
        name: &str,
    ) -> VariableStoreResult<()> {
        let mut state = self.lock()?;
        let collection = state.collection_mut(collection_id)?;
        if collection
            .collection
            .modes
            .iter()
            .any(|mode| mode.name == name && &mode.mode_id != mode_id)
        {
            return Err(VariableStoreError::Conflict(format!(
                "collection {collection_id} already has a mode named '{name}'"
            )));
        }

        let mode = collection
            .collection
            .modes
            .iter_mut()
            .find(|mode| &mode.mode_id == mode_id)
            .ok_or_else(|| VariableStoreError::NotFound {
                resource: "mode",
                id: mode_id.clone(),
            })?;
        mode.name = name.to_string();
        Ok(())
    }

    async fn create_variable(
        &self,
        name: &str,
        collection_id: &CollectionId,
        resolved_type: ResolvedType,
    ) -> VariableStoreResult<VariableId> {
        if name.trim().is_empty() {
            return Err(VariableStoreError::InvalidInput(
                "variable name must not be empty".to_string(),
            ));
        }

        let mut state = self.lock()?;
        let taken = {
            let collection = state.collection(collection_id)?;
            collection.collection.variable_ids.iter().any(|id| {
                state
                    .variables
                    .get(id)
                    .is_some_and(|variable| variable.name == name)
            })
        };
        if taken {
            return Err(VariableStoreError::Conflict(format!(
                "collection {collection_id} already has a variable named '{name}'"
            )));
        }

        let variable_id = state.allocate_variable_id();
        state.variables.insert(
            variable_id.clone(),
            Variable {
                id: variable_id.clone(),
                name: name.to_string(),
                collection_id: collection_id.clone(),
                resolved_type,
                values_by_mode: BTreeMap::new(),
            },
        );
        state
            .collection_mut(collection_id)?
            .collection
            .variable_ids
            .push(variable_id.clone());
        Ok(variable_id)
    }

    async fn set_value_for_mode(
        &self,
        variable_id: &VariableId,
        mode_id: &ModeId,
        value: VariableValue,
    ) -> VariableStoreResult<()> {
        let mut state = self.lock()?;
        let variable = state.variable(variable_id)?;
        if !state.collection(&variable.collection_id)?.collection.has_mode(mode_id) {
            return Err(VariableStoreError::NotFound {
                resource: "mode",
                id: mode_id.clone(),
            });
        }
        state.check_value(variable, &value)?;

        if let Some(variable) = state.variables.get_mut(variable_id) {
            variable.values_by_mode.insert(mode_id.clone(), value);
        }
        Ok(())
    }
}
