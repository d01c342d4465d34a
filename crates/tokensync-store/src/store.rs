use crate::types::{
    Collection, CollectionId, CreatedCollection, ModeId, ResolvedType, Variable, VariableId,
    VariableValue,
};

#[derive(Debug, thiserror::Error)]
pub enum VariableStoreError {
    #[error("resource not found: {resource} ({id})")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

pub type VariableStoreResult<T> = Result<T, VariableStoreError>;

/// Read side of the host variable storage.
#[async_trait::async_trait]
pub trait VariableStore: Send + Sync {
    /// Collections in host enumeration order.
    async fn list_collections(&self) -> VariableStoreResult<Vec<Collection>>;

    async fn get_collection_by_id(&self, id: &CollectionId) -> VariableStoreResult<Collection>;

    /// `Ok(None)` when no variable has this id.
    async fn get_variable_by_id(&self, id: &VariableId) -> VariableStoreResult<Option<Variable>>;
}

/// Mutations used by the importer.
#[async_trait::async_trait]
pub trait VariableWriter: VariableStore {
    async fn create_collection(&self, name: &str) -> VariableStoreResult<CreatedCollection>;

    async fn add_mode(
        &self,
        collection_id: &CollectionId,
        name: &str,
    ) -> VariableStoreResult<ModeId>;

    async fn rename_mode(
        &self,
        collection_id: &CollectionId,
        mode_id: &ModeId,
        name: &str,
    ) -> VariableStoreResult<()>;

    /// Fails with `Conflict` when the collection already holds a variable with this name.
    async fn create_variable(
        &self,
        name: &str,
        collection_id: &CollectionId,
        resolved_type: ResolvedType,
    ) -> VariableStoreResult<VariableId>;

    async fn set_value_for_mode(
        &self,
        variable_id: &VariableId,
        mode_id: &ModeId,
        value: VariableValue,
    ) -> VariableStoreResult<()>;
}
