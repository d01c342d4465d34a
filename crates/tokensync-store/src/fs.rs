use crate::memory::{MemoryState, MemoryVariableStore};
use crate::store::{VariableStore, VariableStoreError, VariableStoreResult, VariableWriter};
use crate::types::{
    Collection, CollectionId, CreatedCollection, ModeId, ResolvedType, Variable, VariableId,
    VariableValue,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const STATE_FILE_NAME: &str = "variables-state.json";

/// Memory store persisted as a JSON snapshot under a root directory.
#[derive(Clone, Debug)]
pub struct FsVariableStore {
    state_file: PathBuf,
    inner: MemoryVariableStore,
}

impl FsVariableStore {
    /// Opens the store under `root`, creating the directory when needed. An
    /// existing snapshot is loaded and checked for dangling references.
    pub fn new<P: AsRef<Path>>(root: P) -> VariableStoreResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|err| io_failure("create store root", root, &err))?;

        let state_file = root.join(STATE_FILE_NAME);
        let state = load_snapshot(&state_file)?.unwrap_or_default();
        Ok(Self {
            inner: MemoryVariableStore::from_state(state),
            state_file,
        })
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    /// Replaces the snapshot atomically: write a sibling temp file, then rename.
    fn persist(&self) -> VariableStoreResult<()> {
        let raw = serde_json::to_vec_pretty(&self.inner.snapshot()?)
            .map_err(|err| VariableStoreError::Serialization(err.to_string()))?;
        let staged = self.state_file.with_extension("json.tmp");
        fs::write(&staged, raw).map_err(|err| io_failure("write snapshot", &staged, &err))?;
        fs::rename(&staged, &self.state_file)
            .map_err(|err| io_failure("replace snapshot", &self.state_file, &err))
    }
}

fn load_snapshot(path: &Path) -> VariableStoreResult<Option<MemoryState>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_failure("read snapshot", path, &err)),
    };
    let state: MemoryState = serde_json::from_slice(&raw).map_err(|err| {
        VariableStoreError::Serialization(format!("{}: {err}", path.display()))
    })?;
    state.validate()?;
    Ok(Some(state))
}

fn io_failure(action: &str, path: &Path, err: &io::Error) -> VariableStoreError {
    VariableStoreError::Backend(format!("{action} '{}' failed: {err}", path.display()))
}

#[async_trait::async_trait]
impl VariableStore for FsVariableStore {
    async fn list_collections(&self) -> VariableStoreResult<Vec<Collection>> {
        self.inner.list_collections().await
    }

    async fn get_collection_by_id(&self, id: &CollectionId) -> VariableStoreResult<Collection> {
        self.inner.get_collection_by_id(id).await
    }

    async fn get_variable_by_id(&self, id: &VariableId) -> VariableStoreResult<Option<Variable>> {
        self.inner.get_variable_by_id(id).await
    }
}

#[async_trait::async_trait]
impl VariableWriter for FsVariableStore {
    async fn create_collection(&self, name: &str) -> VariableStoreResult<CreatedCollection> {
        let created = self.inner.create_collection(name).await?;
        self.persist()?;
        Ok(created)
    }

    async fn add_mode(
        &self,
        collection_id: &CollectionId,
        name: &str,
    ) -> VariableStoreResult<ModeId> {
        let mode_id = self.inner.add_mode(collection_id, name).await?;
        self.persist()?;
        Ok(mode_id)
    }

    async fn rename_mode(
        &self,
        collection_id: &CollectionId,
        mode_id: &ModeId,
        name: &str,
    ) -> VariableStoreResult<()> {
        self.inner.rename_mode(collection_id, mode_id, name).await?;
        self.persist()
    }

    async fn create_variable(
        &self,
        name: &str,
        collection_id: &CollectionId,
        resolved_type: ResolvedType,
    ) -> VariableStoreResult<VariableId> {
        let id = self
            .inner
            .create_variable(name, collection_id, resolved_type)
            .await?;
        self.persist()?;
        Ok(id)
    }

    async fn set_value_for_mode(
        &self,
        variable_id: &VariableId,
        mode_id: &ModeId,
        value: VariableValue,
    ) -> VariableStoreResult<()> {
        self.inner
            .set_value_for_mode(variable_id, mode_id, value)
            .await?;
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn fs_store_reopen_restores_previous_variables() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let store = FsVariableStore::new(tmp.path()).expect("fs store should initialize");

        let created = store
            .create_collection("tokens")
            .await
            .expect("collection should be created");
        let id = store
            .create_variable("spacing/small", &created.collection_id, ResolvedType::Float)
            .await
            .expect("variable should be created");
        store
            .set_value_for_mode(&id, &created.default_mode_id, VariableValue::Float(8.0))
            .await
            .expect("value should be set");
        drop(store);

        let reopened = FsVariableStore::new(tmp.path()).expect("fs store should reopen");
        let variable = reopened
            .get_variable_by_id(&id)
            .await
            .expect("lookup should succeed")
            .expect("variable should survive reopen");
        assert_eq!(
            variable.value_for_mode(&created.default_mode_id),
            Some(&VariableValue::Float(8.0))
        );

        let next = reopened
            .create_variable("spacing/large", &created.collection_id, ResolvedType::Float)
            .await
            .expect("variable should be created after reopen");
        assert_ne!(next, id);
    }

    #[test]
    fn fs_store_snapshot_with_dangling_alias_expected_open_failure() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let snapshot = serde_json::json!({
            "next_collection_seq": 2,
            "next_variable_seq": 2,
            "collections": [{
                "seq": 1,
                "next_mode_seq": 1,
                "collection": {
                    "id": "VariableCollectionId:1",
                    "name": "tokens",
                    "modes": [{"mode_id": "1:0", "name": "Mode 1"}],
                    "variable_ids": ["VariableID:1"]
                }
            }],
            "variables": {
                "VariableID:1": {
                    "id": "VariableID:1",
                    "name": "color/link",
                    "collection_id": "VariableCollectionId:1",
                    "resolved_type": "COLOR",
                    "values_by_mode": {
                        "1:0": {"type": "VARIABLE_ALIAS", "value": {"id": "VariableID:9"}}
                    }
                }
            }
        });
        std::fs::write(
            tmp.path().join(STATE_FILE_NAME),
            serde_json::to_vec_pretty(&snapshot).expect("snapshot should serialize"),
        )
        .expect("snapshot should be written");

        let error =
            FsVariableStore::new(tmp.path()).expect_err("dangling alias should be rejected");

        assert!(matches!(
            error,
            VariableStoreError::Serialization(message) if message.contains("VariableID:9")
        ));
    }
}
