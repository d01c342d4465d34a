pub mod fs;
pub mod memory;
pub mod store;
pub mod types;

pub use fs::FsVariableStore;
pub use memory::MemoryVariableStore;
pub use store::{VariableStore, VariableStoreError, VariableStoreResult, VariableWriter};
pub use types::{
    Collection, CollectionId, Color, CreatedCollection, Mode, ModeId, ResolvedType, Variable,
    VariableId, VariableValue,
};
