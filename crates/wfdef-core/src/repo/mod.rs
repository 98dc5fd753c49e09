pub mod memory;
pub mod types;

pub use memory::{InMemoryDefinitionStore, MemoryTables};
pub use types::{DefinitionFilter, DefinitionRecords, DefinitionStore, Direction, LockKey, OrderBy, OrderField, Page,
                VersionFilter};
