//! wfdef-core: plano de control de definiciones de workflow.
//!
//! Maneja definiciones nombradas y versionadas por tenant: alta, activación,
//! revisiones con bump de versión, títulos y borrado seguro. No ejecuta
//! workflows ni interpreta el contenido (blob opaco).
//!
//! Módulos:
//! - `model`: `Definition` (cabecera), `DefinitionVersion` (historial),
//!   `Version` y el contexto de la petición.
//! - `repo`: contrato del Record Store y backend en memoria.
//! - `collab`: colaboradores externos (usuarios, instancias, grafo).
//! - `manager`: `DefinitionManager`, dueño de los invariantes.
pub mod collab;
pub mod constants;
pub mod errors;
pub mod manager;
pub mod model;
pub mod repo;

pub use collab::{ComponentKind, GraphComponent, InMemoryInstanceTracker, InMemoryUserDirectory, InstanceTracker,
                 RecordingGraphComponent, UserDirectory};
pub use errors::{ConflictReason, Entity, LifecycleError};
pub use manager::DefinitionManager;
pub use model::{Bump, Definition, DefinitionDescriptor, DefinitionRevision, DefinitionVersion, NewDefinition,
                ServiceContext, User, Version};
pub use repo::{DefinitionFilter, DefinitionRecords, DefinitionStore, InMemoryDefinitionStore, LockKey, OrderBy,
               OrderField, Page, VersionFilter};
