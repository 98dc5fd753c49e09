//! Modelo de datos: cabecera, historial, versión y contexto.

pub mod context;
pub mod definition;
pub mod version;

pub use context::{ServiceContext, User};
pub use definition::{Definition, DefinitionDescriptor, DefinitionRevision, DefinitionVersion, NewDefinition};
pub use version::{Bump, Version};
