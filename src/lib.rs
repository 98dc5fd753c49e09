//! wfdef-rust
//!
//! Librería de entrada del workspace:
//! - `config`: contexto por defecto y URL de base de datos desde el entorno.
//! - `bootstrap`: arma un `DefinitionManager` en memoria o sobre Postgres.
//! - Re-exporta el núcleo (`wfdef_core`) y la persistencia.

pub mod bootstrap;
pub mod config;

pub use wfdef_core::*;
pub use wfdef_persistence as persistence;
