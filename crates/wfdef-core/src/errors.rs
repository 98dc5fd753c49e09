//! Errores del ciclo de vida de definiciones.
//!
//! Taxonomía:
//! - `NotFound`: la definición, versión o usuario referenciado no existe.
//! - `Conflict`: la mutación violaría un invariante de seguridad (borrar una
//!   versión activa o con instancias incompletas).
//! - `Store`: fallo opaco del Record Store, propagado sin transformar.
//!
//! El payload se limita al tipo de error y al identificador ofensivo; no hay
//! formateo orientado a usuario en esta capa.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Entidad referenciada por un `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Definition,
    DefinitionVersion,
    User,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Entity::Definition => "definition",
            Entity::DefinitionVersion => "definition version",
            Entity::User => "user",
        };
        f.write_str(s)
    }
}

/// Motivo por el cual una operación destructiva fue rechazada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// La definición (o versión) está activa.
    Active,
    /// Existen instancias en curso que la referencian.
    IncompleteInstances,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::Active => f.write_str("cannot delete active workflow definition"),
            ConflictReason::IncompleteInstances => f.write_str("cannot delete incomplete workflow definition"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no such {entity}: {key}")]
    NotFound { entity: Entity, key: String },
    #[error("{reason} {definition_id}")]
    Conflict { definition_id: Uuid, reason: ConflictReason },
    #[error("invalid version string: {0:?}")]
    InvalidVersion(String),
    #[error("collaborator {component} failed: {message}")]
    Collaborator { component: String, message: String },
    #[error("store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl LifecycleError {
    pub fn not_found(entity: Entity, key: impl Into<String>) -> Self {
        Self::NotFound { entity, key: key.into() }
    }

    pub fn conflict(definition_id: Uuid, reason: ConflictReason) -> Self {
        Self::Conflict { definition_id, reason }
    }

    /// Envuelve un fallo del backend (o un mensaje) como `Store`.
    pub fn store(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Store(err.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
