//! Colaboradores externos consumidos por el manager.
//!
//! - `UserDirectory`: resuelve el actor (id → nombre) para auditoría.
//! - `InstanceTracker`: predicado "tiene instancias incompletas".
//! - `GraphComponent`: dueños de sub-entidades del grafo (condiciones,
//!   instancias, nodos, tareas, transiciones); sólo se les delega el borrado
//!   en cascada.
//!
//! Las implementaciones en memoria de `memory` sirven como dobles de test y
//! como default para binarios sin backend de grafo.

pub mod memory;

use std::fmt;

use uuid::Uuid;

use crate::errors::LifecycleError;
use crate::model::{User, Version};

pub use memory::{CascadeCall, InMemoryInstanceTracker, InMemoryUserDirectory, RecordingGraphComponent};

pub trait UserDirectory: Send + Sync {
    /// Falla con `NotFound(User)` si el id no existe.
    fn user(&self, user_id: i64) -> Result<User, LifecycleError>;
}

pub trait InstanceTracker: Send + Sync {
    /// `version = None` pregunta por cualquier versión de la definición.
    fn has_incomplete_instances(&self, definition_id: Uuid, version: Option<&Version>) -> Result<bool, LifecycleError>;
}

/// Tipo de sub-entidad del grafo. El orden de las variantes es el orden de
/// la cascada de borrado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    Condition,
    Instance,
    Node,
    Task,
    Transition,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentKind::Condition => "condition",
            ComponentKind::Instance => "instance",
            ComponentKind::Node => "node",
            ComponentKind::Task => "task",
            ComponentKind::Transition => "transition",
        };
        f.write_str(s)
    }
}

pub trait GraphComponent: Send + Sync {
    fn kind(&self) -> ComponentKind;
    fn delete_definition_components(&self, definition_id: Uuid) -> Result<(), LifecycleError>;
    fn delete_tenant_components(&self, tenant_id: i64) -> Result<(), LifecycleError>;
}
