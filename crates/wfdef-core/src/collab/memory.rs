//! Dobles en memoria de los colaboradores.
//!
//! Son `Clone` y comparten estado interno, de modo que un test puede
//! conservar una copia para inspeccionar (o alterar) lo que el manager ve.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::{ComponentKind, GraphComponent, InstanceTracker, UserDirectory};
use crate::errors::{Entity, LifecycleError};
use crate::model::{User, Version};

#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: HashMap<i64, User>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: i64, full_name: impl Into<String>) -> Self {
        self.users.insert(user_id, User { user_id, full_name: full_name.into() });
        self
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn user(&self, user_id: i64) -> Result<User, LifecycleError> {
        self.users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| LifecycleError::not_found(Entity::User, user_id.to_string()))
    }
}

/// Registro de instancias en curso por (definición, versión opcional).
#[derive(Debug, Clone, Default)]
pub struct InMemoryInstanceTracker {
    running: Arc<Mutex<HashSet<(Uuid, Option<Version>)>>>,
}

impl InMemoryInstanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marca una instancia incompleta. Con `version = None` no se asocia a
    /// ninguna versión concreta.
    pub fn start(&self, definition_id: Uuid, version: Option<Version>) {
        if let Ok(mut running) = self.running.lock() {
            running.insert((definition_id, version));
        }
    }

    pub fn complete(&self, definition_id: Uuid, version: Option<Version>) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&(definition_id, version));
        }
    }
}

impl InstanceTracker for InMemoryInstanceTracker {
    fn has_incomplete_instances(&self, definition_id: Uuid, version: Option<&Version>) -> Result<bool, LifecycleError> {
        let running = self.running
                          .lock()
                          .map_err(|_| LifecycleError::store("instance tracker mutex poisoned"))?;
        Ok(running.iter().any(|(id, v)| {
                             *id == definition_id
                             && match version {
                                 // una instancia sin versión cuenta para todas
                                 Some(wanted) => v.as_ref().map_or(true, |v| v == wanted),
                                 None => true,
                             }
                         }))
    }
}

/// Evento registrado por `RecordingGraphComponent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeCall {
    Definition(ComponentKind, Uuid),
    Tenant(ComponentKind, i64),
}

/// Componente que sólo anota las llamadas recibidas. Con `failing` devuelve
/// error en cada borrado.
#[derive(Debug, Clone)]
pub struct RecordingGraphComponent {
    kind: ComponentKind,
    failing: bool,
    calls: Arc<Mutex<Vec<CascadeCall>>>,
}

impl RecordingGraphComponent {
    pub fn new(kind: ComponentKind) -> Self {
        Self { kind, failing: false, calls: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn failing(kind: ComponentKind) -> Self {
        Self { failing: true, ..Self::new(kind) }
    }

    /// Comparte el log de llamadas con otro componente (orden global).
    pub fn sharing_log(kind: ComponentKind, other: &RecordingGraphComponent) -> Self {
        Self { kind, failing: false, calls: Arc::clone(&other.calls) }
    }

    pub fn calls(&self) -> Vec<CascadeCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: CascadeCall) -> Result<(), LifecycleError> {
        if self.failing {
            return Err(LifecycleError::Collaborator { component: self.kind.to_string(),
                                                      message: "simulated failure".into() });
        }
        self.calls
            .lock()
            .map_err(|_| LifecycleError::store("component log mutex poisoned"))?
            .push(call);
        Ok(())
    }
}

impl GraphComponent for RecordingGraphComponent {
    fn kind(&self) -> ComponentKind {
        self.kind
    }

    fn delete_definition_components(&self, definition_id: Uuid) -> Result<(), LifecycleError> {
        self.record(CascadeCall::Definition(self.kind, definition_id))
    }

    fn delete_tenant_components(&self, tenant_id: i64) -> Result<(), LifecycleError> {
        self.record(CascadeCall::Tenant(self.kind, tenant_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_scopes_by_version() {
        let tracker = InMemoryInstanceTracker::new();
        let id = Uuid::new_v4();
        let v1 = Version::new(1, 0);
        let v2 = Version::new(2, 0);
        tracker.start(id, Some(v1));
        assert!(tracker.has_incomplete_instances(id, None).unwrap());
        assert!(tracker.has_incomplete_instances(id, Some(&v1)).unwrap());
        assert!(!tracker.has_incomplete_instances(id, Some(&v2)).unwrap());
        tracker.complete(id, Some(v1));
        assert!(!tracker.has_incomplete_instances(id, None).unwrap());
    }

    #[test]
    fn unknown_user_is_not_found() {
        let users = InMemoryUserDirectory::new().with_user(1, "admin");
        assert_eq!(users.user(1).unwrap().full_name, "admin");
        assert!(users.user(2).unwrap_err().is_not_found());
    }
}
