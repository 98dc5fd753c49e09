//! Cabecera (`Definition`) e historial (`DefinitionVersion`).
//!
//! `Definition` es una proyección desnormalizada de la última versión
//! conocida: se muta en sitio. `DefinitionVersion` es el log de snapshots;
//! sólo `active`, `title` y `start_node_id` cambian tras su creación.
//! Cuando se borra la versión a la que apunta la cabecera, la cabecera se
//! re-materializa con `Definition::resync_from`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::User;
use super::version::Version;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub definition_id: Uuid,
    pub tenant_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub create_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    pub name: String,
    pub title: String,
    pub description: String,
    /// Grafo de proceso serializado; opaco para este crate.
    pub content: String,
    /// Major de la versión más reciente registrada.
    pub version: u32,
    pub active: bool,
    pub start_node_id: Option<i64>,
}

impl Definition {
    /// Versión completa (`"<major>.0"`) que corresponde a esta cabecera.
    pub fn head_version(&self) -> Version {
        Version::from_major(self.version)
    }

    /// Copia contenido, versión, flags y auditoría desde un snapshot.
    ///
    /// Es el único camino para re-apuntar la cabecera a otra versión; la
    /// identidad (`definition_id`) no cambia.
    pub fn resync_from(&mut self, snapshot: &DefinitionVersion) {
        self.tenant_id = snapshot.tenant_id;
        self.user_id = snapshot.user_id;
        self.user_name = snapshot.user_name.clone();
        self.create_date = snapshot.create_date;
        self.modified_date = snapshot.create_date;
        self.name = snapshot.name.clone();
        self.title = snapshot.title.clone();
        self.description = snapshot.description.clone();
        self.content = snapshot.content.clone();
        self.version = snapshot.version.major;
        self.active = snapshot.active;
        self.start_node_id = snapshot.start_node_id;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionVersion {
    pub version_id: Uuid,
    pub definition_id: Uuid,
    pub tenant_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub status_by_user_id: i64,
    pub status_by_user_name: String,
    pub status_date: DateTime<Utc>,
    pub create_date: DateTime<Utc>,
    pub name: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub version: Version,
    pub active: bool,
    pub start_node_id: Option<i64>,
    /// Código de estado de aprobación (opaco).
    pub status: i32,
}

impl DefinitionVersion {
    /// Snapshot de la cabecera tal como está en este momento.
    pub fn snapshot(definition: &Definition, user: &User, version: Version, status: i32) -> Self {
        Self { version_id: Uuid::new_v4(),
               definition_id: definition.definition_id,
               tenant_id: definition.tenant_id,
               user_id: user.user_id,
               user_name: user.full_name.clone(),
               status_by_user_id: user.user_id,
               status_by_user_name: user.full_name.clone(),
               status_date: definition.modified_date,
               create_date: definition.modified_date,
               name: definition.name.clone(),
               title: definition.title.clone(),
               description: definition.description.clone(),
               content: definition.content.clone(),
               version,
               active: definition.active,
               start_node_id: definition.start_node_id,
               status }
    }
}

/// Datos de entrada para `add_definition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDefinition {
    pub name: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub version: u32,
}

/// Nuevo contenido para una revisión (update con bump major).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionRevision {
    pub name: String,
    pub title: String,
    pub description: String,
    pub content: String,
}

/// Descriptor externo de una definición ya parseada (nombre, descripción,
/// contenido). Lo produce la capa que interpreta el XML/JSON del proceso.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionDescriptor {
    pub name: String,
    pub description: String,
    pub content: String,
}

impl DefinitionDescriptor {
    pub fn into_revision(self, title: impl Into<String>) -> DefinitionRevision {
        DefinitionRevision { name: self.name,
                             title: title.into(),
                             description: self.description,
                             content: self.content }
    }
}
