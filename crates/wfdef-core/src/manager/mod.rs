//! `DefinitionManager`: ciclo de vida de definiciones nombradas y versionadas.
//!
//! Responsabilidades:
//! - Crear cabecera + primer snapshot (`add_definition`).
//! - Activar/desactivar respetando "≤ 1 versión activa por nombre" en el
//!   camino exclusivo (`activate_exclusive`).
//! - Revisar contenido con bump major (`update_definition`,
//!   `increment_definition`) y actualizar títulos.
//! - Borrar con chequeos de seguridad y re-sincronizar la cabecera cuando se
//!   borra la versión a la que apunta.
//! - Lecturas directas (`fetch_*` devuelve `Option`, `get_*` falla con
//!   `NotFound`).
//!
//! Cada operación pública es exactamente una unidad del store; las que mutan
//! filas de un nombre la abren con `LockKey(tenant, name)`.
//!
//! Caminos de activación (fuerza de invariante distinta, a propósito):
//!
//! | operación | desactiva hermanas | toca `start_node_id` |
//! |---|---|---|
//! | `activate_exclusive` | sí | sí |
//! | `activate_flag_only` | no | no |
//! | `activate_by_name` | no | no |
//!
//! Mezclar los dos últimos con el primero puede dejar más de una versión
//! activa para el mismo nombre.

mod lifecycle;

use std::collections::BTreeMap;

use log::debug;
use uuid::Uuid;

use crate::collab::{ComponentKind, GraphComponent, InstanceTracker, UserDirectory};
use crate::errors::{Entity, LifecycleError};
use crate::model::{Definition, DefinitionVersion, ServiceContext, Version};
use crate::repo::{DefinitionFilter, DefinitionRecords, DefinitionStore, OrderBy, Page, VersionFilter};

pub struct DefinitionManager<S: DefinitionStore> {
    store: S,
    users: Box<dyn UserDirectory>,
    instances: Box<dyn InstanceTracker>,
    /// Indexado por tipo: iterar en orden = orden de la cascada.
    components: BTreeMap<ComponentKind, Box<dyn GraphComponent>>,
}

impl<S: DefinitionStore> DefinitionManager<S> {
    pub fn new(store: S, users: impl UserDirectory + 'static, instances: impl InstanceTracker + 'static) -> Self {
        Self { store,
               users: Box::new(users),
               instances: Box::new(instances),
               components: BTreeMap::new() }
    }

    /// Registra el dueño de un tipo de sub-entidad; reemplaza al previo del
    /// mismo tipo.
    pub fn with_component(mut self, component: impl GraphComponent + 'static) -> Self {
        self.components.insert(component.kind(), Box::new(component));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn component_kinds(&self) -> Vec<ComponentKind> {
        self.components.keys().copied().collect()
    }

    // ----------------------------------------------------------------- reads

    pub fn fetch_definition(&self, tenant_id: i64, name: &str, version: u32) -> Result<Option<Definition>, LifecycleError> {
        self.store.read(|r| r.find_definition_by_version(tenant_id, name, version))
    }

    pub fn get_definition(&self, ctx: &ServiceContext, name: &str, version: u32) -> Result<Definition, LifecycleError> {
        self.store.read(|r| require_definition_by_version(r, ctx.tenant_id, name, version))
    }

    pub fn fetch_latest_definition(&self, ctx: &ServiceContext, name: &str) -> Result<Option<Definition>, LifecycleError> {
        self.store.read(|r| r.find_latest_definition(ctx.tenant_id, name))
    }

    pub fn get_latest_definition(&self, ctx: &ServiceContext, name: &str) -> Result<Definition, LifecycleError> {
        self.store.read(|r| require_latest_definition(r, ctx.tenant_id, name))
    }

    /// Lista filtrada por tenant y, opcionalmente, nombre y/o flag activo.
    pub fn get_definitions(&self,
                           ctx: &ServiceContext,
                           filter: &DefinitionFilter,
                           page: Page,
                           order: OrderBy)
                           -> Result<Vec<Definition>, LifecycleError> {
        self.store.read(|r| r.find_definitions(ctx.tenant_id, filter, page, order))
    }

    pub fn get_definitions_count(&self, ctx: &ServiceContext, filter: &DefinitionFilter) -> Result<usize, LifecycleError> {
        self.store.read(|r| r.count_definitions(ctx.tenant_id, filter))
    }

    pub fn fetch_definition_version(&self,
                                    ctx: &ServiceContext,
                                    definition_id: Uuid,
                                    version: &Version)
                                    -> Result<Option<DefinitionVersion>, LifecycleError> {
        let found = self.store.read(|r| r.find_version(definition_id, version))?;
        Ok(found.filter(|v| v.tenant_id == ctx.tenant_id))
    }

    pub fn get_definition_version(&self,
                                  ctx: &ServiceContext,
                                  definition_id: Uuid,
                                  version: &Version)
                                  -> Result<DefinitionVersion, LifecycleError> {
        self.fetch_definition_version(ctx, definition_id, version)?
            .ok_or_else(|| LifecycleError::not_found(Entity::DefinitionVersion, format!("definition={definition_id} version={version}")))
    }

    pub fn get_latest_definition_version(&self,
                                         ctx: &ServiceContext,
                                         definition_id: Uuid)
                                         -> Result<DefinitionVersion, LifecycleError> {
        self.store.read(|r| require_latest_version(r, ctx.tenant_id, definition_id))
    }

    /// Historial de un nombre (todas sus definiciones).
    pub fn get_definition_versions(&self,
                                   ctx: &ServiceContext,
                                   name: &str,
                                   page: Page,
                                   order: OrderBy)
                                   -> Result<Vec<DefinitionVersion>, LifecycleError> {
        self.store.read(|r| r.find_versions(ctx.tenant_id, &VersionFilter::named(name), page, order))
    }

    pub fn get_definition_versions_count(&self, ctx: &ServiceContext, name: &str) -> Result<usize, LifecycleError> {
        self.store.read(|r| r.count_versions(ctx.tenant_id, &VersionFilter::named(name)))
    }
}

// --------------------------------------------------------------- helpers

fn require_definition(records: &mut dyn DefinitionRecords,
                      tenant_id: i64,
                      definition_id: Uuid)
                      -> Result<Definition, LifecycleError> {
    records.find_definition(definition_id)?
           .filter(|d| d.tenant_id == tenant_id)
           .ok_or_else(|| LifecycleError::not_found(Entity::Definition, definition_id.to_string()))
}

fn require_definition_by_version(records: &mut dyn DefinitionRecords,
                                 tenant_id: i64,
                                 name: &str,
                                 version: u32)
                                 -> Result<Definition, LifecycleError> {
    records.find_definition_by_version(tenant_id, name, version)?
           .ok_or_else(|| {
               LifecycleError::not_found(Entity::Definition, format!("tenant={tenant_id} name={name} version={version}"))
           })
}

fn require_latest_definition(records: &mut dyn DefinitionRecords,
                             tenant_id: i64,
                             name: &str)
                             -> Result<Definition, LifecycleError> {
    records.find_latest_definition(tenant_id, name)?
           .ok_or_else(|| LifecycleError::not_found(Entity::Definition, format!("tenant={tenant_id} name={name}")))
}

fn require_version(records: &mut dyn DefinitionRecords,
                   definition_id: Uuid,
                   version: &Version)
                   -> Result<DefinitionVersion, LifecycleError> {
    records.find_version(definition_id, version)?
           .ok_or_else(|| {
               LifecycleError::not_found(Entity::DefinitionVersion, format!("definition={definition_id} version={version}"))
           })
}

fn require_latest_version(records: &mut dyn DefinitionRecords,
                          tenant_id: i64,
                          definition_id: Uuid)
                          -> Result<DefinitionVersion, LifecycleError> {
    records.find_latest_version(tenant_id, definition_id)?
           .ok_or_else(|| LifecycleError::not_found(Entity::DefinitionVersion, format!("definition={definition_id}")))
}

/// Resuelve `"<major>.0"` de la definición; si no existe, cae a su último
/// snapshot. Sólo falla si la definición no tiene ninguna versión.
fn resolve_version_or_latest(records: &mut dyn DefinitionRecords,
                             tenant_id: i64,
                             definition_id: Uuid,
                             version: &Version)
                             -> Result<DefinitionVersion, LifecycleError> {
    if let Some(found) = records.find_version(definition_id, version)? {
        return Ok(found);
    }
    debug!("version fallback: definition={definition_id} version={version} not found, using latest");
    require_latest_version(records, tenant_id, definition_id)
}
