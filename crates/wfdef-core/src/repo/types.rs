//! Contrato del Record Store.
//!
//! El store es el único recurso mutable compartido. El manager nunca cachea
//! filas entre llamadas: cada operación pública abre una unidad (`read` o
//! `write`) y trabaja contra `DefinitionRecords` dentro de ella.
//!
//! Garantías exigidas a cualquier implementación de `write`:
//! - Atomicidad: o se aplican todos los cambios hechos por el closure o
//!   ninguno.
//! - Exclusión por clave: ninguna otra unidad que comparta alguna de las
//!   claves (tenant, name) pedidas se ejecuta en paralelo.
//! - El closure es `FnMut`: un backend durable puede re-ejecutar la unidad
//!   completa tras un conflicto de serialización transitorio.
use std::cmp::Ordering;

use uuid::Uuid;

use crate::errors::LifecycleError;
use crate::model::{Definition, DefinitionVersion, Version};

/// Clave de exclusión mutua para todas las versiones de un nombre.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub tenant_id: i64,
    pub name: String,
}

impl LockKey {
    pub fn new(tenant_id: i64, name: impl Into<String>) -> Self {
        Self { tenant_id, name: name.into() }
    }
}

/// Rango `[start, end)` sobre el resultado ordenado. `end = None` = sin tope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub start: usize,
    pub end: Option<usize>,
}

impl Page {
    pub const ALL: Page = Page { start: 0, end: None };

    pub fn range(start: usize, end: usize) -> Self {
        Self { start, end: Some(end.max(start)) }
    }

    pub fn first(n: usize) -> Self {
        Self::range(0, n)
    }

    /// Cantidad máxima de filas, si hay tope.
    pub fn limit(&self) -> Option<usize> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    pub fn slice<T>(&self, rows: Vec<T>) -> Vec<T> {
        let it = rows.into_iter().skip(self.start);
        match self.limit() {
            Some(n) => it.take(n).collect(),
            None => it.collect(),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Version,
    Name,
    Title,
    CreateDate,
    ModifiedDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: OrderField,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: OrderField) -> Self {
        Self { field, direction: Direction::Asc }
    }

    pub fn desc(field: OrderField) -> Self {
        Self { field, direction: Direction::Desc }
    }

    fn directed(&self, ord: Ordering) -> Ordering {
        match self.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }

    pub fn compare_definitions(&self, a: &Definition, b: &Definition) -> Ordering {
        let ord = match self.field {
            OrderField::Version => a.version.cmp(&b.version),
            OrderField::Name => a.name.cmp(&b.name),
            OrderField::Title => a.title.cmp(&b.title),
            OrderField::CreateDate => a.create_date.cmp(&b.create_date),
            OrderField::ModifiedDate => a.modified_date.cmp(&b.modified_date),
        };
        self.directed(ord)
    }

    /// `ModifiedDate` sobre versiones usa `status_date` (los snapshots no
    /// tienen fecha de modificación propia).
    pub fn compare_versions(&self, a: &DefinitionVersion, b: &DefinitionVersion) -> Ordering {
        let ord = match self.field {
            OrderField::Version => a.version.cmp(&b.version),
            OrderField::Name => a.name.cmp(&b.name),
            OrderField::Title => a.title.cmp(&b.title),
            OrderField::CreateDate => a.create_date.cmp(&b.create_date),
            OrderField::ModifiedDate => a.status_date.cmp(&b.status_date),
        };
        self.directed(ord)
    }
}

/// Orden por defecto: versión descendente (la más reciente primero).
impl Default for OrderBy {
    fn default() -> Self {
        Self::desc(OrderField::Version)
    }
}

/// Filtro secundario sobre `Definition`; el tenant siempre se pasa aparte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionFilter {
    pub name: Option<String>,
    pub active: Option<bool>,
}

impl DefinitionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), active: None }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn matches(&self, tenant_id: i64, d: &Definition) -> bool {
        d.tenant_id == tenant_id
        && self.name.as_deref().map_or(true, |n| d.name == n)
        && self.active.map_or(true, |a| d.active == a)
    }
}

/// Filtro secundario sobre `DefinitionVersion`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionFilter {
    pub name: Option<String>,
    pub definition_id: Option<Uuid>,
    pub active: Option<bool>,
}

impl VersionFilter {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn of_definition(definition_id: Uuid) -> Self {
        Self { definition_id: Some(definition_id), ..Self::default() }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn matches(&self, tenant_id: i64, v: &DefinitionVersion) -> bool {
        v.tenant_id == tenant_id
        && self.name.as_deref().map_or(true, |n| v.name == n)
        && self.definition_id.map_or(true, |id| v.definition_id == id)
        && self.active.map_or(true, |a| v.active == a)
    }
}

/// Superficie CRUD + índices secundarios disponible dentro de una unidad.
///
/// Los `update_*` fallan con `NotFound` si la fila no existe; los `remove_*`
/// de una sola fila también.
pub trait DefinitionRecords {
    fn insert_definition(&mut self, definition: &Definition) -> Result<(), LifecycleError>;
    fn update_definition(&mut self, definition: &Definition) -> Result<(), LifecycleError>;
    fn remove_definition(&mut self, definition_id: Uuid) -> Result<(), LifecycleError>;
    fn find_definition(&mut self, definition_id: Uuid) -> Result<Option<Definition>, LifecycleError>;
    /// Búsqueda exacta por (tenant, name, version).
    fn find_definition_by_version(&mut self,
                                  tenant_id: i64,
                                  name: &str,
                                  version: u32)
                                  -> Result<Option<Definition>, LifecycleError>;
    fn find_definitions(&mut self,
                        tenant_id: i64,
                        filter: &DefinitionFilter,
                        page: Page,
                        order: OrderBy)
                        -> Result<Vec<Definition>, LifecycleError>;
    fn count_definitions(&mut self, tenant_id: i64, filter: &DefinitionFilter) -> Result<usize, LifecycleError>;
    fn remove_tenant_definitions(&mut self, tenant_id: i64) -> Result<usize, LifecycleError>;

    fn insert_version(&mut self, version: &DefinitionVersion) -> Result<(), LifecycleError>;
    fn update_version(&mut self, version: &DefinitionVersion) -> Result<(), LifecycleError>;
    fn remove_version(&mut self, version_id: Uuid) -> Result<(), LifecycleError>;
    fn find_version(&mut self,
                    definition_id: Uuid,
                    version: &Version)
                    -> Result<Option<DefinitionVersion>, LifecycleError>;
    /// Búsqueda exacta por (tenant, name, version).
    fn find_version_by_name(&mut self,
                            tenant_id: i64,
                            name: &str,
                            version: &Version)
                            -> Result<Option<DefinitionVersion>, LifecycleError>;
    fn find_versions(&mut self,
                     tenant_id: i64,
                     filter: &VersionFilter,
                     page: Page,
                     order: OrderBy)
                     -> Result<Vec<DefinitionVersion>, LifecycleError>;
    fn count_versions(&mut self, tenant_id: i64, filter: &VersionFilter) -> Result<usize, LifecycleError>;
    fn remove_definition_versions(&mut self, definition_id: Uuid) -> Result<usize, LifecycleError>;
    fn remove_tenant_versions(&mut self, tenant_id: i64) -> Result<usize, LifecycleError>;

    /// Definición más reciente (versión descendente, límite 1) de un nombre.
    fn find_latest_definition(&mut self, tenant_id: i64, name: &str) -> Result<Option<Definition>, LifecycleError> {
        let rows = self.find_definitions(tenant_id, &DefinitionFilter::named(name), Page::first(1), OrderBy::default())?;
        Ok(rows.into_iter().next())
    }

    /// Snapshot más reciente de una definición.
    fn find_latest_version(&mut self,
                           tenant_id: i64,
                           definition_id: Uuid)
                           -> Result<Option<DefinitionVersion>, LifecycleError> {
        let rows = self.find_versions(tenant_id,
                                      &VersionFilter::of_definition(definition_id),
                                      Page::first(1),
                                      OrderBy::default())?;
        Ok(rows.into_iter().next())
    }
}

/// Dueño del alcance transaccional.
pub trait DefinitionStore: Send + Sync {
    /// Ejecuta `f` sobre una vista consistente. Los cambios que `f` intente
    /// hacer no se persisten.
    fn read<T, F>(&self, f: F) -> Result<T, LifecycleError>
        where F: FnMut(&mut dyn DefinitionRecords) -> Result<T, LifecycleError>;

    /// Ejecuta `f` como unidad atómica bajo la exclusión de todas las claves
    /// de `locks` (vacío = sin exclusión por nombre).
    fn write<T, F>(&self, locks: &[LockKey], f: F) -> Result<T, LifecycleError>
        where F: FnMut(&mut dyn DefinitionRecords) -> Result<T, LifecycleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_slices_half_open_range() {
        let rows: Vec<u32> = (0..10).collect();
        assert_eq!(Page::range(2, 5).slice(rows.clone()), vec![2, 3, 4]);
        assert_eq!(Page::first(1).slice(rows.clone()), vec![0]);
        assert_eq!(Page::ALL.slice(rows.clone()).len(), 10);
        assert!(Page::range(5, 3).slice(rows).is_empty());
    }

    #[test]
    fn page_limit() {
        assert_eq!(Page::range(3, 8).limit(), Some(5));
        assert_eq!(Page::ALL.limit(), None);
    }
}
