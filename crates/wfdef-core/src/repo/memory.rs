//! Record Store en memoria.
//!
//! Útil para tests y prototipos. Las unidades se serializan con un único
//! mutex (cubre trivialmente la exclusión por (tenant, name)) y se aplican
//! copy-on-write: el closure trabaja sobre una copia de las tablas que sólo
//! reemplaza a las vigentes si termina en `Ok`.
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use uuid::Uuid;

use super::types::{DefinitionFilter, DefinitionRecords, DefinitionStore, LockKey, OrderBy, Page, VersionFilter};
use crate::errors::{Entity, LifecycleError};
use crate::model::{Definition, DefinitionVersion, Version};

/// Tablas en orden de inserción (desempate estable al ordenar).
#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    definitions: IndexMap<Uuid, Definition>,
    versions: IndexMap<Uuid, DefinitionVersion>,
}

impl MemoryTables {
    pub fn definition_count(&self) -> usize {
        self.definitions.len()
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDefinitionStore {
    tables: Mutex<MemoryTables>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, MemoryTables>, LifecycleError> {
        self.tables
            .lock()
            .map_err(|_| LifecycleError::store("in-memory store mutex poisoned"))
    }

    /// Copia de todas las filas (diagnóstico y tests).
    pub fn snapshot(&self) -> Result<MemoryTables, LifecycleError> {
        Ok(self.tables()?.clone())
    }
}

impl DefinitionStore for InMemoryDefinitionStore {
    fn read<T, F>(&self, mut f: F) -> Result<T, LifecycleError>
        where F: FnMut(&mut dyn DefinitionRecords) -> Result<T, LifecycleError>
    {
        let mut view = self.tables()?.clone();
        f(&mut view)
    }

    fn write<T, F>(&self, _locks: &[LockKey], mut f: F) -> Result<T, LifecycleError>
        where F: FnMut(&mut dyn DefinitionRecords) -> Result<T, LifecycleError>
    {
        let mut guard = self.tables()?;
        let mut staged = guard.clone();
        let out = f(&mut staged)?;
        *guard = staged;
        Ok(out)
    }
}

impl DefinitionRecords for MemoryTables {
    fn insert_definition(&mut self, definition: &Definition) -> Result<(), LifecycleError> {
        if self.definitions.contains_key(&definition.definition_id) {
            return Err(LifecycleError::store(format!("duplicate definition id {}", definition.definition_id)));
        }
        self.definitions.insert(definition.definition_id, definition.clone());
        Ok(())
    }

    fn update_definition(&mut self, definition: &Definition) -> Result<(), LifecycleError> {
        match self.definitions.get_mut(&definition.definition_id) {
            Some(row) => {
                *row = definition.clone();
                Ok(())
            }
            None => Err(LifecycleError::not_found(Entity::Definition, definition.definition_id.to_string())),
        }
    }

    fn remove_definition(&mut self, definition_id: Uuid) -> Result<(), LifecycleError> {
        self.definitions
            .shift_remove(&definition_id)
            .map(|_| ())
            .ok_or_else(|| LifecycleError::not_found(Entity::Definition, definition_id.to_string()))
    }

    fn find_definition(&mut self, definition_id: Uuid) -> Result<Option<Definition>, LifecycleError> {
        Ok(self.definitions.get(&definition_id).cloned())
    }

    fn find_definition_by_version(&mut self,
                                  tenant_id: i64,
                                  name: &str,
                                  version: u32)
                                  -> Result<Option<Definition>, LifecycleError> {
        Ok(self.definitions
               .values()
               .find(|d| d.tenant_id == tenant_id && d.name == name && d.version == version)
               .cloned())
    }

    fn find_definitions(&mut self,
                        tenant_id: i64,
                        filter: &DefinitionFilter,
                        page: Page,
                        order: OrderBy)
                        -> Result<Vec<Definition>, LifecycleError> {
        let mut rows: Vec<Definition> = self.definitions
                                            .values()
                                            .filter(|d| filter.matches(tenant_id, d))
                                            .cloned()
                                            .collect();
        rows.sort_by(|a, b| order.compare_definitions(a, b));
        Ok(page.slice(rows))
    }

    fn count_definitions(&mut self, tenant_id: i64, filter: &DefinitionFilter) -> Result<usize, LifecycleError> {
        Ok(self.definitions.values().filter(|d| filter.matches(tenant_id, d)).count())
    }

    fn remove_tenant_definitions(&mut self, tenant_id: i64) -> Result<usize, LifecycleError> {
        let before = self.definitions.len();
        self.definitions.retain(|_, d| d.tenant_id != tenant_id);
        Ok(before - self.definitions.len())
    }

    fn insert_version(&mut self, version: &DefinitionVersion) -> Result<(), LifecycleError> {
        if self.versions.contains_key(&version.version_id) {
            return Err(LifecycleError::store(format!("duplicate version id {}", version.version_id)));
        }
        self.versions.insert(version.version_id, version.clone());
        Ok(())
    }

    fn update_version(&mut self, version: &DefinitionVersion) -> Result<(), LifecycleError> {
        match self.versions.get_mut(&version.version_id) {
            Some(row) => {
                *row = version.clone();
                Ok(())
            }
            None => Err(LifecycleError::not_found(Entity::DefinitionVersion, version.version_id.to_string())),
        }
    }

    fn remove_version(&mut self, version_id: Uuid) -> Result<(), LifecycleError> {
        self.versions
            .shift_remove(&version_id)
            .map(|_| ())
            .ok_or_else(|| LifecycleError::not_found(Entity::DefinitionVersion, version_id.to_string()))
    }

    fn find_version(&mut self,
                    definition_id: Uuid,
                    version: &Version)
                    -> Result<Option<DefinitionVersion>, LifecycleError> {
        Ok(self.versions
               .values()
               .find(|v| v.definition_id == definition_id && v.version == *version)
               .cloned())
    }

    fn find_version_by_name(&mut self,
                            tenant_id: i64,
                            name: &str,
                            version: &Version)
                            -> Result<Option<DefinitionVersion>, LifecycleError> {
        Ok(self.versions
               .values()
               .find(|v| v.tenant_id == tenant_id && v.name == name && v.version == *version)
               .cloned())
    }

    fn find_versions(&mut self,
                     tenant_id: i64,
                     filter: &VersionFilter,
                     page: Page,
                     order: OrderBy)
                     -> Result<Vec<DefinitionVersion>, LifecycleError> {
        let mut rows: Vec<DefinitionVersion> = self.versions
                                                   .values()
                                                   .filter(|v| filter.matches(tenant_id, v))
                                                   .cloned()
                                                   .collect();
        rows.sort_by(|a, b| order.compare_versions(a, b));
        Ok(page.slice(rows))
    }

    fn count_versions(&mut self, tenant_id: i64, filter: &VersionFilter) -> Result<usize, LifecycleError> {
        Ok(self.versions.values().filter(|v| filter.matches(tenant_id, v)).count())
    }

    fn remove_definition_versions(&mut self, definition_id: Uuid) -> Result<usize, LifecycleError> {
        let before = self.versions.len();
        self.versions.retain(|_, v| v.definition_id != definition_id);
        Ok(before - self.versions.len())
    }

    fn remove_tenant_versions(&mut self, tenant_id: i64) -> Result<usize, LifecycleError> {
        let before = self.versions.len();
        self.versions.retain(|_, v| v.tenant_id != tenant_id);
        Ok(before - self.versions.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::User;

    fn definition(name: &str, version: u32) -> Definition {
        let now = Utc::now();
        Definition { definition_id: Uuid::new_v4(),
                     tenant_id: 1,
                     user_id: 1,
                     user_name: "admin".into(),
                     create_date: now,
                     modified_date: now,
                     name: name.into(),
                     title: name.into(),
                     description: String::new(),
                     content: format!("<{name} v={version}/>"),
                     version,
                     active: false,
                     start_node_id: None }
    }

    #[test]
    fn failed_write_leaves_tables_untouched() {
        let store = InMemoryDefinitionStore::new();
        let def = definition("approval", 1);
        let res: Result<(), LifecycleError> = store.write(&[], |r| {
                                                       r.insert_definition(&def)?;
                                                       Err(LifecycleError::store("boom"))
                                                   });
        assert!(res.is_err());
        assert_eq!(store.snapshot().unwrap().definition_count(), 0);
    }

    #[test]
    fn latest_definition_is_highest_version() {
        let store = InMemoryDefinitionStore::new();
        store.write(&[], |r| {
                 r.insert_definition(&definition("approval", 1))?;
                 r.insert_definition(&definition("approval", 10))?;
                 r.insert_definition(&definition("approval", 9))?;
                 r.insert_definition(&definition("other", 50))
             })
             .unwrap();
        let latest = store.read(|r| r.find_latest_definition(1, "approval")).unwrap().unwrap();
        assert_eq!(latest.version, 10);
        assert!(store.read(|r| r.find_latest_definition(2, "approval")).unwrap().is_none());
    }

    #[test]
    fn latest_version_orders_numerically() {
        let store = InMemoryDefinitionStore::new();
        let def = definition("approval", 1);
        let user = User { user_id: 1, full_name: "admin".into() };
        store.write(&[], |r| {
                 r.insert_definition(&def)?;
                 for v in ["2.0", "10.0", "9.3"] {
                     r.insert_version(&DefinitionVersion::snapshot(&def, &user, v.parse()?, 0))?;
                 }
                 Ok(())
             })
             .unwrap();
        let latest = store.read(|r| r.find_latest_version(1, def.definition_id)).unwrap().unwrap();
        assert_eq!(latest.version.to_string(), "10.0");
    }

    #[test]
    fn update_of_missing_row_is_not_found() {
        let store = InMemoryDefinitionStore::new();
        let err = store.write(&[], |r| r.update_definition(&definition("ghost", 1))).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn remove_of_missing_row_is_not_found() {
        let store = InMemoryDefinitionStore::new();
        assert!(store.write(&[], |r| r.remove_definition(Uuid::new_v4())).unwrap_err().is_not_found());
        assert!(store.write(&[], |r| r.remove_version(Uuid::new_v4())).unwrap_err().is_not_found());
    }

    #[test]
    fn filters_and_pages_definitions() {
        let store = InMemoryDefinitionStore::new();
        store.write(&[], |r| {
                 for v in 1..=5 {
                     let mut d = definition("approval", v);
                     d.active = v == 3;
                     r.insert_definition(&d)?;
                 }
                 Ok(())
             })
             .unwrap();
        let active = DefinitionFilter::named("approval").with_active(true);
        assert_eq!(store.read(|r| r.count_definitions(1, &active)).unwrap(), 1);
        let page = store.read(|r| {
                             r.find_definitions(1,
                                                &DefinitionFilter::all(),
                                                Page::range(1, 3),
                                                OrderBy::asc(crate::repo::OrderField::Version))
                         })
                        .unwrap();
        let versions: Vec<u32> = page.iter().map(|d| d.version).collect();
        assert_eq!(versions, vec![2, 3]);
    }
}
