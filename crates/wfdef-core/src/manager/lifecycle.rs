//! Operaciones que mutan filas: alta, activación, revisión y borrado.
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use uuid::Uuid;

use super::{require_definition, require_definition_by_version, require_latest_definition, require_latest_version,
            require_version, resolve_version_or_latest, DefinitionManager};
use crate::constants::STATUS_APPROVED;
use crate::errors::{ConflictReason, Entity, LifecycleError};
use crate::model::{Bump, Definition, DefinitionDescriptor, DefinitionRevision, DefinitionVersion, NewDefinition,
                   ServiceContext, User, Version};
use crate::repo::{DefinitionFilter, DefinitionRecords, DefinitionStore, LockKey, OrderBy, Page, VersionFilter};

/// Reintentos de `write_locked_by_id` cuando la cabecera se renombra entre
/// la lectura del nombre y la toma del lock.
const RENAME_RETRIES: usize = 3;

impl<S: DefinitionStore> DefinitionManager<S> {
    /// Crea una cabecera inactiva y su snapshot `"<version>.0"` aprobado.
    ///
    /// No valida unicidad de (name, version): evitar duplicados es
    /// responsabilidad del llamador (o de un índice único del backend).
    pub fn add_definition(&self, ctx: &ServiceContext, new: &NewDefinition) -> Result<Definition, LifecycleError> {
        debug!("add_definition:start tenant={} name={} version={}", ctx.tenant_id, new.name, new.version);
        let user = self.users.user(ctx.user_id)?;
        let lock = LockKey::new(ctx.tenant_id, &new.name);
        let definition = self.store.write(&[lock], |records| {
                                        let now = Utc::now();
                                        let definition = Definition { definition_id: Uuid::new_v4(),
                                                                      tenant_id: ctx.tenant_id,
                                                                      user_id: user.user_id,
                                                                      user_name: user.full_name.clone(),
                                                                      create_date: now,
                                                                      modified_date: now,
                                                                      name: new.name.clone(),
                                                                      title: new.title.clone(),
                                                                      description: new.description.clone(),
                                                                      content: new.content.clone(),
                                                                      version: new.version,
                                                                      active: false,
                                                                      start_node_id: None };
                                        records.insert_definition(&definition)?;
                                        let snapshot = DefinitionVersion::snapshot(&definition,
                                                                                   &user,
                                                                                   definition.head_version(),
                                                                                   STATUS_APPROVED);
                                        records.insert_version(&snapshot)?;
                                        Ok(definition)
                                    })?;
        debug!("add_definition:done id={}", definition.definition_id);
        Ok(definition)
    }

    /// Activación exclusiva: desactiva toda otra versión activa del mismo
    /// nombre y activa la cabecera `definition_id` con su nodo inicial, todo
    /// bajo el lock del nombre.
    pub fn activate_exclusive(&self,
                              ctx: &ServiceContext,
                              definition_id: Uuid,
                              start_node_id: i64)
                              -> Result<(), LifecycleError> {
        debug!("activate_exclusive:start id={definition_id} start_node={start_node_id}");
        let deactivated = self.write_locked_by_id(ctx.tenant_id, definition_id, None, |records, mut target| {
                                         let now = Utc::now();
                                         let deactivated = deactivate_previous(records, &target, now)?;

                                         target.start_node_id = Some(start_node_id);
                                         target.modified_date = now;
                                         target.active = true;
                                         records.update_definition(&target)?;

                                         let mut version = require_version(records, definition_id, &target.head_version())?;
                                         version.start_node_id = Some(start_node_id);
                                         version.active = true;
                                         records.update_version(&version)?;
                                         Ok(deactivated)
                                     })?;
        debug!("activate_exclusive:done id={definition_id} deactivated_siblings={deactivated}");
        Ok(())
    }

    /// Sólo enciende el flag de la cabecera y de su versión actual. No
    /// desactiva hermanas ni toca el nodo inicial.
    pub fn activate_flag_only(&self, ctx: &ServiceContext, definition_id: Uuid) -> Result<(), LifecycleError> {
        debug!("activate_flag_only:start id={definition_id}");
        self.write_locked_by_id(ctx.tenant_id, definition_id, None, |records, mut target| {
                      target.modified_date = Utc::now();
                      target.active = true;
                      records.update_definition(&target)?;

                      let mut version = require_version(records, definition_id, &target.head_version())?;
                      version.active = true;
                      records.update_version(&version)
                  })
    }

    /// Activa la versión `version` de `name`. Ver `set_active_by_name` para
    /// las reglas de resolución.
    pub fn activate_by_name(&self, ctx: &ServiceContext, name: &str, version: u32) -> Result<(), LifecycleError> {
        debug!("activate_by_name:start tenant={} name={name} version={version}", ctx.tenant_id);
        self.set_active_by_name(ctx, name, version, true)
    }

    pub fn deactivate_by_name(&self, ctx: &ServiceContext, name: &str, version: u32) -> Result<(), LifecycleError> {
        debug!("deactivate_by_name:start tenant={} name={name} version={version}", ctx.tenant_id);
        self.set_active_by_name(ctx, name, version, false)
    }

    /// Resolución con fallback explícito:
    /// 1. cabecera exacta (tenant, name, version);
    /// 2. si no existe, la cabecera más reciente del nombre;
    /// 3. en esa definición, el snapshot `"<version>.0"` o, si falta, el
    ///    último snapshot.
    ///
    /// Sólo el snapshot recibe el flag; la cabecera no se toca.
    fn set_active_by_name(&self, ctx: &ServiceContext, name: &str, version: u32, active: bool) -> Result<(), LifecycleError> {
        self.store.write(&[LockKey::new(ctx.tenant_id, name)], |records| {
                      let definition = match records.find_definition_by_version(ctx.tenant_id, name, version)? {
                          Some(exact) => exact,
                          None => {
                              debug!("set_active_by_name: no head for {name}@{version}, falling back to latest");
                              require_latest_definition(records, ctx.tenant_id, name)?
                          }
                      };
                      let mut snapshot = resolve_version_or_latest(records,
                                                                   ctx.tenant_id,
                                                                   definition.definition_id,
                                                                   &Version::from_major(version))?;
                      snapshot.active = active;
                      records.update_version(&snapshot)
                  })
    }

    /// Revisión de contenido sobre la cabecera `target.definition_id`: la
    /// deja inactiva y agrega un snapshot con bump major respecto al último
    /// snapshot de la definición.
    ///
    /// De `target` sólo se usa el id; la fila se relee del store dentro de la
    /// unidad, acotada al tenant de `ctx`. Si la revisión renombra, se toman
    /// los locks del nombre viejo y del nuevo.
    pub fn update_definition(&self,
                             ctx: &ServiceContext,
                             revision: &DefinitionRevision,
                             target: &Definition)
                             -> Result<Definition, LifecycleError> {
        debug!("update_definition:start id={} name={}", target.definition_id, revision.name);
        let user = self.users.user(ctx.user_id)?;
        let updated = self.write_locked_by_id(ctx.tenant_id,
                                              target.definition_id,
                                              Some(&revision.name),
                                              |records, current| revise(records, &user, revision, current))?;
        debug!("update_definition:done id={} version={}", updated.definition_id, updated.version);
        Ok(updated)
    }

    /// Resuelve la cabecera más reciente de `descriptor.name` y le aplica
    /// una revisión con el contenido del descriptor, en una sola unidad.
    pub fn increment_definition(&self,
                                ctx: &ServiceContext,
                                descriptor: &DefinitionDescriptor,
                                title: &str)
                                -> Result<Definition, LifecycleError> {
        debug!("increment_definition:start tenant={} name={}", ctx.tenant_id, descriptor.name);
        let user = self.users.user(ctx.user_id)?;
        let revision = descriptor.clone().into_revision(title);
        self.store.write(&[LockKey::new(ctx.tenant_id, &descriptor.name)], |records| {
                      let latest = require_latest_definition(records, ctx.tenant_id, &descriptor.name)?;
                      revise(records, &user, &revision, latest)
                  })
    }

    /// Cambia sólo el título de la cabecera exacta y de su snapshot actual.
    pub fn update_title(&self,
                        ctx: &ServiceContext,
                        name: &str,
                        version: u32,
                        title: &str)
                        -> Result<Definition, LifecycleError> {
        debug!("update_title:start tenant={} name={name} version={version}", ctx.tenant_id);
        self.store.write(&[LockKey::new(ctx.tenant_id, name)], |records| {
                      let mut definition = require_definition_by_version(records, ctx.tenant_id, name, version)?;
                      definition.title = title.to_string();
                      records.update_definition(&definition)?;

                      let mut snapshot = require_version(records, definition.definition_id, &definition.head_version())?;
                      snapshot.title = title.to_string();
                      records.update_version(&snapshot)?;
                      Ok(definition)
                  })
    }

    /// Borrado seguro.
    ///
    /// - Única versión del nombre: se rechaza si la cabecera está activa o
    ///   tiene instancias incompletas; si no, se borra la cabecera, todo su
    ///   historial y se propaga el borrado a cada componente del grafo.
    /// - Varias versiones: se borra sólo el snapshot pedido (mismos
    ///   chequeos, a nivel de versión). La cabecera dueña del snapshot se
    ///   resuelve por `definition_id`: si se queda sin snapshots se borra
    ///   entera (con cascada); si el borrado era su versión actual, se
    ///   re-sincroniza desde su snapshot más reciente.
    ///
    /// La cascada corre dentro de la unidad: si un componente falla, no se
    /// borra ninguna fila.
    pub fn delete_definition(&self, ctx: &ServiceContext, name: &str, version: u32) -> Result<(), LifecycleError> {
        debug!("delete_definition:start tenant={} name={name} version={version}", ctx.tenant_id);
        self.store.write(&[LockKey::new(ctx.tenant_id, name)], |records| {
                      let count = records.count_versions(ctx.tenant_id, &VersionFilter::named(name))?;
                      if count == 1 {
                          let definition = require_definition_by_version(records, ctx.tenant_id, name, version)?;
                          self.remove_whole_definition(records, definition)
                      } else {
                          self.delete_one_version(records, ctx.tenant_id, name, version)
                      }
                  })?;
        debug!("delete_definition:done tenant={} name={name} version={version}", ctx.tenant_id);
        Ok(())
    }

    /// Borra cabecera, historial y sub-entidades del grafo de `definition`.
    fn remove_whole_definition(&self,
                               records: &mut dyn DefinitionRecords,
                               definition: Definition)
                               -> Result<(), LifecycleError> {
        let id = definition.definition_id;
        if definition.active {
            warn!("delete refused: definition {id} is active");
            return Err(LifecycleError::conflict(id, ConflictReason::Active));
        }
        if self.instances.has_incomplete_instances(id, None)? {
            warn!("delete refused: definition {id} has incomplete instances");
            return Err(LifecycleError::conflict(id, ConflictReason::IncompleteInstances));
        }

        records.remove_definition(id)?;
        let removed = records.remove_definition_versions(id)?;
        for component in self.components.values() {
            component.delete_definition_components(id)?;
        }
        info!("deleted definition {id} ({}) with {removed} version(s)", definition.name);
        Ok(())
    }

    fn delete_one_version(&self,
                          records: &mut dyn DefinitionRecords,
                          tenant_id: i64,
                          name: &str,
                          version: u32)
                          -> Result<(), LifecycleError> {
        let target = Version::from_major(version);
        let snapshot = records.find_version_by_name(tenant_id, name, &target)?
                              .ok_or_else(|| {
                                  LifecycleError::not_found(Entity::DefinitionVersion,
                                                            format!("tenant={tenant_id} name={name} version={target}"))
                              })?;
        if snapshot.active {
            warn!("delete refused: version {target} of {} is active", snapshot.definition_id);
            return Err(LifecycleError::conflict(snapshot.definition_id, ConflictReason::Active));
        }
        if self.instances
               .has_incomplete_instances(snapshot.definition_id, Some(&snapshot.version))?
        {
            warn!("delete refused: version {target} of {} has incomplete instances", snapshot.definition_id);
            return Err(LifecycleError::conflict(snapshot.definition_id, ConflictReason::IncompleteInstances));
        }

        let mut owner = require_definition(records, tenant_id, snapshot.definition_id)?;
        let owned = records.count_versions(tenant_id, &VersionFilter::of_definition(owner.definition_id))?;
        if owned == 1 {
            // otra cabecera del mismo nombre sigue viva; ésta se va entera
            return self.remove_whole_definition(records, owner);
        }

        records.remove_version(snapshot.version_id)?;
        if owner.head_version() == snapshot.version {
            let latest = require_latest_version(records, tenant_id, owner.definition_id)?;
            debug!("resync head {} from {} to {}", owner.definition_id, target, latest.version);
            owner.resync_from(&latest);
            records.update_definition(&owner)?;
        }
        info!("deleted version {target} of {name}");
        Ok(())
    }

    /// Corre `f` sobre la cabecera `definition_id` del tenant bajo el lock de
    /// su nombre actual, más el de `also` si es otro nombre. Si la cabecera
    /// cambió de nombre entre la lectura y el lock, vuelve a intentar.
    fn write_locked_by_id<T, F>(&self,
                                tenant_id: i64,
                                definition_id: Uuid,
                                also: Option<&str>,
                                mut f: F)
                                -> Result<T, LifecycleError>
        where F: FnMut(&mut dyn DefinitionRecords, Definition) -> Result<T, LifecycleError>
    {
        for _ in 0..RENAME_RETRIES {
            let name = self.store.read(|r| require_definition(r, tenant_id, definition_id))?.name;
            let mut locks = vec![LockKey::new(tenant_id, &name)];
            if let Some(other) = also.filter(|other| *other != name) {
                locks.push(LockKey::new(tenant_id, other));
            }
            let outcome = self.store.write(&locks, |records| {
                                        let current = require_definition(records, tenant_id, definition_id)?;
                                        if current.name != name {
                                            return Ok(None);
                                        }
                                        f(records, current).map(Some)
                                    })?;
            match outcome {
                Some(out) => return Ok(out),
                None => debug!("definition {definition_id} renamed while locking, retrying"),
            }
        }
        Err(LifecycleError::store(format!("definition {definition_id} kept being renamed concurrently")))
    }

    /// Baja de un tenant completo: cabeceras, historial y sub-entidades del
    /// grafo. Sin chequeos de actividad. Devuelve (cabeceras, versiones)
    /// borradas.
    pub fn delete_tenant_definitions(&self, tenant_id: i64) -> Result<(usize, usize), LifecycleError> {
        debug!("delete_tenant_definitions:start tenant={tenant_id}");
        let removed = self.store.write(&[], |records| {
                                     let definitions = records.remove_tenant_definitions(tenant_id)?;
                                     let versions = records.remove_tenant_versions(tenant_id)?;
                                     for component in self.components.values() {
                                         component.delete_tenant_components(tenant_id)?;
                                     }
                                     Ok((definitions, versions))
                                 })?;
        info!("tenant {tenant_id}: removed {} definition(s), {} version(s)", removed.0, removed.1);
        Ok(removed)
    }
}

/// Desactiva toda cabecera y todo snapshot activos del nombre de `target`,
/// salvo los de `target` en su versión actual. Devuelve cuántas filas
/// cambió.
fn deactivate_previous(records: &mut dyn DefinitionRecords,
                       target: &Definition,
                       now: DateTime<Utc>)
                       -> Result<usize, LifecycleError> {
    let mut changed = 0;
    let active_heads = DefinitionFilter::named(&target.name).with_active(true);
    for mut previous in records.find_definitions(target.tenant_id, &active_heads, Page::ALL, OrderBy::default())? {
        if previous.definition_id == target.definition_id {
            continue;
        }
        previous.modified_date = now;
        previous.active = false;
        records.update_definition(&previous)?;
        changed += 1;
    }

    let head_version = target.head_version();
    let active_versions = VersionFilter::named(&target.name).with_active(true);
    for mut previous in records.find_versions(target.tenant_id, &active_versions, Page::ALL, OrderBy::default())? {
        if previous.definition_id == target.definition_id && previous.version == head_version {
            continue;
        }
        previous.active = false;
        records.update_version(&previous)?;
        changed += 1;
    }
    Ok(changed)
}

/// Núcleo compartido por `update_definition` e `increment_definition`.
/// `definition` es la fila recién leída dentro de la unidad.
fn revise(records: &mut dyn DefinitionRecords,
          user: &User,
          revision: &DefinitionRevision,
          mut definition: Definition)
          -> Result<Definition, LifecycleError> {
    let latest = require_latest_version(records, definition.tenant_id, definition.definition_id)?;
    let next = latest.version.next(Bump::Major)?;

    definition.modified_date = Utc::now();
    definition.name = revision.name.clone();
    definition.title = revision.title.clone();
    definition.description = revision.description.clone();
    definition.content = revision.content.clone();
    definition.version = next.major;
    definition.active = false;
    records.update_definition(&definition)?;

    let snapshot = DefinitionVersion::snapshot(&definition, user, next, STATUS_APPROVED);
    records.insert_version(&snapshot)?;
    Ok(definition)
}
