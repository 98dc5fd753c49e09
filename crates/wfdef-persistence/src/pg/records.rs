//! `DefinitionRecords` sobre una conexión Postgres dentro de una transacción.

use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use uuid::Uuid;
use wfdef_core::repo::Direction;
use wfdef_core::{Definition, DefinitionFilter, DefinitionRecords, DefinitionVersion, Entity, LifecycleError, OrderBy,
                 OrderField, Page, Version, VersionFilter};

use super::rows::{to_column, DefinitionRow, VersionRow};
use crate::error::PersistenceError;
use crate::schema::{workflow_definition_versions as versions, workflow_definitions as definitions};

/// Vista de registros atada a la conexión transaccional de la unidad.
pub struct PgRecords<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgRecords<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

fn db(err: diesel::result::Error) -> LifecycleError {
    PersistenceError::from(err).into()
}

fn offset_of(page: Page) -> Result<i64, LifecycleError> {
    i64::try_from(page.start).map_err(|_| LifecycleError::store("page start out of range"))
}

fn limit_of(page: Page) -> Result<Option<i64>, LifecycleError> {
    page.limit()
        .map(|n| i64::try_from(n).map_err(|_| LifecycleError::store("page limit out of range")))
        .transpose()
}

fn count_of(n: i64) -> Result<usize, LifecycleError> {
    usize::try_from(n).map_err(|_| LifecycleError::store(format!("invalid row count {n}")))
}

fn definitions_query<'a>(tenant_id: i64, filter: &DefinitionFilter) -> definitions::BoxedQuery<'a, Pg> {
    let mut query = definitions::table.filter(definitions::tenant_id.eq(tenant_id)).into_boxed();
    if let Some(name) = &filter.name {
        query = query.filter(definitions::name.eq(name.clone()));
    }
    if let Some(active) = filter.active {
        query = query.filter(definitions::active.eq(active));
    }
    query
}

/// Orden primario pedido; desempate por fecha de creación ascendente.
fn order_definitions<'a>(query: definitions::BoxedQuery<'a, Pg>, order: OrderBy) -> definitions::BoxedQuery<'a, Pg> {
    let query = match (order.field, order.direction) {
        (OrderField::Version, Direction::Asc) => query.order(definitions::version.asc()),
        (OrderField::Version, Direction::Desc) => query.order(definitions::version.desc()),
        (OrderField::Name, Direction::Asc) => query.order(definitions::name.asc()),
        (OrderField::Name, Direction::Desc) => query.order(definitions::name.desc()),
        (OrderField::Title, Direction::Asc) => query.order(definitions::title.asc()),
        (OrderField::Title, Direction::Desc) => query.order(definitions::title.desc()),
        (OrderField::CreateDate, Direction::Asc) => query.order(definitions::create_date.asc()),
        (OrderField::CreateDate, Direction::Desc) => query.order(definitions::create_date.desc()),
        (OrderField::ModifiedDate, Direction::Asc) => query.order(definitions::modified_date.asc()),
        (OrderField::ModifiedDate, Direction::Desc) => query.order(definitions::modified_date.desc()),
    };
    query.then_order_by(definitions::create_date.asc())
}

fn versions_query<'a>(tenant_id: i64, filter: &VersionFilter) -> versions::BoxedQuery<'a, Pg> {
    let mut query = versions::table.filter(versions::tenant_id.eq(tenant_id)).into_boxed();
    if let Some(name) = &filter.name {
        query = query.filter(versions::name.eq(name.clone()));
    }
    if let Some(definition_id) = filter.definition_id {
        query = query.filter(versions::definition_id.eq(definition_id));
    }
    if let Some(active) = filter.active {
        query = query.filter(versions::active.eq(active));
    }
    query
}

fn order_versions<'a>(query: versions::BoxedQuery<'a, Pg>, order: OrderBy) -> versions::BoxedQuery<'a, Pg> {
    let query = match (order.field, order.direction) {
        (OrderField::Version, Direction::Asc) => query.order((versions::version_major.asc(), versions::version_minor.asc())),
        (OrderField::Version, Direction::Desc) => {
            query.order((versions::version_major.desc(), versions::version_minor.desc()))
        }
        (OrderField::Name, Direction::Asc) => query.order(versions::name.asc()),
        (OrderField::Name, Direction::Desc) => query.order(versions::name.desc()),
        (OrderField::Title, Direction::Asc) => query.order(versions::title.asc()),
        (OrderField::Title, Direction::Desc) => query.order(versions::title.desc()),
        (OrderField::CreateDate, Direction::Asc) => query.order(versions::create_date.asc()),
        (OrderField::CreateDate, Direction::Desc) => query.order(versions::create_date.desc()),
        (OrderField::ModifiedDate, Direction::Asc) => query.order(versions::status_date.asc()),
        (OrderField::ModifiedDate, Direction::Desc) => query.order(versions::status_date.desc()),
    };
    query.then_order_by(versions::create_date.asc())
}

fn definitions_model(rows: Vec<DefinitionRow>) -> Result<Vec<Definition>, LifecycleError> {
    rows.into_iter().map(DefinitionRow::into_model).collect()
}

fn versions_model(rows: Vec<VersionRow>) -> Result<Vec<DefinitionVersion>, LifecycleError> {
    rows.into_iter().map(VersionRow::into_model).collect()
}

impl DefinitionRecords for PgRecords<'_> {
    fn insert_definition(&mut self, definition: &Definition) -> Result<(), LifecycleError> {
        let row = DefinitionRow::from_model(definition)?;
        diesel::insert_into(definitions::table).values(&row)
                                               .execute(self.conn)
                                               .map_err(db)?;
        Ok(())
    }

    fn update_definition(&mut self, definition: &Definition) -> Result<(), LifecycleError> {
        let row = DefinitionRow::from_model(definition)?;
        let changed = diesel::update(definitions::table.find(row.definition_id)).set(&row)
                                                                               .execute(self.conn)
                                                                               .map_err(db)?;
        if changed == 0 {
            return Err(LifecycleError::not_found(Entity::Definition, row.definition_id.to_string()));
        }
        Ok(())
    }

    fn remove_definition(&mut self, definition_id: Uuid) -> Result<(), LifecycleError> {
        let removed = diesel::delete(definitions::table.find(definition_id)).execute(self.conn)
                                                                           .map_err(db)?;
        if removed == 0 {
            return Err(LifecycleError::not_found(Entity::Definition, definition_id.to_string()));
        }
        Ok(())
    }

    fn find_definition(&mut self, definition_id: Uuid) -> Result<Option<Definition>, LifecycleError> {
        definitions::table.find(definition_id)
                          .first::<DefinitionRow>(self.conn)
                          .optional()
                          .map_err(db)?
                          .map(DefinitionRow::into_model)
                          .transpose()
    }

    fn find_definition_by_version(&mut self,
                                  tenant_id: i64,
                                  name: &str,
                                  version: u32)
                                  -> Result<Option<Definition>, LifecycleError> {
        definitions::table.filter(definitions::tenant_id.eq(tenant_id))
                          .filter(definitions::name.eq(name))
                          .filter(definitions::version.eq(to_column(version)?))
                          .order(definitions::create_date.asc())
                          .first::<DefinitionRow>(self.conn)
                          .optional()
                          .map_err(db)?
                          .map(DefinitionRow::into_model)
                          .transpose()
    }

    fn find_definitions(&mut self,
                        tenant_id: i64,
                        filter: &DefinitionFilter,
                        page: Page,
                        order: OrderBy)
                        -> Result<Vec<Definition>, LifecycleError> {
        let mut query = order_definitions(definitions_query(tenant_id, filter), order).offset(offset_of(page)?);
        if let Some(limit) = limit_of(page)? {
            query = query.limit(limit);
        }
        definitions_model(query.load::<DefinitionRow>(self.conn).map_err(db)?)
    }

    fn count_definitions(&mut self, tenant_id: i64, filter: &DefinitionFilter) -> Result<usize, LifecycleError> {
        let n: i64 = definitions_query(tenant_id, filter).count()
                                                         .get_result(self.conn)
                                                         .map_err(db)?;
        count_of(n)
    }

    fn remove_tenant_definitions(&mut self, tenant_id: i64) -> Result<usize, LifecycleError> {
        diesel::delete(definitions::table.filter(definitions::tenant_id.eq(tenant_id))).execute(self.conn)
                                                                                      .map_err(db)
    }

    fn insert_version(&mut self, version: &DefinitionVersion) -> Result<(), LifecycleError> {
        let row = VersionRow::from_model(version)?;
        diesel::insert_into(versions::table).values(&row)
                                            .execute(self.conn)
                                            .map_err(db)?;
        Ok(())
    }

    fn update_version(&mut self, version: &DefinitionVersion) -> Result<(), LifecycleError> {
        let row = VersionRow::from_model(version)?;
        let changed = diesel::update(versions::table.find(row.version_id)).set(&row)
                                                                         .execute(self.conn)
                                                                         .map_err(db)?;
        if changed == 0 {
            return Err(LifecycleError::not_found(Entity::DefinitionVersion, row.version_id.to_string()));
        }
        Ok(())
    }

    fn remove_version(&mut self, version_id: Uuid) -> Result<(), LifecycleError> {
        let removed = diesel::delete(versions::table.find(version_id)).execute(self.conn)
                                                                     .map_err(db)?;
        if removed == 0 {
            return Err(LifecycleError::not_found(Entity::DefinitionVersion, version_id.to_string()));
        }
        Ok(())
    }

    fn find_version(&mut self,
                    definition_id: Uuid,
                    version: &Version)
                    -> Result<Option<DefinitionVersion>, LifecycleError> {
        versions::table.filter(versions::definition_id.eq(definition_id))
                       .filter(versions::version.eq(version.to_string()))
                       .first::<VersionRow>(self.conn)
                       .optional()
                       .map_err(db)?
                       .map(VersionRow::into_model)
                       .transpose()
    }

    fn find_version_by_name(&mut self,
                            tenant_id: i64,
                            name: &str,
                            version: &Version)
                            -> Result<Option<DefinitionVersion>, LifecycleError> {
        versions::table.filter(versions::tenant_id.eq(tenant_id))
                       .filter(versions::name.eq(name))
                       .filter(versions::version.eq(version.to_string()))
                       .order(versions::create_date.asc())
                       .first::<VersionRow>(self.conn)
                       .optional()
                       .map_err(db)?
                       .map(VersionRow::into_model)
                       .transpose()
    }

    fn find_versions(&mut self,
                     tenant_id: i64,
                     filter: &VersionFilter,
                     page: Page,
                     order: OrderBy)
                     -> Result<Vec<DefinitionVersion>, LifecycleError> {
        let mut query = order_versions(versions_query(tenant_id, filter), order).offset(offset_of(page)?);
        if let Some(limit) = limit_of(page)? {
            query = query.limit(limit);
        }
        versions_model(query.load::<VersionRow>(self.conn).map_err(db)?)
    }

    fn count_versions(&mut self, tenant_id: i64, filter: &VersionFilter) -> Result<usize, LifecycleError> {
        let n: i64 = versions_query(tenant_id, filter).count()
                                                      .get_result(self.conn)
                                                      .map_err(db)?;
        count_of(n)
    }

    fn remove_definition_versions(&mut self, definition_id: Uuid) -> Result<usize, LifecycleError> {
        diesel::delete(versions::table.filter(versions::definition_id.eq(definition_id))).execute(self.conn)
                                                                                        .map_err(db)
    }

    fn remove_tenant_versions(&mut self, tenant_id: i64) -> Result<usize, LifecycleError> {
        diesel::delete(versions::table.filter(versions::tenant_id.eq(tenant_id))).execute(self.conn)
                                                                                .map_err(db)
    }
}
