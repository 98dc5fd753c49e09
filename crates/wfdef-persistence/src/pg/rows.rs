//! Filas Diesel y conversión fila <-> modelo.
//!
//! Las columnas numéricas de Postgres son `INTEGER` con signo; el modelo usa
//! `u32`. Las conversiones fallan con `LifecycleError::Store` en lugar de
//! truncar.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;
use wfdef_core::{Definition, DefinitionVersion, LifecycleError, Version};

use crate::schema::{workflow_definition_versions, workflow_definitions};

/// Fila de `workflow_definitions`; el orden de campos sigue al de la tabla.
#[derive(Queryable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = workflow_definitions, primary_key(definition_id), treat_none_as_null = true)]
pub struct DefinitionRow {
    pub definition_id: Uuid,
    pub tenant_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub create_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    pub name: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub version: i32,
    pub active: bool,
    pub start_node_id: Option<i64>,
}

/// Fila de `workflow_definition_versions`. `version` se guarda como texto
/// (`"<major>.<minor>"`) y también desglosada para ordenar numéricamente.
#[derive(Queryable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = workflow_definition_versions, primary_key(version_id), treat_none_as_null = true)]
pub struct VersionRow {
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
    pub version: String,
    pub version_major: i32,
    pub version_minor: i32,
    pub active: bool,
    pub start_node_id: Option<i64>,
    pub status: i32,
}

pub(crate) fn to_column(value: u32) -> Result<i32, LifecycleError> {
    i32::try_from(value).map_err(|_| LifecycleError::store(format!("value {value} out of range for INTEGER column")))
}

fn from_column(value: i32) -> Result<u32, LifecycleError> {
    u32::try_from(value).map_err(|_| LifecycleError::store(format!("negative value {value} in unsigned column")))
}

impl DefinitionRow {
    pub fn from_model(d: &Definition) -> Result<Self, LifecycleError> {
        Ok(Self { definition_id: d.definition_id,
                  tenant_id: d.tenant_id,
                  user_id: d.user_id,
                  user_name: d.user_name.clone(),
                  create_date: d.create_date,
                  modified_date: d.modified_date,
                  name: d.name.clone(),
                  title: d.title.clone(),
                  description: d.description.clone(),
                  content: d.content.clone(),
                  version: to_column(d.version)?,
                  active: d.active,
                  start_node_id: d.start_node_id })
    }

    pub fn into_model(self) -> Result<Definition, LifecycleError> {
        Ok(Definition { definition_id: self.definition_id,
                        tenant_id: self.tenant_id,
                        user_id: self.user_id,
                        user_name: self.user_name,
                        create_date: self.create_date,
                        modified_date: self.modified_date,
                        name: self.name,
                        title: self.title,
                        description: self.description,
                        content: self.content,
                        version: from_column(self.version)?,
                        active: self.active,
                        start_node_id: self.start_node_id })
    }
}

impl VersionRow {
    pub fn from_model(v: &DefinitionVersion) -> Result<Self, LifecycleError> {
        Ok(Self { version_id: v.version_id,
                  definition_id: v.definition_id,
                  tenant_id: v.tenant_id,
                  user_id: v.user_id,
                  user_name: v.user_name.clone(),
                  status_by_user_id: v.status_by_user_id,
                  status_by_user_name: v.status_by_user_name.clone(),
                  status_date: v.status_date,
                  create_date: v.create_date,
                  name: v.name.clone(),
                  title: v.title.clone(),
                  description: v.description.clone(),
                  content: v.content.clone(),
                  version: v.version.to_string(),
                  version_major: to_column(v.version.major)?,
                  version_minor: to_column(v.version.minor)?,
                  active: v.active,
                  start_node_id: v.start_node_id,
                  status: v.status })
    }

    pub fn into_model(self) -> Result<DefinitionVersion, LifecycleError> {
        let version: Version = self.version.parse()?;
        Ok(DefinitionVersion { version_id: self.version_id,
                               definition_id: self.definition_id,
                               tenant_id: self.tenant_id,
                               user_id: self.user_id,
                               user_name: self.user_name,
                               status_by_user_id: self.status_by_user_id,
                               status_by_user_name: self.status_by_user_name,
                               status_date: self.status_date,
                               create_date: self.create_date,
                               name: self.name,
                               title: self.title,
                               description: self.description,
                               content: self.content,
                               version,
                               active: self.active,
                               start_node_id: self.start_node_id,
                               status: self.status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_version(label: &str) -> VersionRow {
        let now = Utc::now();
        VersionRow { version_id: Uuid::new_v4(),
                     definition_id: Uuid::new_v4(),
                     tenant_id: 1,
                     user_id: 2,
                     user_name: "u".into(),
                     status_by_user_id: 2,
                     status_by_user_name: "u".into(),
                     status_date: now,
                     create_date: now,
                     name: "n".into(),
                     title: "t".into(),
                     description: "d".into(),
                     content: "<c/>".into(),
                     version: label.into(),
                     version_major: 3,
                     version_minor: 1,
                     active: false,
                     start_node_id: None,
                     status: 0 }
    }

    #[test]
    fn version_row_parses_label() {
        let model = sample_version("3.1").into_model().unwrap();
        assert_eq!(model.version, Version::new(3, 1));
        let back = VersionRow::from_model(&model).unwrap();
        assert_eq!((back.version_major, back.version_minor), (3, 1));
        assert_eq!(back.version, "3.1");
    }

    #[test]
    fn malformed_label_is_invalid_version() {
        let err = sample_version("3").into_model().unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidVersion(_)));
    }

    #[test]
    fn out_of_range_columns_are_store_errors() {
        assert!(matches!(to_column(u32::MAX), Err(LifecycleError::Store(_))));
        assert!(matches!(from_column(-1), Err(LifecycleError::Store(_))));
        assert_eq!(to_column(7).unwrap(), 7);
    }
}
