//! Contexto de la petición y usuario resuelto.

use serde::{Deserialize, Serialize};

/// Tenant y actor de la operación en curso. Toda lectura y escritura del
/// manager se filtra por `tenant_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceContext {
    pub tenant_id: i64,
    pub user_id: i64,
}

impl ServiceContext {
    pub fn new(tenant_id: i64, user_id: i64) -> Self {
        Self { tenant_id, user_id }
    }
}

/// Usuario tal como lo devuelve el `UserDirectory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub full_name: String,
}
