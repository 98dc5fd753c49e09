//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y expone una estructura inmutable
//! (`CONFIG`) con el contexto por defecto (tenant/usuario) y, opcionalmente,
//! la URL de Postgres.
use std::env;

use log::warn;
use once_cell::sync::Lazy;
use thiserror::Error;
use wfdef_core::ServiceContext;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("variable {var} inválida: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub tenant_id: i64,
    pub user_id: i64,
    /// Nombre con el que se registra el usuario por defecto en el directorio
    /// en memoria.
    pub user_name: String,
    /// Sin URL se trabaja sólo con el store en memoria.
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { tenant_id: 1, user_id: 1, user_name: "admin".to_string(), database_url: None }
    }
}

fn parse_id<F>(lookup: &F, var: &'static str, default: i64) -> Result<i64, ConfigError>
    where F: Fn(&str) -> Option<String>
{
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Construye la configuración a partir de una función de búsqueda
    /// (variables de entorno en producción, mapas en tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let defaults = Self::default();
        Ok(Self { tenant_id: parse_id(&lookup, "WFDEF_TENANT_ID", defaults.tenant_id)?,
                  user_id: parse_id(&lookup, "WFDEF_USER_ID", defaults.user_id)?,
                  user_name: lookup("WFDEF_USER_NAME").unwrap_or(defaults.user_name),
                  database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn context(&self) -> ServiceContext {
        ServiceContext::new(self.tenant_id, self.user_id)
    }
}

/// Instancia global perezosa; valores inválidos caen a los defaults.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    AppConfig::from_env().unwrap_or_else(|e| {
                             warn!("config: {e}; usando valores por defecto");
                             AppConfig::default()
                         })
});
