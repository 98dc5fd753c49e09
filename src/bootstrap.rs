//! Construcción de managers listos para usar.
use log::info;
use wfdef_core::{DefinitionManager, InMemoryDefinitionStore, InMemoryInstanceTracker, InMemoryUserDirectory};
use wfdef_persistence::{PersistenceError, PgDefinitionStore, PoolProvider};

use crate::config::AppConfig;

fn directory(cfg: &AppConfig) -> InMemoryUserDirectory {
    InMemoryUserDirectory::new().with_user(cfg.user_id, cfg.user_name.clone())
}

/// Manager sobre el store en memoria, con el usuario de la configuración
/// registrado y el tracker de instancias compartido con el llamador.
pub fn in_memory_manager(cfg: &AppConfig,
                         instances: InMemoryInstanceTracker)
                         -> DefinitionManager<InMemoryDefinitionStore> {
    DefinitionManager::new(InMemoryDefinitionStore::new(), directory(cfg), instances)
}

/// Manager sobre Postgres; requiere `database_url`.
pub fn pg_manager(cfg: &AppConfig,
                  instances: InMemoryInstanceTracker)
                  -> Result<DefinitionManager<PgDefinitionStore<PoolProvider>>, PersistenceError> {
    let url = cfg.database_url
                 .as_deref()
                 .ok_or_else(|| PersistenceError::Config("DATABASE_URL no definido".into()))?;
    let pool = wfdef_persistence::build_pool(url, 1, 4)?;
    info!("postgres store ready");
    Ok(DefinitionManager::new(PgDefinitionStore::from_pool(pool), directory(cfg), instances))
}
