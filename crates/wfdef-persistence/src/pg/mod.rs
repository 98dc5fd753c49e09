//! Implementación Postgres (Diesel) de `DefinitionStore`.
//!
//! - Cada `read`/`write` es una transacción (`read_only` / `read_write`).
//! - `write` con `LockKey` toma `pg_advisory_xact_lock(key)` como primera
//!   sentencia; el lock se libera con el commit o el rollback.
//! - Errores transitorios (serialización, conexión) reintentan la unidad
//!   completa con backoff corto; por eso los closures son `FnMut`.
//! - Un `Err` del closure (p.ej. `Conflict`) hace rollback de todo lo que la
//!   unidad escribió.

mod records;
mod rows;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::sql_types::BigInt;
use log::{debug, warn};
use sha2::{Digest, Sha256};
use wfdef_core::{DefinitionRecords, DefinitionStore, LifecycleError, LockKey};

pub use records::PgRecords;
pub use rows::{DefinitionRow, VersionRow};

use crate::error::{persistence_cause, PersistenceError};
use crate::migrations::run_pending_migrations;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real o un provider de test sin acoplar el store
/// a r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Error interno de una unidad: Diesel exige `From<diesel::result::Error>`
/// en el tipo de error de la transacción.
#[derive(Debug)]
enum TxError {
    Persistence(PersistenceError),
    Lifecycle(LifecycleError),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Persistence(err.into())
    }
}

impl From<TxError> for LifecycleError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::Persistence(e) => e.into(),
            TxError::Lifecycle(e) => e,
        }
    }
}

impl TxError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence(e) => e.is_retryable(),
            Self::Lifecycle(e) => persistence_cause(e).is_some_and(PersistenceError::is_retryable),
        }
    }
}

/// Retry simple con backoff lineal muy pequeño (hasta 3 reintentos).
///
/// Política:
/// - Backoff: 15ms, 30ms, 45ms.
/// - Logs: se emite `warn!` por intento.
fn with_retry<F, T>(mut f: F) -> Result<T, TxError>
    where F: FnMut() -> Result<T, TxError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if e.is_retryable() && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Clave de `pg_advisory_xact_lock` para (tenant, name): primeros 8 bytes
/// de SHA-256 sobre `"<tenant>:<name>"`.
pub fn advisory_key(lock: &LockKey) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(lock.tenant_id.to_be_bytes());
    hasher.update(b":");
    hasher.update(lock.name.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(prefix)
}

/// Claves de advisory lock ordenadas y sin repetir: dos unidades que pidan
/// los mismos nombres los toman en el mismo orden.
fn lock_order(locks: &[LockKey]) -> Vec<(i64, &LockKey)> {
    let mut keys: Vec<(i64, &LockKey)> = locks.iter().map(|l| (advisory_key(l), l)).collect();
    keys.sort_by_key(|(key, _)| *key);
    keys.dedup_by_key(|(key, _)| *key);
    keys
}

fn acquire_name_lock(conn: &mut PgConnection, key: i64, lock: &LockKey) -> Result<(), TxError> {
    debug!("advisory lock tenant={} name={} key={key}", lock.tenant_id, lock.name);
    diesel::sql_query("SELECT pg_advisory_xact_lock($1)").bind::<BigInt, _>(key)
                                                         .execute(conn)?;
    Ok(())
}

/// Record Store durable sobre Postgres.
pub struct PgDefinitionStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgDefinitionStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl PgDefinitionStore<PoolProvider> {
    pub fn from_pool(pool: PgPool) -> Self {
        Self::new(PoolProvider { pool })
    }
}

impl<P: ConnectionProvider> DefinitionStore for PgDefinitionStore<P> {
    fn read<T, F>(&self, mut f: F) -> Result<T, LifecycleError>
        where F: FnMut(&mut dyn DefinitionRecords) -> Result<T, LifecycleError>
    {
        with_retry(|| {
            let mut conn = self.provider.connection().map_err(TxError::Persistence)?;
            conn.build_transaction()
                .read_only()
                .run(|tx| f(&mut PgRecords::new(tx)).map_err(TxError::Lifecycle))
        }).map_err(LifecycleError::from)
    }

    fn write<T, F>(&self, locks: &[LockKey], mut f: F) -> Result<T, LifecycleError>
        where F: FnMut(&mut dyn DefinitionRecords) -> Result<T, LifecycleError>
    {
        let keys = lock_order(locks);
        with_retry(|| {
            let mut conn = self.provider.connection().map_err(TxError::Persistence)?;
            conn.build_transaction().read_write().run(|tx| {
                                                     for &(key, lock) in &keys {
                                                         acquire_name_lock(tx, key, lock)?;
                                                     }
                                                     f(&mut PgRecords::new(tx)).map_err(TxError::Lifecycle)
                                                 })
        }).map_err(LifecycleError::from)
    }
}

/// Construye un pool r2d2 y corre las migraciones pendientes.
///
/// - Tamaños en 0 se elevan a 1; si `min_size > max_size` se usa
///   `min = max`.
/// - Devuelve `PersistenceError::TransientIo` ante errores del pool.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({validated_min} > {validated_max}), ajustando min=max");
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee configuración (DATABASE_URL,
/// tamaños) y construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_key_is_stable_and_scoped() {
        let a = LockKey::new(1, "approval");
        assert_eq!(advisory_key(&a), advisory_key(&LockKey::new(1, "approval")));
        assert_ne!(advisory_key(&a), advisory_key(&LockKey::new(2, "approval")));
        assert_ne!(advisory_key(&a), advisory_key(&LockKey::new(1, "approvals")));
    }

    #[test]
    fn lock_order_is_sorted_and_deduplicated() {
        let old = LockKey::new(1, "approval");
        let new = LockKey::new(1, "approval-v2");
        let forward: Vec<i64> = lock_order(&[old.clone(), new.clone()]).into_iter().map(|(k, _)| k).collect();
        let backward: Vec<i64> = lock_order(&[new, old.clone()]).into_iter().map(|(k, _)| k).collect();
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 2);
        assert_eq!(lock_order(&[old.clone(), old]).len(), 1);
    }

    #[test]
    fn tx_error_retry_classification() {
        assert!(TxError::Persistence(PersistenceError::SerializationConflict).is_retryable());
        assert!(TxError::Lifecycle(PersistenceError::TransientIo("x".into()).into()).is_retryable());
        assert!(!TxError::Lifecycle(LifecycleError::InvalidVersion("1".into())).is_retryable());
    }

    #[test]
    fn retry_gives_up_after_three_retries() {
        let mut calls = 0;
        let out: Result<(), TxError> = with_retry(|| {
            calls += 1;
            Err(TxError::Persistence(PersistenceError::SerializationConflict))
        });
        assert!(out.is_err());
        assert_eq!(calls, 4);
    }

    #[test]
    fn domain_errors_are_not_retried() {
        let mut calls = 0;
        let out: Result<(), TxError> = with_retry(|| {
            calls += 1;
            Err(TxError::Lifecycle(LifecycleError::InvalidVersion("x".into())))
        });
        assert!(matches!(LifecycleError::from(out.unwrap_err()), LifecycleError::InvalidVersion(_)));
        assert_eq!(calls, 1);
    }
}
