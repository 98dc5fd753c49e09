//! wfdef-persistence
//!
//! Backend Postgres (Diesel) del Record Store de `wfdef-core`.
//!
//! Cada unidad del store es una transacción Diesel; las escrituras sobre un
//! nombre toman además `pg_advisory_xact_lock` con una clave derivada de
//! (tenant, name), lo que serializa activaciones y borrados concurrentes
//! entre procesos.
//!
//! Módulos:
//! - `pg`: pool, provider de conexiones y `PgDefinitionStore`.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::init_dotenv;
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgDefinitionStore, PgPool, PoolProvider};
