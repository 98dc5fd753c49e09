//! Errores de persistencia.
//! Mapea errores de Diesel / conexión a variantes semánticas y, hacia el
//! manager, a `LifecycleError::Store`.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;
use wfdef_core::LifecycleError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl PersistenceError {
    /// Transitorio: se recomienda reintentar la unidad completa.
    ///
    /// Algunos mensajes (según driver/pg) llegan como `Unknown` con texto;
    /// se hace match best-effort sin acoplar a SQLSTATE.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SerializationConflict | Self::TransientIo(_) => true,
            Self::Unknown(msg) => {
                let m = msg.to_lowercase();
                m.contains("deadlock detected")
                || m.contains("could not serialize access due to concurrent update")
                || m.contains("terminating connection due to administrator command")
                || m.contains("connection closed")
                || m.contains("connection refused")
                || m.contains("timeout")
            }
            _ => false,
        }
    }
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(info.message().to_string()),
                DatabaseErrorKind::CheckViolation => Self::CheckViolation(info.message().to_string()),
                DatabaseErrorKind::ForeignKeyViolation => Self::ForeignKeyViolation(info.message().to_string()),
                DatabaseErrorKind::SerializationFailure => Self::SerializationConflict,
                DatabaseErrorKind::ClosedConnection => Self::TransientIo(info.message().to_string()),
                other => Self::Unknown(format!("db error kind {:?}: {}", other, info.message())),
            },
            DieselError::DeserializationError(e) => Self::Unknown(format!("deser: {e}")),
            DieselError::SerializationError(e) => Self::Unknown(format!("ser: {e}")),
            DieselError::AlreadyInTransaction => Self::Unknown("already in transaction".into()),
            DieselError::RollbackErrorOnCommit { rollback_error, commit_error } => {
                Self::Unknown(format!("rollback={rollback_error}; commit={commit_error}"))
            }
            DieselError::BrokenTransactionManager => Self::TransientIo("broken transaction manager".into()),
            DieselError::QueryBuilderError(e) => Self::Unknown(format!("query builder: {e}")),
            DieselError::RollbackTransaction => Self::Unknown("rollback transaction".into()),
            DieselError::NotInTransaction => Self::Unknown("not in transaction".into()),
            other => Self::Unknown(format!("unhandled diesel error: {other:?}")),
        }
    }
}

impl From<PersistenceError> for LifecycleError {
    fn from(err: PersistenceError) -> Self {
        LifecycleError::store(err)
    }
}

/// Recupera el `PersistenceError` envuelto en un `LifecycleError::Store`.
pub fn persistence_cause(err: &LifecycleError) -> Option<&PersistenceError> {
    match err {
        LifecycleError::Store(source) => source.downcast_ref::<PersistenceError>(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diesel_not_found_maps_to_not_found() {
        assert!(matches!(PersistenceError::from(DieselError::NotFound), PersistenceError::NotFound));
    }

    #[test]
    fn retryable_classification() {
        assert!(PersistenceError::SerializationConflict.is_retryable());
        assert!(PersistenceError::TransientIo("pool".into()).is_retryable());
        assert!(PersistenceError::Unknown("ERROR: deadlock detected".into()).is_retryable());
        assert!(!PersistenceError::UniqueViolation("dup".into()).is_retryable());
        assert!(!PersistenceError::Unknown("syntax error".into()).is_retryable());
    }

    #[test]
    fn lifecycle_store_error_keeps_cause() {
        let err: LifecycleError = PersistenceError::SerializationConflict.into();
        assert!(matches!(persistence_cause(&err), Some(PersistenceError::SerializationConflict)));
        assert!(persistence_cause(&LifecycleError::InvalidVersion("x".into())).is_none());
    }
}
