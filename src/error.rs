//! Error taxonomy of the store.
//!
//! Every store operation reports its outcome as a [`StoreResult`]. Errors travel through completion handles as
//! plain data; nothing in the crate panics on a failed backend call except [`must()`](crate::dispatch::must).
//!
//! The machine-readable [`code()`](StoreError::code) of an error is stable and safe to hand to clients. The
//! `Display` form of [`StoreError::Internal`] intentionally says nothing about the backend: the original
//! [`DbErr`] is only reachable through [`std::error::Error::source()`] for logging.

use sea_orm::DbErr;
use sea_orm::SqlErr;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The row does not exist or has been soft-deleted.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// An entity failed its shape checks before a write.
    #[error("invalid {entity}: {reason}")]
    Validation { entity: &'static str, reason: String },

    /// Create-only semantics violated: the entity already has an id or the id is taken.
    #[error("{entity} '{id}' already exists")]
    Conflict { entity: &'static str, id: String },

    /// Backend, transport or runtime failure.
    #[error("internal store error ({code})")]
    Internal {
        code:      &'static str,
        transient: bool,
        #[source]
        source:    Option<BoxedSource>,
    },

    /// A cursor parameter could not be parsed. Only produced at the API boundary.
    #[error("bad cursor parameter '{param}': {reason}")]
    BadCursor { param: &'static str, reason: String },
}

/// Broad class of a [`StoreError`], used for status mapping at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Internal,
    BadCursor,
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            entity,
            reason: reason.into(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            id: id.into(),
        }
    }

    pub fn internal(code: &'static str) -> Self {
        Self::Internal {
            code,
            transient: false,
            source: None,
        }
    }

    pub fn internal_with<E>(code: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            code,
            transient: false,
            source: Some(Box::new(source)),
        }
    }

    /// A component could not be assembled from its builder.
    pub fn builder<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::internal_with("store.builder", source)
    }

    pub fn bad_cursor(param: &'static str, reason: impl Into<String>) -> Self {
        Self::BadCursor {
            param,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::BadCursor { .. } => ErrorKind::BadCursor,
        }
    }

    /// Stable machine-readable identifier, e.g. `store.product.not_found` or `store.db`.
    pub fn code(&self) -> String {
        match self {
            Self::NotFound { entity, .. } => format!("store.{entity}.not_found"),
            Self::Validation { entity, .. } => format!("store.{entity}.invalid"),
            Self::Conflict { entity, .. } => format!("store.{entity}.exists"),
            Self::Internal { code, .. } => (*code).to_string(),
            Self::BadCursor { param, .. } => format!("store.cursor.{param}.invalid"),
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Internal { transient: true, .. })
    }

    /// Attach the entity name to a backend failure that turned out to be a duplicate key.
    pub(crate) fn or_conflict(self, entity: &'static str, id: &str) -> Self {
        match self {
            Self::Internal {
                source: Some(ref source),
                ..
            } if source
                .downcast_ref::<DbErr>()
                .and_then(DbErr::sql_err)
                .is_some_and(|e| matches!(e, SqlErr::UniqueConstraintViolation(_))) =>
            {
                Self::conflict(entity, id)
            }
            other => other,
        }
    }
}

// Lock contention, deadlocks, serialization failures and pool exhaustion are worth another attempt.
fn is_transient_db_error(err: &DbErr) -> bool {
    if matches!(err, DbErr::ConnectionAcquire(_)) {
        return true;
    }
    let text = err.to_string().to_lowercase();
    ["database is locked", "deadlock", "could not serialize", "lock wait timeout"]
        .iter()
        .any(|needle| text.contains(needle))
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        Self::Internal {
            code:      "store.db",
            transient: is_transient_db_error(&err),
            source:    Some(Box::new(err)),
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal_with("store.worker_lost", err)
    }
}

impl From<postcard::Error> for StoreError {
    fn from(err: postcard::Error) -> Self {
        Self::internal_with("store.codec", err)
    }
}
