use cuneiform_kv::KVError;
use cuneiform_sql::SQLError;
use thiserror::Error;

/// Unified error type for the record layer.
///
/// The first four variants signal programmer or schema errors and are never
/// retried. `Storage` and `Snapshot` wrap backend failures; `SQLError`
/// separates connection loss from malformed statements, so callers can tell
/// a transient fault from a bug.
#[derive(Error, Debug)]
pub enum OrmError {
    /// Invalid schema declaration, caught when the schema is built.
    #[error("{0}")]
    Config(String),

    /// A value disagrees with its field's declared type, or a required
    /// value is missing.
    #[error("{0}")]
    Validation(String),

    /// The API was called in a way that has no meaning, e.g. reading a
    /// reverse relation as a column.
    #[error("{0}")]
    Usage(String),

    /// Row does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Unexpected internal error, e.g. a backend contract violation.
    #[error("{0}")]
    Internal(String),

    /// SQL backend failure.
    #[error("{0}")]
    Storage(#[from] SQLError),

    /// Snapshot store failure.
    #[error("{0}")]
    Snapshot(#[from] KVError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_just_the_message() {
        assert_eq!(
            OrmError::Config("duplicate model \"Town\"".into()).to_string(),
            "duplicate model \"Town\""
        );
        assert_eq!(
            OrmError::NotFound("town 7 not found".into()).to_string(),
            "town 7 not found"
        );
    }

    #[test]
    fn backend_errors_convert() {
        fn fails() -> Result<(), OrmError> {
            Err(SQLError::Connection("gone".into()))?;
            Ok(())
        }
        assert!(matches!(
            fails(),
            Err(OrmError::Storage(SQLError::Connection(_)))
        ));
    }
}
