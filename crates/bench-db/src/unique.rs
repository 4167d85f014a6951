//! Detecting Postgres unique-constraint violations by name, so the ingester
//! can treat them as "already inserted by a concurrent request" rather than
//! a fatal error.

/// True if `err` is a unique-violation (SQLSTATE 23505) on `constraint`.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.constraint() == Some(constraint)
                || (db_err.code().as_deref() == Some("23505")
                    && db_err.constraint() == Some(constraint))
        }
        _ => false,
    }
}

/// True if `err` is any unique-violation, regardless of which constraint.
/// Used by the batch-insert fallback path, where the offending tuple (and
/// therefore the constraint) isn't known ahead of time.
pub fn is_any_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}
