use anyhow::{Context, Result};
use sqlx::MySqlPool;

pub async fn init_db(database_url: &str) -> Result<MySqlPool> {
    MySqlPool::connect(database_url)
        .await
        .context("Failed to connect to database")
}

/// Unique index violation (MySQL 1062). SQLSTATE 23000 alone also covers
/// foreign key and NOT NULL failures.
pub fn is_duplicate_key(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Insert or update pointing at a row that does not exist.
pub fn is_missing_reference(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_foreign_key_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{borrow::Cow, error::Error as StdError, fmt};

    #[derive(Debug)]
    enum Violation {
        Unique,
        ForeignKey,
        NotNull,
    }

    #[derive(Debug)]
    struct ConstraintError(Violation);

    impl fmt::Display for ConstraintError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?} violation", self.0)
        }
    }

    impl StdError for ConstraintError {}

    impl DatabaseError for ConstraintError {
        fn message(&self) -> &str {
            "constraint failed"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23000"))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.0 {
                Violation::Unique => ErrorKind::UniqueViolation,
                Violation::ForeignKey => ErrorKind::ForeignKeyViolation,
                Violation::NotNull => ErrorKind::NotNullViolation,
            }
        }
    }

    fn db_error(violation: Violation) -> sqlx::Error {
        sqlx::Error::Database(Box::new(ConstraintError(violation)))
    }

    #[test]
    fn same_sqlstate_different_violations() {
        assert!(is_duplicate_key(&db_error(Violation::Unique)));
        assert!(!is_missing_reference(&db_error(Violation::Unique)));

        assert!(!is_duplicate_key(&db_error(Violation::ForeignKey)));
        assert!(is_missing_reference(&db_error(Violation::ForeignKey)));

        assert!(!is_duplicate_key(&db_error(Violation::NotNull)));
        assert!(!is_missing_reference(&db_error(Violation::NotNull)));

        assert!(!is_duplicate_key(&sqlx::Error::RowNotFound));
    }
}
