use std::fmt::Display;

/// The kind of row an operation referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Team,
    Match,
    Athlete,
    Car,
}

impl Display for RowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowKind::Team => write!(f, "team"),
            RowKind::Match => write!(f, "match"),
            RowKind::Athlete => write!(f, "athlete"),
            RowKind::Car => write!(f, "car"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Caller-supplied input violates a precondition. Nothing was written.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A referenced row does not exist. Nothing was written.
    #[error("Unknown {kind} {id}")]
    NotFound { kind: RowKind, id: i64 },

    /// The database failed. Any open transaction has been rolled back.
    #[error("Storage error: {0}")]
    Storage(sqlx::Error),
}

impl LedgerError {
    pub fn not_found(kind: RowKind, id: i64) -> Self {
        LedgerError::NotFound { kind, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, LedgerError::Validation(_))
    }
}

impl From<&str> for LedgerError {
    fn from(str: &str) -> Self {
        Self::Validation(str.to_owned())
    }
}

impl From<String> for LedgerError {
    fn from(str: String) -> Self {
        Self::Validation(str)
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        log::error!("Database operation failed: {}", err);
        LedgerError::Storage(err)
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
