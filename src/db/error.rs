use std::error::Error as _;
use std::fmt::{self, Write as _};

/// SQLSTATE class of a failed statement, as far as a workload run cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 42601 / 42000
    Syntax,
    /// 42704 on a `SET`: the server does not know the setting, usually
    /// because the Bao extension is not loaded
    UnknownSetting,
    /// Remaining class 42 codes (missing relation, column, function)
    Semantic,
    /// Data exceptions, constraint violations, resource limits, cancellation
    Execution,
    /// Aborted transaction or serialization failure
    Transaction,
    /// Class 08 and errors raised by the client itself
    Connection,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Syntax => "Syntax Error",
            ErrorCategory::UnknownSetting => "Unknown Setting",
            ErrorCategory::Semantic => "Semantic Error",
            ErrorCategory::Execution => "Execution Error",
            ErrorCategory::Transaction => "Transaction Error",
            ErrorCategory::Connection => "Connection Error",
            ErrorCategory::Unknown => "Error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A statement the server (or the connection) rejected during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseFailure {
    pub category: ErrorCategory,
    /// SQLSTATE, empty when the failure did not come from the server
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub statement: String,
}

impl DatabaseFailure {
    pub fn from_pg_error(err: &tokio_postgres::Error, statement: &str) -> Self {
        let Some(db) = err.as_db_error() else {
            let category = if err.is_closed() || err.source().is_some() {
                ErrorCategory::Connection
            } else {
                ErrorCategory::Unknown
            };
            return DatabaseFailure {
                category,
                code: String::new(),
                message: err.to_string(),
                detail: err.source().map(ToString::to_string),
                hint: None,
                statement: statement.to_string(),
            };
        };

        let code = db.code().code();
        let category = classify_failure(code, statement);
        let hint = match (db.hint(), category) {
            (Some(server_hint), _) => Some(server_hint.to_string()),
            (None, ErrorCategory::UnknownSetting) => Some(String::from(
                "check that pg_bao is listed in shared_preload_libraries",
            )),
            (None, _) => None,
        };

        DatabaseFailure {
            category,
            code: code.to_string(),
            message: db.message().to_string(),
            detail: db.detail().map(ToString::to_string),
            hint,
            statement: statement.to_string(),
        }
    }

    pub fn from_string(message: impl Into<String>, statement: &str) -> Self {
        DatabaseFailure {
            category: ErrorCategory::Unknown,
            code: String::new(),
            message: message.into(),
            detail: None,
            hint: None,
            statement: statement.to_string(),
        }
    }

    /// Multi-line report printed when a run aborts.
    pub fn display_full(&self) -> String {
        let mut out = format!("{}: {}", self.category, self.message);
        if !self.code.is_empty() {
            let _ = write!(out, "\n  SQLSTATE: {}", self.code);
        }
        for (label, value) in [("Detail", &self.detail), ("Hint", &self.hint)] {
            if let Some(value) = value {
                let _ = write!(out, "\n  {}: {}", label, value);
            }
        }
        let _ = write!(out, "\n  Statement: {}", self.statement);
        out
    }
}

impl fmt::Display for DatabaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if !self.code.is_empty() {
            write!(f, " [{}]", self.code)?;
        }
        Ok(())
    }
}

/// Map a SQLSTATE to its category. `statement` separates a missing Bao
/// setting from other undefined objects.
pub fn classify_failure(code: &str, statement: &str) -> ErrorCategory {
    let is_set = statement
        .trim_start()
        .get(..4)
        .is_some_and(|head| head.eq_ignore_ascii_case("set "));

    match (code.get(..2), code) {
        (_, "42601" | "42000") => ErrorCategory::Syntax,
        (_, "42704") if is_set => ErrorCategory::UnknownSetting,
        (Some("42"), _) => ErrorCategory::Semantic,
        (Some("22" | "23" | "53" | "54" | "55" | "57"), _) => ErrorCategory::Execution,
        (Some("25" | "40"), _) => ErrorCategory::Transaction,
        (Some("08"), _) => ErrorCategory::Connection,
        _ => ErrorCategory::Unknown,
    }
}
