use sqlgate_runtime::ExecError;

/// Map a driver error onto the collaborator error taxonomy.
///
/// Errors the server raised about the statement are the caller's problem;
/// pool and transport errors mean the database is unavailable.
pub fn exec_error(err: sqlx::Error) -> ExecError {
    match err {
        sqlx::Error::Database(db) => ExecError::Statement(db.message().to_string()),
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::WorkerCrashed => ExecError::Connection(err.to_string()),
        other => ExecError::Statement(other.to_string()),
    }
}

pub(crate) fn transaction_error(err: sqlx::Error) -> ExecError {
    match exec_error(err) {
        ExecError::Statement(message) => ExecError::Transaction(message),
        other => other,
    }
}
