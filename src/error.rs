//! Driver error types
//!
//! Every fault that touches the database carries the statement text that
//! produced it, so an operator can see exactly what the engine rejected.

use std::io;

use thiserror::Error;

/// A failed statement together with the text that was sent to the engine
#[derive(Error, Debug)]
#[error("{source} in query: {query}")]
pub struct QueryError {
    pub query: String,
    #[source]
    pub source: rusqlite::Error,
}

impl QueryError {
    pub fn new(query: impl Into<String>, source: rusqlite::Error) -> Self {
        Self {
            query: query.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("invalid database locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("failed to open database at '{path}': {source}")]
    Connection {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to bootstrap migrations table: {0}")]
    Bootstrap(#[source] QueryError),

    #[error("failed to read migration version: {0}")]
    Read(#[source] QueryError),

    #[error("failed to write migration version: {0}")]
    Write(#[source] QueryError),

    #[error("migration failed: {0}")]
    Execution(#[source] QueryError),

    #[error("database is already locked")]
    Locked,

    #[error("migration script ended the transaction holding the migration lock; set x-no-tx-wrap=true and run it without the lock")]
    LockLost,

    #[error("failed to acquire migration lock: {0}")]
    Lock(#[source] QueryError),

    #[error("failed to release migration lock: {0}")]
    Unlock(#[source] QueryError),

    #[error("failed to read migration script: {0}")]
    Script(#[source] io::Error),

    #[error("failed to drop database '{path}': {source}")]
    Drop {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to close database: {0}")]
    Close(#[source] rusqlite::Error),
}

impl DriverError {
    /// The statement text behind a query-level failure, if any
    pub fn query(&self) -> Option<&str> {
        match self {
            DriverError::Bootstrap(e)
            | DriverError::Read(e)
            | DriverError::Write(e)
            | DriverError::Execution(e)
            | DriverError::Lock(e)
            | DriverError::Unlock(e) => Some(e.query.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
