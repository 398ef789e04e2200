use std::num::ParseIntError;
use thiserror::Error;

/// Failures surfaced by the catalog query layer.
///
/// Every failure propagates immediately to the caller; there is no retry and
/// no partial success. A table's DDL is either fully rendered or not rendered
/// at all.
#[derive(Debug, Error)]
pub enum Error {
    /// The connection could not be opened or used.
    #[error("database connection failed: {0}")]
    Connection(#[source] tokio_postgres::Error),

    /// A catalog query was rejected by the server.
    #[error("catalog query failed: {0}")]
    Query(#[source] tokio_postgres::Error),

    /// A result row could not be decoded into the expected shape.
    #[error("failed to decode catalog row: {0}")]
    Scan(#[source] tokio_postgres::Error),

    /// A textual catalog field could not be converted to its numeric type.
    #[error("cannot convert {field} value {value:?} to a number")]
    Conversion {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Result type for squill operations.
pub type Result<T> = std::result::Result<T, Error>;
