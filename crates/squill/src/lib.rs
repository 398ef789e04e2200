//! Canonical Postgres schema export for diff-based migrations.
//!
//! squill reconstructs the DDL of a live database's current schema from
//! catalog metadata, in a normalized form where two semantically identical
//! schemas always render to byte-identical text. A diff engine downstream
//! compares that text against a desired schema to compute migration
//! statements; this crate only reads.
//!
//! # Example
//!
//! ```ignore
//! use squill::{CatalogReader, DbConfig};
//!
//! let config = DbConfig {
//!     dbname: "app".to_string(),
//!     ..DbConfig::default()
//! };
//! let client = config.connect().await?;
//! let reader = CatalogReader::new(&client);
//!
//! for ddl in reader.enum_type_ddls().await? {
//!     println!("{ddl}");
//! }
//! for table in reader.table_names().await? {
//!     println!("{}", reader.table_ddl(&table).await?);
//! }
//! for ddl in reader.view_ddls().await? {
//!     println!("{ddl}");
//! }
//! ```

mod catalog;
mod config;
mod conn;
mod error;

pub use catalog::CatalogReader;
pub use config::DbConfig;
pub use conn::{Session, SessionExt, SessionPool, TracedSession};
pub use error::{Error, Result};

// Re-export the pure model so downstream consumers (the diff engine's parsed
// form) can name the same types.
pub use squill_db_schema as db_schema;
