//! Persistence layer.

mod libsql_backend;
mod migrations;
mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::PackageStore;
