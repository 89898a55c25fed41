//! Database layer
//!
//! SQLite is the default for single-binary deployment; MySQL is available for
//! larger installs. The driver is selected from configuration and everything
//! above this module works against the `DatabasePool` trait.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
