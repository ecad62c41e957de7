//! Database access layer: connection handling, schema introspection and
//! the [`Transport`] trait the rewrite engine drives. The live backend
//! talks to a MySQL-compatible server; [`memory::MemoryTransport`] is a
//! drop-in stand-in for tests.

mod db;
pub mod error;
pub mod memory;
mod schema;
mod transport;
pub mod value;

pub use db::{ConnectInfo, MySqlTransport};
pub use error::StoreError;
pub use schema::{organize_columns, RawColumn};
pub use transport::Transport;
pub use value::{PageRow, SqlValue};
