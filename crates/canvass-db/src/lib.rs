//! Persistence layer for Canvass survey responses.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and the [`ResponseStore`] that records accepted
//! survey answers. The responses table is the only durable state in the
//! system; in-progress call sessions live in memory and are lost on restart
//! by design.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: one server, one file, no external database
//!   process. WAL allows concurrent readers with a single writer, which
//!   matches the access pattern of many parallel calls each writing one
//!   row per accepted answer.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!` so the schema ships with the server and cannot drift
//!   from the code that depends on it.

mod migrations;
mod pool;
mod responses;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbSettings, PoolError};
pub use responses::{insert_response, list_responses, ResponseStore, StoreError};
