//! Database module for PostgreSQL persistence.

mod pool;
mod projects;

pub use pool::*;
pub use projects::*;
