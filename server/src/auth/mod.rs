//! Authentication for the persistence API.

mod middleware;

pub use middleware::*;
