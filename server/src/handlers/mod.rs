//! Request handlers.

mod projects;
mod shared;

pub use projects::*;
pub use shared::*;
