//! Version reconciliation - optimistic concurrency for remote snapshots.
//!
//! Every remote snapshot carries a monotonically increasing server version.
//! A write is accepted only when the client's last-observed version equals
//! the durable version at the moment of the write; anything else fails
//! closed as a conflict that the caller must resolve. The engine never
//! merges automatically.

use crate::Version;

/// Version assigned to a record on creation.
pub const INITIAL_VERSION: Version = 1;

/// The durable-store-side decision for one write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    /// The write is based on the current durable version; apply it and
    /// advance to `next`.
    Accept { next: Version },
    /// The client is behind; reject without mutating the record.
    Stale,
}

/// Decide whether a write based on `client_version` may be applied to a
/// record currently at `server_version`.
///
/// Accepted writes advance the version by exactly 1. A stale client version
/// is always rejected - resubmitting an old write yields `Stale` again,
/// never a silent overwrite.
pub fn evaluate_write(client_version: Version, server_version: Version) -> WriteDecision {
    if client_version == server_version {
        WriteDecision::Accept {
            next: server_version + 1,
        }
    } else {
        WriteDecision::Stale
    }
}
