//! # Folio Engine
//!
//! The persistence core for the Folio multi-page document editor.
//!
//! This crate holds the pure logic of the save/load engine: converting a
//! live editing session into a portable snapshot and back, deciding which
//! persistence path services a call, and detecting concurrent-write
//! conflicts. It performs no IO - the async runtime lives in
//! `folio-client`, and the durable store behind the remote path lives in
//! `folio-server`.
//!
//! ## Core Concepts
//!
//! ### Snapshots
//!
//! An [`EditorSession`] is the live, in-memory editing state. It uses
//! containers that are convenient to edit but not portable: ordered maps
//! with integer keys, sets, and transient UI-only flags. The codec in
//! [`codec`] converts a session into a [`ProjectSnapshot`] - a plain,
//! cycle-free, JSON-safe tree - and reconstructs a [`SessionPatch`] from
//! stored snapshot data.
//!
//! ### Modes
//!
//! Every save and load call is serviced by exactly one of three paths,
//! selected by [`resolve_mode`] from an explicit [`AmbientContext`]:
//!
//! - [`SessionMode::Owner`] - authenticated user, remote backend
//! - [`SessionMode::LocalOnly`] - anonymous, device storage
//! - [`SessionMode::SharedCollaborative`] - share-token access with a
//!   declared viewer or editor permission
//!
//! ### Versions
//!
//! Every remote record carries a monotonically increasing server version,
//! and each client tracks the last version it observed. The write decision
//! in [`evaluate_write`] fails closed: a stale client version is always
//! rejected, never silently overwritten, and the caller surfaces both
//! representations for resolution.
//!
//! ### Share Grants
//!
//! A [`ShareGrant`] authorizes collaborative access by token possession,
//! independent of user identity. The shared-editor patch path is validated
//! twice - client side before any network call, server side before any
//! write - using the same rules in [`share`].

pub mod codec;
pub mod error;
pub mod mode;
pub mod session;
pub mod share;
pub mod snapshot;
pub mod version;

// Re-export main types at crate root
pub use codec::{deserialize, serialize, SessionPatch, UNSERIALIZABLE_SENTINEL};
pub use error::Error;
pub use mode::{resolve_mode, AmbientContext, Credential, SessionMode, ShareMarkers};
pub use session::{
    DocumentState, EditorSession, EditorState, ElementCollections, FinalLayoutSettings,
    LayerState, ViewState, WorkflowStep,
};
pub use share::{validate_shared_patch, PatchRejection, ShareGrant, SharePermission};
pub use snapshot::{PortableDocumentState, PortableEditorState, ProjectSnapshot};
pub use version::{evaluate_write, WriteDecision, INITIAL_VERSION};

/// Type aliases for clarity
pub type ProjectId = String;
pub type ShareId = String;
pub type UserId = String;
pub type Version = u64;
pub type Timestamp = u64;

/// Semantic version of the snapshot wire shape, carried in every snapshot
/// for forward compatibility.
pub const SNAPSHOT_SCHEMA_VERSION: &str = "1.0.0";
