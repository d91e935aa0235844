//! # Folio Client
//!
//! The persistence runtime an editor front-end embeds. It wires the pure
//! logic from `folio-engine` to real IO:
//!
//! - [`gateway`] - the [`StorageGateway`] abstraction with a local
//!   (on-device, namespaced JSON entries) and a remote (authenticated HTTP)
//!   implementation
//! - [`service`] - the [`ProjectPersistence`] service that resolves the
//!   session mode on every call, dispatches to the right gateway, tracks
//!   versions and enforces the single-flight guards
//! - [`autosave`] - the debounced [`AutoSaveScheduler`], armed only while
//!   the resolved mode is shared-collaborative

pub mod autosave;
pub mod gateway;
pub mod service;

pub use autosave::{AutoSaveScheduler, AUTO_SAVE_DEBOUNCE};
pub use gateway::local::LocalGateway;
pub use gateway::remote::{RemoteConfig, RemoteGateway};
pub use gateway::{
    ConflictPayload, CreateProjectRequest, ProjectRecord, ProjectSummary, RemoteAccess,
    SharedPatchRequest, StorageGateway, UpdateOutcome, UpdateProjectRequest,
};
pub use service::{LoadOutcome, ProjectPersistence, SaveOutcome};
