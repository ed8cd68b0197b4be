//! Change tracking and reconciliation for ISA-based research data
//! workspaces.
//!
//! The crate turns raw version-control status output into a navigable change
//! tree with size aggregation and large-file selection heuristics, and keeps
//! the on-disk workspace consistent with an in-memory domain model by
//! applying declarative contract batches. Version control, the spreadsheet
//! codec, and the domain model itself stay behind traits; the presentation
//! layer observes everything through [`state::SharedState`].

pub mod config;
pub mod domain;
pub mod fs;
pub mod git;
pub mod ignore;
pub mod net;
pub mod selection;
pub mod state;
pub mod sync;
pub mod tree;
pub mod watch;
pub mod workspace;

// Re-export the types most hosts touch.
pub use config::EngineConfig;
pub use domain::{
    ArcModel, Contract, ContractDto, DtoType, EntityKind, Operation, SpreadsheetCodec, StatusEntry,
    Workbook,
};
pub use fs::{FileStore, LocalFileStore, WatchEvent};
pub use git::{GitOps, GitRunner, ShellGitRunner};
pub use ignore::IgnoreToggle;
pub use net::RequestSupervisor;
pub use selection::{SelectionSet, TrackedFileMap};
pub use state::{SharedState, Snapshot};
pub use sync::{SyncOutcome, SyncReport, apply_contracts};
pub use tree::ChangeTree;
pub use watch::ReloadDebouncer;
pub use workspace::Workspace;
