use crate::config::EngineConfig;
use crate::domain::{
    ArcModel, Contract, ContractDto, EntityKind, INVESTIGATION_FILE, SpreadsheetCodec,
};
use crate::fs::FileStore;
use crate::git::{GitOps, GitRunner};
use crate::ignore::{GITIGNORE_FILE, IgnoreToggle, default_gitignore_contract};
use crate::selection::{default_selection, toggle};
use crate::state::SharedState;
use crate::sync::{Diagnostic, SyncIssue, SyncOutcome, SyncReport, apply_contracts};
use crate::tree::ChangeTree;
use anyhow::Result;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result of one load pass. `Skipped` means the root is not a workspace
/// (no investigation file), which is a no-op rather than an error.
#[derive(Debug)]
pub struct LoadReport {
    pub outcome: SyncOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

struct BusyGuard {
    state: SharedState,
}

impl BusyGuard {
    fn hold(state: &SharedState) -> Self {
        state.set_busy(true);
        Self {
            state: state.clone(),
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.state.set_busy(false);
    }
}

struct SuppressGuard {
    flag: Option<Arc<AtomicBool>>,
}

impl SuppressGuard {
    fn hold(flag: Option<&Arc<AtomicBool>>) -> Self {
        if let Some(flag) = flag {
            flag.store(true, Ordering::SeqCst);
        }
        Self {
            flag: flag.cloned(),
        }
    }
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        if let Some(flag) = &self.flag {
            flag.store(false, Ordering::SeqCst);
        }
    }
}

/// Binds the collaborators together for one tracked root: load and save
/// flows, status polling, selection, and ignore maintenance.
///
/// Operations here are meant to be driven from a single logical control
/// flow. The busy flag in the state bag is advisory; nothing blocks a second
/// caller from overlapping operations against the same root, and doing so is
/// a caller error.
pub struct Workspace {
    fs: Arc<dyn FileStore>,
    codec: Arc<dyn SpreadsheetCodec>,
    git: GitOps,
    state: SharedState,
    watch_suppress: Option<Arc<AtomicBool>>,
    commit_author: String,
}

impl Workspace {
    pub fn new(
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileStore>,
        runner: Arc<dyn GitRunner>,
        codec: Arc<dyn SpreadsheetCodec>,
        state: SharedState,
        config: &EngineConfig,
    ) -> Self {
        let threshold = config.lfs_threshold_mib;
        state.update(|snapshot| snapshot.lfs_threshold_mib = threshold);
        Self {
            fs,
            codec,
            git: GitOps::new(runner, root),
            state,
            watch_suppress: None,
            commit_author: config.commit_author.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        self.git.root()
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn git(&self) -> &GitOps {
        &self.git
    }

    /// Wires in the debouncer's suppression flag so bulk writes do not feed
    /// back through the watcher.
    pub fn attach_watch_suppression(&mut self, flag: Arc<AtomicBool>) {
        self.watch_suppress = Some(flag);
    }

    /// Reads the on-disk workspace into the domain model: every read
    /// contract gets its file decoded through the codec, and the resolved
    /// batch is handed back to the model. Unreadable or undecodable files
    /// degrade to diagnostics instead of aborting the load.
    pub fn load(&self, model: &mut dyn ArcModel) -> LoadReport {
        if !self.fs.exists(&self.root().join(INVESTIGATION_FILE)) {
            return LoadReport {
                outcome: SyncOutcome::Skipped,
                diagnostics: Vec::new(),
            };
        }

        let _busy = BusyGuard::hold(&self.state);
        let mut diagnostics = Vec::new();
        let mut resolved = Vec::new();

        for contract in model.read_contracts() {
            match self.fs.read(&self.root().join(&contract.path)) {
                Ok(bytes) => match self.codec.from_bytes(&bytes) {
                    Ok(workbook) => resolved.push(Contract {
                        dto: Some(ContractDto::Workbook(workbook)),
                        ..contract
                    }),
                    Err(err) => diagnostics.push(Diagnostic {
                        contract: contract.describe(),
                        issue: SyncIssue::Codec(err),
                    }),
                },
                Err(err) => diagnostics.push(Diagnostic {
                    contract: contract.describe(),
                    issue: SyncIssue::Io(err),
                }),
            }
        }

        if let Err(err) = model.set_isa_from_contracts(resolved) {
            diagnostics.push(Diagnostic {
                contract: "ISA read batch".to_string(),
                issue: SyncIssue::Model(err),
            });
        }

        let git_initialized = self.git.is_initialized();
        self.state
            .update(|snapshot| snapshot.git_initialized = git_initialized);

        LoadReport {
            outcome: if diagnostics.is_empty() {
                SyncOutcome::Clean
            } else {
                SyncOutcome::WithDiagnostics
            },
            diagnostics,
        }
    }

    /// Writes pending model changes to disk. `force` takes the full write
    /// contract set instead of only the dirty updates. A missing ignore file
    /// is materialized as part of the same batch.
    pub fn save(&self, model: &mut dyn ArcModel, force: bool) -> SyncReport {
        let _busy = BusyGuard::hold(&self.state);
        let _quiet = SuppressGuard::hold(self.watch_suppress.as_ref());

        model.update_file_system();
        let mut contracts = if force {
            model.write_contracts()
        } else {
            model.update_contracts()
        };

        if !self.fs.exists(&self.root().join(GITIGNORE_FILE)) {
            contracts.push(default_gitignore_contract());
        }

        apply_contracts(
            self.fs.as_ref(),
            self.codec.as_ref(),
            model,
            self.root(),
            &contracts,
        )
    }

    /// Bootstraps a new workspace: full save, read-back, then version
    /// control init with the configured author.
    pub fn create(&self, model: &mut dyn ArcModel) -> SyncReport {
        let mut report = self.save(model, true);
        let load = self.load(model);
        report.diagnostics.extend(load.diagnostics);

        let (ok, message) = self.git.init_workspace(&self.commit_author);
        if !ok {
            report.diagnostics.push(Diagnostic {
                contract: format!("INIT {}", self.root().display()),
                issue: SyncIssue::Tool(message),
            });
        }
        report
    }

    pub fn delete_entity(
        &self,
        model: &mut dyn ArcModel,
        kind: EntityKind,
        identifier: &str,
    ) -> SyncReport {
        let contracts = model.delete_contracts(kind, identifier);
        self.apply_batch(model, &contracts)
    }

    pub fn rename_entity(
        &self,
        model: &mut dyn ArcModel,
        kind: EntityKind,
        old_identifier: &str,
        new_identifier: &str,
    ) -> SyncReport {
        let contracts = model.rename_contracts(kind, old_identifier, new_identifier);
        self.apply_batch(model, &contracts)
    }

    fn apply_batch(&self, model: &mut dyn ArcModel, contracts: &[Contract]) -> SyncReport {
        let _busy = BusyGuard::hold(&self.state);
        let _quiet = SuppressGuard::hold(self.watch_suppress.as_ref());
        apply_contracts(
            self.fs.as_ref(),
            self.codec.as_ref(),
            model,
            self.root(),
            contracts,
        )
    }

    /// Status poll: rebuilds the change tree, recomputes the default
    /// selection (manual picks are discarded by design), and publishes the
    /// whole view to the state bag.
    pub fn refresh_changes(&self) {
        let _busy = BusyGuard::hold(&self.state);

        let (entries, rebasing) = self.git.status_entries(self.fs.as_ref());
        let tree = ChangeTree::build(&entries);
        let tracked = self.git.tracked_lfs_files();
        let expanded = tree.expanded_ids();

        self.state.update(move |snapshot| {
            snapshot.selection =
                default_selection(&tree, &tracked, snapshot.lfs_threshold_bytes());
            snapshot.tree = tree;
            snapshot.tracked_lfs = tracked;
            snapshot.expanded = expanded;
            snapshot.rebase_in_progress = rebasing;
        });
    }

    pub fn refresh_remotes(&self) {
        let branches = self.git.branches();
        let mut remotes = self.git.remotes();
        self.git.check_remotes(&mut remotes);

        self.state.update(move |snapshot| {
            snapshot.branches = branches;
            snapshot.remotes = remotes;
        });
    }

    /// Changing the threshold recomputes the selection over the current
    /// tree, the same way a fresh poll would.
    pub fn set_lfs_threshold(&self, mib: f64) {
        self.state.update(|snapshot| {
            snapshot.lfs_threshold_mib = mib;
            let selection = default_selection(
                &snapshot.tree,
                &snapshot.tracked_lfs,
                snapshot.lfs_threshold_bytes(),
            );
            snapshot.selection = selection;
        });
    }

    /// Tri-state selection toggle on a tree node; returns false when the id
    /// is not in the current tree.
    pub fn toggle_selection(&self, id: &str) -> bool {
        let mut found = false;
        self.state.update(|snapshot| {
            if let Some(node) = snapshot.tree.find(id) {
                found = true;
                toggle(&snapshot.tree, &mut snapshot.selection, node);
            }
        });
        found
    }

    pub fn toggle_ignore(
        &self,
        model: &mut dyn ArcModel,
        absolute_path: &Path,
    ) -> Result<IgnoreToggle> {
        crate::ignore::toggle_ignore(
            self.fs.as_ref(),
            self.codec.as_ref(),
            model,
            &self.git,
            &self.state,
            absolute_path,
        )
    }

    pub fn set_git_user(&self, name: &str, email: &str) -> (bool, String) {
        self.git.set_user(name, email)
    }

    pub fn open_in_explorer(&self) -> io::Result<()> {
        self.fs.open_path(self.root())
    }

    /// All spreadsheet files under the root, for hosts constructing the
    /// domain model from file paths.
    pub fn spreadsheet_paths(&self) -> io::Result<Vec<PathBuf>> {
        self.fs.all_spreadsheets(self.root())
    }
}
