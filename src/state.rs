use crate::git::{Branches, Remote};
use crate::selection::{SelectionSet, TrackedFileMap};
use crate::tree::ChangeTree;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

const MIB: f64 = 1024.0 * 1024.0;

/// Everything the presentation layer reads. Mutated only through
/// [`SharedState`]; consumers take snapshots and re-render on revision
/// changes.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tree: ChangeTree,
    pub selection: SelectionSet,
    pub expanded: Vec<String>,
    pub branches: Branches,
    pub remotes: Vec<Remote>,
    pub tracked_lfs: TrackedFileMap,
    pub rebase_in_progress: bool,
    /// Advisory only: set while a load or save runs, never checked to gate
    /// entry. Overlapping calls against the same root are a caller error,
    /// not something this flag prevents.
    pub busy: bool,
    pub git_initialized: bool,
    /// Large-file selection threshold in MiB.
    pub lfs_threshold_mib: f64,
    /// Bumped whenever ignore or index membership changed and tracked state
    /// needs re-rendering.
    pub commit_refresh: u64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            tree: ChangeTree::new(),
            selection: SelectionSet::new(),
            expanded: Vec::new(),
            branches: Branches::default(),
            remotes: Vec::new(),
            tracked_lfs: TrackedFileMap::new(),
            rebase_in_progress: false,
            busy: false,
            git_initialized: false,
            lfs_threshold_mib: 1.0,
            commit_refresh: 0,
        }
    }
}

impl Snapshot {
    pub fn lfs_threshold_bytes(&self) -> u64 {
        (self.lfs_threshold_mib * MIB) as u64
    }
}

struct StateInner {
    snapshot: RwLock<Snapshot>,
    revision: watch::Sender<u64>,
}

/// Shared observable state. Cloning is cheap; all clones see the same bag.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<StateInner>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StateInner {
                snapshot: RwLock::new(Snapshot::default()),
                revision,
            }),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot.read().expect("state lock poisoned").clone()
    }

    /// Revision stream for change notification; the value itself only ever
    /// increments.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub fn update(&self, mutate: impl FnOnce(&mut Snapshot)) {
        {
            let mut snapshot = self.inner.snapshot.write().expect("state lock poisoned");
            mutate(&mut snapshot);
        }
        self.inner.revision.send_modify(|revision| *revision += 1);
    }

    pub fn set_busy(&self, busy: bool) {
        self.update(|snapshot| snapshot.busy = busy);
    }

    pub fn is_busy(&self) -> bool {
        self.inner.snapshot.read().expect("state lock poisoned").busy
    }

    pub fn bump_commit_refresh(&self) {
        self.update(|snapshot| snapshot.commit_refresh += 1);
    }
}
