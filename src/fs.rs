use crate::domain::SPREADSHEET_EXT;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::ModifyKind};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Create,
    Modify,
    Remove,
    Rename,
}

impl From<EventKind> for FileChangeKind {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Create(_) => Self::Create,
            EventKind::Modify(ModifyKind::Name(_)) => Self::Rename,
            EventKind::Remove(_) => Self::Remove,
            _ => Self::Modify,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: FileChangeKind,
}

/// Stream of raw change events for a watched root. Dropping the subscription
/// stops the underlying watcher.
pub struct FsSubscription {
    rx: UnboundedReceiver<WatchEvent>,
    _watcher: RecommendedWatcher,
}

impl FsSubscription {
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }
}

/// Local filesystem operations the engine depends on. Methods return
/// `io::Result` so callers can dispatch on the error kind (already-exists,
/// not-found) instead of string matching.
pub trait FileStore: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    /// Unconditional write, overwriting any existing file.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;
    /// Create-exclusive write; fails with `AlreadyExists` instead of
    /// overwriting.
    fn write_new(&self, path: &Path, data: &[u8]) -> io::Result<()>;
    fn remove(&self, path: &Path) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    /// Sizes for the given paths, `0` where the file is absent.
    fn file_sizes(&self, paths: &[PathBuf]) -> Vec<u64>;
    /// Every spreadsheet file under `root`, relative order unspecified.
    fn all_spreadsheets(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
    /// Reveals the path in the platform file manager.
    fn open_path(&self, path: &Path) -> io::Result<()>;
    /// Subscribes to raw change events below `root`.
    fn subscribe(&self, root: &Path) -> Result<FsSubscription>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

impl LocalFileStore {
    fn ensure_parent(path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl FileStore for LocalFileStore {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        Self::ensure_parent(path)?;
        fs::write(path, data)
    }

    fn write_new(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        Self::ensure_parent(path)?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        let mut file = options.open(path)?;
        io::Write::write_all(&mut file, data)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        Self::ensure_parent(to)?;
        fs::rename(from, to)
    }

    fn file_sizes(&self, paths: &[PathBuf]) -> Vec<u64> {
        paths
            .iter()
            .map(|path| fs::metadata(path).map(|meta| meta.len()).unwrap_or(0))
            .collect()
    }

    fn all_spreadsheets(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(io::Error::other)?;
            if entry.file_type().is_file()
                && entry
                    .path()
                    .to_string_lossy()
                    .ends_with(SPREADSHEET_EXT)
            {
                found.push(entry.into_path());
            }
        }
        Ok(found)
    }

    fn open_path(&self, path: &Path) -> io::Result<()> {
        #[cfg(target_os = "macos")]
        let opener = "open";
        #[cfg(target_os = "windows")]
        let opener = "explorer";
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let opener = "xdg-open";

        Command::new(opener).arg(path).spawn()?;
        Ok(())
    }

    fn subscribe(&self, root: &Path) -> Result<FsSubscription> {
        let (tx, rx) = unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            if let Ok(event) = result {
                let kind = FileChangeKind::from(event.kind);
                for path in event.paths {
                    let _ = tx.send(WatchEvent { path, kind });
                }
            }
        })
        .context("failed to create filesystem watcher")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;

        Ok(FsSubscription {
            rx,
            _watcher: watcher,
        })
    }
}
