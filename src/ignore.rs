use crate::domain::{ArcModel, Contract, SpreadsheetCodec};
use crate::fs::FileStore;
use crate::git::GitOps;
use crate::state::SharedState;
use crate::sync::apply_contracts;
use anyhow::{Context, Result};
use std::path::Path;

pub const GITIGNORE_FILE: &str = ".gitignore";

/// Baseline ignore entries for a fresh workspace: OS litter and the lock
/// files spreadsheet editors leave next to open workbooks.
pub const DEFAULT_GITIGNORE: &str = ".DS_Store\nThumbs.db\ndesktop.ini\n~$*\n.~lock.*#\n";

pub fn default_gitignore_contract() -> Contract {
    Contract::create_text(GITIGNORE_FILE, DEFAULT_GITIGNORE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreToggle {
    /// Entry appended; the path was unstaged and dropped from the index.
    Ignored,
    /// Entry removed; the path was staged again.
    Tracked,
}

/// Flips ignore-file membership for one path and mirrors the change into the
/// git index. The ignore file's existing line-ending convention is detected
/// (CRLF checked first) and preserved on rewrite.
pub fn toggle_ignore(
    fs: &dyn FileStore,
    codec: &dyn SpreadsheetCodec,
    model: &mut dyn ArcModel,
    git: &GitOps,
    state: &SharedState,
    absolute_path: &Path,
) -> Result<IgnoreToggle> {
    let root = git.root();
    let relative = absolute_path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", absolute_path.display(), root.display()))?;
    let entry = format!("/{}", relative.to_string_lossy().replace('\\', "/"));
    let pathspec = format!(".{entry}");

    let ignore_path = root.join(GITIGNORE_FILE);
    if !fs.exists(&ignore_path) {
        apply_contracts(fs, codec, model, root, &[default_gitignore_contract()]);
    }

    let raw = fs
        .read_to_string(&ignore_path)
        .with_context(|| format!("failed to read {}", ignore_path.display()))?;
    let delimiter = if raw.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<&str> = raw.split(delimiter).collect();

    let toggle = if let Some(position) = lines.iter().position(|line| *line == entry) {
        lines.remove(position);
        git.stage(&pathspec);
        IgnoreToggle::Tracked
    } else {
        lines.push(&entry);
        git.unstage_and_untrack(&pathspec);
        IgnoreToggle::Ignored
    };

    fs.write(&ignore_path, lines.join(delimiter).as_bytes())
        .with_context(|| format!("failed to rewrite {}", ignore_path.display()))?;

    state.bump_commit_refresh();
    Ok(toggle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityKind, Workbook};
    use crate::fs::LocalFileStore;
    use crate::git::GitRunner;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    struct NullCodec;

    impl SpreadsheetCodec for NullCodec {
        fn to_bytes(&self, _workbook: &Workbook) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn from_bytes(&self, _bytes: &[u8]) -> Result<Workbook> {
            Ok(Workbook(serde_json::Value::Null))
        }
    }

    #[derive(Default)]
    struct NoopModel;

    impl ArcModel for NoopModel {
        fn update_file_system(&mut self) {}

        fn read_contracts(&self) -> Vec<Contract> {
            Vec::new()
        }

        fn update_contracts(&self) -> Vec<Contract> {
            Vec::new()
        }

        fn write_contracts(&self) -> Vec<Contract> {
            Vec::new()
        }

        fn set_isa_from_contracts(&mut self, _contracts: Vec<Contract>) -> Result<()> {
            Ok(())
        }

        fn delete_contracts(&mut self, _kind: EntityKind, _identifier: &str) -> Vec<Contract> {
            Vec::new()
        }

        fn rename_contracts(&mut self, _kind: EntityKind, _old: &str, _new: &str) -> Vec<Contract> {
            Vec::new()
        }
    }

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingRunner {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("lock").clone()
        }
    }

    impl GitRunner for RecordingRunner {
        fn run(&self, args: &[&str], _cwd: &Path) -> (bool, String) {
            self.calls.lock().expect("lock").push(args.join(" "));
            (true, String::new())
        }
    }

    fn fixture(root: &Path) -> (GitOps, Arc<RecordingRunner>, SharedState) {
        let runner = Arc::new(RecordingRunner::default());
        let git = GitOps::new(runner.clone(), root);
        (git, runner, SharedState::new())
    }

    #[test]
    fn appending_to_crlf_file_preserves_crlf() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join(".gitignore"), ".DS_Store\r\n*.tmp").expect("seed");
        let (git, runner, state) = fixture(dir.path());

        let toggle = toggle_ignore(
            &LocalFileStore,
            &NullCodec,
            &mut NoopModel,
            &git,
            &state,
            &dir.path().join("dataset/big.bin"),
        )
        .expect("toggle");

        assert_eq!(toggle, IgnoreToggle::Ignored);
        let written = std::fs::read_to_string(dir.path().join(".gitignore")).expect("read");
        assert_eq!(written, ".DS_Store\r\n*.tmp\r\n/dataset/big.bin");
        assert_eq!(
            runner.calls(),
            vec![
                "reset ./dataset/big.bin".to_string(),
                "rm --cached ./dataset/big.bin".to_string(),
            ]
        );
    }

    #[test]
    fn removing_an_entry_restages_the_path() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(".gitignore"),
            ".DS_Store\n/dataset/big.bin\n*.tmp",
        )
        .expect("seed");
        let (git, runner, state) = fixture(dir.path());

        let toggle = toggle_ignore(
            &LocalFileStore,
            &NullCodec,
            &mut NoopModel,
            &git,
            &state,
            &dir.path().join("dataset/big.bin"),
        )
        .expect("toggle");

        assert_eq!(toggle, IgnoreToggle::Tracked);
        let written = std::fs::read_to_string(dir.path().join(".gitignore")).expect("read");
        assert_eq!(written, ".DS_Store\n*.tmp");
        assert_eq!(runner.calls(), vec!["add ./dataset/big.bin".to_string()]);
    }

    #[test]
    fn missing_ignore_file_is_materialized_first() {
        let dir = tempdir().expect("tempdir");
        let (git, _runner, state) = fixture(dir.path());

        toggle_ignore(
            &LocalFileStore,
            &NullCodec,
            &mut NoopModel,
            &git,
            &state,
            &dir.path().join("runs/out.bin"),
        )
        .expect("toggle");

        let written = std::fs::read_to_string(dir.path().join(".gitignore")).expect("read");
        assert!(written.starts_with(DEFAULT_GITIGNORE.trim_end_matches('\n')));
        assert!(written.ends_with("/runs/out.bin"));
    }

    #[test]
    fn every_toggle_bumps_the_commit_refresh_counter() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join(".gitignore"), "").expect("seed");
        let (git, _runner, state) = fixture(dir.path());

        for _ in 0..2 {
            toggle_ignore(
                &LocalFileStore,
                &NullCodec,
                &mut NoopModel,
                &git,
                &state,
                &dir.path().join("a.bin"),
            )
            .expect("toggle");
        }
        assert_eq!(state.snapshot().commit_refresh, 2);
    }

    #[test]
    fn path_outside_root_is_rejected() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join(".gitignore"), "").expect("seed");
        let (git, _runner, state) = fixture(dir.path());

        let result = toggle_ignore(
            &LocalFileStore,
            &NullCodec,
            &mut NoopModel,
            &git,
            &state,
            Path::new("/elsewhere/file.bin"),
        );
        assert!(result.is_err());
    }
}
