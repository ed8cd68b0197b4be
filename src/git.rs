use crate::domain::{
    ASSAYS_DIR, INVESTIGATION_FILE, RUNS_DIR, STUDIES_DIR, StatusEntry, WORKFLOWS_DIR,
};
use crate::fs::FileStore;
use crate::selection::TrackedFileMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::warn;

/// External version-control tool. Failures never raise; they come back as
/// the success flag plus a message.
pub trait GitRunner: Send + Sync {
    fn run(&self, args: &[&str], cwd: &Path) -> (bool, String);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShellGitRunner;

impl GitRunner for ShellGitRunner {
    fn run(&self, args: &[&str], cwd: &Path) -> (bool, String) {
        let output = match Command::new("git").args(args).current_dir(cwd).output() {
            Ok(output) => output,
            Err(err) => return (false, format!("failed to execute git: {err}")),
        };

        if output.status.success() {
            (true, String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            (false, String::from_utf8_lossy(&output.stderr).to_string())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Branches {
    pub list: Vec<String>,
    pub current: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
    /// Local HEAD differs from the remote head of the current branch.
    pub dirty: bool,
}

/// Splits NUL-delimited `status -z -u` output into (code, path) records.
pub fn parse_porcelain(raw: &str) -> Vec<(String, String)> {
    raw.split('\0')
        .filter(|record| record.chars().count() > 3)
        .map(|record| {
            let chars: Vec<char> = record.chars().collect();
            let code: String = chars[..2].iter().collect();
            let path: String = chars[3..].iter().collect();
            (code, path)
        })
        .collect()
}

pub fn parse_branches(raw: &str) -> Branches {
    let mut branches = Branches::default();
    for line in raw.lines() {
        if line.len() < 3 {
            continue;
        }
        let name = line[2..].to_string();
        if line.starts_with('*') {
            branches.current = Some(name.clone());
        }
        branches.list.push(name);
    }
    branches
}

pub fn parse_remotes(raw: &str) -> Vec<Remote> {
    let mut remotes: Vec<Remote> = Vec::new();
    for line in raw.lines() {
        let Some((name, rest)) = line.split_once('\t') else {
            continue;
        };
        let url = rest.split(' ').next().unwrap_or(rest);
        if remotes.iter().any(|remote| remote.name == name) {
            continue;
        }
        remotes.push(Remote {
            name: name.to_string(),
            url: url.to_string(),
            dirty: false,
        });
    }
    remotes
}

/// Parses `git lfs ls-files` output; `*` after the oid marks a fully
/// downloaded object, `-` a pointer-only one.
pub fn parse_lfs_files(raw: &str) -> TrackedFileMap {
    let mut tracked = TrackedFileMap::new();
    for line in raw.lines() {
        let fields: Vec<&str> = line.split(' ').collect();
        if fields.len() < 3 {
            continue;
        }
        tracked.insert(fields[2..].join(" "), fields[1] == "*");
    }
    tracked
}

pub fn rebase_in_progress(status_output: &str) -> bool {
    status_output.starts_with("interactive rebase in progress")
}

/// Git operations against one tracked root.
pub struct GitOps {
    runner: Arc<dyn GitRunner>,
    root: PathBuf,
}

impl GitOps {
    pub fn new(runner: Arc<dyn GitRunner>, root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_initialized(&self) -> bool {
        self.runner.run(&["status"], &self.root).0
    }

    /// Full status poll: porcelain records plus on-disk sizes, and whether a
    /// rebase is in flight.
    pub fn status_entries(&self, fs: &dyn FileStore) -> (Vec<StatusEntry>, bool) {
        let (_, plain) = self.runner.run(&["status"], &self.root);
        let rebasing = rebase_in_progress(&plain);

        let (ok, raw) = self.runner.run(&["status", "-z", "-u"], &self.root);
        if !ok {
            return (Vec::new(), rebasing);
        }

        let records = parse_porcelain(&raw);
        let absolute: Vec<PathBuf> = records
            .iter()
            .map(|(_, path)| self.root.join(path))
            .collect();
        let sizes = fs.file_sizes(&absolute);

        let entries = records
            .into_iter()
            .zip(sizes)
            .map(|((code, path), size_bytes)| StatusEntry::new(&code, path, size_bytes))
            .collect();
        (entries, rebasing)
    }

    pub fn branches(&self) -> Branches {
        let (ok, raw) = self.runner.run(&["branch"], &self.root);
        if !ok {
            return Branches::default();
        }
        parse_branches(&raw)
    }

    pub fn remotes(&self) -> Vec<Remote> {
        let (ok, raw) = self.runner.run(&["remote", "-v"], &self.root);
        if !ok {
            return Vec::new();
        }
        parse_remotes(&raw)
    }

    /// Marks each remote dirty when its head for the current branch differs
    /// from local HEAD. An unreachable remote stays clean rather than
    /// erroring.
    pub fn check_remotes(&self, remotes: &mut [Remote]) {
        let (ok, head) = self.runner.run(&["rev-parse", "HEAD"], &self.root);
        if !ok {
            return;
        }
        let head = head.trim().to_string();

        let Some(current) = self.branches().current else {
            return;
        };
        let refspec = format!("refs/heads/{current}");

        for remote in remotes.iter_mut() {
            let (ok, listing) =
                self.runner
                    .run(&["ls-remote", &remote.url, "-h", &refspec], &self.root);
            remote.dirty = ok
                && listing
                    .split('\t')
                    .next()
                    .is_some_and(|remote_head| remote_head != head);
        }
    }

    pub fn tracked_lfs_files(&self) -> TrackedFileMap {
        let (ok, raw) = self.runner.run(&["lfs", "ls-files"], &self.root);
        if !ok {
            warn!("unable to fetch LFS file list");
            return TrackedFileMap::new();
        }
        parse_lfs_files(&raw)
    }

    pub fn set_user(&self, name: &str, email: &str) -> (bool, String) {
        let response =
            self.runner
                .run(&["config", "--replace-all", "user.name", name], &self.root);
        if !response.0 {
            return response;
        }
        self.runner
            .run(&["config", "--replace-all", "user.email", email], &self.root)
    }

    pub fn stage(&self, pathspec: &str) -> (bool, String) {
        self.runner.run(&["add", pathspec], &self.root)
    }

    /// Drops the path from the index, then from the cache, so a newly
    /// ignored file stops being tracked without touching the worktree.
    pub fn unstage_and_untrack(&self, pathspec: &str) -> (bool, String) {
        let response = self.runner.run(&["reset", pathspec], &self.root);
        if !response.0 {
            return response;
        }
        self.runner.run(&["rm", "--cached", pathspec], &self.root)
    }

    /// Bootstraps version control for a freshly created workspace.
    pub fn init_workspace(&self, author: &str) -> (bool, String) {
        let response = self.runner.run(&["init", "-b", "main"], &self.root);
        if !response.0 {
            return response;
        }
        let response = self.runner.run(
            &[
                "add",
                INVESTIGATION_FILE,
                &format!("{ASSAYS_DIR}/"),
                &format!("{STUDIES_DIR}/"),
                &format!("{RUNS_DIR}/"),
                &format!("{WORKFLOWS_DIR}/"),
            ],
            &self.root,
        );
        if !response.0 {
            return response;
        }
        self.runner
            .run(&["commit", "-m", "init", "--author", author], &self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileStore;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct ScriptedRunner {
        responses: HashMap<String, (bool, String)>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn respond(mut self, args: &[&str], ok: bool, output: &str) -> Self {
            self.responses
                .insert(args.join(" "), (ok, output.to_string()));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("lock").clone()
        }
    }

    impl GitRunner for ScriptedRunner {
        fn run(&self, args: &[&str], _cwd: &Path) -> (bool, String) {
            let key = args.join(" ");
            self.calls.lock().expect("lock").push(key.clone());
            self.responses
                .get(&key)
                .cloned()
                .unwrap_or((false, format!("unscripted: {key}")))
        }
    }

    #[test]
    fn porcelain_parsing_splits_code_and_path() {
        let raw = "M  studies/S1/isa.study.xlsx\0?? dataset/raw/d1.bin\0";
        let records = parse_porcelain(raw);
        assert_eq!(
            records,
            vec![
                ("M ".to_string(), "studies/S1/isa.study.xlsx".to_string()),
                ("??".to_string(), "dataset/raw/d1.bin".to_string()),
            ]
        );
    }

    #[test]
    fn branch_parsing_marks_current() {
        let raw = "  develop\n* main\n  feature/lfs\n";
        let branches = parse_branches(raw);
        assert_eq!(branches.list, vec!["develop", "main", "feature/lfs"]);
        assert_eq!(branches.current.as_deref(), Some("main"));
    }

    #[test]
    fn remote_parsing_dedupes_fetch_and_push_rows() {
        let raw = "origin\thttps://example.org/arc.git (fetch)\n\
                   origin\thttps://example.org/arc.git (push)\n\
                   mirror\tgit@example.org:arc.git (fetch)\n";
        let remotes = parse_remotes(raw);
        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes[0].name, "origin");
        assert_eq!(remotes[0].url, "https://example.org/arc.git");
        assert!(!remotes[0].dirty);
        assert_eq!(remotes[1].name, "mirror");
    }

    #[test]
    fn lfs_parsing_maps_star_to_fully_tracked() {
        let raw = "4bb3265b12 * dataset/raw/d1.bin\n\
                   99a1cf548f - dataset/raw/with space.bin\n";
        let tracked = parse_lfs_files(raw);
        assert_eq!(tracked.get("dataset/raw/d1.bin"), Some(&true));
        assert_eq!(tracked.get("dataset/raw/with space.bin"), Some(&false));
    }

    #[test]
    fn status_entries_attach_sizes_from_disk() {
        let dir = tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("dataset")).expect("mkdir");
        std::fs::write(dir.path().join("dataset/d1.bin"), [0u8; 10]).expect("seed");

        let runner = ScriptedRunner::default()
            .respond(&["status"], true, "On branch main\n")
            .respond(&["status", "-z", "-u"], true, "?? dataset/d1.bin\0D  gone.txt\0");
        let git = GitOps::new(Arc::new(runner), dir.path());

        let (entries, rebasing) = git.status_entries(&LocalFileStore);
        assert!(!rebasing);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "dataset/d1.bin");
        assert_eq!(entries[0].size_bytes, 10);
        assert_eq!(entries[1].size_bytes, 0);
    }

    #[test]
    fn status_entries_reports_rebase_in_progress() {
        let runner = ScriptedRunner::default()
            .respond(&["status"], true, "interactive rebase in progress; onto 1a2b3c\n")
            .respond(&["status", "-z", "-u"], true, "");
        let git = GitOps::new(Arc::new(runner), "/tmp/arc");

        let (entries, rebasing) = git.status_entries(&LocalFileStore);
        assert!(rebasing);
        assert!(entries.is_empty());
    }

    #[test]
    fn check_remotes_flags_divergent_heads_only() {
        let runner = ScriptedRunner::default()
            .respond(&["rev-parse", "HEAD"], true, "aaa111\n")
            .respond(&["branch"], true, "* main\n")
            .respond(
                &["ls-remote", "https://example.org/stale.git", "-h", "refs/heads/main"],
                true,
                "bbb222\trefs/heads/main\n",
            )
            .respond(
                &["ls-remote", "https://example.org/fresh.git", "-h", "refs/heads/main"],
                true,
                "aaa111\trefs/heads/main\n",
            )
            .respond(
                &["ls-remote", "https://example.org/down.git", "-h", "refs/heads/main"],
                false,
                "could not resolve host",
            );
        let git = GitOps::new(Arc::new(runner), "/tmp/arc");

        let mut remotes = vec![
            Remote {
                name: "stale".to_string(),
                url: "https://example.org/stale.git".to_string(),
                dirty: false,
            },
            Remote {
                name: "fresh".to_string(),
                url: "https://example.org/fresh.git".to_string(),
                dirty: true,
            },
            Remote {
                name: "down".to_string(),
                url: "https://example.org/down.git".to_string(),
                dirty: true,
            },
        ];
        git.check_remotes(&mut remotes);

        assert!(remotes[0].dirty);
        assert!(!remotes[1].dirty);
        assert!(!remotes[2].dirty);
    }

    #[test]
    fn set_user_short_circuits_on_first_failure() {
        let runner = ScriptedRunner::default().respond(
            &["config", "--replace-all", "user.name", "Ada"],
            false,
            "not a git repository",
        );
        let git = GitOps::new(Arc::new(runner), "/tmp/arc");

        let (ok, message) = git.set_user("Ada", "ada@example.org");
        assert!(!ok);
        assert_eq!(message, "not a git repository");
    }

    #[test]
    fn tracked_lfs_files_is_empty_when_lfs_is_unavailable() {
        let runner =
            ScriptedRunner::default().respond(&["lfs", "ls-files"], false, "lfs not installed");
        let git = GitOps::new(Arc::new(runner), "/tmp/arc");
        assert_eq!(git.tracked_lfs_files(), TrackedFileMap::new());
    }

    #[test]
    fn unstage_and_untrack_resets_before_dropping_from_cache() {
        let runner = Arc::new(
            ScriptedRunner::default()
                .respond(&["reset", "./dataset/big.bin"], true, "")
                .respond(&["rm", "--cached", "./dataset/big.bin"], true, ""),
        );
        let git = GitOps::new(runner.clone(), "/tmp/arc");

        let (ok, _) = git.unstage_and_untrack("./dataset/big.bin");
        assert!(ok);
        assert_eq!(
            runner.calls(),
            vec![
                "reset ./dataset/big.bin".to_string(),
                "rm --cached ./dataset/big.bin".to_string(),
            ]
        );
    }
}
