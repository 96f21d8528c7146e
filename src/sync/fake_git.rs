//! In-memory git double for end-to-end export tests.
//!
//! `FakeServer` holds the remotes; every `FakeGit` sharing a server behaves
//! like a separate clone of them. Working-copy files live on disk so the
//! serializer writes real files, but history is kept in memory.
//!
//! Commands that write the index honour `.git/index.lock` the way git does.
//! A delayed pull or commit holds that lock while it sleeps, so dropping the
//! future mid-delay leaves the lock behind like a killed git process.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::git::{GitError, GitOps};

pub type Tree = BTreeMap<String, Vec<u8>>;

struct Commit {
    parent: Option<usize>,
    tree: Tree,
}

#[derive(Default)]
struct ServerState {
    remotes: HashMap<String, Option<usize>>,
    commits: Vec<Commit>,
    unreachable: HashSet<String>,
}

impl ServerState {
    fn is_ancestor(&self, ancestor: usize, mut of: usize) -> bool {
        loop {
            if of == ancestor {
                return true;
            }
            match self.commits[of].parent {
                Some(parent) => of = parent,
                None => return false,
            }
        }
    }

    fn check_reachable(&self, url: &str) -> Result<(), GitError> {
        if self.unreachable.contains(url) {
            let host = url.split(['@', ':']).nth(1).unwrap_or(url);
            return Err(failure(
                128,
                &format!(
                    "ssh: Could not resolve hostname {}: Name or service not known\n\
                     fatal: Could not read from remote repository.",
                    host
                ),
            ));
        }
        if !self.remotes.contains_key(url) {
            return Err(failure(
                128,
                "ERROR: Repository not found.\nfatal: the remote end refused access",
            ));
        }
        Ok(())
    }
}

/// Shared set of remote repositories.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty remote.
    pub fn create_remote(&self, url: &str) {
        self.state.lock().unwrap().remotes.insert(url.to_string(), None);
    }

    /// Push a commit holding `tree` directly to the remote, as another client would.
    pub fn push_tree(&self, url: &str, tree: Tree) {
        let mut state = self.state.lock().unwrap();
        let parent = state.remotes.get(url).copied().flatten();
        state.commits.push(Commit { parent, tree });
        let id = state.commits.len() - 1;
        state.remotes.insert(url.to_string(), Some(id));
    }

    pub fn set_unreachable(&self, url: &str) {
        self.state.lock().unwrap().unreachable.insert(url.to_string());
    }

    pub fn head(&self, url: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.remotes.get(url).copied().flatten().map(commit_hash)
    }

    /// Number of commits reachable from the remote's head.
    pub fn history_len(&self, url: &str) -> usize {
        let state = self.state.lock().unwrap();
        let mut next = state.remotes.get(url).copied().flatten();
        let mut len = 0;
        while let Some(id) = next {
            len += 1;
            next = state.commits[id].parent;
        }
        len
    }

    pub fn tree(&self, url: &str) -> Tree {
        let state = self.state.lock().unwrap();
        state
            .remotes
            .get(url)
            .copied()
            .flatten()
            .map(|id| state.commits[id].tree.clone())
            .unwrap_or_default()
    }
}

struct Local {
    url: String,
    head: Option<usize>,
}

#[derive(Clone, Copy, Default)]
struct Delays {
    pull: Duration,
    commit: Duration,
    push: Duration,
}

/// A git client whose clones live under real directories. Clones of a
/// `FakeGit` share its working copies and delays.
#[derive(Clone)]
pub struct FakeGit {
    server: FakeServer,
    locals: Arc<Mutex<HashMap<PathBuf, Local>>>,
    delays: Arc<Mutex<Delays>>,
}

impl FakeGit {
    pub fn new(server: &FakeServer) -> Self {
        Self {
            server: server.clone(),
            locals: Arc::new(Mutex::new(HashMap::new())),
            delays: Arc::new(Mutex::new(Delays::default())),
        }
    }

    /// Sleep before every push reaches the server.
    pub fn with_push_delay(self, delay: Duration) -> Self {
        self.delays.lock().unwrap().push = delay;
        self
    }

    /// Hold the index lock for `delay` at the start of every pull.
    pub fn set_pull_delay(&self, delay: Duration) {
        self.delays.lock().unwrap().pull = delay;
    }

    /// Hold the index lock for `delay` at the start of every commit.
    pub fn with_commit_delay(self, delay: Duration) -> Self {
        self.delays.lock().unwrap().commit = delay;
        self
    }

    pub fn clear_delays(&self) {
        *self.delays.lock().unwrap() = Delays::default();
    }

    fn delays(&self) -> Delays {
        *self.delays.lock().unwrap()
    }

    fn with_local<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&mut Local, &mut ServerState) -> Result<T, GitError>,
    ) -> Result<T, GitError> {
        let mut locals = self.locals.lock().unwrap();
        let local = locals
            .get_mut(path)
            .ok_or_else(|| failure(128, "fatal: not a git repository"))?;
        let mut state = self.server.state.lock().unwrap();
        f(local, &mut state)
    }
}

fn commit_hash(id: usize) -> String {
    format!("{:040x}", id + 1)
}

fn parse_hash(hash: &str) -> Result<usize, GitError> {
    usize::from_str_radix(hash, 16)
        .ok()
        .and_then(|n| n.checked_sub(1))
        .ok_or_else(|| failure(128, &format!("fatal: bad revision '{}'", hash)))
}

fn success(stdout: &str) -> Output {
    Output {
        status: ExitStatus::from_raw(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

fn failure(code: i32, output: &str) -> GitError {
    GitError::NonZeroExit {
        code,
        output: output.to_string(),
    }
}

fn io_failure(e: std::io::Error) -> GitError {
    GitError::CommandFailed(e.to_string())
}

fn index_lock(path: &Path) -> PathBuf {
    path.join(".git").join("index.lock")
}

fn check_index_unlocked(path: &Path) -> Result<(), GitError> {
    let lock = index_lock(path);
    if lock.exists() {
        return Err(failure(
            128,
            &format!(
                "fatal: Unable to create '{}': File exists.\n\n\
                 Another git process seems to be running in this repository.",
                lock.display()
            ),
        ));
    }
    Ok(())
}

/// Take the index lock, sleep, then release it. The lock stays on disk if
/// the returned future is dropped while sleeping.
async fn hold_index_lock(path: &Path, delay: Duration) -> Result<(), GitError> {
    check_index_unlocked(path)?;
    if delay.is_zero() {
        return Ok(());
    }
    let lock = index_lock(path);
    std::fs::write(&lock, b"").map_err(io_failure)?;
    tokio::time::sleep(delay).await;
    std::fs::remove_file(&lock).map_err(io_failure)
}

fn tree_of(state: &ServerState, head: Option<usize>) -> Tree {
    head.map(|id| state.commits[id].tree.clone())
        .unwrap_or_default()
}

/// Every file under `root` except `.git`, keyed by slash-separated path.
fn snapshot(root: &Path) -> Result<Tree, GitError> {
    fn walk(root: &Path, dir: &Path, tree: &mut Tree) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path == root.join(".git") {
                continue;
            }
            if entry.file_type()?.is_dir() {
                walk(root, &path, tree)?;
            } else {
                let relative = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join("/");
                tree.insert(relative, std::fs::read(&path)?);
            }
        }
        Ok(())
    }

    let mut tree = Tree::new();
    walk(root, root, &mut tree).map_err(io_failure)?;
    Ok(tree)
}

/// Make the files under `root` match `tree` exactly.
fn checkout(root: &Path, tree: &Tree) -> Result<(), GitError> {
    for entry in std::fs::read_dir(root).map_err(io_failure)? {
        let entry = entry.map_err(io_failure)?;
        if entry.file_name() == ".git" {
            continue;
        }
        let path = entry.path();
        let removed = if entry.file_type().map_err(io_failure)?.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removed.map_err(io_failure)?;
    }

    for (relative, contents) in tree {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_failure)?;
        }
        std::fs::write(&path, contents).map_err(io_failure)?;
    }
    Ok(())
}

impl GitOps for FakeGit {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<Output, GitError> {
        let head = {
            let state = self.server.state.lock().unwrap();
            state.check_reachable(url)?;
            let head = state.remotes[url];
            std::fs::create_dir_all(dest.join(".git")).map_err(io_failure)?;
            checkout(dest, &tree_of(&state, head))?;
            head
        };

        self.locals.lock().unwrap().insert(
            dest.to_path_buf(),
            Local {
                url: url.to_string(),
                head,
            },
        );
        Ok(success(""))
    }

    async fn remote_get_url(&self, path: &Path, _name: &str) -> Result<Output, GitError> {
        self.with_local(path, |local, _| Ok(success(&format!("{}\n", local.url))))
    }

    async fn remote_set_url(
        &self,
        path: &Path,
        _name: &str,
        url: &str,
    ) -> Result<Output, GitError> {
        self.with_local(path, |local, _| {
            local.url = url.to_string();
            Ok(success(""))
        })
    }

    async fn pull(&self, path: &Path, _remote: &str) -> Result<Output, GitError> {
        hold_index_lock(path, self.delays().pull).await?;
        self.with_local(path, |local, state| {
            state.check_reachable(&local.url)?;
            let remote = state.remotes[&local.url];
            let fast_forward = match (local.head, remote) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(mine), Some(theirs)) => mine != theirs && state.is_ancestor(mine, theirs),
            };
            if !fast_forward {
                return match (local.head, remote) {
                    (Some(mine), Some(theirs)) if !state.is_ancestor(theirs, mine) => {
                        Err(failure(128, "fatal: Not possible to fast-forward, aborting."))
                    }
                    _ => Ok(success("Already up to date.\n")),
                };
            }
            local.head = remote;
            checkout(path, &tree_of(state, remote))?;
            Ok(success("Fast-forward\n"))
        })
    }

    async fn status_porcelain(&self, path: &Path) -> Result<Output, GitError> {
        let current = snapshot(path)?;
        self.with_local(path, |local, state| {
            let clean = current == tree_of(state, local.head);
            Ok(success(if clean { "" } else { "M  fonts\n" }))
        })
    }

    async fn add_files(&self, path: &Path, _files: &[String]) -> Result<Output, GitError> {
        check_index_unlocked(path)?;
        self.with_local(path, |_, _| Ok(success("")))
    }

    async fn commit(
        &self,
        path: &Path,
        _message: &str,
        _author_name: &str,
        _author_email: &str,
    ) -> Result<Output, GitError> {
        hold_index_lock(path, self.delays().commit).await?;
        let tree = snapshot(path)?;
        self.with_local(path, |local, state| {
            state.commits.push(Commit {
                parent: local.head,
                tree,
            });
            local.head = Some(state.commits.len() - 1);
            Ok(success(""))
        })
    }

    async fn rev_parse_head(&self, path: &Path) -> Result<Output, GitError> {
        self.with_local(path, |local, _| match local.head {
            Some(id) => Ok(success(&format!("{}\n", commit_hash(id)))),
            None => Err(failure(128, "fatal: Needed a single revision")),
        })
    }

    async fn push(&self, path: &Path, _remote: &str) -> Result<Output, GitError> {
        tokio::time::sleep(self.delays().push).await;

        self.with_local(path, |local, state| {
            state.check_reachable(&local.url)?;
            let mine = local
                .head
                .ok_or_else(|| failure(1, "error: src refspec HEAD does not match any"))?;
            let accepted = match state.remotes[&local.url] {
                None => true,
                Some(theirs) => state.is_ancestor(theirs, mine),
            };
            if !accepted {
                return Err(failure(
                    1,
                    "To remote\n!\tHEAD:refs/heads/main\t[rejected] (fetch first)\nDone",
                ));
            }
            state.remotes.insert(local.url.clone(), Some(mine));
            Ok(success("Done\n"))
        })
    }

    async fn reset_hard(&self, path: &Path, rev: &str) -> Result<Output, GitError> {
        let id = parse_hash(rev)?;
        check_index_unlocked(path)?;
        self.with_local(path, |local, state| {
            local.head = Some(id);
            checkout(path, &tree_of(state, local.head))?;
            Ok(success(""))
        })
    }

    async fn reset_unborn(&self, path: &Path) -> Result<Output, GitError> {
        check_index_unlocked(path)?;
        self.with_local(path, |local, _| {
            local.head = None;
            Ok(success(""))
        })
    }

    async fn clean(&self, path: &Path) -> Result<Output, GitError> {
        self.with_local(path, |local, state| {
            checkout(path, &tree_of(state, local.head))?;
            Ok(success(""))
        })
    }
}
