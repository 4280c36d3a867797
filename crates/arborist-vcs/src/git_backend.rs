//! Real `VcsAdapter` implementation. Reads go through `git2` (libgit2
//! bindings) for speed and structured output. Writes shell out to the `git`
//! binary via `tokio::process::Command` -- libgit2's write-side API
//! (rebase/merge with conflict handling) is deliberately not used; the `git`
//! binary's own conflict markers and exit codes are simpler to reason about
//! than recreating that logic against the library.

use crate::adapter::VcsAdapter;
use crate::error::{VcsError, VcsResult};
use crate::trailer_parse::parse_message;
use crate::types::{Commit, MergeOutcome};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

pub struct GitBackend;

impl GitBackend {
    pub fn new() -> Self {
        Self
    }

    async fn run_git(&self, dir: &Path, args: &[&str]) -> VcsResult<(String, String)> {
        let output = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    VcsError::MissingBinary
                } else {
                    VcsError::Io(e)
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(VcsError::Command {
                op: leak_op(args),
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }
        Ok((stdout, stderr))
    }

    fn open(&self, path: &Path) -> VcsResult<git2::Repository> {
        git2::Repository::open(path).map_err(|_| VcsError::NotARepo(path.to_path_buf()))
    }
}

/// `args[0]` is a fixed git subcommand name known at call sites; leaking it
/// gives [`VcsError::Command`] a `'static` operation label without an extra
/// allocation-bearing variant.
fn leak_op(args: &[&str]) -> &'static str {
    match args.first() {
        Some(&"branch") => "branch",
        Some(&"checkout") | Some(&"switch") => "switch_to",
        Some(&"commit") => "commit",
        Some(&"merge") => "merge",
        Some(&"rebase") => "rebase",
        Some(&"add") => "stage_all",
        Some(&"diff") => "diff",
        _ => "git",
    }
}

impl Default for GitBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VcsAdapter for GitBackend {
    async fn init_or_attach(&self, path: &Path) -> VcsResult<()> {
        if self.open(path).is_ok() {
            return Ok(());
        }
        tokio::fs::create_dir_all(path).await?;
        self.run_git(path, &["init"]).await?;
        Ok(())
    }

    async fn log_subject_matches(
        &self,
        path: &Path,
        branch: &str,
        subject_prefix: &str,
        limit: usize,
    ) -> VcsResult<Vec<Commit>> {
        let repo = self.open(path)?;
        let reference = repo
            .find_branch(branch, git2::BranchType::Local)
            .map_err(VcsError::Git2)?;
        let oid = reference
            .get()
            .target()
            .ok_or_else(|| VcsError::NotARepo(path.to_path_buf()))?;

        let mut revwalk = repo.revwalk()?;
        revwalk.push(oid)?;
        revwalk.set_sorting(git2::Sort::TIME)?;

        let mut out = Vec::new();
        for oid in revwalk {
            if out.len() >= limit {
                break;
            }
            let oid = oid?;
            let commit = repo.find_commit(oid)?;
            let message = commit.message().unwrap_or_default();
            let (subject, body, trailers) = parse_message(message);
            if subject.starts_with(subject_prefix) {
                out.push(Commit {
                    revision: oid.to_string(),
                    subject,
                    body,
                    trailers,
                });
            }
        }
        Ok(out)
    }

    async fn branch_create(&self, path: &Path, name: &str, at_revision: &str) -> VcsResult<()> {
        let repo = self.open(path)?;
        if repo.find_branch(name, git2::BranchType::Local).is_ok() {
            return Err(VcsError::BranchExists(name.to_string()));
        }
        let oid = git2::Oid::from_str(at_revision)
            .or_else(|_| {
                repo.resolve_reference_from_short_name(at_revision)
                    .and_then(|r| r.peel_to_commit())
                    .map(|c| c.id())
            })
            .map_err(VcsError::Git2)?;
        let commit = repo.find_commit(oid)?;
        repo.branch(name, &commit, false)?;
        Ok(())
    }

    async fn branch_list(&self, path: &Path, glob: &str) -> VcsResult<Vec<String>> {
        let repo = self.open(path)?;
        let mut names = Vec::new();
        for branch in repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                if glob_match(glob, name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn branch_delete(&self, path: &Path, name: &str) -> VcsResult<bool> {
        let repo = self.open(path)?;
        match repo.find_branch(name, git2::BranchType::Local) {
            Ok(mut branch) => {
                branch.delete()?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn new_change(
        &self,
        path: &Path,
        parent_revisions: &[String],
        message: &str,
    ) -> VcsResult<String> {
        if parent_revisions.len() > 1 {
            for parent in &parent_revisions[1..] {
                self.run_git(path, &["merge", "--no-commit", "--no-ff", parent])
                    .await?;
            }
        }
        self.run_git(path, &["commit", "--allow-empty", "-m", message])
            .await?;
        let (stdout, _) = self.run_git(path, &["rev-parse", "HEAD"]).await?;
        Ok(stdout.trim().to_string())
    }

    async fn describe(&self, path: &Path, _revision: &str, message: &str) -> VcsResult<()> {
        self.run_git(path, &["commit", "--amend", "-m", message])
            .await?;
        Ok(())
    }

    async fn switch_to(&self, path: &Path, revision_or_branch: &str) -> VcsResult<()> {
        self.run_git(path, &["checkout", revision_or_branch]).await?;
        Ok(())
    }

    async fn diff(&self, path: &Path, base: &str, head: &str, byte_cap: usize) -> VcsResult<String> {
        let range = format!("{base}..{head}");
        let (stdout, _) = self.run_git(path, &["diff", &range]).await?;
        Ok(truncate_with_marker(&stdout, byte_cap))
    }

    async fn squash(
        &self,
        path: &Path,
        from_revision: &str,
        into_revision: &str,
    ) -> VcsResult<MergeOutcome> {
        self.run_git(path, &["checkout", into_revision]).await?;

        let output = Command::new("git")
            .arg("-C")
            .arg(path)
            .args(["merge", "--squash", from_revision])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    VcsError::MissingBinary
                } else {
                    VcsError::Io(e)
                }
            })?;

        if output.status.success() {
            return Ok(MergeOutcome::Merged);
        }

        let (unmerged, _) = self
            .run_git(path, &["diff", "--name-only", "--diff-filter=U"])
            .await?;
        let files: Vec<String> = unmerged.lines().filter(|l| !l.is_empty()).map(String::from).collect();
        if files.is_empty() {
            return Err(VcsError::Command {
                op: "squash",
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(MergeOutcome::Conflict { files })
    }

    async fn rebase(&self, path: &Path, revision: &str, onto: &str) -> VcsResult<()> {
        self.run_git(path, &["checkout", revision]).await?;
        self.run_git(path, &["rebase", "--onto", onto]).await?;
        Ok(())
    }

    async fn trailers_of(
        &self,
        path: &Path,
        revision: &str,
    ) -> VcsResult<BTreeMap<String, String>> {
        let repo = self.open(path)?;
        let oid = git2::Oid::from_str(revision)?;
        let commit = repo.find_commit(oid)?;
        let message = commit.message().unwrap_or_default();
        let (_, _, trailers) = parse_message(message);
        Ok(trailers)
    }

    async fn stage_all(&self, path: &Path) -> VcsResult<()> {
        self.run_git(path, &["add", "-A"]).await?;
        Ok(())
    }

    async fn is_dirty(&self, path: &Path) -> VcsResult<bool> {
        let repo = self.open(path)?;
        let statuses = repo.statuses(None)?;
        Ok(!statuses.is_empty())
    }
}

fn truncate_with_marker(text: &str, byte_cap: usize) -> String {
    if text.len() <= byte_cap {
        return text.to_string();
    }
    let half = byte_cap / 2;
    let head = &text[..floor_char_boundary(text, half)];
    let tail = &text[ceil_char_boundary(text, text.len() - half)..];
    format!("{head}\n... [truncated {} bytes] ...\n{tail}", text.len() - byte_cap)
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Minimal shell-style glob: `*` matches any run of characters, everything
/// else must match literally. Sufficient for the branch-name patterns this
/// adapter is asked to list (`feature/spec-id/*`).
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(pattern: &[u8], text: &[u8]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some(b'*') => {
                (0..=text.len()).any(|i| inner(&pattern[1..], &text[i..]))
            }
            Some(&c) => text.first() == Some(&c) && inner(&pattern[1..], &text[1..]),
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}
