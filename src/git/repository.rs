use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    process::Command,
};

use git2::{Direction, Repository, ResetType};
use log::{debug, info, trace, warn};
use thiserror::Error;

use super::cache::UpstreamGitCache;
use crate::model::recipe::RemoteSpec;

#[derive(Error, Debug)]
pub enum UpstreamRepoError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("Could not invoke the git binary: {0}")]
    GitInvocation(std::io::Error),
    #[error("git am failed in {workdir}: {output}")]
    PatchFailed { workdir: String, output: String },
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// Branch and tag names currently present on the remote, the moral
/// equivalent of `git ls-remote`.
struct RemoteRefs {
    heads: HashSet<String>,
    tags: HashSet<String>,
}

/// A scratch clone of one upstream repository, pinned to a treeish.
pub struct UpstreamRepository<'a> {
    cache: &'a UpstreamGitCache,
    git_repo: Repository,
    path: PathBuf,
    spec: RemoteSpec,
}

impl<'a> UpstreamRepository<'a> {
    pub(super) fn new(
        cache: &'a UpstreamGitCache,
        git_repo: Repository,
        path: PathBuf,
        spec: RemoteSpec,
    ) -> UpstreamRepository<'a> {
        UpstreamRepository {
            cache,
            git_repo,
            path,
            spec,
        }
    }

    /// The checked-out working tree that copy steps read from.
    pub fn workdir(&self) -> &Path {
        &self.path
    }

    /// Fetches the pinned treeish from origin and hard-resets the working
    /// tree to it.
    ///
    /// A treeish naming a branch on the remote is checked out through
    /// `origin/<treeish>`, so repeated runs track the true upstream tip
    /// rather than a stale local ref; anything else (tag or raw commit) is
    /// resolved as given.
    pub fn fetch_and_checkout(&self) -> Result<(), UpstreamRepoError> {
        let treeish = &self.spec.treeish;
        let refs = self.remote_refs()?;

        let (refspec, target) = if refs.heads.contains(treeish) {
            (
                format!("+refs/heads/{treeish}:refs/remotes/origin/{treeish}"),
                format!("origin/{treeish}"),
            )
        } else if refs.tags.contains(treeish) {
            (
                format!("+refs/tags/{treeish}:refs/tags/{treeish}"),
                treeish.clone(),
            )
        } else {
            // Raw commit: fetched into FETCH_HEAD, resolved from the odb.
            (treeish.clone(), treeish.clone())
        };

        info!("Fetching {} from {}", treeish, self.spec.url);
        let mut remote = self.git_repo.find_remote("origin")?;
        if let Err(error) = remote.fetch(
            &[refspec.as_str()],
            Some(&mut self.cache.fetch_options(self.spec.shallow)),
            None,
        ) {
            if !refs.heads.contains(treeish) && !refs.tags.contains(treeish) {
                // Not every transport supports fetching a raw commit.
                warn!(
                    "Failed to fetch single commit {}, falling back to a full fetch: {}",
                    treeish, error
                );
                remote.fetch(
                    &["+refs/heads/*:refs/remotes/origin/*"],
                    Some(&mut self.cache.fetch_options(self.spec.shallow)),
                    None,
                )?;
            } else {
                return Err(error.into());
            }
        }

        debug!("Checking out {} in {}", target, self.path.display());
        let object = self.git_repo.revparse_single(&target)?;
        self.git_repo.reset(&object, ResetType::Hard, None)?;
        Ok(())
    }

    /// Applies mailbox-format patches (`git format-patch` output) to the
    /// checked-out working tree. libgit2 has no mailbox support, so this
    /// shells out to `git am`; patch paths must be absolute. Conflicts are
    /// fatal, there is no automatic resolution or retry.
    pub fn apply_patches(
        &self,
        patches: &[PathBuf],
        threeway: bool,
        ignore_whitespace: bool,
    ) -> Result<(), UpstreamRepoError> {
        if patches.is_empty() {
            return Ok(());
        }

        let mut command = Command::new("git");
        command.current_dir(&self.path).arg("am");
        if threeway {
            command.arg("--3way");
        }
        if ignore_whitespace {
            command.arg("--ignore-whitespace");
        }
        command.args(patches);

        debug!(
            "Applying {} carry patches in {}",
            patches.len(),
            self.path.display()
        );
        let output = command.output().map_err(UpstreamRepoError::GitInvocation)?;
        if !output.status.success() {
            return Err(UpstreamRepoError::PatchFailed {
                workdir: self.path.to_string_lossy().to_string(),
                output: format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }
        Ok(())
    }

    fn remote_refs(&self) -> Result<RemoteRefs, UpstreamRepoError> {
        let mut remote = self.git_repo.find_remote("origin")?;
        let connection =
            remote.connect_auth(Direction::Fetch, Some(self.cache.remote_callbacks()), None)?;

        let mut heads = HashSet::new();
        let mut tags = HashSet::new();
        for head in connection.list()? {
            if let Some(name) = head.name().strip_prefix("refs/heads/") {
                heads.insert(name.to_string());
            } else if let Some(name) = head.name().strip_prefix("refs/tags/") {
                // Annotated tags are listed twice, once peeled as `name^{}`.
                tags.insert(name.trim_end_matches("^{}").to_string());
            }
        }
        trace!(
            "Remote has {} branches and {} tags",
            heads.len(),
            tags.len()
        );
        Ok(RemoteRefs { heads, tags })
    }
}
