use std::path::{Path, PathBuf};

use git2::{
    AutotagOption, Config, Cred, CredentialType, FetchOptions, RemoteCallbacks, Repository,
};
use log::{debug, info, trace};
use thiserror::Error;

use crate::{flock::FileLock, git::repository::UpstreamRepository, model::recipe::RemoteSpec};

/// Scratch clones of upstream repositories, kept under one cache directory
/// (the system temp directory by default) and keyed by repository basename.
/// Clones persist across runs and are updated with a fetch rather than
/// re-cloned.
pub struct UpstreamGitCache {
    pub location: PathBuf,
    git_config: Config,
    _lock: FileLock,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("Cache location {location} exists but is not a directory")]
    BadLocation { location: String },
    #[error("Cache lock cannot be acquired")]
    Lock(#[from] crate::flock::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

impl UpstreamGitCache {
    pub fn new(location: PathBuf, git_config: Config) -> Result<UpstreamGitCache, CacheError> {
        if location.exists() {
            if !location.is_dir() {
                return Err(CacheError::BadLocation {
                    location: location.to_str().unwrap_or("").to_string(),
                });
            }
        } else {
            std::fs::create_dir_all(&location)?;
        }

        let lock = Self::acquire_lock(&location)?;

        Ok(UpstreamGitCache {
            location,
            git_config,
            _lock: lock,
        })
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        if self.location.exists() {
            info!(
                "Clearing vendorfetch scratch clones under {}",
                self.location.display()
            );
            std::fs::remove_dir_all(&self.location)?;
        }
        Ok(())
    }

    /// Opens the scratch clone for `spec`, creating it on first use.
    pub fn clone_or_update(&self, spec: &RemoteSpec) -> Result<UpstreamRepository, CacheError> {
        let path = self.location.join(spec.basename());

        let repo = if path.exists() {
            self.open_clone(&path, &spec.url)?
        } else {
            self.create_clone(&path, &spec.url)?
        };

        Ok(UpstreamRepository::new(self, repo, path, spec.clone()))
    }

    fn acquire_lock(location: &Path) -> Result<FileLock, CacheError> {
        let location = location.join(".lock");
        debug!(
            "Acquiring a lock on the cache location: {}",
            location.display()
        );
        let lock = FileLock::new(&location)?;
        Ok(lock)
    }

    fn open_clone(&self, path: &Path, url: &str) -> Result<Repository, CacheError> {
        trace!("Opening existing scratch clone at {}", path.display());

        let repo = Repository::open(path)?;

        {
            let remote = repo.find_remote("origin")?;
            if remote.url() != Some(url) {
                // Two upstreams can share a basename; the last recipe to run
                // wins the scratch clone.
                trace!(
                    "Updating remote existing url {:?} to new url {}",
                    remote.url(),
                    url
                );
                repo.remote_set_url("origin", url)?;
            }
        }

        Ok(repo)
    }

    fn create_clone(&self, path: &Path, url: &str) -> Result<Repository, CacheError> {
        trace!("Creating a new scratch clone at {}", path.display());

        // A working tree is required: carry patches apply to it and copy
        // steps read from it.
        let repo = Repository::init(path)?;
        repo.remote("origin", url)?;

        Ok(repo)
    }

    pub(super) fn remote_callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username, allowed_types| {
            trace!(
                "Requested credentials for {}, username {:?}, allowed types {:?}",
                url,
                username,
                allowed_types
            );
            // Asking for ssh username
            if allowed_types.contains(CredentialType::USERNAME) {
                return Cred::username("git");
            }
            // SSH auth
            if allowed_types.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(username.unwrap_or("git"));
            }
            // HTTP auth
            if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
                return Cred::credential_helper(&self.git_config, url, username);
            }
            Err(git2::Error::from_str("no valid authentication available"))
        });
        callbacks
    }

    pub(super) fn fetch_options(&self, shallow: bool) -> FetchOptions<'_> {
        let mut fetch_options = FetchOptions::new();
        fetch_options
            .remote_callbacks(self.remote_callbacks())
            .download_tags(AutotagOption::All);
        if shallow {
            fetch_options.depth(1);
        }
        fetch_options
    }
}
