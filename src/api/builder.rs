use std::{env, path::PathBuf};

use anyhow::bail;

use crate::{git::cache::UpstreamGitCache, workspace, Vendorfetch};

#[derive(Default)]
pub struct VendorfetchBuilder {
    // All other paths are relative to `root`
    root: Option<PathBuf>,
    recipe_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
}

impl VendorfetchBuilder {
    /// Monorepo root.
    ///
    /// Defaults to walking upward from the current directory until a `.git`
    /// marker is found.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Directory under the root holding the per-library recipe toml files.
    ///
    /// Defaults to `upstream_utils`.
    pub fn recipe_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.recipe_dir = Some(path.into());
        self
    }

    /// Location of the scratch-clone cache.
    ///
    /// Defaults to `vendorfetch` under the system temp directory. Scratch
    /// clones persist there until explicitly cleared.
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn try_build(self) -> anyhow::Result<Vendorfetch> {
        let Self {
            root,
            recipe_dir,
            cache_dir,
        } = self;

        let root = match root {
            Some(root) => root,
            None => match workspace::find_repo_root(&env::current_dir()?) {
                Some(root) => root,
                None => bail!("Not inside a git repository; pass an explicit root"),
            },
        };

        let recipe_dir = recipe_dir.unwrap_or_else(|| PathBuf::from("upstream_utils"));
        let cache_dir = cache_dir.unwrap_or_else(default_cache_directory);

        let git_config = git2::Config::open_default()?;
        let cache = UpstreamGitCache::new(cache_dir, git_config)?;

        Ok(Vendorfetch {
            cache,
            root,
            recipe_dir,
        })
    }
}

fn default_cache_directory() -> PathBuf {
    env::temp_dir().join("vendorfetch")
}
