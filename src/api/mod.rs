use std::path::PathBuf;

use crate::{
    cli::command_handlers::{do_clear_cache, do_update},
    git::cache::UpstreamGitCache,
};

mod builder;

pub use builder::VendorfetchBuilder;

pub struct Vendorfetch {
    cache: UpstreamGitCache,
    root: PathBuf,
    recipe_dir: PathBuf,
}

impl Vendorfetch {
    pub fn builder() -> VendorfetchBuilder {
        VendorfetchBuilder::default()
    }

    /// Updates the vendored sources for the named libraries, or for every
    /// recipe in the recipe directory when `names` is empty.
    pub fn update(&self, names: &[String]) -> anyhow::Result<()> {
        do_update(&self.cache, &self.root, &self.recipe_dir, names)
    }

    /// Deletes the scratch-clone cache. Clones are recreated on the next
    /// update, so this only costs the next run a full clone.
    pub fn clear_cache(&self) -> anyhow::Result<()> {
        do_clear_cache(&self.cache)
    }
}
