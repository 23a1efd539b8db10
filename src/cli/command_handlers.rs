use std::path::Path;

use anyhow::bail;
use log::debug;

use crate::{git::cache::UpstreamGitCache, model::recipe::Recipe, pipeline};

/// Handler for the update command: runs the named recipes, or every recipe
/// found in the recipe directory when no names are given. Recipes run one
/// after another; the first failure aborts the rest.
pub fn do_update(
    cache: &UpstreamGitCache,
    root: &Path,
    recipe_dir: &Path,
    names: &[String],
) -> anyhow::Result<()> {
    let recipe_dir = root.join(recipe_dir);

    let recipes = if names.is_empty() {
        all_recipes(&recipe_dir)?
    } else {
        names
            .iter()
            .map(|name| Recipe::from_file(&recipe_dir.join(format!("{name}.toml"))))
            .collect::<Result<Vec<_>, _>>()?
    };
    if recipes.is_empty() {
        bail!("No vendoring recipes found in {}", recipe_dir.display());
    }

    for recipe in &recipes {
        pipeline::run(recipe, root, cache)?;
    }
    Ok(())
}

pub fn do_clear_cache(cache: &UpstreamGitCache) -> anyhow::Result<()> {
    cache.clear()?;
    Ok(())
}

fn all_recipes(recipe_dir: &Path) -> anyhow::Result<Vec<Recipe>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(recipe_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|extension| extension.to_str()) == Some("toml") {
            paths.push(path);
        }
    }
    paths.sort();
    debug!("Found {} recipes in {}", paths.len(), recipe_dir.display());

    paths
        .iter()
        .map(|path| Recipe::from_file(path).map_err(Into::into))
        .collect()
}
