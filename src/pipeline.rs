use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use anyhow::Context;
use log::{debug, info, warn};
use regex_lite::Regex;

use crate::{
    git::cache::UpstreamGitCache,
    includes,
    model::recipe::{CopyStep, Recipe},
    tree,
};

/// Runs one library's vendoring recipe end to end: pinned checkout, carry
/// patches, delete-then-repopulate copy steps, rewrite passes, include
/// repair.
///
/// Nothing here is atomic across files; an interrupted run is recovered by
/// restoring the destination tree to a clean VCS state and re-running.
pub fn run(recipe: &Recipe, repo_root: &Path, cache: &UpstreamGitCache) -> anyhow::Result<()> {
    info!(
        "Vendoring {} from {} at {}",
        recipe.name, recipe.url, recipe.treeish
    );

    let repository = cache.clone_or_update(&recipe.remote_spec())?;
    repository.fetch_and_checkout()?;

    if let Some(patches) = &recipe.patches {
        let patch_files = collect_patches(&repo_root.join(&patches.dir))?;
        repository.apply_patches(&patch_files, patches.threeway, patches.ignore_whitespace)?;
    }

    let upstream_root = repository.workdir();
    let mut copied: Vec<PathBuf> = Vec::new();
    for step in &recipe.copy_steps {
        copied.extend(run_copy_step(step, upstream_root, repo_root)?);
    }

    for pass in &recipe.rewrites {
        let regex = pass.regex()?;
        for file in &copied {
            rewrite_file(file, &regex, &pass.replace)?;
        }
    }

    if let Some(repair) = &recipe.repair {
        let search_roots: Vec<PathBuf> = repair
            .search_roots
            .iter()
            .map(|root| repo_root.join(root))
            .collect();
        for file in &copied {
            includes::repair(file, &search_roots)?;
        }
    }

    info!("Vendored {} files for {}", copied.len(), recipe.name);
    Ok(())
}

/// Carry patches apply in sorted file-name order, matching the sequence
/// numbers `git format-patch` assigns.
fn collect_patches(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read patch directory {}", dir.display()))?;
    let mut patches = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|extension| extension.to_str()) == Some("patch") {
            patches.push(path);
        }
    }
    patches.sort();
    Ok(patches)
}

fn run_copy_step(
    step: &CopyStep,
    upstream_root: &Path,
    repo_root: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    let matcher = step.matcher()?;
    let source_root = upstream_root.join(&step.source_root);
    let dest_root = repo_root.join(&step.dest);

    // Delete-then-repopulate: the destination must reflect the current
    // selection, not the union of every selection that ever ran.
    if dest_root.exists() {
        debug!("Clearing {}", dest_root.display());
        std::fs::remove_dir_all(&dest_root)?;
    }

    let copied = tree::select_and_mirror(
        &source_root,
        |dir, name| matcher.is_match(dir, name),
        &dest_root,
    )?;
    debug!("Copied {} files into {}", copied.len(), dest_root.display());
    Ok(copied)
}

fn rewrite_file(file: &Path, regex: &Regex, replace: &str) -> anyhow::Result<()> {
    let Ok(original) = String::from_utf8(std::fs::read(file)?) else {
        warn!("Skipping rewrite pass for non-UTF-8 file {}", file.display());
        return Ok(());
    };
    if let Cow::Owned(rewritten) = regex.replace_all(&original, replace) {
        std::fs::write(file, rewritten)?;
    }
    Ok(())
}
