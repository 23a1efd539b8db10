use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use log::{debug, error};
use regex_lite::Regex;
use serde::Deserialize;

use crate::model::ParseError;

/// Identifies what to fetch from upstream; immutable per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    pub url: String,
    pub treeish: String,
    pub shallow: bool,
}

impl RemoteSpec {
    /// Scratch clones are keyed by the repository basename alone, so
    /// differently pinned recipes for the same upstream share one clone.
    pub fn basename(&self) -> &str {
        let tail = self
            .url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.url);
        tail.strip_suffix(".git").unwrap_or(tail)
    }
}

/// One library's vendoring recipe, loaded from `<recipe_dir>/<name>.toml`.
///
/// A recipe is the data-driven replacement for a bespoke per-library script:
/// a pinned upstream snapshot, optional carry patches, one or more copy
/// steps, optional rewrite passes and an optional include-repair pass.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    pub name: String,
    pub url: String,
    pub treeish: String,
    #[serde(default)]
    pub shallow: bool,
    #[serde(default)]
    pub patches: Option<PatchConfig>,
    #[serde(default, rename = "copy")]
    pub copy_steps: Vec<CopyStep>,
    #[serde(default, rename = "rewrite")]
    pub rewrites: Vec<RewritePass>,
    #[serde(default)]
    pub repair: Option<RepairConfig>,
}

/// Locally maintained mailbox patches applied to the snapshot before any
/// files are copied.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PatchConfig {
    /// Patch directory, relative to the monorepo root.
    pub dir: PathBuf,
    /// Fall back to a three-way merge when patch context has drifted from
    /// the pinned revision.
    #[serde(default)]
    pub threeway: bool,
    #[serde(default)]
    pub ignore_whitespace: bool,
}

/// Selects a subset of the upstream tree and mirrors it into the monorepo.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CopyStep {
    /// Subdirectory of the upstream clone the globs are matched against.
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,
    /// Destination directory, relative to the monorepo root. Cleared before
    /// the step runs.
    pub dest: PathBuf,
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}

impl CopyStep {
    /// Compiles this step's glob patterns into a selection predicate over
    /// paths relative to the step's source root. Pure and deterministic, as
    /// the two-phase delete-then-repopulate protocol requires.
    pub fn matcher(&self) -> Result<StepMatcher, ParseError> {
        Ok(StepMatcher {
            include: build_glob_set(&self.include)?,
            exclude: build_glob_set(&self.exclude)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StepMatcher {
    include: GlobSet,
    exclude: GlobSet,
}

impl StepMatcher {
    pub fn is_match(&self, dir: &Path, file_name: &str) -> bool {
        let path = dir.join(file_name);
        self.include.is_match(&path) && !self.exclude.is_match(&path)
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ParseError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).map_err(|source| ParseError::Glob {
            pattern: pattern.clone(),
            source,
        })?);
    }
    builder.build().map_err(|source| ParseError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}

/// A regex find-and-replace applied to every copied file, used for
/// policy-specific normalization such as namespace renaming.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RewritePass {
    pub pattern: String,
    pub replace: String,
}

impl RewritePass {
    pub fn regex(&self) -> Result<Regex, ParseError> {
        Regex::new(&self.pattern).map_err(|source| ParseError::Rewrite {
            pattern: self.pattern.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RepairConfig {
    /// Extra directories, relative to the monorepo root, consulted after the
    /// including file's own directory when resolving `#include "..."`.
    #[serde(default)]
    pub search_roots: Vec<PathBuf>,
}

impl Recipe {
    pub fn from_file(path: &Path) -> Result<Recipe, ParseError> {
        debug!("Reading vendoring recipe from {}", path.display());
        let contents = std::fs::read_to_string(path)?;

        let recipe = Recipe::from_toml_str(&contents);
        if let Err(err) = &recipe {
            error!(
                "Could not build a valid recipe from {} due to err {err}",
                path.display()
            );
        }
        recipe
    }

    pub fn from_toml_str(data: &str) -> Result<Recipe, ParseError> {
        let recipe: Recipe = toml::from_str(data)?;
        if recipe.copy_steps.is_empty() {
            return Err(ParseError::NoCopySteps(recipe.name));
        }
        // Reject malformed patterns up front rather than mid-pipeline, after
        // destinations have already been cleared.
        for step in &recipe.copy_steps {
            if step.include.is_empty() {
                return Err(ParseError::EmptyInclude(recipe.name));
            }
            step.matcher()?;
            ensure_within_root(&recipe.name, &step.dest)?;
        }
        for pass in &recipe.rewrites {
            pass.regex()?;
        }
        if let Some(patches) = &recipe.patches {
            ensure_within_root(&recipe.name, &patches.dir)?;
        }
        if let Some(repair) = &recipe.repair {
            for root in &repair.search_roots {
                ensure_within_root(&recipe.name, root)?;
            }
        }
        Ok(recipe)
    }

    pub fn remote_spec(&self) -> RemoteSpec {
        RemoteSpec {
            url: self.url.clone(),
            treeish: self.treeish.clone(),
            shallow: self.shallow,
        }
    }
}

// Recipe paths are joined onto the monorepo root, and copy destinations are
// deleted before they are repopulated. An empty, absolute or `..`-laden path
// would point that deletion at the root itself or outside it, so a path must
// stay strictly below the root: at least one normal component and nothing
// that climbs out.
fn ensure_within_root(recipe: &str, path: &Path) -> Result<(), ParseError> {
    let mut has_normal = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ParseError::PathEscapesRoot {
                    recipe: recipe.to_string(),
                    path: path.to_path_buf(),
                });
            }
        }
    }
    if !has_normal {
        return Err(ParseError::PathEscapesRoot {
            recipe: recipe.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    const FMT_RECIPE: &str = r#"
        name = "fmt"
        url = "https://github.com/fmtlib/fmt.git"
        treeish = "11.0.2"
        shallow = true

        [patches]
        dir = "upstream_utils/fmt_patches"
        threeway = true

        [[copy]]
        dest = "thirdparty/fmt/include"
        include = ["include/fmt/**/*.h"]
        exclude = ["**/test/**"]

        [[copy]]
        source_root = "src"
        dest = "thirdparty/fmt/src"
        include = ["*.cc"]

        [[rewrite]]
        pattern = '\bfmt::'
        replace = "wpi::fmt::"

        [repair]
        search_roots = ["thirdparty/fmt/include"]
    "#;

    #[test]
    fn parses_a_full_recipe() {
        let recipe = Recipe::from_toml_str(FMT_RECIPE).unwrap();

        assert_eq!(recipe.name, "fmt");
        assert_eq!(
            recipe.remote_spec(),
            RemoteSpec {
                url: "https://github.com/fmtlib/fmt.git".to_string(),
                treeish: "11.0.2".to_string(),
                shallow: true,
            }
        );
        let patches = recipe.patches.as_ref().unwrap();
        assert!(patches.threeway);
        assert!(!patches.ignore_whitespace);
        assert_eq!(recipe.copy_steps.len(), 2);
        assert_eq!(recipe.copy_steps[0].source_root, PathBuf::from("."));
        assert_eq!(recipe.copy_steps[1].source_root, PathBuf::from("src"));
        assert_eq!(recipe.rewrites.len(), 1);
        assert_eq!(
            recipe.repair.as_ref().unwrap().search_roots,
            vec![PathBuf::from("thirdparty/fmt/include")]
        );
    }

    #[test]
    fn matcher_honours_include_and_exclude() {
        let recipe = Recipe::from_toml_str(FMT_RECIPE).unwrap();
        let matcher = recipe.copy_steps[0].matcher().unwrap();

        assert!(matcher.is_match(Path::new("include/fmt"), "format.h"));
        assert!(!matcher.is_match(Path::new("include/fmt"), "format.cc"));
        assert!(!matcher.is_match(Path::new("include/fmt/test"), "gtest.h"));
        assert!(!matcher.is_match(Path::new("src"), "format.h"));
    }

    #[test]
    fn rejects_recipe_without_copy_steps() {
        let text = r#"
            name = "empty"
            url = "https://example.com/empty.git"
            treeish = "main"
        "#;
        assert!(matches!(
            Recipe::from_toml_str(text),
            Err(ParseError::NoCopySteps(name)) if name == "empty"
        ));
    }

    #[test]
    fn rejects_copy_step_without_includes() {
        let text = r#"
            name = "empty"
            url = "https://example.com/empty.git"
            treeish = "main"

            [[copy]]
            dest = "thirdparty/empty"
            include = []
        "#;
        assert!(matches!(
            Recipe::from_toml_str(text),
            Err(ParseError::EmptyInclude(name)) if name == "empty"
        ));
    }

    #[test]
    fn rejects_paths_that_escape_the_monorepo_root() {
        let with_dest = |dest: &str| {
            format!(
                r#"
                    name = "escape"
                    url = "https://example.com/escape.git"
                    treeish = "main"

                    [[copy]]
                    dest = "{dest}"
                    include = ["**/*.h"]
                "#
            )
        };

        // Copy destinations are cleared before repopulation, so any of these
        // would delete the monorepo root or files outside it.
        for dest in ["", ".", "/tmp/escape", "../sibling", "a/../../b"] {
            assert!(
                matches!(
                    Recipe::from_toml_str(&with_dest(dest)),
                    Err(ParseError::PathEscapesRoot { recipe, .. }) if recipe == "escape"
                ),
                "dest `{dest}` must be rejected"
            );
        }
        assert!(Recipe::from_toml_str(&with_dest("./thirdparty/escape")).is_ok());

        let bad_patch_dir = r#"
            name = "escape"
            url = "https://example.com/escape.git"
            treeish = "main"

            [patches]
            dir = "../patches"

            [[copy]]
            dest = "thirdparty/escape"
            include = ["**/*.h"]
        "#;
        assert!(matches!(
            Recipe::from_toml_str(bad_patch_dir),
            Err(ParseError::PathEscapesRoot { .. })
        ));

        let bad_search_root = r#"
            name = "escape"
            url = "https://example.com/escape.git"
            treeish = "main"

            [[copy]]
            dest = "thirdparty/escape"
            include = ["**/*.h"]

            [repair]
            search_roots = ["/usr/include"]
        "#;
        assert!(matches!(
            Recipe::from_toml_str(bad_search_root),
            Err(ParseError::PathEscapesRoot { .. })
        ));
    }

    #[test]
    fn rejects_invalid_rewrite_pattern() {
        let text = r#"
            name = "bad"
            url = "https://example.com/bad.git"
            treeish = "main"

            [[copy]]
            dest = "thirdparty/bad"
            include = ["**/*.h"]

            [[rewrite]]
            pattern = "(unclosed"
            replace = ""
        "#;
        assert!(matches!(
            Recipe::from_toml_str(text),
            Err(ParseError::Rewrite { .. })
        ));
    }

    #[test]
    fn basename_strips_trailing_git_suffix() {
        let spec = |url: &str| RemoteSpec {
            url: url.to_string(),
            treeish: "main".to_string(),
            shallow: false,
        };
        assert_eq!(spec("https://github.com/fmtlib/fmt.git").basename(), "fmt");
        assert_eq!(spec("https://github.com/fmtlib/fmt").basename(), "fmt");
        assert_eq!(spec("https://github.com/fmtlib/fmt/").basename(), "fmt");
        assert_eq!(spec("/srv/mirrors/llvm-project.git").basename(), "llvm-project");
    }
}
