use std::path::PathBuf;

use thiserror::Error;

pub mod recipe;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading recipe toml: {0}")]
    IO(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid glob pattern `{pattern}`: {source}")]
    Glob {
        pattern: String,
        source: globset::Error,
    },
    #[error("Invalid rewrite pattern `{pattern}`: {source}")]
    Rewrite {
        pattern: String,
        source: regex_lite::Error,
    },
    #[error("Recipe `{0}` has no copy steps")]
    NoCopySteps(String),
    #[error("A copy step in recipe `{0}` has an empty include list")]
    EmptyInclude(String),
    #[error("Recipe `{recipe}` names a path outside the monorepo root: `{path}`")]
    PathEscapesRoot { recipe: String, path: PathBuf },
}
