use std::path::{Path, PathBuf};

/// Walks upward from `start` until a directory carrying a `.git` marker is
/// found. Returns `None` if the filesystem root is reached first.
///
/// The marker may be a directory or, in linked worktrees, a file.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn finds_root_from_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("monorepo");
        let nested = root.join("wpiutil/src/main/native");
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_repo_root(&nested), Some(root));
    }

    #[test]
    fn returns_none_outside_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_repo_root(&nested), None);
    }
}
