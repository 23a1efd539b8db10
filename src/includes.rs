use std::path::{Path, PathBuf};

use log::{debug, warn};
use regex_lite::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepairError {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// Comments out `#include "X"` directives in `file` whose target no longer
/// exists, either next to the file itself or under any of `search_roots`
/// (consulted in order). Returns true when the file was rewritten.
///
/// Angle-bracket includes resolve through the build's system include path
/// and are never touched, and a directive already preceded by `//` on its
/// line is skipped, which keeps the pass idempotent. The file is written
/// back only when the output differs byte-for-byte from the input, so
/// re-running a recipe against an unchanged tree leaves no diff and no
/// timestamp churn.
pub fn repair(file: &Path, search_roots: &[PathBuf]) -> Result<bool, RepairError> {
    let original = match String::from_utf8(std::fs::read(file)?) {
        Ok(text) => text,
        Err(_) => {
            warn!(
                "Skipping include repair for non-UTF-8 file {}",
                file.display()
            );
            return Ok(false);
        }
    };

    let directive = Regex::new(r#"#include\s*"([^"]+)""#).unwrap();
    let parent = file.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut repaired = String::with_capacity(original.len());
    for line in original.split_inclusive('\n') {
        repaired.push_str(&repair_line(line, &directive, &parent, search_roots));
    }

    if repaired != original {
        std::fs::write(file, &repaired)?;
        debug!("Commented out unresolvable includes in {}", file.display());
        return Ok(true);
    }
    Ok(false)
}

fn repair_line(line: &str, directive: &Regex, parent: &Path, search_roots: &[PathBuf]) -> String {
    let mut insertions = Vec::new();
    for captures in directive.captures_iter(line) {
        let Some(matched) = captures.get(0) else {
            continue;
        };
        if line[..matched.start()].contains("//") {
            continue;
        }
        if resolves(&captures[1], parent, search_roots) {
            continue;
        }
        insertions.push(matched.start());
    }
    if insertions.is_empty() {
        return line.to_string();
    }
    let mut repaired = line.to_string();
    for start in insertions.into_iter().rev() {
        repaired.insert_str(start, "// ");
    }
    repaired
}

fn resolves(target: &str, parent: &Path, search_roots: &[PathBuf]) -> bool {
    parent.join(target).exists() || search_roots.iter().any(|root| root.join(target).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn comments_out_only_unresolvable_includes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/y.h", "");
        let file = write(
            dir.path(),
            "a/x.h",
            "#include \"y.h\"\n#include \"missing.h\"\n#include <vector>\n",
        );

        assert!(repair(&file, &[]).unwrap());
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "#include \"y.h\"\n// #include \"missing.h\"\n#include <vector>\n"
        );
    }

    #[test]
    fn repair_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "x.h", "#include \"missing.h\"\n");

        assert!(repair(&file, &[]).unwrap());
        let once = std::fs::read_to_string(&file).unwrap();
        assert!(!repair(&file, &[]).unwrap());
        assert_eq!(std::fs::read_to_string(&file).unwrap(), once);
        assert_eq!(once, "// #include \"missing.h\"\n");
    }

    #[test]
    fn search_roots_are_consulted_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "roots/extra/lib/util.h", "");
        let file = write(
            dir.path(),
            "src/main.cpp",
            "#include \"lib/util.h\"\n#include \"lib/gone.h\"\n",
        );

        let roots = vec![dir.path().join("roots/extra")];
        assert!(repair(&file, &roots).unwrap());
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "#include \"lib/util.h\"\n// #include \"lib/gone.h\"\n"
        );
    }

    #[test]
    fn preserves_indentation_and_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "x.h",
            "#ifdef A\r\n  #include \"missing.h\"\r\n#endif\r\n",
        );

        assert!(repair(&file, &[]).unwrap());
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "#ifdef A\r\n  // #include \"missing.h\"\r\n#endif\r\n"
        );
    }

    #[test]
    fn untouched_file_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "y.h", "");
        let file = write(dir.path(), "x.h", "#include \"y.h\"\n");

        assert!(!repair(&file, &[]).unwrap());
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "#include \"y.h\"\n");
    }
}
