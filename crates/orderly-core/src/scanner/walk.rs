use glob::Pattern;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::error;

/// List candidate files under `root` in a stable (name-sorted, depth-first)
/// order, filtering by glob ignore patterns.
///
/// Directory symlinks are never followed. File symlinks are listed as-is so
/// the symlink policy can decide about them later.
pub fn list_files(root: &Path, ignore_globs: &[String]) -> io::Result<Vec<PathBuf>> {
    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let mut files = Vec::new();
    visit_dirs(root, &ignore_patterns, &mut files)?;
    Ok(files)
}

fn is_ignored(path: &Path, ignore_patterns: &[Pattern]) -> bool {
    ignore_patterns
        .iter()
        .any(|pattern| pattern.matches_path(path))
}

fn visit_dirs(dir: &Path, ignore_patterns: &[Pattern], files: &mut Vec<PathBuf>) -> io::Result<()> {
    if is_ignored(dir, ignore_patterns) {
        return Ok(());
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            if err.kind() == io::ErrorKind::PermissionDenied {
                error!("Access denied reading directory {}: {}", dir.display(), err);
                return Ok(());
            } else {
                return Err(io::Error::new(
                    err.kind(),
                    format!("Error reading directory {}: {}", dir.display(), err),
                ));
            }
        }
    };

    let mut children: Vec<(PathBuf, fs::FileType)> = Vec::new();
    for entry_result in entries {
        let entry = entry_result.map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("Error reading entry in directory {}: {}", dir.display(), err),
            )
        })?;
        let file_type = entry.file_type().map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("Error getting file type for {}: {}", entry.path().display(), err),
            )
        })?;
        children.push((entry.path(), file_type));
    }
    children.sort_by(|a, b| a.0.cmp(&b.0));

    for (path, file_type) in children {
        if file_type.is_dir() {
            visit_dirs(&path, ignore_patterns, files)?;
        } else if (file_type.is_file() || file_type.is_symlink())
            && !is_ignored(&path, ignore_patterns)
        {
            files.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_files_sorted_and_recursive() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("b_dir")).unwrap();
        fs::write(root.join("c.txt"), "c").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b_dir").join("inner.txt"), "i").unwrap();

        let files = list_files(root, &[]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b_dir/inner.txt", "c.txt"]);
    }

    #[test]
    fn test_list_files_respects_ignore_patterns() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("node_modules")).unwrap();
        fs::write(root.join("node_modules").join("x.js"), "x").unwrap();
        fs::write(root.join("keep.txt"), "k").unwrap();
        fs::write(root.join("skip.tmp"), "s").unwrap();

        let files = list_files(root, &["*/node_modules".to_string(), "*.tmp".to_string()]).unwrap();
        assert_eq!(files, vec![root.join("keep.txt")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_symlinks_not_followed() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("root");
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("dir_link")).unwrap();

        let files = list_files(&root, &[]).unwrap();
        // The link itself is listed as an entry, its contents are not walked.
        assert_eq!(files, vec![root.join("dir_link")]);
    }
}
