//! Path containment checks: reject any client path that escapes the
//! media root after symlink resolution.

use std::path::{Path, PathBuf};

/// True iff `requested`, once resolved (symlinks included) under `base`,
/// is `base` itself or a descendant of it.
pub fn is_safe(base: &Path, requested: &Path) -> bool {
    let Ok(base) = base.canonicalize() else {
        return false;
    };
    let candidate = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        base.join(requested)
    };
    let Ok(candidate) = candidate.canonicalize() else {
        return false;
    };
    candidate.starts_with(&base)
}

/// Resolve a client-supplied relative path against `base`, returning the
/// canonicalized absolute path only if it passes [`is_safe`].
pub fn resolve(base: &Path, relative: &Path) -> Option<PathBuf> {
    let candidate = base.join(relative);
    if is_safe(base, &candidate) {
        candidate.canonicalize().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn rejects_dotdot_escape() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("a.mp4"), b"x").unwrap();
        assert!(is_safe(root.path(), &root.path().join("a.mp4")));
        assert!(!is_safe(root.path(), &root.path().join("../etc/passwd")));
    }

    #[test]
    fn rejects_symlink_escape() {
        let root = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), b"top secret").unwrap();

        let link = root.path().join("link");
        #[cfg(unix)]
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), &link).unwrap();

        assert!(!is_safe(root.path(), &link));
    }

    #[test]
    fn accepts_nested_descendant() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("sub")).unwrap();
        fs::write(root.path().join("sub/b.mp4"), b"x").unwrap();
        assert!(is_safe(root.path(), &root.path().join("sub/b.mp4")));
    }
}
