//! Path jail and symlink policy.
//!
//! Every check works on canonical paths: symlinks and `..` segments are
//! resolved before containment is tested. Targets that do not exist yet are
//! resolved through their longest existing ancestor. Checks run when a plan
//! item is proposed and again right before the move, since the filesystem
//! may have changed in between.

use crate::config::SafetyConfig;
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("root {root} cannot be resolved")]
    RootUnavailable { root: String },

    #[error("path {path} resolves outside root {root}")]
    OutsideRoot { path: String, root: String },

    #[error("symlink movement blocked: {path}")]
    SymlinkBlocked { path: String },
}

/// Canonicalize a path that may not exist yet.
///
/// The longest existing ancestor is canonicalized by the OS; the remaining
/// components are applied lexically. A component that exists as a dangling
/// symlink cannot be resolved and is an error.
pub fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut existing = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut rest: Vec<OsString> = Vec::new();

    let mut base = loop {
        match existing.canonicalize() {
            Ok(canonical) => break canonical,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if existing.symlink_metadata().is_ok() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("dangling symlink at {}", existing.display()),
                    ));
                }
                let last = match existing.components().next_back() {
                    Some(Component::Normal(name)) => name.to_os_string(),
                    Some(Component::ParentDir) => OsString::from(".."),
                    Some(Component::CurDir) => OsString::from("."),
                    _ => return Err(e),
                };
                rest.push(last);
                if !existing.pop() {
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
    };

    for component in rest.into_iter().rev() {
        if component == ".." {
            base.pop();
        } else if component != "." {
            base.push(component);
        }
    }
    Ok(base)
}

/// Canonical location of a directory entry without following the entry
/// itself: the parent is resolved, the final name is kept as-is.
fn canonical_entry(path: &Path) -> io::Result<PathBuf> {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            Ok(canonicalize_lenient(parent)?.join(name))
        }
        _ => canonicalize_lenient(path),
    }
}

fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// True iff the canonical form of `target` is `root` or lies beneath it.
/// Relative targets are taken relative to `root`. Fails closed: an
/// unresolvable root or target is never safe.
pub fn is_safe(root: &Path, target: &Path) -> bool {
    let canonical_root = match root.canonicalize() {
        Ok(r) => r,
        Err(e) => {
            warn!("Cannot canonicalize root {}: {}", root.display(), e);
            return false;
        }
    };
    let target = if target.is_absolute() {
        target.to_path_buf()
    } else {
        canonical_root.join(target)
    };
    match canonicalize_lenient(&target) {
        Ok(canonical) => canonical.starts_with(&canonical_root),
        Err(e) => {
            warn!("Cannot canonicalize target {}: {}", target.display(), e);
            false
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SafetyPolicy {
    allow_symlinks: bool,
}

impl SafetyPolicy {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            allow_symlinks: config.allow_symlinks,
        }
    }

    /// Block symlink sources unless the policy allows moving the link itself.
    pub fn move_guard(&self, src: &Path) -> Result<(), SecurityError> {
        if is_symlink(src) && !self.allow_symlinks {
            return Err(SecurityError::SymlinkBlocked {
                path: src.display().to_string(),
            });
        }
        Ok(())
    }

    /// Full check for moving `src` to `dest` inside `root`. Either path may
    /// be missing: before a move the destination usually is, after a crash
    /// the source may be.
    ///
    /// An allowed symlink is jail-checked by its own location, never by the
    /// file it points to.
    pub fn validate_move(&self, root: &Path, src: &Path, dest: &Path) -> Result<(), SecurityError> {
        self.move_guard(src)?;

        let canonical_root = root
            .canonicalize()
            .map_err(|_| SecurityError::RootUnavailable {
                root: root.display().to_string(),
            })?;

        ensure_within(&canonical_root, src, self.location(src))?;
        ensure_within(&canonical_root, dest, self.location(dest))?;
        Ok(())
    }

    /// Symlinks the policy allows to move are located by the link itself.
    fn location(&self, path: &Path) -> io::Result<PathBuf> {
        if self.allow_symlinks && is_symlink(path) {
            canonical_entry(path)
        } else {
            canonicalize_lenient(path)
        }
    }
}

fn ensure_within(
    canonical_root: &Path,
    original: &Path,
    resolved: io::Result<PathBuf>,
) -> Result<(), SecurityError> {
    match resolved {
        Ok(p) if p.starts_with(canonical_root) => Ok(()),
        _ => Err(SecurityError::OutsideRoot {
            path: original.display().to_string(),
            root: canonical_root.display().to_string(),
        }),
    }
}
