use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// The result of splitting a physical path at a `.git` boundary.
///
/// `lead` is the physical path up to and including the `.git` component
/// (or the whole input path if no such component exists). `sub` is the
/// synthetic remainder inside the Git namespace: `None` means the path
/// never crosses a `.git` boundary at all, `Some("")` means it names the
/// `.git` directory itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPath {
    pub lead: PathBuf,
    pub sub: Option<String>,
}

/// Split a physical path into its passthrough lead and synthetic remainder.
///
/// Strips trailing separators first, so `split_git(p)`, `split_git(p + "/")`
/// and `split_git(p + "//")` always agree. Absolute and relative inputs are
/// treated identically apart from whether `lead` begins with `/`.
pub fn split_git(path: &str) -> SplitPath {
    let trimmed = path.trim_end_matches('/');

    if trimmed.is_empty() {
        return SplitPath {
            lead: PathBuf::from("/"),
            sub: None,
        };
    }

    let leading_slash = trimmed.starts_with('/');
    let components: Vec<&str> = trimmed.split('/').filter(|c| !c.is_empty()).collect();

    match components.iter().position(|c| c.ends_with(".git")) {
        Some(idx) => {
            let lead_components = &components[..=idx];
            let sub_components = &components[idx + 1..];

            let mut lead = String::new();
            if leading_slash {
                lead.push('/');
            }
            lead.push_str(&lead_components.join("/"));

            SplitPath {
                lead: PathBuf::from(lead),
                sub: Some(sub_components.join("/")),
            }
        }
        None => SplitPath {
            lead: PathBuf::from(trimmed),
            sub: None,
        },
    }
}

/// Normalize a synthetic sub-path: strip leading/trailing slashes, reject
/// `.`/`..` segments, and collapse repeated slashes.
///
/// An empty input returns an empty string (root of the synthetic view).
///
/// # Errors
/// Returns [`Error::InvalidPath`] if the path contains `.` or `..` segments.
pub fn normalize_path(path: &str) -> Result<String> {
    if path.is_empty() {
        return Ok(String::new());
    }

    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        if seg.is_empty() {
            continue;
        }
        if seg == ".." {
            return Err(Error::invalid_path(format!(
                "path segment '{}' is not allowed",
                seg,
            )));
        }
        if seg == "." {
            continue;
        }
        segments.push(seg);
    }

    if segments.is_empty() {
        if path.bytes().all(|b| b == b'/') {
            return Ok(String::new());
        }
        return Err(Error::invalid_path("path must not be empty"));
    }

    Ok(segments.join("/"))
}

/// Returns `true` when the path refers to the root of the synthetic tree
/// (empty string or only slashes).
pub fn is_root_path(path: &str) -> bool {
    path.is_empty() || path.chars().all(|c| c == '/')
}

/// The number of `../` hops needed to get from a node at `sub` back to the
/// mounted root, used to build relative symlink targets.
///
/// Per the spec this is computed from the count of `/` characters in `sub`,
/// not by walking the constructed target string, so it stays correct at
/// arbitrary mount depth.
pub fn updir_prefix(sub: &str) -> String {
    "../".repeat(sub.matches('/').count())
}

/// `true` if `full` names the same directory as `mountpoint` once both are
/// canonicalized to absolute paths. Used to hide the mountpoint from its
/// own parent's passthrough listing.
pub fn is_same_path(full: &Path, mountpoint: &Path) -> bool {
    match (full.canonicalize(), mountpoint.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => full == mountpoint,
    }
}
