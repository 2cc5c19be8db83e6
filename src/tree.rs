use crate::error::{Error, Result};
use crate::types::{WalkEntry, MODE_TREE};

/// Result of looking up a single tree entry.
#[derive(Debug, Clone, Copy)]
pub struct TreeEntryResult {
    pub oid: git2::Oid,
    pub mode: u32,
}

/// Return the `(oid, mode)` of the entry at `path`, or `None` if missing.
///
/// Walks the tree from `tree_oid` through each path segment by name lookup.
/// Returns `None` when any segment is not found or an intermediate entry
/// is not a tree.
///
/// # Arguments
/// * `repo` - The git repository.
/// * `tree_oid` - Root tree to search from.
/// * `path` - Normalized forward-slash path (e.g. `"dir/file.txt"`).
pub fn entry_at_path(
    repo: &git2::Repository,
    tree_oid: git2::Oid,
    path: &str,
) -> Result<Option<TreeEntryResult>> {
    let path = crate::paths::normalize_path(path)?;
    if path.is_empty() {
        return Ok(Some(TreeEntryResult {
            oid: tree_oid,
            mode: MODE_TREE,
        }));
    }

    let segments: Vec<&str> = path.split('/').collect();
    let mut current_oid = tree_oid;

    for (i, segment) in segments.iter().enumerate() {
        let tree = repo.find_tree(current_oid).map_err(Error::git)?;

        let entry_info = tree.get_name(segment).map(|e| (e.id(), e.filemode() as u32));

        match entry_info {
            Some((entry_oid, entry_mode)) => {
                if i == segments.len() - 1 {
                    return Ok(Some(TreeEntryResult {
                        oid: entry_oid,
                        mode: entry_mode,
                    }));
                } else {
                    if entry_mode != MODE_TREE {
                        return Ok(None);
                    }
                    current_oid = entry_oid;
                }
            }
            None => return Ok(None),
        }
    }

    Ok(None)
}

/// List the immediate children of a tree at the given path.
///
/// Returns [`WalkEntry`] objects with `name`, `oid`, and `mode` for each
/// child, in the order stored in the tree. Pass an empty or root path to
/// list the top-level tree.
///
/// # Errors
/// Returns [`Error::NotFound`] if the path does not exist, or
/// [`Error::NotADirectory`] if it is not a tree.
pub fn list_tree_at_path(
    repo: &git2::Repository,
    tree_oid: git2::Oid,
    path: &str,
) -> Result<Vec<WalkEntry>> {
    let target_oid = if crate::paths::is_root_path(path) {
        tree_oid
    } else {
        let entry = entry_at_path(repo, tree_oid, path)?
            .ok_or_else(|| Error::not_found(path))?;
        if entry.mode != MODE_TREE {
            return Err(Error::not_a_directory(path));
        }
        entry.oid
    };

    let tree = repo.find_tree(target_oid).map_err(Error::git)?;
    let mut entries = Vec::with_capacity(tree.len());
    for i in 0..tree.len() {
        let e = tree.get(i).unwrap();
        entries.push(WalkEntry {
            name: e.name().unwrap_or("").to_string(),
            oid: e.id(),
            mode: e.filemode() as u32,
        });
    }
    Ok(entries)
}
