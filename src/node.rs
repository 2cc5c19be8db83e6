//! Node Dispatcher and Virtual Node variants (spec §4.1–4.11).
//!
//! [`dispatch`] turns a split physical path into a [`VNode`]; each variant
//! implements the subset of `getattr`/`readdir`/`readlink`/`open` it
//! supports, returning [`Error::NotSupported`] for the rest.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::trace;

use crate::cache::BlobCache;
use crate::descriptor::DescriptorManager;
use crate::error::{Error, Result};
use crate::paths;
use crate::repo::{ObjectKind, RefValue, RepoHandle};
use crate::tree;
use crate::types::{DirEntry, NodeAttr, NodeKind, StatTemplate, MODE_BLOB, MODE_BLOB_EXEC, MODE_TREE};

/// The resource key for an open passthrough file descriptor.
pub type FileHandle = Arc<Mutex<File>>;

/// A synthetic or passthrough node, constructed fresh for a single kernel
/// operation and discarded afterward (spec §3 Lifecycle).
pub enum VNode {
    /// Directory outside any `.git` boundary; lists only subdirectories.
    PassthroughDir { dir: PathBuf, mountpoint: PathBuf },
    /// The `.git` directory itself.
    RepoRoot { lead: PathBuf, repo: RepoHandle },
    /// `config` or `description` inside a repository.
    PassthroughFile(PathBuf),
    /// `refs` or any non-leaf prefix under it.
    RefsDir { repo: RepoHandle, prefix: String },
    /// `HEAD` or a ref name that resolves to a value.
    RefSymlink {
        repo: RepoHandle,
        name: String,
        updir: String,
    },
    /// `objects`, the flat listing of every object id.
    ObjectsIndex(RepoHandle),
    /// A tree object, or the tree reached by walking into one.
    Tree { repo: RepoHandle, oid: git2::Oid },
    /// A blob object, reached directly or via a tree walk.
    Blob {
        repo: RepoHandle,
        oid: git2::Oid,
        mode: u32,
    },
    /// A commit object and its sub-view (`tree`, `parent`, `parents/NN`,
    /// `history/NNNNNN_<sha>`, or the commit root when empty).
    Commit {
        repo: RepoHandle,
        oid: git2::Oid,
        csub: String,
        updir: String,
    },
}

/// Dispatch `(lead, sub)` to the virtual node it denotes (spec §4.2).
///
/// `mountpoint` is only consulted by the passthrough-directory variant, to
/// hide the mount from its own parent's listing.
pub fn dispatch(lead: &Path, sub: Option<&str>, mountpoint: &Path) -> Result<VNode> {
    let sub = match sub {
        None => {
            trace!("dispatch {:?}: passthrough directory", lead);
            return Ok(VNode::PassthroughDir {
                dir: lead.to_path_buf(),
                mountpoint: mountpoint.to_path_buf(),
            });
        }
        Some(s) => s,
    };

    // Opening the repository for a `lead` that is not a valid git directory
    // fails with not-found (spec §4.2, last paragraph).
    let repo = RepoHandle::open(lead)?;

    if sub.is_empty() {
        trace!("dispatch {:?}: repository root", lead);
        return Ok(VNode::RepoRoot {
            lead: lead.to_path_buf(),
            repo,
        });
    }

    if sub == "config" || sub == "description" {
        return Ok(VNode::PassthroughFile(lead.join(sub)));
    }

    if sub == "HEAD" {
        return Ok(VNode::RefSymlink {
            updir: paths::updir_prefix(sub),
            name: "HEAD".to_string(),
            repo,
        });
    }

    if sub == "objects" {
        return Ok(VNode::ObjectsIndex(repo));
    }

    if let Some(rest) = sub.strip_prefix("objects/") {
        return dispatch_object(repo, sub, rest);
    }

    if sub == "refs" || sub.starts_with("refs/") {
        if repo.has_ref(sub) {
            return Ok(VNode::RefSymlink {
                updir: paths::updir_prefix(sub),
                name: sub.to_string(),
                repo,
            });
        }
        let prefix = sub
            .strip_prefix("refs")
            .unwrap()
            .trim_start_matches('/')
            .to_string();
        return Ok(VNode::RefsDir { repo, prefix });
    }

    Err(Error::not_found(sub.to_string()))
}

/// Resolve `objects/<hash>[/<rest>]`. `full_sub` is the complete synthetic
/// path (used only to compute the `../` symlink prefix); `rest` is what
/// follows the hash.
fn dispatch_object(repo: RepoHandle, full_sub: &str, rest: &str) -> Result<VNode> {
    let mut parts = rest.splitn(2, '/');
    let hash = parts.next().unwrap_or("");
    let csub = parts.next().unwrap_or("");

    let oid = git2::Oid::from_str(hash).map_err(|_| Error::not_found(hash.to_string()))?;
    let kind = repo.object_kind(oid)?;

    match kind {
        ObjectKind::Commit => Ok(VNode::Commit {
            updir: paths::updir_prefix(full_sub),
            oid,
            csub: csub.to_string(),
            repo,
        }),
        ObjectKind::Tree => {
            if csub.is_empty() {
                Ok(VNode::Tree { repo, oid })
            } else {
                let entry = tree::entry_at_path(repo.git(), oid, csub)?
                    .ok_or_else(|| Error::not_found(csub.to_string()))?;
                if entry.mode == MODE_TREE {
                    Ok(VNode::Tree {
                        repo,
                        oid: entry.oid,
                    })
                } else {
                    Ok(VNode::Blob {
                        repo,
                        oid: entry.oid,
                        mode: entry.mode,
                    })
                }
            }
        }
        ObjectKind::Blob => {
            if csub.is_empty() {
                Ok(VNode::Blob {
                    repo,
                    oid,
                    mode: MODE_BLOB,
                })
            } else {
                Err(Error::not_found(csub.to_string()))
            }
        }
        ObjectKind::Tag => Err(Error::not_found(hash.to_string())),
    }
}

/// Format a zero-padded two-digit parent index (`parents/00`, `parents/01`, ...).
fn parent_entry_name(index: usize) -> String {
    format!("{:02}", index)
}

/// Format a history entry name (`000000_<sha>`, `000001_<sha>`, ...).
fn history_entry_name(index: usize, oid: git2::Oid) -> String {
    format!("{:06}_{}", index, oid)
}

/// The first-parent chain starting at (but excluding) `oid` itself.
fn first_parent_chain(repo: &RepoHandle, oid: git2::Oid) -> Result<Vec<git2::Oid>> {
    let mut chain = Vec::new();
    let mut current = repo.first_parent(oid)?;
    while let Some(c) = current {
        chain.push(c);
        current = repo.first_parent(c)?;
    }
    Ok(chain)
}

impl VNode {
    /// spec §4.3–§4.11, the `getattr` column.
    pub fn getattr(&self, tmpl: &StatTemplate) -> Result<NodeAttr> {
        let _ = tmpl; // synthetic variants carry their own perm/size; real variants ignore it here
        match self {
            VNode::PassthroughDir { dir, .. } => {
                let meta = std::fs::metadata(dir).map_err(|e| Error::io(dir, e))?;
                if !meta.is_dir() {
                    return Err(Error::not_found(dir.display().to_string()));
                }
                use std::os::unix::fs::MetadataExt;
                Ok(NodeAttr {
                    kind: NodeKind::Dir,
                    perm: 0o755,
                    size: meta.len(),
                    nlink: meta.nlink() as u32,
                    real: Some(meta),
                })
            }
            VNode::RepoRoot { lead, .. } => {
                let meta = std::fs::metadata(lead).map_err(|e| Error::io(lead, e))?;
                use std::os::unix::fs::MetadataExt;
                Ok(NodeAttr {
                    kind: NodeKind::Dir,
                    perm: 0o755,
                    size: meta.len(),
                    nlink: meta.nlink() as u32,
                    real: Some(meta),
                })
            }
            VNode::PassthroughFile(path) => {
                let meta = std::fs::metadata(path).map_err(|e| Error::io(path, e))?;
                if !meta.is_file() {
                    return Err(Error::not_found(path.display().to_string()));
                }
                use std::os::unix::fs::{MetadataExt, PermissionsExt};
                let perm = (meta.permissions().mode() & 0o777) as u16;
                Ok(NodeAttr {
                    kind: NodeKind::File,
                    perm,
                    size: meta.len(),
                    nlink: meta.nlink() as u32,
                    real: Some(meta),
                })
            }
            VNode::RefsDir { .. } | VNode::ObjectsIndex(_) | VNode::Tree { .. } => {
                Ok(NodeAttr::synthetic(NodeKind::Dir, 0o755, 0))
            }
            VNode::Blob { repo, oid, mode } => {
                let size = repo.blob_size(*oid)?;
                let perm = if *mode == MODE_BLOB_EXEC { 0o755 } else { 0o644 };
                Ok(NodeAttr::synthetic(NodeKind::File, perm, size))
            }
            VNode::RefSymlink { .. } => {
                let target = self.readlink()?;
                Ok(NodeAttr::synthetic(
                    NodeKind::Symlink,
                    0o777,
                    target.len() as u64,
                ))
            }
            VNode::Commit { oid, csub, repo, .. } => self.commit_getattr(repo, *oid, csub),
        }
    }

    fn commit_getattr(&self, repo: &RepoHandle, oid: git2::Oid, csub: &str) -> Result<NodeAttr> {
        if csub.is_empty() {
            return Ok(NodeAttr::synthetic(NodeKind::Dir, 0o755, 0));
        }
        if csub == "tree" || csub == "parent" {
            let target = self.readlink()?;
            return Ok(NodeAttr::synthetic(
                NodeKind::Symlink,
                0o777,
                target.len() as u64,
            ));
        }
        if csub == "history" || csub == "parents" {
            return Ok(NodeAttr::synthetic(NodeKind::Dir, 0o755, 0));
        }
        if let Some(idx) = csub.strip_prefix("parents/") {
            let idx: usize = idx.parse().map_err(|_| Error::not_found(csub.to_string()))?;
            let (_, parents) = repo.commit_tree_and_parents(oid)?;
            if idx >= parents.len() {
                return Err(Error::not_found(csub.to_string()));
            }
            let target = self.readlink()?;
            return Ok(NodeAttr::synthetic(
                NodeKind::Symlink,
                0o777,
                target.len() as u64,
            ));
        }
        if csub.strip_prefix("history/").is_some() {
            let target = self.readlink()?;
            return Ok(NodeAttr::synthetic(
                NodeKind::Symlink,
                0o777,
                target.len() as u64,
            ));
        }
        Err(Error::not_found(csub.to_string()))
    }

    /// spec §4.3–§4.9, the `readdir` column. The FUSE surface adds `.`/`..`.
    pub fn readdir(&self) -> Result<Vec<DirEntry>> {
        match self {
            VNode::PassthroughDir { dir, mountpoint } => {
                let mut out = Vec::new();
                for entry in std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
                    let entry = entry.map_err(|e| Error::io(dir, e))?;
                    let path = entry.path();
                    let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
                    if !file_type.is_dir() {
                        continue;
                    }
                    if paths::is_same_path(&path, mountpoint) {
                        continue;
                    }
                    out.push(DirEntry {
                        name: entry.file_name().to_string_lossy().into_owned(),
                        kind: NodeKind::Dir,
                    });
                }
                Ok(out)
            }
            VNode::RepoRoot { lead, repo } => {
                let mut out = Vec::new();
                if repo.has_ref("HEAD") {
                    out.push(DirEntry {
                        name: "HEAD".to_string(),
                        kind: NodeKind::Symlink,
                    });
                }
                for name in ["config", "description"] {
                    if lead.join(name).is_file() {
                        out.push(DirEntry {
                            name: name.to_string(),
                            kind: NodeKind::File,
                        });
                    }
                }
                out.push(DirEntry {
                    name: "refs".to_string(),
                    kind: NodeKind::Dir,
                });
                out.push(DirEntry {
                    name: "objects".to_string(),
                    kind: NodeKind::Dir,
                });
                Ok(out)
            }
            VNode::RefsDir { repo, prefix } => {
                let dir_sub = if prefix.is_empty() {
                    "refs".to_string()
                } else {
                    format!("refs/{}", prefix)
                };
                let want_prefix = format!("{}/", dir_sub);

                let mut seen = std::collections::BTreeSet::new();
                for name in repo.all_ref_names()? {
                    if let Some(remainder) = name.strip_prefix(&want_prefix) {
                        if let Some(component) = remainder.split('/').next() {
                            seen.insert(component.to_string());
                        }
                    }
                }

                let mut out = Vec::with_capacity(seen.len());
                for component in seen {
                    let candidate = format!("{}/{}", dir_sub, component);
                    let kind = if repo.has_ref(&candidate) {
                        NodeKind::Symlink
                    } else {
                        NodeKind::Dir
                    };
                    out.push(DirEntry {
                        name: component,
                        kind,
                    });
                }
                Ok(out)
            }
            VNode::ObjectsIndex(repo) => {
                let mut out = Vec::new();
                for id in repo.all_object_ids()? {
                    let oid = git2::Oid::from_str(&id).map_err(|e| Error::git_msg(e.to_string()))?;
                    let kind = match repo.object_kind(oid) {
                        Ok(ObjectKind::Commit) | Ok(ObjectKind::Tree) => NodeKind::Dir,
                        _ => NodeKind::File,
                    };
                    out.push(DirEntry { name: id, kind });
                }
                Ok(out)
            }
            VNode::Tree { repo, oid } => {
                let entries = tree::list_tree_at_path(repo.git(), *oid, "")?;
                Ok(entries
                    .into_iter()
                    .map(|e| DirEntry {
                        name: e.name,
                        kind: if e.mode == MODE_TREE {
                            NodeKind::Dir
                        } else {
                            NodeKind::File
                        },
                    })
                    .collect())
            }
            VNode::Commit { repo, oid, csub, .. } => self.commit_readdir(repo, *oid, csub),
            VNode::PassthroughFile(_) | VNode::Blob { .. } | VNode::RefSymlink { .. } => {
                Err(Error::NotSupported)
            }
        }
    }

    fn commit_readdir(&self, repo: &RepoHandle, oid: git2::Oid, csub: &str) -> Result<Vec<DirEntry>> {
        if csub.is_empty() {
            let (_, parents) = repo.commit_tree_and_parents(oid)?;
            let mut out = vec![DirEntry {
                name: "tree".to_string(),
                kind: NodeKind::Symlink,
            }];
            if !parents.is_empty() {
                out.push(DirEntry {
                    name: "parent".to_string(),
                    kind: NodeKind::Symlink,
                });
                out.push(DirEntry {
                    name: "parents".to_string(),
                    kind: NodeKind::Dir,
                });
                out.push(DirEntry {
                    name: "history".to_string(),
                    kind: NodeKind::Dir,
                });
            }
            return Ok(out);
        }

        if csub == "parents" {
            let (_, parents) = repo.commit_tree_and_parents(oid)?;
            return Ok((0..parents.len())
                .map(|i| DirEntry {
                    name: parent_entry_name(i),
                    kind: NodeKind::Symlink,
                })
                .collect());
        }

        if csub == "history" {
            let chain = first_parent_chain(repo, oid)?;
            return Ok(chain
                .into_iter()
                .enumerate()
                .map(|(i, c)| DirEntry {
                    name: history_entry_name(i, c),
                    kind: NodeKind::Symlink,
                })
                .collect());
        }

        Err(Error::not_found(csub.to_string()))
    }

    /// spec §4.6 and §4.8, the `readlink` column.
    pub fn readlink(&self) -> Result<String> {
        match self {
            VNode::RefSymlink { repo, name, updir } => match repo.ref_value(name)? {
                Some(RefValue::Symbolic(target)) => Ok(format!("{}{}", updir, target)),
                Some(RefValue::Direct(oid)) => Ok(format!("{}objects/{}", updir, oid)),
                None => Err(Error::not_found(name.clone())),
            },
            VNode::Commit { repo, oid, csub, updir } => self.commit_readlink(repo, *oid, csub, updir),
            _ => Err(Error::NotSupported),
        }
    }

    fn commit_readlink(
        &self,
        repo: &RepoHandle,
        oid: git2::Oid,
        csub: &str,
        updir: &str,
    ) -> Result<String> {
        if csub == "tree" {
            let (tree_oid, _) = repo.commit_tree_and_parents(oid)?;
            return Ok(format!("{}objects/{}", updir, tree_oid));
        }
        if csub == "parent" {
            return Ok("parents/00".to_string());
        }
        if let Some(idx) = csub.strip_prefix("parents/") {
            let idx: usize = idx.parse().map_err(|_| Error::not_found(csub.to_string()))?;
            let (_, parents) = repo.commit_tree_and_parents(oid)?;
            let parent = parents.get(idx).ok_or_else(|| Error::not_found(csub.to_string()))?;
            return Ok(format!("{}objects/{}", updir, parent));
        }
        if let Some(name) = csub.strip_prefix("history/") {
            let hash = name.split('_').nth(1).ok_or_else(|| Error::not_found(csub.to_string()))?;
            return Ok(format!("{}objects/{}", updir, hash));
        }
        Err(Error::not_found(csub.to_string()))
    }

    /// spec §4.10/§4.11, the `open` column. `read`/`release` operate purely
    /// on the descriptor managers and blob cache, so they live on the FUSE
    /// surface instead of here — by the time a handle exists, the node that
    /// produced it is gone.
    pub fn open(
        &self,
        blobs: &BlobCache,
        blob_descs: &DescriptorManager<git2::Oid>,
        file_descs: &DescriptorManager<FileHandle>,
    ) -> Result<u64> {
        match self {
            VNode::Blob { repo, oid, .. } => {
                let oid = *oid;
                blobs.ensure(oid, || repo.blob_bytes(oid))?;
                Ok(blob_descs.allocate(oid))
            }
            VNode::PassthroughFile(path) => {
                let file = std::fs::OpenOptions::new()
                    .read(true)
                    .open(path)
                    .map_err(|e| Error::io(path, e))?;
                Ok(file_descs.allocate(Arc::new(Mutex::new(file))))
            }
            _ => Err(Error::NotSupported),
        }
    }
}
