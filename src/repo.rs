use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// The kind of a loaded git object, as far as the node dispatcher cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

/// The value stored at a ref name: either another ref name (symbolic) or
/// an object id (direct).
#[derive(Debug, Clone)]
pub enum RefValue {
    Direct(git2::Oid),
    Symbolic(String),
}

/// A freshly opened handle onto a repository's object store and refs.
///
/// Carries no cross-call state of its own beyond the open `git2::Repository`
/// — virtual nodes open one of these per dispatch and discard it when the
/// kernel operation completes.
pub struct RepoHandle {
    repo: git2::Repository,
    path: PathBuf,
}

impl RepoHandle {
    /// Open the repository rooted at `lead` (a `.git` directory).
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if `lead` is not a valid git directory —
    /// per spec, a failed repository open is reported as not-found, not as
    /// a git error, so that an unrecognized `.git`-suffixed directory
    /// behaves like any other absent path.
    pub fn open(lead: &Path) -> Result<Self> {
        let repo = git2::Repository::open(lead)
            .map_err(|_| Error::not_found(lead.display().to_string()))?;
        Ok(Self {
            repo,
            path: lead.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Borrow the underlying `git2::Repository`, for callers (tree walks)
    /// that need the raw handle.
    pub fn git(&self) -> &git2::Repository {
        &self.repo
    }

    /// Look up a ref's stored value, one hop (symbolic refs are not
    /// followed further). `Ok(None)` means the ref does not exist.
    pub fn ref_value(&self, name: &str) -> Result<Option<RefValue>> {
        match self.repo.find_reference(name) {
            Ok(r) => {
                if let Some(target) = r.symbolic_target() {
                    Ok(Some(RefValue::Symbolic(target.to_string())))
                } else if let Some(oid) = r.target() {
                    Ok(Some(RefValue::Direct(oid)))
                } else {
                    Ok(None)
                }
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(Error::git(e)),
        }
    }

    /// `true` iff `name` is a known ref (branch, tag, HEAD, or other).
    pub fn has_ref(&self, name: &str) -> bool {
        self.repo.find_reference(name).is_ok()
    }

    /// Every known ref's full name (e.g. `refs/heads/master`, `HEAD`).
    pub fn all_ref_names(&self) -> Result<Vec<String>> {
        let refs = self.repo.references().map_err(Error::git)?;
        let mut out = Vec::new();
        for r in refs {
            let r = r.map_err(Error::git)?;
            if let Some(name) = r.name() {
                out.push(name.to_string());
            }
        }
        Ok(out)
    }

    /// The kind of the object identified by `oid`.
    pub fn object_kind(&self, oid: git2::Oid) -> Result<ObjectKind> {
        let obj = self
            .repo
            .find_object(oid, None)
            .map_err(|_| Error::not_found(oid.to_string()))?;
        match obj.kind() {
            Some(git2::ObjectType::Commit) => Ok(ObjectKind::Commit),
            Some(git2::ObjectType::Tree) => Ok(ObjectKind::Tree),
            Some(git2::ObjectType::Blob) => Ok(ObjectKind::Blob),
            Some(git2::ObjectType::Tag) => Ok(ObjectKind::Tag),
            _ => Err(Error::not_found(oid.to_string())),
        }
    }

    /// A commit's tree and parent object ids, in order.
    pub fn commit_tree_and_parents(&self, oid: git2::Oid) -> Result<(git2::Oid, Vec<git2::Oid>)> {
        let commit = self
            .repo
            .find_commit(oid)
            .map_err(|_| Error::not_found(oid.to_string()))?;
        let tree = commit.tree_id();
        let parents = commit.parent_ids().collect();
        Ok((tree, parents))
    }

    /// A commit's first parent, if any.
    pub fn first_parent(&self, oid: git2::Oid) -> Result<Option<git2::Oid>> {
        let commit = self
            .repo
            .find_commit(oid)
            .map_err(|_| Error::not_found(oid.to_string()))?;
        Ok(commit.parent_ids().next())
    }

    /// Raw bytes of a blob.
    pub fn blob_bytes(&self, oid: git2::Oid) -> Result<Vec<u8>> {
        let blob = self
            .repo
            .find_blob(oid)
            .map_err(|_| Error::not_found(oid.to_string()))?;
        Ok(blob.content().to_vec())
    }

    /// A blob's size without loading its content.
    pub fn blob_size(&self, oid: git2::Oid) -> Result<u64> {
        let blob = self
            .repo
            .find_blob(oid)
            .map_err(|_| Error::not_found(oid.to_string()))?;
        Ok(blob.size() as u64)
    }

    /// The hex id of every object in the store, as a flat list.
    pub fn all_object_ids(&self) -> Result<Vec<String>> {
        let odb = self.repo.odb().map_err(Error::git)?;
        let mut ids = Vec::new();
        odb.foreach(|oid| {
            ids.push(oid.to_string());
            true
        })
        .map_err(Error::git)?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo_with_commit(dir: &Path) -> (git2::Repository, git2::Oid) {
        let repo = git2::Repository::init_bare(dir).unwrap();
        let builder = repo.treebuilder(None).unwrap();
        let tree_oid = builder.write().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        let sig = git2::Signature::now("tester", "tester@example.com").unwrap();
        let commit_oid = repo
            .commit(Some("refs/heads/master"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
        repo.set_head("refs/heads/master").unwrap();
        (repo, commit_oid)
    }

    #[test]
    fn open_missing_repo_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = RepoHandle::open(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn head_is_symbolic_to_master() {
        let dir = tempfile::tempdir().unwrap();
        init_repo_with_commit(dir.path());
        let handle = RepoHandle::open(dir.path()).unwrap();
        match handle.ref_value("HEAD").unwrap().unwrap() {
            RefValue::Symbolic(target) => assert_eq!(target, "refs/heads/master"),
            RefValue::Direct(_) => panic!("expected symbolic HEAD"),
        }
    }

    #[test]
    fn master_is_direct_to_commit() {
        let dir = tempfile::tempdir().unwrap();
        let (_repo, commit_oid) = init_repo_with_commit(dir.path());
        let handle = RepoHandle::open(dir.path()).unwrap();
        match handle.ref_value("refs/heads/master").unwrap().unwrap() {
            RefValue::Direct(oid) => assert_eq!(oid, commit_oid),
            RefValue::Symbolic(_) => panic!("expected direct ref"),
        }
    }

    #[test]
    fn object_kind_distinguishes_commit_and_tree() {
        let dir = tempfile::tempdir().unwrap();
        let (_repo, commit_oid) = init_repo_with_commit(dir.path());
        let handle = RepoHandle::open(dir.path()).unwrap();
        assert_eq!(
            handle.object_kind(commit_oid).unwrap(),
            ObjectKind::Commit
        );
        let (tree_oid, _) = handle.commit_tree_and_parents(commit_oid).unwrap();
        assert_eq!(handle.object_kind(tree_oid).unwrap(), ObjectKind::Tree);
    }

    #[test]
    fn all_object_ids_includes_commit_and_tree() {
        let dir = tempfile::tempdir().unwrap();
        let (_repo, commit_oid) = init_repo_with_commit(dir.path());
        let handle = RepoHandle::open(dir.path()).unwrap();
        let ids = handle.all_object_ids().unwrap();
        assert!(ids.contains(&commit_oid.to_string()));
    }
}
