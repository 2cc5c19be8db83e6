// ---------------------------------------------------------------------------
// Mode constants
// ---------------------------------------------------------------------------

/// Regular file mode (non-executable).
pub const MODE_BLOB: u32 = 0o100644;
/// Executable file mode.
pub const MODE_BLOB_EXEC: u32 = 0o100755;
/// Symbolic link mode.
pub const MODE_LINK: u32 = 0o120000;
/// Directory (tree) mode.
pub const MODE_TREE: u32 = 0o040000;

// ---------------------------------------------------------------------------
// FileType
// ---------------------------------------------------------------------------

/// The type of a git tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Regular file (`0o100644`).
    Blob,
    /// Executable file (`0o100755`).
    Executable,
    /// Symbolic link (`0o120000`).
    Link,
    /// Directory / subtree (`0o040000`).
    Tree,
}

impl FileType {
    /// Convert a raw git mode to a `FileType`.
    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode {
            MODE_BLOB => Some(Self::Blob),
            MODE_BLOB_EXEC => Some(Self::Executable),
            MODE_LINK => Some(Self::Link),
            MODE_TREE => Some(Self::Tree),
            _ => None,
        }
    }

    /// Whether this type represents a directory.
    pub fn is_dir(self) -> bool {
        matches!(self, Self::Tree)
    }
}

// ---------------------------------------------------------------------------
// WalkEntry
// ---------------------------------------------------------------------------

/// An entry yielded when listing a tree (by [`crate::tree::list_tree_at_path`]).
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Entry name (file or directory basename), exactly as stored.
    pub name: String,
    /// Raw git object ID.
    pub oid: git2::Oid,
    /// Git filemode integer (e.g. `0o100644`).
    pub mode: u32,
}

// ---------------------------------------------------------------------------
// StatTemplate
// ---------------------------------------------------------------------------

/// Owner/group captured at mount time from the repository root, plus the
/// fixed timestamps and link count shared by every synthetic node.
///
/// Cloned per call and combined with a variant-specific mode/size to build
/// the `fuser::FileAttr` the FUSE surface hands back to the kernel. Access,
/// change, and modify times are always zero; synthetic nodes carry no real
/// timestamps (see spec Non-goals).
#[derive(Debug, Clone, Copy)]
pub struct StatTemplate {
    pub uid: u32,
    pub gid: u32,
}

impl StatTemplate {
    /// Capture owner/group from the metadata of `path` (the repository root).
    pub fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        use std::os::unix::fs::MetadataExt;
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            uid: meta.uid(),
            gid: meta.gid(),
        })
    }
}

// ---------------------------------------------------------------------------
// NodeKind / DirEntry / NodeAttr
// ---------------------------------------------------------------------------

/// The coarse shape a virtual node presents to the FUSE surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Dir,
    File,
    Symlink,
}

/// One entry yielded by a node's `readdir`. The FUSE surface adds `.` and
/// `..` itself; nodes only report their real children.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
}

/// The result of a node's `getattr`.
///
/// `real`, when present, is the actual filesystem metadata of a passthrough
/// path (directory, repository root, or plain file), whose owner, group,
/// timestamps, and link count are used as-is — the spec's Non-goal waiving
/// accurate hardlink counts applies only to synthetic nodes, not to the
/// unmodified passthrough view. When `real` is absent the node is synthetic
/// and the FUSE surface combines `perm`/`size`/`nlink` with the mount's
/// [`StatTemplate`] and zeroed timestamps, per the spec's empty-stat
/// template (synthetic nodes always report link count 1).
#[derive(Debug, Clone)]
pub struct NodeAttr {
    pub kind: NodeKind,
    pub perm: u16,
    pub size: u64,
    pub nlink: u32,
    pub real: Option<std::fs::Metadata>,
}

impl NodeAttr {
    pub fn synthetic(kind: NodeKind, perm: u16, size: u64) -> Self {
        Self {
            kind,
            perm,
            size,
            nlink: 1,
            real: None,
        }
    }
}

// ---------------------------------------------------------------------------
// MountConfig
// ---------------------------------------------------------------------------

/// Configuration for a single mount, built from CLI arguments.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Directory containing the repository/repositories to expose.
    pub root: std::path::PathBuf,
    /// Directory the filesystem is mounted onto.
    pub mountpoint: std::path::PathBuf,
    /// Enable verbose (`debug!`) logging in the core.
    pub debug: bool,
    /// Also surface `fuser`'s own session-level debug output.
    pub fuse_debug: bool,
}
