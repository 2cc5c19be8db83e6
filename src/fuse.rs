//! FUSE Surface (spec §4.13): the thin adapter between `fuser`'s
//! kernel-level callbacks and the node dispatcher.
//!
//! Every callback splits the incoming path (or resolves it from the inode
//! table), dispatches a [`VNode`], and delegates. The surface owns the two
//! descriptor managers and the blob cache, and is the only place that knows
//! about `fuser` types, inode numbers, or errno.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType as FuseFileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, Request,
};
use log::{debug, trace};

use crate::cache::BlobCache;
use crate::descriptor::DescriptorManager;
use crate::error::Error;
use crate::node::{self, FileHandle, VNode};
use crate::paths;
use crate::types::{MountConfig, NodeAttr, NodeKind, StatTemplate};

/// Attribute cache TTL handed back to the kernel. Synthetic nodes never
/// change out from under a live mount (see Non-goals), so a short TTL is
/// only about amortizing repeated lookups, not correctness.
const TTL: Duration = Duration::from_secs(1);
const ROOT_INO: u64 = 1;

/// `true` if `flags` (an `open(2)`-style flag bitfield) carries write
/// intent (`O_WRONLY` or `O_RDWR`), the case `open` must reject with
/// read-only-filesystem per spec §4.13/§6.
fn wants_write(flags: i32) -> bool {
    let accmode = flags & libc::O_ACCMODE;
    accmode == libc::O_WRONLY || accmode == libc::O_RDWR
}

/// Maps between inode numbers (what `fuser` speaks) and physical paths
/// (what the node dispatcher speaks). `fuser`'s `Filesystem` trait is
/// inode-addressed; the core described by the spec is path-addressed, so
/// this table is the seam between the two, owned entirely by the surface.
struct InodeTable {
    inner: Mutex<InodeTableInner>,
}

struct InodeTableInner {
    next: u64,
    paths: HashMap<u64, PathBuf>,
    ids: HashMap<PathBuf, u64>,
}

impl InodeTable {
    fn new(root: PathBuf) -> Self {
        let mut paths = HashMap::new();
        let mut ids = HashMap::new();
        paths.insert(ROOT_INO, root.clone());
        ids.insert(root, ROOT_INO);
        Self {
            inner: Mutex::new(InodeTableInner {
                next: ROOT_INO + 1,
                paths,
                ids,
            }),
        }
    }

    fn path(&self, ino: u64) -> Option<PathBuf> {
        self.inner
            .lock()
            .expect("inode table poisoned")
            .paths
            .get(&ino)
            .cloned()
    }

    /// The inode for `path`, allocating a new one if this is the first
    /// time it's been named.
    fn ino_for(&self, path: &Path) -> u64 {
        let mut inner = self.inner.lock().expect("inode table poisoned");
        if let Some(ino) = inner.ids.get(path) {
            return *ino;
        }
        let ino = inner.next;
        inner.next += 1;
        inner.paths.insert(ino, path.to_path_buf());
        inner.ids.insert(path.to_path_buf(), ino);
        ino
    }
}

/// The `fuser::Filesystem` adapter. Carries the mount configuration, the
/// captured stat template, the inode table, and the shared blob
/// cache/descriptor managers (spec §5).
pub struct GitFs {
    config: MountConfig,
    stat_template: StatTemplate,
    inodes: InodeTable,
    blobs: BlobCache,
    blob_descs: DescriptorManager<git2::Oid>,
    file_descs: DescriptorManager<FileHandle>,
}

impl GitFs {
    /// Build a filesystem rooted at `config.root`, capturing owner/group
    /// for the empty-stat template from the root directory's metadata.
    pub fn new(config: MountConfig) -> std::io::Result<Self> {
        let stat_template = StatTemplate::from_path(&config.root)?;
        let inodes = InodeTable::new(config.root.clone());
        Ok(Self {
            config,
            stat_template,
            inodes,
            blobs: BlobCache::new(),
            blob_descs: DescriptorManager::new(),
            file_descs: DescriptorManager::new(),
        })
    }

    fn dispatch(&self, path: &Path) -> crate::error::Result<VNode> {
        let path_str = path.to_string_lossy();
        let split = paths::split_git(&path_str);
        trace!(
            "dispatch path={:?} lead={:?} sub={:?}",
            path,
            split.lead,
            split.sub
        );
        node::dispatch(&split.lead, split.sub.as_deref(), &self.config.mountpoint)
    }

    fn build_attr(&self, ino: u64, attr: &NodeAttr) -> FileAttr {
        let kind = match attr.kind {
            NodeKind::Dir => FuseFileType::Directory,
            NodeKind::File => FuseFileType::RegularFile,
            NodeKind::Symlink => FuseFileType::Symlink,
        };
        let (uid, gid, atime, mtime, ctime) = match &attr.real {
            Some(meta) => {
                use std::os::unix::fs::MetadataExt;
                let ctime = UNIX_EPOCH + Duration::from_secs(meta.ctime().max(0) as u64);
                (
                    meta.uid(),
                    meta.gid(),
                    meta.accessed().unwrap_or(UNIX_EPOCH),
                    meta.modified().unwrap_or(UNIX_EPOCH),
                    ctime,
                )
            }
            None => (
                self.stat_template.uid,
                self.stat_template.gid,
                UNIX_EPOCH,
                UNIX_EPOCH,
                UNIX_EPOCH,
            ),
        };
        FileAttr {
            ino,
            size: attr.size,
            blocks: attr.size.div_ceil(512),
            atime,
            mtime,
            ctime,
            crtime: UNIX_EPOCH,
            kind,
            perm: attr.perm,
            nlink: attr.nlink,
            uid,
            gid,
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }
}

impl Filesystem for GitFs {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(parent_path) = self.inodes.path(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let child = parent_path.join(name);
        match self.dispatch(&child).and_then(|n| n.getattr(&self.stat_template)) {
            Ok(attr) => {
                let ino = self.inodes.ino_for(&child);
                reply.entry(&TTL, &self.build_attr(ino, &attr), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.inodes.path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.dispatch(&path).and_then(|n| n.getattr(&self.stat_template)) {
            Ok(attr) => reply.attr(&TTL, &self.build_attr(ino, &attr)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let Some(path) = self.inodes.path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.dispatch(&path).and_then(|n| n.readlink()) {
            Ok(target) => reply.data(target.as_bytes()),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.inodes.path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let entries = match self.dispatch(&path).and_then(|n| n.readdir()) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };

        let parent_ino = path.parent().map(|p| self.inodes.ino_for(p)).unwrap_or(ino);

        let mut all = vec![
            (ino, FuseFileType::Directory, ".".to_string()),
            (parent_ino, FuseFileType::Directory, "..".to_string()),
        ];
        for entry in entries {
            let child_ino = self.inodes.ino_for(&path.join(&entry.name));
            let kind = match entry.kind {
                NodeKind::Dir => FuseFileType::Directory,
                NodeKind::File => FuseFileType::RegularFile,
                NodeKind::Symlink => FuseFileType::Symlink,
            };
            all.push((child_ino, kind, entry.name));
        }

        for (i, (child_ino, kind, name)) in all.into_iter().enumerate().skip(offset as usize) {
            if reply.add(child_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        if wants_write(flags) {
            reply.error(Error::ReadOnly.errno());
            return;
        }
        let Some(path) = self.inodes.path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let result = self
            .dispatch(&path)
            .and_then(|n| n.open(&self.blobs, &self.blob_descs, &self.file_descs));
        match result {
            Ok(handle) => reply.opened(handle, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if let Some(oid) = self.blob_descs.lookup(fh) {
            match self.blobs.get(&oid) {
                Some(buf) => {
                    let offset = offset.max(0) as usize;
                    let start = offset.min(buf.len());
                    let end = start.saturating_add(size as usize).min(buf.len());
                    reply.data(&buf[start..end]);
                }
                None => reply.error(libc::ENOENT),
            }
            return;
        }

        if let Some(file) = self.file_descs.lookup(fh) {
            let mut f = file.lock().expect("passthrough file handle poisoned");
            if let Err(e) = f.seek(SeekFrom::Start(offset.max(0) as u64)) {
                reply.error(e.raw_os_error().unwrap_or(libc::EIO));
                return;
            }
            let mut buf = vec![0u8; size as usize];
            match f.read(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    reply.data(&buf);
                }
                Err(e) => reply.error(e.raw_os_error().unwrap_or(libc::EIO)),
            }
            return;
        }

        reply.error(libc::ENOENT);
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        if let Some((oid, final_release)) = self.blob_descs.release(fh) {
            if final_release {
                debug!("evicting blob cache entry for {}", oid);
                self.blobs.evict(&oid);
            }
            reply.ok();
            return;
        }
        self.file_descs.release(fh);
        reply.ok();
    }
}
