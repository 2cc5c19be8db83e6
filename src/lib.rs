//! A read-only FUSE filesystem that exposes a git repository's refs,
//! objects, commits, trees, and blobs as ordinary files, directories, and
//! symbolic links.
//!
//! Mount a directory and, beneath any `.git` directory encountered, the
//! repository's internal structure becomes navigable: `HEAD` and refs are
//! symlinks to the commits they name, commits expose `tree`/`parent`/
//! `parents/`/`history/` sub-views, trees are directories, and blobs are
//! regular files holding their raw bytes. Outside a `.git` boundary the
//! view is an unmodified passthrough of the backing directory tree
//! (directories only — see [`node::VNode::PassthroughDir`]).
//!
//! # Key types
//!
//! - [`paths::split_git`] — splits a physical path into the passthrough
//!   lead and the synthetic remainder inside a repository.
//! - [`node::dispatch`] — turns a split path into a [`node::VNode`], the
//!   tagged variant implementing `getattr`/`readdir`/`readlink`/`open`.
//! - [`repo::RepoHandle`] — a freshly opened view onto one repository's
//!   refs and object store.
//! - [`fuse::GitFs`] — the `fuser::Filesystem` adapter tying it together.
//!
//! # Quick example
//!
//! ```rust,no_run
//! use gitfs::fuse::GitFs;
//! use gitfs::types::MountConfig;
//!
//! let config = MountConfig {
//!     root: "/home/me/projects".into(),
//!     mountpoint: "/mnt/gitfs".into(),
//!     debug: false,
//!     fuse_debug: false,
//! };
//! let fs = GitFs::new(config).unwrap();
//! fuser::mount2(fs, "/mnt/gitfs", &[fuser::MountOption::RO]).unwrap();
//! ```

pub mod cache;
pub mod descriptor;
pub mod error;
pub mod fuse;
pub mod node;
pub mod paths;
pub mod repo;
pub mod tree;
pub mod types;

pub use error::{Error, Result};
pub use fuse::GitFs;
pub use repo::RepoHandle;
pub use types::MountConfig;
