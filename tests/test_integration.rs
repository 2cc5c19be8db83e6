//! End-to-end exercises of the node dispatcher against real on-disk bare
//! repositories, bypassing the actual kernel mount (which cannot run in a
//! test sandbox) the same way `vost`'s own suite drives `Fs` without a live
//! mount.

mod common;

use std::path::{Path, PathBuf};

use gitfs::cache::BlobCache;
use gitfs::descriptor::DescriptorManager;
use gitfs::node::{self, VNode};
use gitfs::paths::split_git;
use gitfs::types::{NodeKind, StatTemplate};

/// A bare repository under `<mount_root>/repo.git`, the shape every test
/// below drives paths against.
struct Mount {
    root: tempfile::TempDir,
    git_dir: PathBuf,
}

fn mount() -> (Mount, common::Fixture) {
    let root = tempfile::tempdir().unwrap();
    let git_dir = root.path().join("repo.git");
    std::fs::create_dir_all(&git_dir).unwrap();
    let fixture = common::build(&git_dir);
    (Mount { root, git_dir }, fixture)
}

impl Mount {
    fn dispatch(&self, full: &str) -> gitfs::Result<VNode> {
        let split = split_git(full);
        node::dispatch(&split.lead, split.sub.as_deref(), self.root.path())
    }

    fn at(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            self.git_dir.display().to_string()
        } else {
            format!("{}/{}", self.git_dir.display(), suffix)
        }
    }
}

fn passthrough_dispatch(root: &Path, mountpoint: &Path) -> gitfs::Result<VNode> {
    node::dispatch(root, None, mountpoint)
}

#[test]
fn full_path_split_and_dispatch_to_blob() {
    let (m, fixture) = mount();

    let full = m.at(&format!("objects/{}/hello.txt", fixture.tree));
    let split = split_git(&full);
    assert_eq!(split.lead, m.git_dir);
    assert_eq!(
        split.sub.as_deref(),
        Some(format!("objects/{}/hello.txt", fixture.tree).as_str())
    );

    let node = m.dispatch(&full).unwrap();
    let attr = node.getattr(&StatTemplate { uid: 0, gid: 0 }).unwrap();
    assert_eq!(attr.kind, NodeKind::File);
    assert_eq!(attr.size, "hello world\n".len() as u64);
}

#[test]
fn blob_open_read_release_round_trip_yields_raw_bytes() {
    let (m, fixture) = mount();
    let node = m
        .dispatch(&m.at(&format!("objects/{}/hello.txt", fixture.tree)))
        .unwrap();

    let blobs = BlobCache::new();
    let blob_descs: DescriptorManager<git2::Oid> = DescriptorManager::new();
    let file_descs: DescriptorManager<gitfs::node::FileHandle> = DescriptorManager::new();

    let handle = node.open(&blobs, &blob_descs, &file_descs).unwrap();
    let oid = blob_descs.lookup(handle).unwrap();
    let buf = blobs.get(&oid).unwrap();
    assert_eq!(&**buf, b"hello world\n");

    let (_, done) = blob_descs.release(handle).unwrap();
    assert!(done);
    blobs.evict(&oid);
    assert!(blobs.get(&oid).is_none());
}

#[test]
fn repeated_open_read_release_is_idempotent() {
    let (m, fixture) = mount();
    let sub = format!("objects/{}/hello.txt", fixture.tree);

    let blobs = BlobCache::new();
    let blob_descs: DescriptorManager<git2::Oid> = DescriptorManager::new();
    let file_descs: DescriptorManager<gitfs::node::FileHandle> = DescriptorManager::new();

    for _ in 0..3 {
        let node = m.dispatch(&m.at(&sub)).unwrap();
        let handle = node.open(&blobs, &blob_descs, &file_descs).unwrap();
        let oid = blob_descs.lookup(handle).unwrap();
        assert_eq!(&**blobs.get(&oid).unwrap(), b"hello world\n");
        blob_descs.release(handle);
    }
}

#[test]
fn nested_tree_blob_resolves_through_dir() {
    let (m, fixture) = mount();
    let node = m
        .dispatch(&m.at(&format!("objects/{}/dir/nested.txt", fixture.tree)))
        .unwrap();
    let attr = node.getattr(&StatTemplate { uid: 0, gid: 0 }).unwrap();
    assert_eq!(attr.size, "nested contents\n".len() as u64);
}

#[test]
fn missing_tree_entry_is_not_found() {
    let (m, fixture) = mount();
    let err = m
        .dispatch(&m.at(&format!("objects/{}/nope.txt", fixture.tree)))
        .unwrap_err();
    assert!(matches!(err, gitfs::Error::NotFound(_)));
}

#[test]
fn refs_directory_lists_heads_and_tags() {
    let (m, _fixture) = mount();

    let node = m.dispatch(&m.at("refs")).unwrap();
    let names: Vec<String> = node.readdir().unwrap().into_iter().map(|e| e.name).collect();
    assert!(names.contains(&"heads".to_string()));
    assert!(names.contains(&"tags".to_string()));

    let heads = m.dispatch(&m.at("refs/heads")).unwrap();
    let heads_names: Vec<String> = heads.readdir().unwrap().into_iter().map(|e| e.name).collect();
    assert!(heads_names.contains(&"master".to_string()));
    assert!(heads_names.contains(&"other".to_string()));
}

#[test]
fn tag_ref_is_symlink_to_object() {
    let (m, fixture) = mount();
    let node = m.dispatch(&m.at("refs/tags/v1")).unwrap();
    assert!(matches!(node, VNode::RefSymlink { .. }));
    assert_eq!(
        node.readlink().unwrap(),
        format!("../../objects/{}", fixture.root)
    );
}

#[test]
fn head_symlink_points_at_branch_ref() {
    let (m, _fixture) = mount();
    let node = m.dispatch(&m.at("HEAD")).unwrap();
    assert_eq!(node.readlink().unwrap(), "refs/heads/master");
}

#[test]
fn commit_history_and_parents_walk_first_parent_chain() {
    let (m, fixture) = mount();

    let node = m
        .dispatch(&m.at(&format!("objects/{}/history", fixture.tip)))
        .unwrap();
    let names: Vec<String> = node.readdir().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(
        names,
        vec![
            format!("000000_{}", fixture.mid),
            format!("000001_{}", fixture.root),
        ]
    );

    let history_node = m
        .dispatch(&m.at(&format!(
            "objects/{}/history/000000_{}",
            fixture.tip, fixture.mid
        )))
        .unwrap();
    assert_eq!(
        history_node.readlink().unwrap(),
        format!("../../objects/{}", fixture.mid)
    );
}

#[test]
fn commit_parents_readlink_matches_index() {
    let (m, fixture) = mount();
    let node = m
        .dispatch(&m.at(&format!("objects/{}/parents/00", fixture.mid)))
        .unwrap();
    assert_eq!(
        node.readlink().unwrap(),
        format!("../../../objects/{}", fixture.root)
    );

    let oob = m
        .dispatch(&m.at(&format!("objects/{}/parents/03", fixture.mid)))
        .unwrap();
    assert!(oob.readlink().is_err());
}

#[test]
fn root_commit_has_only_tree_entry() {
    let (m, fixture) = mount();
    let node = m.dispatch(&m.at(&format!("objects/{}", fixture.root))).unwrap();
    let names: Vec<String> = node.readdir().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["tree"]);
}

#[test]
fn passthrough_directory_hides_mountpoint_and_lists_only_dirs() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("subdir")).unwrap();
    std::fs::write(dir.path().join("plainfile.txt"), b"x").unwrap();
    let mountpoint = dir.path().join("subdir");

    let node = passthrough_dispatch(dir.path(), &mountpoint).unwrap();
    let names: Vec<String> = node.readdir().unwrap().into_iter().map(|e| e.name).collect();
    assert!(!names.contains(&"subdir".to_string()));
    assert!(!names.contains(&"plainfile.txt".to_string()));
}

#[test]
fn passthrough_directory_outside_mountpoint_lists_subdirs() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("subdir")).unwrap();
    std::fs::write(dir.path().join("plainfile.txt"), b"x").unwrap();
    let unrelated_mountpoint = dir.path().join("does-not-exist");

    let node = passthrough_dispatch(dir.path(), &unrelated_mountpoint).unwrap();
    let names: Vec<String> = node.readdir().unwrap().into_iter().map(|e| e.name).collect();
    assert!(names.contains(&"subdir".to_string()));
    assert!(!names.contains(&"plainfile.txt".to_string()));
}

#[test]
fn config_and_description_are_passthrough_files() {
    let (m, _fixture) = mount();
    std::fs::write(m.git_dir.join("description"), b"a test repo\n").unwrap();

    let node = m.dispatch(&m.at("description")).unwrap();
    assert!(matches!(node, VNode::PassthroughFile(_)));

    let blobs = BlobCache::new();
    let blob_descs: DescriptorManager<git2::Oid> = DescriptorManager::new();
    let file_descs: DescriptorManager<gitfs::node::FileHandle> = DescriptorManager::new();
    let handle = node.open(&blobs, &blob_descs, &file_descs).unwrap();
    let key = file_descs.lookup(handle).unwrap();
    let mut buf = Vec::new();
    {
        use std::io::Read;
        key.lock().unwrap().read_to_end(&mut buf).unwrap();
    }
    assert_eq!(buf, b"a test repo\n");
}

#[test]
fn repo_root_lists_fixed_children() {
    let (m, _fixture) = mount();
    std::fs::write(m.git_dir.join("description"), b"hi\n").unwrap();

    let node = m.dispatch(&m.at("")).unwrap();
    let names: Vec<String> = node.readdir().unwrap().into_iter().map(|e| e.name).collect();
    assert!(names.contains(&"HEAD".to_string()));
    assert!(names.contains(&"refs".to_string()));
    assert!(names.contains(&"objects".to_string()));
    assert!(names.contains(&"description".to_string()));
}

#[test]
fn opening_a_nonexistent_git_directory_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let fake = dir.path().join("nope.git");
    let full = format!("{}/HEAD", fake.display());
    let split = split_git(&full);
    let err = node::dispatch(&split.lead, split.sub.as_deref(), dir.path()).unwrap_err();
    assert!(matches!(err, gitfs::Error::NotFound(_)));
}

#[test]
fn objects_index_lists_every_stored_object() {
    let (m, fixture) = mount();
    let node = m.dispatch(&m.at("objects")).unwrap();
    let names: Vec<String> = node.readdir().unwrap().into_iter().map(|e| e.name).collect();
    assert!(names.contains(&fixture.tip.to_string()));
    assert!(names.contains(&fixture.tree.to_string()));
}
