use std::path::Path;

/// A bare repository with a three-commit first-parent chain (`root` -> `mid`
/// -> `tip`, the current `refs/heads/master`), a nested tree, and a
/// lightweight tag, built the way `vost`'s own test helpers build fixture
/// repositories directly with `git2`.
pub struct Fixture {
    pub repo: git2::Repository,
    pub tree: git2::Oid,
    pub root: git2::Oid,
    pub mid: git2::Oid,
    pub tip: git2::Oid,
}

pub fn build(dir: &Path) -> Fixture {
    let repo = git2::Repository::init_bare(dir).unwrap();

    let hello = repo.blob(b"hello world\n").unwrap();
    let mut sub_builder = repo.treebuilder(None).unwrap();
    let nested = repo.blob(b"nested contents\n").unwrap();
    sub_builder
        .insert("nested.txt", nested, gitfs::types::MODE_BLOB as i32)
        .unwrap();
    let sub_oid = sub_builder.write().unwrap();

    let mut root_builder = repo.treebuilder(None).unwrap();
    root_builder
        .insert("hello.txt", hello, gitfs::types::MODE_BLOB as i32)
        .unwrap();
    root_builder
        .insert("dir", sub_oid, gitfs::types::MODE_TREE as i32)
        .unwrap();
    let tree_oid = root_builder.write().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();

    let sig = git2::Signature::now("tester", "tester@example.com").unwrap();

    let root_oid = repo.commit(None, &sig, &sig, "root", &tree, &[]).unwrap();
    let root_commit = repo.find_commit(root_oid).unwrap();

    let mid_oid = repo
        .commit(None, &sig, &sig, "mid", &tree, &[&root_commit])
        .unwrap();
    let mid_commit = repo.find_commit(mid_oid).unwrap();

    let tip_oid = repo
        .commit(
            Some("refs/heads/master"),
            &sig,
            &sig,
            "tip",
            &tree,
            &[&mid_commit],
        )
        .unwrap();
    repo.set_head("refs/heads/master").unwrap();

    repo.tag_lightweight("v1", repo.find_object(root_oid, None).as_ref().unwrap(), false)
        .unwrap();
    repo.reference("refs/heads/other", tip_oid, false, "branch")
        .unwrap();

    Fixture {
        repo,
        tree: tree_oid,
        root: root_oid,
        mid: mid_oid,
        tip: tip_oid,
    }
}
