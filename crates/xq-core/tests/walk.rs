//! Repository walk integration tests for xq-core.

mod common;

use common::{Compression, Pkg, Tree};
use xq_core::ArchIndex;

fn shells() -> Vec<Pkg<'static>> {
    vec![
        Pkg::new("zsh", "zsh-5.8_1", "Z shell"),
        Pkg::new("bash", "bash-5.1_2", "GNU Bourne Again Shell"),
    ]
}

#[cfg(unix)]
#[test]
fn test_unreadable_entries_do_not_abort_walk() {
    use std::os::unix::fs::symlink;

    let tree = Tree::new();
    tree.write("current/x86_64-repodata", &shells(), Compression::Zstd);
    symlink(tree.root().join("gone"), tree.root().join("current/dangling")).unwrap();
    symlink(tree.root(), tree.root().join("current/loop")).unwrap();

    let index = ArchIndex::build(&[tree.root()]).unwrap();
    assert_eq!(index.names(), ["x86_64"]);
    assert_eq!(index.arch("x86_64").unwrap().name_index(), ["bash", "zsh"]);
}

#[cfg(unix)]
#[test]
fn test_follows_symlinked_repodata() {
    use std::os::unix::fs::symlink;

    let store = Tree::new();
    let target = store.write("x86_64-repodata", &shells(), Compression::Gzip);
    let shared = store.write(
        "nonfree/aarch64-repodata",
        &[Pkg::new("unrar", "unrar-6.0_1", "RAR extractor")],
        Compression::Zstd,
    );

    let tree = Tree::new();
    std::fs::create_dir_all(tree.root().join("current")).unwrap();
    symlink(&target, tree.root().join("current/x86_64-repodata")).unwrap();
    symlink(shared.parent().unwrap(), tree.root().join("current/nonfree")).unwrap();

    let index = ArchIndex::build(&[tree.root()]).unwrap();
    assert_eq!(index.names(), ["aarch64", "x86_64"]);
    assert_eq!(index.arch("x86_64").unwrap().name_index(), ["bash", "zsh"]);
    assert_eq!(
        index.arch("aarch64").unwrap().package("unrar").unwrap().repository,
        "nonfree"
    );
}

#[test]
fn test_relative_path_keeps_marker_label() {
    let tree = Tree::new();
    tree.write(
        "mirror_current_nonfree/x86_64-repodata",
        &shells(),
        Compression::Zstd,
    );

    std::env::set_current_dir(tree.root().join("mirror_current_nonfree")).unwrap();
    let index = ArchIndex::build(&["x86_64-repodata"]).unwrap();

    let x86 = index.arch("x86_64").unwrap();
    assert_eq!(x86.package("bash").unwrap().repository, "nonfree");
}
