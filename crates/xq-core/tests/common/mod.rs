#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// One package entry for a fixture `index.plist`.
pub struct Pkg<'a> {
    pub name: &'a str,
    pub pkgver: &'a str,
    pub short_desc: &'a str,
    pub repository: Option<&'a str>,
}

impl<'a> Pkg<'a> {
    pub fn new(name: &'a str, pkgver: &'a str, short_desc: &'a str) -> Self {
        Self {
            name,
            pkgver,
            short_desc,
            repository: None,
        }
    }

    pub fn repository(mut self, repo: &'a str) -> Self {
        self.repository = Some(repo);
        self
    }
}

#[derive(Clone, Copy)]
pub enum Compression {
    Zstd,
    Gzip,
}

pub fn index_plist(pkgs: &[Pkg<'_>]) -> Vec<u8> {
    let mut root = plist::Dictionary::new();
    for pkg in pkgs {
        let mut entry = plist::Dictionary::new();
        entry.insert("pkgver".into(), pkg.pkgver.into());
        entry.insert("architecture".into(), "x86_64".into());
        entry.insert("short_desc".into(), pkg.short_desc.into());
        entry.insert("build-date".into(), "2021-03-04 05:06 UTC".into());
        entry.insert("installed_size".into(), plist::Value::Integer(4096_i64.into()));
        if let Some(repo) = pkg.repository {
            entry.insert("repository".into(), repo.into());
        }
        root.insert(pkg.name.into(), plist::Value::Dictionary(entry));
    }

    let mut buf = Vec::new();
    plist::Value::Dictionary(root)
        .to_writer_xml(&mut buf)
        .expect("failed to encode plist");
    buf
}

pub fn repodata(pkgs: &[Pkg<'_>], compression: Compression) -> Vec<u8> {
    let plist = index_plist(pkgs);

    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(plist.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "index.plist", &plist[..])
        .expect("failed to append entry");
    let tar = builder.into_inner().expect("failed to finish tar");

    match compression {
        Compression::Zstd => zstd::encode_all(&tar[..], 3).expect("failed to compress"),
        Compression::Gzip => {
            let mut enc =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(&tar).expect("failed to compress");
            enc.finish().expect("failed to compress")
        }
    }
}

/// Temporary repodata tree.
pub struct Tree {
    pub dir: TempDir,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a repodata archive at `rel` (e.g. `current/x86_64-repodata`).
    pub fn write(&self, rel: &str, pkgs: &[Pkg<'_>], compression: Compression) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create dirs");
        }
        std::fs::write(&path, repodata(pkgs, compression)).expect("failed to write repodata");
        path
    }
}
