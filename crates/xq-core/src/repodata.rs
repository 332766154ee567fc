//! Per-architecture package store.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use xq_schema::{ETag, ETagBuilder, Record, ShortRecord};

use crate::decode::{PackageMap, build_record, decode_index};
use crate::error::Result;
use crate::filter;
use crate::io::extract::read_index_entry;
use crate::search::{SearchError, SearchHandle};

/// Every package of one architecture, ordered by name.
///
/// `index[i].index == i` and `root[index[i].name] == i` hold after every
/// merge. The store only grows; a reload builds a fresh one.
#[derive(Default)]
pub struct RepoData {
    root: HashMap<String, usize>,
    index: Vec<Record>,
    name_index: Vec<String>,
    etag: ETag,
    search: Option<Box<dyn SearchHandle>>,
}

impl std::fmt::Debug for RepoData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoData")
            .field("packages", &self.index.len())
            .field("etag", &self.etag)
            .field("search", &self.search.is_some())
            .finish_non_exhaustive()
    }
}

impl RepoData {
    /// Create an empty store.
    pub fn new() -> Self {
        let mut rd = Self::default();
        rd.etag = rd.compute_etag();
        rd
    }

    /// Open a repodata file and merge its packages.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or any step of
    /// [`read_repo`](Self::read_repo) fails.
    pub fn load_repo(&mut self, path: &Path, repo: Option<&str>) -> Result<()> {
        let mut file = File::open(path)?;
        self.read_repo(&mut file, repo)
    }

    /// Extract, decode and merge one repodata archive.
    ///
    /// # Errors
    ///
    /// Propagates archive, plist and pkgver errors. On error the store is
    /// left exactly as it was.
    pub fn read_repo<R: Read + Seek>(&mut self, source: &mut R, repo: Option<&str>) -> Result<()> {
        let bytes = read_index_entry(source)?;
        let packages = decode_index(&bytes)?;
        self.merge(packages, repo)
    }

    /// Merge freshly decoded packages by name.
    ///
    /// Existing names are replaced in their current slot, new names are
    /// appended, then the whole index is re-sorted and renumbered.
    ///
    /// # Errors
    ///
    /// Fails on the first entry whose record cannot be built. No record from
    /// `packages` is admitted in that case.
    pub fn merge(&mut self, packages: PackageMap, repo: Option<&str>) -> Result<()> {
        let records = packages
            .into_iter()
            .map(|(key, raw)| build_record(&key, raw, repo))
            .collect::<Result<Vec<_>>>()?;

        for mut record in records {
            if let Some(&slot) = self.root.get(&record.name) {
                record.index = slot;
                self.index[slot] = record;
            } else {
                record.index = self.index.len();
                self.root.insert(record.name.clone(), record.index);
                self.index.push(record);
            }
        }

        self.index.sort_by(|a, b| a.name.cmp(&b.name));

        self.name_index.clear();
        for (i, record) in self.index.iter_mut().enumerate() {
            record.index = i;
            self.root.insert(record.name.clone(), i);
            self.name_index.push(record.name.clone());
        }

        self.etag = self.compute_etag();
        Ok(())
    }

    fn compute_etag(&self) -> ETag {
        let mut builder = ETagBuilder::new(self.index.len());
        for record in &self.index {
            builder.member(&record.pkgver, &record.etag);
        }
        builder.finish()
    }

    /// Records in ascending name order.
    pub fn index(&self) -> &[Record] {
        &self.index
    }

    /// Package names in ascending order.
    pub fn name_index(&self) -> &[String] {
        &self.name_index
    }

    /// Number of packages.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True before any package was merged.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Collection tag over every record's `pkgver` and tag, in order.
    pub fn etag(&self) -> &ETag {
        &self.etag
    }

    /// Look up one package by name.
    pub fn package(&self, name: &str) -> Option<&Record> {
        self.root.get(name).map(|&i| &self.index[i])
    }

    /// Case-insensitive substring search over `pkgver` and `short_desc`.
    ///
    /// An empty query returns the whole index.
    pub fn filter_text(&self, text: &str) -> Vec<&Record> {
        let needle = text.to_lowercase();
        if needle.is_empty() {
            return self.index.iter().collect();
        }

        filter::filter(&self.index, |r| {
            r.search_pkgver.contains(&needle) || r.search_short_desc.contains(&needle)
        })
    }

    /// [`filter_text`](Self::filter_text) projected to query results.
    pub fn query(&self, text: &str) -> Vec<ShortRecord> {
        self.filter_text(text).into_iter().map(Record::short).collect()
    }

    /// Attach a full-text handle built from this store's index.
    pub fn set_search(&mut self, handle: Box<dyn SearchHandle>) {
        self.search = Some(handle);
    }

    /// True once a full-text handle is attached.
    pub fn has_search(&self) -> bool {
        self.search.is_some()
    }

    /// Ranked full-text search. `None` when no handle is attached.
    ///
    /// # Errors
    ///
    /// Returns the handle's error for an unparsable query.
    pub fn search(&self, text: &str, limit: usize) -> Option<Result<Vec<&Record>, SearchError>> {
        let handle = self.search.as_ref()?;
        Some(handle.search(text, limit).map(|slots| {
            slots
                .into_iter()
                .filter_map(|slot| self.index.get(slot))
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xq_schema::RawPackage;

    fn raw(pkgver: &str, desc: &str) -> RawPackage {
        RawPackage {
            pkgver: pkgver.into(),
            short_desc: desc.into(),
            architecture: "x86_64".into(),
            ..RawPackage::default()
        }
    }

    fn map(entries: &[(&str, &str, &str)]) -> PackageMap {
        entries
            .iter()
            .map(|(key, pkgver, desc)| ((*key).to_string(), raw(pkgver, desc)))
            .collect()
    }

    fn assert_invariants(rd: &RepoData) {
        assert_eq!(rd.root.len(), rd.index.len());
        assert_eq!(rd.name_index.len(), rd.index.len());
        for (i, record) in rd.index.iter().enumerate() {
            assert_eq!(record.index, i);
            assert_eq!(rd.root[&record.name], i);
            assert_eq!(rd.name_index[i], record.name);
        }
        assert!(rd.name_index.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn merge_sorts_and_numbers() {
        let mut rd = RepoData::new();
        rd.merge(
            map(&[
                ("zsh", "zsh-5.8_1", "Z shell"),
                ("bash", "bash-5.1_2", "GNU Bourne Again Shell"),
                ("mksh", "mksh-R59c_1", "MirBSD Korn Shell"),
            ]),
            None,
        )
        .unwrap();

        assert_invariants(&rd);
        assert_eq!(rd.name_index(), ["bash", "mksh", "zsh"]);
        assert_eq!(rd.package("mksh").unwrap().version, "R59c");
    }

    #[test]
    fn merge_replaces_in_place_and_appends() {
        let mut rd = RepoData::new();
        rd.merge(
            map(&[("bash", "bash-5.1_1", ""), ("zsh", "zsh-5.8_1", "")]),
            None,
        )
        .unwrap();
        let before = rd.etag().clone();

        rd.merge(
            map(&[("bash", "bash-5.1_2", ""), ("dash", "dash-0.5_1", "")]),
            Some("nonfree"),
        )
        .unwrap();

        assert_invariants(&rd);
        assert_eq!(rd.len(), 3);
        assert_eq!(rd.package("bash").unwrap().revision, 2);
        assert_eq!(rd.package("bash").unwrap().repository, "nonfree");
        assert_eq!(rd.package("zsh").unwrap().repository, "current");
        assert_ne!(rd.etag(), &before);
    }

    #[test]
    fn failed_merge_admits_nothing() {
        let mut rd = RepoData::new();
        rd.merge(map(&[("bash", "bash-5.1_1", "")]), None).unwrap();
        let before = rd.etag().clone();

        let err = rd.merge(
            map(&[("aaa", "aaa-1_1", ""), ("broken", "broken", "")]),
            None,
        );
        assert!(err.is_err());
        assert_eq!(rd.len(), 1);
        assert!(rd.package("aaa").is_none());
        assert_eq!(rd.etag(), &before);
    }

    #[test]
    fn same_source_twice_is_idempotent() {
        let entries = [
            ("b", "b-1_1", "bee"),
            ("a", "a-1_1", "ay"),
            ("c", "c-2_1", "see"),
        ];

        let mut once = RepoData::new();
        once.merge(map(&entries), None).unwrap();

        let mut twice = RepoData::new();
        twice.merge(map(&entries), None).unwrap();
        twice.merge(map(&entries), None).unwrap();

        assert_eq!(once.name_index(), twice.name_index());
        assert_eq!(once.etag(), twice.etag());
        for (x, y) in once.index().iter().zip(twice.index()) {
            assert_eq!(x.index, y.index);
            assert_eq!(x.etag, y.etag);
        }
    }

    #[test]
    fn collection_tag_tracks_fields() {
        let mut a = RepoData::new();
        a.merge(map(&[("a", "a-1_1", "one"), ("b", "b-1_1", "two")]), None)
            .unwrap();
        let mut b = RepoData::new();
        b.merge(map(&[("a", "a-1_1", "one"), ("b", "b-1_1", "TWO")]), None)
            .unwrap();

        assert_eq!(a.etag(), &a.compute_etag());
        assert_ne!(a.etag(), b.etag());
    }

    #[test]
    fn empty_store_has_a_tag() {
        let rd = RepoData::new();
        assert!(!rd.etag().is_empty());
        assert!(rd.is_empty());
        assert!(rd.query("").is_empty());
    }

    #[test]
    fn query_matches_pkgver_and_description() {
        let mut rd = RepoData::new();
        rd.merge(
            map(&[
                ("zsh", "zsh-5.8_1", "Z shell"),
                ("bash", "bash-5.1_2", "GNU Bourne Again Shell"),
                ("vim", "vim-8.2_1", "Vi IMproved"),
            ]),
            None,
        )
        .unwrap();

        let names = |q: &str| -> Vec<String> { rd.query(q).into_iter().map(|s| s.name).collect() };

        assert_eq!(names(""), ["bash", "vim", "zsh"]);
        assert_eq!(names("SHELL"), ["bash", "zsh"]);
        assert_eq!(names("5.1"), ["bash"]);
        assert_eq!(names("improved"), ["vim"]);
        assert!(names("emacs").is_empty());
        assert!(rd.search("vim", 10).is_none());
    }
}
