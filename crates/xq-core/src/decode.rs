//! `index.plist` decoding.
//!
//! Decoding always lands in a fresh map; merging into an existing store is a
//! separate step (see [`crate::repodata::RepoData::merge`]).

use std::collections::BTreeMap;
use std::io::Cursor;

use xq_schema::{DEFAULT_REPOSITORY, ETag, RawPackage, Record, parse_versioned_name};

use crate::error::{RepoError, Result};

/// Package key (name) to raw dictionary, in key order.
pub type PackageMap = BTreeMap<String, RawPackage>;

/// Decode an XML or binary property list into a fresh package map.
///
/// # Errors
///
/// Returns [`RepoError::Plist`] if the payload is not a dictionary of
/// package dictionaries.
pub fn decode_index(bytes: &[u8]) -> Result<PackageMap> {
    Ok(plist::from_reader(Cursor::new(bytes))?)
}

/// Build a fully derived record from one raw entry.
///
/// `repo` is the caller-supplied repository label; when absent the entry's own
/// `repository` key is used, then [`DEFAULT_REPOSITORY`].
///
/// # Errors
///
/// Fails if `pkgver` cannot be split into version and revision, or if the
/// record cannot be serialized for tagging.
pub fn build_record(key: &str, raw: RawPackage, repo: Option<&str>) -> Result<Record> {
    let parsed = parse_versioned_name(&raw.pkgver).map_err(|source| RepoError::Version {
        pkgver: raw.pkgver.clone(),
        source,
    })?;
    let version = parsed.version.to_string();
    let revision = parsed.revision;

    let repository = match repo {
        Some(label) if !label.is_empty() => label.to_string(),
        _ if !raw.repository.is_empty() => raw.repository,
        _ => DEFAULT_REPOSITORY.to_string(),
    };

    // Naive case folding is enough: repodata is ASCII in practice.
    let search_pkgver = raw.pkgver.to_lowercase();
    let search_short_desc = raw.short_desc.to_lowercase();

    let mut record = Record {
        pkgver: raw.pkgver,
        name: key.to_string(),
        version,
        revision,
        repository,
        architecture: raw.architecture,
        build_date: raw.build_date,
        build_options: raw.build_options,
        filename_sha256: raw.filename_sha256,
        filename_size: raw.filename_size,
        homepage: raw.homepage,
        installed_size: raw.installed_size,
        license: raw.license,
        maintainer: raw.maintainer,
        short_desc: raw.short_desc,
        preserve: raw.preserve,
        source_revisions: raw.source_revisions,
        run_depends: raw.run_depends,
        shlib_requires: raw.shlib_requires,
        shlib_provides: raw.shlib_provides,
        conflicts: raw.conflicts,
        reverts: raw.reverts,
        replaces: raw.replaces,
        alternatives: raw.alternatives,
        conf_files: raw.conf_files,
        search_pkgver,
        search_short_desc,
        index: 0,
        etag: ETag::default(),
    };

    record.etag = ETag::of_json(&record).map_err(|source| RepoError::ETag {
        pkgver: record.pkgver.clone(),
        source,
    })?;

    Ok(record)
}
