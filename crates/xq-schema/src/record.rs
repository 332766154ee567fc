//! Package records as decoded from `index.plist` and served as JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ETag;

/// One dictionary entry of `index.plist`, exactly as the repository ships it.
///
/// Keys follow the repodata spelling (`build-date`, `installed_size`, ...).
/// Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPackage {
    /// Combined `<name>-<version>_<revision>` identifier.
    #[serde(rename = "pkgver", default)]
    pub pkgver: String,
    /// Target architecture of the binary package.
    #[serde(default)]
    pub architecture: String,
    /// Repository the entry was installed from (only present in pkgdb-style dumps).
    #[serde(default)]
    pub repository: String,
    /// Build timestamp, parsed from `2018-09-01 12:34 UTC`.
    #[serde(rename = "build-date", default, deserialize_with = "de_build_date")]
    pub build_date: Option<DateTime<Utc>>,
    /// Enabled build options, space separated.
    #[serde(rename = "build-options", default)]
    pub build_options: String,
    /// Hex sha256 of the binary package file.
    #[serde(rename = "filename-sha256", default)]
    pub filename_sha256: String,
    /// Size in bytes of the binary package file.
    #[serde(rename = "filename-size", default)]
    pub filename_size: u64,
    /// Upstream homepage.
    #[serde(default)]
    pub homepage: String,
    /// Installed size in bytes.
    #[serde(default)]
    pub installed_size: u64,
    /// License expression.
    #[serde(default)]
    pub license: String,
    /// `Name <email>` of the package maintainer.
    #[serde(default)]
    pub maintainer: String,
    /// One-line description.
    #[serde(default)]
    pub short_desc: String,
    /// Keep files on removal.
    #[serde(default)]
    pub preserve: bool,
    /// `<template>:<commit>` the package was built from.
    #[serde(rename = "source-revisions", default)]
    pub source_revisions: String,
    /// Runtime dependency patterns.
    #[serde(default)]
    pub run_depends: Vec<String>,
    /// Shared libraries the package links against.
    #[serde(rename = "shlib-requires", default)]
    pub shlib_requires: Vec<String>,
    /// Shared libraries the package ships.
    #[serde(rename = "shlib-provides", default)]
    pub shlib_provides: Vec<String>,
    /// Packages that cannot be installed alongside.
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// Versions this package supersedes.
    #[serde(default)]
    pub reverts: Vec<String>,
    /// Packages this one replaces.
    #[serde(default)]
    pub replaces: Vec<String>,
    /// Alternatives groups mapped to their symlinks.
    #[serde(default)]
    pub alternatives: BTreeMap<String, Vec<String>>,
    /// Configuration files kept across updates.
    #[serde(default)]
    pub conf_files: Vec<String>,
}

/// Parse the repodata timestamp layout: `2018-09-01 12:34 UTC`.
///
/// The trailing zone abbreviation is ignored; repodata is always stamped in UTC.
///
/// # Errors
///
/// Returns the chrono parse error when the date/time part is malformed.
pub fn parse_build_date(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let s = s.trim();
    let stamp = match s.rsplit_once(' ') {
        Some((head, zone)) if zone.chars().all(|c| c.is_ascii_alphabetic()) => head,
        _ => s,
    };

    NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S"))
        .map(|naive| naive.and_utc())
}

fn de_build_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_build_date(&s)
        .map(Some)
        .map_err(|e| serde::de::Error::custom(format!("invalid build-date {s:?}: {e}")))
}

/// One package version's metadata, owned by a single per-architecture store.
///
/// The JSON form omits empty fields. Fields marked `serde(skip)` are engine
/// state and never leave the process.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Record {
    /// Combined identifier the record was parsed from.
    #[serde(skip)]
    pub pkgver: String,

    /// Package name (the dictionary key).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Version part of `pkgver`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Revision part of `pkgver`.
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub revision: u32,

    /// Repository label the record was loaded under.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub repository: String,
    /// Target architecture of the binary package.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub architecture: String,
    /// Build timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_date: Option<DateTime<Utc>>,
    /// Enabled build options, space separated.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub build_options: String,
    /// Hex sha256 of the binary package file.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filename_sha256: String,
    /// Size in bytes of the binary package file.
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub filename_size: u64,
    /// Upstream homepage.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub homepage: String,
    /// Installed size in bytes.
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub installed_size: u64,
    /// License expression.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub license: String,
    /// `Name <email>` of the package maintainer.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub maintainer: String,
    /// One-line description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub short_desc: String,
    /// Keep files on removal.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub preserve: bool,

    /// `<template>:<commit>` the package was built from.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_revisions: String,

    /// Runtime dependency patterns.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub run_depends: Vec<String>,
    /// Shared libraries the package links against.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shlib_requires: Vec<String>,
    /// Shared libraries the package ships.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shlib_provides: Vec<String>,
    /// Packages that cannot be installed alongside.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
    /// Versions this package supersedes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reverts: Vec<String>,
    /// Packages this one replaces.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replaces: Vec<String>,
    /// Alternatives groups mapped to their symlinks.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub alternatives: BTreeMap<String, Vec<String>>,
    /// Configuration files kept across updates.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conf_files: Vec<String>,

    /// Lower-cased `pkgver`, matched by substring queries.
    #[serde(skip)]
    pub search_pkgver: String,
    /// Lower-cased `short_desc`, matched by substring queries.
    #[serde(skip)]
    pub search_short_desc: String,

    /// Slot of this record in its store's ordered index.
    #[serde(skip)]
    pub index: usize,
    /// Tag over the serialized fields above.
    #[serde(skip)]
    pub etag: ETag,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

impl Record {
    /// Query-result projection of this record.
    pub fn short(&self) -> ShortRecord {
        ShortRecord {
            name: self.name.clone(),
            version: self.version.clone(),
            revision: self.revision,
            short_desc: self.short_desc.clone(),
        }
    }
}

/// Compact query result entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortRecord {
    /// Package name.
    pub name: String,
    /// Version part of `pkgver`.
    pub version: String,
    /// Revision part of `pkgver`.
    pub revision: u32,
    /// One-line description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub short_desc: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_date_layout() {
        let t = parse_build_date("2018-09-01 12:34 UTC").unwrap();
        assert_eq!(t.to_rfc3339(), "2018-09-01T12:34:00+00:00");

        let t = parse_build_date("2020-01-02 03:04:05").unwrap();
        assert_eq!(t.to_rfc3339(), "2020-01-02T03:04:05+00:00");

        assert!(parse_build_date("yesterday").is_err());
    }

    #[test]
    fn json_omits_empty_and_internal_fields() {
        let record = Record {
            pkgver: "foo-1.0_1".into(),
            name: "foo".into(),
            version: "1.0".into(),
            revision: 1,
            search_pkgver: "foo-1.0_1".into(),
            index: 7,
            ..Record::default()
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "foo", "version": "1.0", "revision": 1})
        );
    }

    #[test]
    fn short_projection() {
        let record = Record {
            name: "foo".into(),
            version: "1.0".into(),
            revision: 2,
            short_desc: "A foo".into(),
            license: "MIT".into(),
            ..Record::default()
        };
        let json = serde_json::to_value(record.short()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "foo", "version": "1.0", "revision": 2, "short_desc": "A foo"})
        );
    }
}
