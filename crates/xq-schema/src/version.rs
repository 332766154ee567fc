//! Parsing of combined `<name>-<version>_<revision>` package identifiers.

use thiserror::Error;

/// Why a `pkgver` string could not be split.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The input was empty.
    #[error("name is empty")]
    Empty,

    /// No `_<integer>` suffix.
    #[error("revision not found")]
    NoRevision,

    /// No `-` before the revision separator.
    #[error("version not found")]
    NoVersion,
}

/// The three parts of a `pkgver` string, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionedName<'a> {
    /// Package name (`occt-32bit`).
    pub name: &'a str,
    /// Upstream version (`7.2.0p1`).
    pub version: &'a str,
    /// Package revision (`1`).
    pub revision: u32,
}

/// Split a combined identifier right-to-left.
///
/// Only the last `_` and the last `-` before it are significant, so versions
/// may contain `-`, `_`, `+` and epoch `:` separators.
///
/// ```
/// use xq_schema::parse_versioned_name;
///
/// let v = parse_versioned_name("telepathy-mission-control-32bit-5:5.16.1_2").unwrap();
/// assert_eq!(v.name, "telepathy-mission-control-32bit");
/// assert_eq!(v.version, "5:5.16.1");
/// assert_eq!(v.revision, 2);
/// ```
///
/// # Errors
///
/// Returns [`VersionError::NoRevision`] when there is no `_` or the suffix is
/// not an integer, and [`VersionError::NoVersion`] when no `-` precedes it.
pub fn parse_versioned_name(s: &str) -> Result<VersionedName<'_>, VersionError> {
    if s.is_empty() {
        return Err(VersionError::Empty);
    }

    let rev_idx = s.rfind('_').ok_or(VersionError::NoRevision)?;
    let ver_idx = s[..rev_idx].rfind('-').ok_or(VersionError::NoVersion)?;

    let revision = s[rev_idx + 1..]
        .parse::<u32>()
        .map_err(|_| VersionError::NoRevision)?;

    Ok(VersionedName {
        name: &s[..ver_idx],
        version: &s[ver_idx + 1..rev_idx],
        revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_table() {
        let cases = [
            ("mac-32bit-3.99u4b5s7_2", "mac-32bit", "3.99u4b5s7", 2),
            ("navit-32bit-0.5.1+rc1_1", "navit-32bit", "0.5.1+rc1", 1),
            ("occt-32bit-7.2.0p1_1", "occt-32bit", "7.2.0p1", 1),
            ("occt-devel-32bit-7.2.0p1_1", "occt-devel-32bit", "7.2.0p1", 1),
            ("openjdk-jre-32bit-8u182b00_1", "openjdk-jre-32bit", "8u182b00", 1),
            ("qpdfview-32bit-0.4.17beta1_1", "qpdfview-32bit", "0.4.17beta1", 1),
            (
                "telepathy-mission-control-32bit-5:5.16.1_2",
                "telepathy-mission-control-32bit",
                "5:5.16.1",
                2,
            ),
            ("tsocks-32bit-1.8beta5_3", "tsocks-32bit", "1.8beta5", 3),
            ("vapoursynth-32bit-R43_1", "vapoursynth-32bit", "R43", 1),
        ];

        for (input, name, version, revision) in cases {
            let parsed = parse_versioned_name(input)
                .unwrap_or_else(|e| panic!("cannot parse {input:?}: {e}"));
            assert_eq!(parsed.name, name, "name of {input:?}");
            assert_eq!(parsed.version, version, "version of {input:?}");
            assert_eq!(parsed.revision, revision, "revision of {input:?}");
        }
    }

    #[test]
    fn underscore_inside_version() {
        let parsed = parse_versioned_name("python3-foo_bar-1.0_beta-2_4").unwrap();
        assert_eq!(parsed.name, "python3-foo_bar-1.0_beta");
        assert_eq!(parsed.version, "2");
        assert_eq!(parsed.revision, 4);
    }

    #[test]
    fn missing_revision() {
        assert_eq!(
            parse_versioned_name("foo-1.0"),
            Err(VersionError::NoRevision)
        );
        assert_eq!(
            parse_versioned_name("foo-1.0_x"),
            Err(VersionError::NoRevision)
        );
        assert_eq!(parse_versioned_name("foo-1.0_"), Err(VersionError::NoRevision));
    }

    #[test]
    fn missing_version() {
        assert_eq!(parse_versioned_name("foo_1"), Err(VersionError::NoVersion));
        // A dash after the last underscore does not count.
        assert_eq!(parse_versioned_name("foo_1-2"), Err(VersionError::NoVersion));
    }

    #[test]
    fn empty_input() {
        assert_eq!(parse_versioned_name(""), Err(VersionError::Empty));
    }
}
