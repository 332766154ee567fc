//! Error taxonomy for loading and serving repodata.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use xq_schema::VersionError;

use crate::search::SearchError;

/// Everything that can go wrong turning repodata files into an index.
#[derive(Error, Debug)]
pub enum RepoError {
    /// Opening or reading a file failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The archive is not in the framing that was tried, or is corrupt.
    #[error("error parsing {framing} repodata: {source}")]
    Format {
        /// Framing that was being decoded.
        framing: &'static str,
        /// Decoder error.
        #[source]
        source: io::Error,
    },

    /// No framing yielded an `index.plist` entry.
    #[error("index not found: index.plist")]
    NoIndex,

    /// `index.plist` is not a dictionary of package dictionaries.
    #[error("malformed index.plist: {0}")]
    Plist(#[from] plist::Error),

    /// A `pkgver` could not be split.
    #[error("invalid pkgver {pkgver:?}: {source}")]
    Version {
        /// Offending identifier.
        pkgver: String,
        /// Underlying error.
        #[source]
        source: VersionError,
    },

    /// A record could not be serialized for tagging.
    #[error("unable to compute etag for {pkgver:?}: {source}")]
    ETag {
        /// Offending identifier.
        pkgver: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// An explicit file path lacks the `-repodata` suffix.
    #[error("{}: repodata files must end in -repodata", .0.display())]
    BadPath(PathBuf),

    /// Any of the above, with the file it came from.
    #[error("load {}: {source}", path.display())]
    Load {
        /// Repodata file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Box<RepoError>,
    },

    /// A walked root could not be read.
    #[error("walk {}: {source}", path.display())]
    Walk {
        /// Walked root.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: walkdir::Error,
    },

    /// Building an architecture's full-text index failed.
    #[error("search index for {arch}: {source}")]
    Search {
        /// Architecture being indexed.
        arch: String,
        /// Underlying error.
        #[source]
        source: SearchError,
    },

    /// A blocking build task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl RepoError {
    /// Wrap an error with the path of the repodata file it came from.
    pub fn at(self, path: impl Into<PathBuf>) -> Self {
        Self::Load {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

/// Result alias defaulting to [`RepoError`].
pub type Result<T, E = RepoError> = std::result::Result<T, E>;
