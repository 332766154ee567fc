//! Shared types and wire format for xq.
//!
//! Everything the HTTP layer serializes and everything the core engine hashes
//! lives here, so both sides agree on field names and cache tags.

pub mod etag;
pub mod record;
pub mod version;

// Re-exports
pub use etag::{ETag, ETagBuilder};
pub use record::{RawPackage, Record, ShortRecord};
pub use version::{VersionError, VersionedName, parse_versioned_name};

/// Magic bytes for ZSTD compression (Little Endian: 0xFD2FB528 -> 28 B5 2F FD)
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Magic bytes of a gzip member header.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Name of the archive entry holding the package dictionary.
pub const REPO_INDEX_FILE: &str = "index.plist";

/// Suffix every repodata file name must carry (`x86_64-repodata`).
pub const REPODATA_SUFFIX: &str = "-repodata";

/// Repository label used when neither the caller nor the entry names one.
pub const DEFAULT_REPOSITORY: &str = "current";
