//! Core engine for xq.
//!
//! Reads `<arch>-repodata` archives into per-architecture stores, answers
//! substring and full-text queries over them, and publishes rebuilt indices
//! through [`Store`].

pub mod arch;
pub mod decode;
pub mod error;
pub mod filter;
pub mod io;
pub mod repodata;
pub mod search;
pub mod store;

pub use arch::ArchIndex;
pub use error::{RepoError, Result};
pub use repodata::RepoData;
pub use search::{SearchError, SearchHandle, SearchIndexer, TantivyIndexer};
pub use store::Store;
