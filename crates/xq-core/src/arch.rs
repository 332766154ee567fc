//! Architecture index and repodata path discovery.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;
use xq_schema::{ETag, ETagBuilder, REPODATA_SUFFIX};

use crate::error::{RepoError, Result};
use crate::repodata::RepoData;

/// Walked roots under which repository labels are never inferred.
pub const SYSTEM_REPODATA_DIRS: &[&str] = &["/var/db/xbps"];

const CURRENT_MARKER: &str = "_current_";
const CURRENT_SEGMENT: &str = "current";

/// Every loaded architecture, keyed by name.
#[derive(Debug)]
pub struct ArchIndex {
    archs: HashMap<String, RepoData>,
    names: Vec<String>,
    etag: ETag,
}

impl Default for ArchIndex {
    fn default() -> Self {
        let mut index = Self {
            archs: HashMap::new(),
            names: Vec::new(),
            etag: ETag::default(),
        };
        index.finish();
        index
    }
}

impl ArchIndex {
    /// Load every repodata file named by, or found under, `paths`.
    ///
    /// Directory walks follow symlinks. Entries below a walked root that
    /// cannot be read (dangling links, loops, permission errors) are skipped
    /// with a warning.
    ///
    /// # Errors
    ///
    /// The first file that fails to load aborts the build, as does a walked
    /// root that cannot be read. Paths that cannot be stat'ed are skipped
    /// with a warning.
    pub fn build<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut index = Self::default();
        for path in paths {
            index.load_path(path.as_ref())?;
        }
        index.finish();

        tracing::info!(
            archs = index.names.len(),
            packages = index.packages(),
            "repodata loaded"
        );
        Ok(index)
    }

    fn load_path(&mut self, path: &Path) -> Result<()> {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(path = %path.display(), "ignoring repodata path: stat failed: {err}");
                return Ok(());
            }
        };

        if meta.is_dir() {
            self.load_dir(path)
        } else {
            self.load_file(path, None)
        }
    }

    fn load_dir(&mut self, root: &Path) -> Result<()> {
        tracing::debug!(root = %root.display(), "walking for repodata files");

        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) if source.depth() == 0 => {
                    return Err(RepoError::Walk {
                        path: root.to_path_buf(),
                        source,
                    });
                }
                Err(err) => {
                    let path = err.path().unwrap_or(root);
                    tracing::warn!(path = %path.display(), "skipping unreadable entry: {err}");
                    continue;
                }
            };
            if entry.file_type().is_file() && has_repodata_suffix(entry.path()) {
                files.push(entry.into_path());
            }
        }

        for file in files {
            self.load_file(&file, Some(root))?;
        }
        Ok(())
    }

    fn load_file(&mut self, path: &Path, root: Option<&Path>) -> Result<()> {
        let arch = arch_from_path(path).ok_or_else(|| RepoError::BadPath(path.to_path_buf()))?;
        let repo = repository_from_path(path, root);

        tracing::info!(path = %path.display(), arch, repo = repo.as_deref(), "loading repodata");

        let rd = self.archs.entry(arch.to_string()).or_insert_with(RepoData::new);
        let before = rd.len();
        rd.load_repo(path, repo.as_deref()).map_err(|err| err.at(path))?;

        tracing::debug!(
            path = %path.display(),
            new_packages = rd.len() - before,
            "merged repodata"
        );
        Ok(())
    }

    fn finish(&mut self) {
        let mut names: Vec<String> = self.archs.keys().cloned().collect();
        names.sort();

        let mut builder = ETagBuilder::new(names.len());
        for name in &names {
            builder.member(name, self.archs[name].etag());
        }
        self.etag = builder.finish();
        self.names = names;
    }

    /// Store for `name`, if loaded.
    pub fn arch(&self, name: &str) -> Option<&RepoData> {
        self.archs.get(name)
    }

    /// Architecture names in ascending order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Tag over the architecture names and each store's tag.
    pub fn etag(&self) -> &ETag {
        &self.etag
    }

    /// Total number of packages across all architectures.
    pub fn packages(&self) -> usize {
        self.archs.values().map(RepoData::len).sum()
    }

    /// True when no architecture is loaded.
    pub fn is_empty(&self) -> bool {
        self.archs.is_empty()
    }

    /// Split into per-architecture stores, e.g. to attach search handles.
    pub fn into_archs(self) -> HashMap<String, RepoData> {
        self.archs
    }

    /// Reassemble from stores taken out with [`into_archs`](Self::into_archs).
    pub fn from_archs(archs: HashMap<String, RepoData>) -> Self {
        let mut index = Self {
            archs,
            names: Vec::new(),
            etag: ETag::default(),
        };
        index.finish();
        index
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn has_repodata_suffix(path: &Path) -> bool {
    arch_from_path(path).is_some()
}

/// `x86_64` for `.../x86_64-repodata`.
pub fn arch_from_path(path: &Path) -> Option<&str> {
    path.file_name()?
        .to_str()?
        .strip_suffix(REPODATA_SUFFIX)
        .filter(|arch| !arch.is_empty())
}

/// Repository label implied by where a repodata file lives.
///
/// A parent directory named `<anything>_current_<label>` gives `<label>` with
/// `_` read as `/`. Otherwise, when the file was found under `root`, the
/// directories after a `current` segment form the label. Roots listed in
/// [`SYSTEM_REPODATA_DIRS`] never yield a label.
///
/// Relative paths are resolved against the working directory first.
pub fn repository_from_path(path: &Path, root: Option<&Path>) -> Option<String> {
    let path = absolute(path);
    let root = root.map(absolute);
    if root
        .as_deref()
        .is_some_and(|r| SYSTEM_REPODATA_DIRS.iter().any(|s| r == Path::new(s)))
    {
        return None;
    }

    let parent = path.parent()?;
    if let Some(base) = parent.file_name().and_then(OsStr::to_str) {
        if let Some(at) = base.rfind(CURRENT_MARKER) {
            let label = &base[at + CURRENT_MARKER.len()..];
            if !label.is_empty() {
                return Some(label.replace('_', "/"));
            }
        }
    }

    let rel = parent.strip_prefix(root?).ok()?;
    let mut segments = rel.components().filter_map(|c| match c {
        Component::Normal(s) => s.to_str(),
        _ => None,
    });
    segments.find(|s| *s == CURRENT_SEGMENT)?;

    let label = segments.collect::<Vec<_>>().join("/");
    (!label.is_empty()).then_some(label)
}
