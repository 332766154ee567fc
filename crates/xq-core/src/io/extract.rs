//! Repodata archive reader
//!
//! A repodata file is a tar archive compressed with zstd (current) or gzip
//! (older releases). The framing is detected by trying each decompressor in
//! turn, so a tree that mixes both loads without configuration.

use std::ffi::OsStr;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path};

use zstd::stream::Decoder as ZstdDecoder;

use xq_schema::{GZIP_MAGIC, REPO_INDEX_FILE, ZSTD_MAGIC};

use crate::error::{RepoError, Result};

/// Compression wrapped around the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Zstandard frame.
    Zstd,
    /// gzip member.
    Gzip,
}

impl Framing {
    /// Order in which framings are tried.
    pub const PRIORITY: [Framing; 2] = [Framing::Zstd, Framing::Gzip];

    /// Name used in logs and errors.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zstd => "zstd",
            Self::Gzip => "gzip",
        }
    }

    fn signature(self) -> &'static [u8] {
        match self {
            Self::Zstd => &ZSTD_MAGIC,
            Self::Gzip => &GZIP_MAGIC,
        }
    }

    fn decoder<'a, R: Read + 'a>(self, reader: BufReader<R>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Self::Zstd => Box::new(ZstdDecoder::with_buffer(reader)?),
            Self::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        })
    }
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of reading the source under one framing.
enum Attempt {
    Found(Vec<u8>),
    /// Header mismatch, truncation, or a clean archive without the entry.
    Skip(io::Error),
}

/// Errors that mean "this is not the framing we guessed".
fn is_wrong_framing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput
    )
}

fn is_index_entry(path: &Path) -> bool {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .eq([Component::Normal(OsStr::new(REPO_INDEX_FILE))])
}

/// Return the bytes of `index.plist` from a repodata archive.
///
/// # Errors
///
/// Returns [`RepoError::NoIndex`] if no framing yields the entry, or
/// [`RepoError::Format`] for a decode error that is not a framing mismatch.
pub fn read_index_entry<R: Read + Seek>(source: &mut R) -> Result<Vec<u8>> {
    for framing in Framing::PRIORITY {
        match read_framed(source, framing) {
            Ok(Attempt::Found(bytes)) => {
                tracing::trace!(%framing, bytes = bytes.len(), "read {REPO_INDEX_FILE}");
                return Ok(bytes);
            }
            Ok(Attempt::Skip(reason)) => {
                tracing::trace!(%framing, "framing rejected: {reason}");
            }
            Err(err) if is_wrong_framing(&err) => {
                tracing::trace!(%framing, "framing rejected: {err}");
            }
            Err(err) => {
                return Err(RepoError::Format {
                    framing: framing.as_str(),
                    source: err,
                });
            }
        }
    }

    Err(RepoError::NoIndex)
}

fn read_framed<R: Read + Seek>(source: &mut R, framing: Framing) -> io::Result<Attempt> {
    source.seek(SeekFrom::Start(0))?;

    let sig = framing.signature();
    let mut magic = [0u8; 4];
    let magic = &mut magic[..sig.len()];
    if let Err(err) = source.read_exact(magic) {
        return if err.kind() == io::ErrorKind::UnexpectedEof {
            Ok(Attempt::Skip(err))
        } else {
            Err(err)
        };
    }
    if magic != sig {
        return Ok(Attempt::Skip(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{framing} signature mismatch"),
        )));
    }

    source.seek(SeekFrom::Start(0))?;
    let decoder = Decoded::new(framing.decoder(BufReader::new(&mut *source))?);

    let mut archive = tar::Archive::new(decoder);
    match scan_entries(&mut archive) {
        Ok(Some(buf)) => Ok(Attempt::Found(buf)),
        Ok(None) => Ok(Attempt::Skip(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{REPO_INDEX_FILE} not in archive"),
        ))),
        Err(err) => match archive.into_inner().failure {
            // The decompressor failed; let the caller classify it.
            Some(decode_err) => Err(decode_err),
            // The stream decoded but the tar structure is corrupt.
            None => Ok(Attempt::Skip(err)),
        },
    }
}

fn scan_entries<R: Read>(archive: &mut tar::Archive<R>) -> io::Result<Option<Vec<u8>>> {
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !is_index_entry(&entry.path()?) {
            continue;
        }

        let mut buf = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut buf)?;
        return Ok(Some(buf));
    }
    Ok(None)
}

/// Remembers the first error raised by the decompressor, which the tar
/// layer may rewrap.
struct Decoded<R> {
    inner: R,
    failure: Option<io::Error>,
}

impl<R> Decoded<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            failure: None,
        }
    }
}

impl<R: Read> Read for Decoded<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|err| {
            if self.failure.is_none() {
                self.failure = Some(io::Error::new(err.kind(), err.to_string()));
            }
        })
    }
}
