//! Byte sources the scanner reads payloads from.
//!
//! A source hands out a fresh reader positioned at a given offset. The ledger
//! opens one per scan and drops it before returning, so no handle is held
//! open between requests.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;

use crate::util::{Error, Result};

/// Reader returned by [`ByteSource::open_at`].
pub type SourceReader = Box<dyn Read + Send>;

/// Random-access origin of file bytes.
pub trait ByteSource: Send + Sync {
    /// Open a reader positioned at `offset`.
    fn open_at(&self, offset: u64) -> Result<SourceReader>;

    /// Human readable origin, used in log output.
    fn describe(&self) -> String;
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })
}

/// Read and discard `offset` bytes. Used where seeking is unavailable.
pub fn skip_to<R: Read>(reader: &mut R, offset: u64) -> Result<()> {
    let skipped = io::copy(&mut reader.by_ref().take(offset), &mut io::sink())?;
    if skipped < offset {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("source ends at {} before offset {}", skipped, offset),
        )));
    }
    Ok(())
}

/// Plain file, seeked per open.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        open_file(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn open_at(&self, offset: u64) -> Result<SourceReader> {
        let mut file = open_file(&self.path)?;
        if let Err(e) = file.seek(SeekFrom::Start(offset)) {
            tracing::debug!(path = %self.path.display(), error = %e, "seek failed, skipping instead");
            let mut file = open_file(&self.path)?;
            skip_to(&mut file, offset)?;
            return Ok(Box::new(file));
        }
        Ok(Box::new(file))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Memory-mapped file. The mapping lives as long as the readers using it.
pub struct MmapSource {
    path: PathBuf,
}

impl MmapSource {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        open_file(&path)?;
        Ok(Self { path })
    }
}

struct MappedBytes(Mmap);

impl AsRef<[u8]> for MappedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl ByteSource for MmapSource {
    fn open_at(&self, offset: u64) -> Result<SourceReader> {
        let file = open_file(&self.path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Box::new(io::empty()));
        }
        // Safety: file is opened read-only and the mapping is never handed out mutably
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
        let mut cursor = Cursor::new(MappedBytes(mmap));
        cursor.set_position(offset);
        Ok(Box::new(cursor))
    }

    fn describe(&self) -> String {
        format!("mmap:{}", self.path.display())
    }
}

/// In-memory bytes, shared between readers.
#[derive(Clone)]
pub struct MemorySource {
    bytes: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl ByteSource for MemorySource {
    fn open_at(&self, offset: u64) -> Result<SourceReader> {
        let mut cursor = Cursor::new(SharedBytes(Arc::clone(&self.bytes)));
        cursor.set_position(offset);
        Ok(Box::new(cursor))
    }

    fn describe(&self) -> String {
        format!("memory:{} bytes", self.bytes.len())
    }
}

type ReaderFactory = dyn Fn() -> io::Result<SourceReader> + Send + Sync;

/// Non-seekable readers (pipes, decompressors). Every open starts a new
/// reader from the factory and reads-and-discards up to the offset.
pub struct ReaderSource {
    factory: Box<ReaderFactory>,
    label: String,
}

impl ReaderSource {
    pub fn new<F>(label: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> io::Result<SourceReader> + Send + Sync + 'static,
    {
        Self { factory: Box::new(factory), label: label.into() }
    }
}

impl ByteSource for ReaderSource {
    fn open_at(&self, offset: u64) -> Result<SourceReader> {
        let mut reader = (self.factory)()?;
        skip_to(&mut reader, offset)?;
        Ok(reader)
    }

    fn describe(&self) -> String {
        format!("stream:{}", self.label)
    }
}
