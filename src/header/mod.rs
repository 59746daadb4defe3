//! Header layer - declarations, content filters and the [`DataFile`] facade.
//!
//! The text grammar that turns header bytes into declarations is not part of
//! this crate; callers hand over [`ArrayDeclaration`] and [`DataDefinition`]
//! records. HyperSurface bodies declare themselves while being scanned, so
//! those files open without any records.
//!
//! # Example
//!
//! ```ignore
//! use ahds::prelude::*;
//!
//! let file = DataFile::builder(FileSource::new("lattice.am")?)
//!     .declarations(vec![ArrayDeclaration::new("Lattice", vec![64, 64, 32])])
//!     .definitions(vec![DataDefinition::new("Lattice", "Data", "byte", 1, 1)])
//!     .build()?;
//! let stream = file.stream(1)?;
//! let voxels = file.decode(&stream)?;
//! ```

mod declaration;
mod filter;
mod locate;

pub use declaration::{build_streams, ArrayDeclaration, ArrayLink, DataDefinition, FIELD_ALIAS};
pub use filter::{spreadsheet_columns, split_counter, ContentFilter, FilterRegistry, SPREADSHEET};
pub use locate::{locate_header, HeaderLocation};

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::core::{LoadPolicy, ReaderConfig};
use crate::scan::{ByteSource, Designation, FileSource, MmapSource};
use crate::stream::{ArrayArena, LedgerSetup, StreamDescriptor, StreamLedger};
use crate::util::{Result, TypedArray};

/// An open AmiraMesh or HyperSurface file.
///
/// The stream ledger sits behind a mutex, so a `DataFile` can be shared
/// between threads; scans are serialised.
pub struct DataFile {
    designation: Designation,
    header_len: u64,
    header_text: String,
    ledger: Mutex<StreamLedger>,
}

impl fmt::Debug for DataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // try_lock: a scan in progress on another thread must not block formatting
        f.debug_struct("DataFile")
            .field("designation", &self.designation)
            .field("header_len", &self.header_len)
            .field("policy", &self.ledger.try_lock().map(|l| l.policy()))
            .finish_non_exhaustive()
    }
}

impl DataFile {
    /// Open a file on disk with the given reader options.
    pub fn open(path: impl AsRef<Path>, config: &ReaderConfig) -> Result<Self> {
        let source: Arc<dyn ByteSource> = if config.use_mmap {
            Arc::new(MmapSource::new(path)?)
        } else {
            Arc::new(FileSource::new(path)?)
        };
        DataFileBuilder::new(source).config(config.clone()).build()
    }

    pub fn builder<S: ByteSource + 'static>(source: S) -> DataFileBuilder {
        DataFileBuilder::new(Arc::new(source))
    }

    pub fn designation(&self) -> &Designation {
        &self.designation
    }

    /// Offset of the first body byte.
    pub fn header_len(&self) -> u64 {
        self.header_len
    }

    /// Header text; empty when the header location was supplied by the caller.
    pub fn header_text(&self) -> &str {
        &self.header_text
    }

    pub fn policy(&self) -> LoadPolicy {
        self.ledger.lock().policy()
    }

    /// Descriptor of stream `index`.
    pub fn stream(&self, index: usize) -> Result<Arc<StreamDescriptor>> {
        self.ledger.lock().stream(index)
    }

    /// Descriptor named `field` in `array` (`"Patch2"`, `"Triangles"`).
    pub fn stream_by_name(&self, array: &str, field: &str) -> Result<Arc<StreamDescriptor>> {
        self.ledger.lock().stream_by_name(array, field)
    }

    /// Descriptors known so far, in index order.
    pub fn streams(&self) -> Vec<Arc<StreamDescriptor>> {
        self.ledger.lock().streams().cloned().collect()
    }

    /// Snapshot of the declared and discovered arrays.
    pub fn arrays(&self) -> ArrayArena {
        self.ledger.lock().arrays().clone()
    }

    /// Encoded payload of `desc`, read on first use.
    pub fn load<'a>(&self, desc: &'a StreamDescriptor) -> Result<&'a [u8]> {
        desc.get_or_load(&mut self.ledger.lock())
    }

    /// Decoded array of `desc`, loaded and decoded on first use.
    pub fn decode<'a>(&self, desc: &'a StreamDescriptor) -> Result<&'a TypedArray> {
        desc.get_or_decode(&mut self.ledger.lock())
    }

    /// Attach every stream of the body, whatever the policy.
    pub fn load_all(&self) -> Result<()> {
        self.ledger.lock().load_all()
    }

    /// Load every stream, then decode them in parallel.
    pub fn decode_all(&self) -> Result<()> {
        let (decoder, streams) = {
            let mut ledger = self.ledger.lock();
            ledger.check_policy()?;
            ledger.load_all()?;
            let streams: Vec<Arc<StreamDescriptor>> = ledger.streams().cloned().collect();
            (*ledger.decoder(), streams)
        };
        streams
            .par_iter()
            .filter(|d| d.is_loaded())
            .try_for_each(|d| d.decode_with(&decoder).map(|_| ()))
    }

    /// Payload offset of `index` once loaded, else the ledger cursor.
    pub fn stream_offset(&self, index: usize) -> Result<u64> {
        self.ledger.lock().stream_offset(index)
    }

    pub fn set_stream_offset(&self, index: usize, offset: u64) -> Result<()> {
        self.ledger.lock().set_stream_offset(index, offset)
    }
}

/// Builder for [`DataFile`].
pub struct DataFileBuilder {
    source: Arc<dyn ByteSource>,
    config: ReaderConfig,
    declarations: Vec<ArrayDeclaration>,
    definitions: Vec<DataDefinition>,
    content_type: Option<String>,
    filters: FilterRegistry,
    header: Option<(Designation, u64)>,
    offsets: Vec<(usize, u64)>,
}

impl DataFileBuilder {
    pub fn new(source: Arc<dyn ByteSource>) -> Self {
        Self {
            source,
            config: ReaderConfig::default(),
            declarations: Vec::new(),
            definitions: Vec::new(),
            content_type: None,
            filters: FilterRegistry::default(),
            header: None,
            offsets: Vec::new(),
        }
    }

    pub fn load_policy(mut self, policy: LoadPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    pub fn config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn declarations(mut self, declarations: Vec<ArrayDeclaration>) -> Self {
        self.declarations = declarations;
        self
    }

    pub fn definitions(mut self, definitions: Vec<DataDefinition>) -> Self {
        self.definitions = definitions;
        self
    }

    /// `ContentType` parameter of the header, selects a declaration filter.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    /// Skip header location; the body starts at `header_len`.
    pub fn header(mut self, designation: Designation, header_len: u64) -> Self {
        self.header = Some((designation, header_len));
        self
    }

    /// Seed a stream offset already known from the header.
    pub fn stream_offset(mut self, index: usize, offset: u64) -> Self {
        self.offsets.push((index, offset));
        self
    }

    pub fn build(self) -> Result<DataFile> {
        self.config.validate()?;
        let (designation, header_len, header_text) = match self.header {
            Some((designation, header_len)) => (designation, header_len, String::new()),
            None => {
                let loc = locate_header(self.source.as_ref(), self.config.chunk_size)?;
                (loc.designation, loc.header_len, loc.text)
            }
        };

        let content_type = self.content_type.or_else(|| designation.content_type.clone());
        let declarations = self.filters.apply(content_type.as_deref(), &self.declarations);
        let (arrays, streams) = build_streams(&declarations, &self.definitions)?;

        let mut ledger = StreamLedger::new(LedgerSetup {
            format: designation.format,
            encoding: designation.encoding,
            policy: self.config.policy,
            source: self.source,
            chunk_size: self.config.chunk_size,
            header_len,
            arrays,
            streams,
        })?;
        for (index, offset) in self.offsets {
            ledger.set_stream_offset(index, offset)?;
        }
        if self.config.policy == LoadPolicy::Immediate {
            ledger.load_all()?;
        }
        tracing::debug!(
            format = %designation.format,
            policy = %self.config.policy,
            header_len,
            streams = ledger.streams().count(),
            "opened data file"
        );

        Ok(DataFile { designation, header_len, header_text, ledger: Mutex::new(ledger) })
    }
}
