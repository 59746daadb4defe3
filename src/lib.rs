//! # ahds
//!
//! Lazy stream reader for AmiraMesh (`.am`) and HyperSurface (`.surf`) files.
//!
//! Both formats put a text header in front of one or more binary or ASCII
//! payload sections. The header declares arrays and data streams; this crate
//! finds the matching payload bytes in the body without reading the whole
//! file, and decodes them into typed arrays on first use.
//!
//! ## Modules
//!
//! - [`util`] - Error taxonomy, element types, shapes and decoded arrays
//! - [`core`] - Load policy, reader configuration, HxByteRLE and HxZip codecs
//! - [`scan`] - Byte sources, chunked delimiter scanner, body grammars
//! - [`stream`] - Stream descriptors, decoder and the forward-only ledger
//! - [`header`] - Declaration records, content filters and [`DataFile`]
//!
//! ## Example
//!
//! ```ignore
//! use ahds::prelude::*;
//!
//! let file = DataFile::builder(FileSource::new("heart.am")?)
//!     .load_policy(LoadPolicy::OnDemand)
//!     .declarations(vec![ArrayDeclaration::new("Nodes", vec![1024])])
//!     .definitions(vec![DataDefinition::new("Nodes", "Coordinates", "float", 3, 1)])
//!     .build()?;
//!
//! let coords = file.stream(1)?;
//! let values = file.decode(&coords)?;
//! println!("{} values, shape {:?}", values.len(), values.shape());
//! ```

pub mod util;
pub mod core;
pub mod scan;
pub mod stream;
pub mod header;

// Re-export commonly used types
pub use crate::util::{ElementType, Encoding, Error, Result, Shape, TypedArray};
pub use crate::core::{Compression, LoadPolicy, ReaderConfig};
pub use crate::header::{ArrayDeclaration, DataDefinition, DataFile, DataFileBuilder};
pub use crate::stream::{StreamDescriptor, StreamLedger};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{ArrayData, ElementType, Encoding, Error, Result, Shape, TypedArray};
    pub use crate::core::{Compression, LoadPolicy, ReaderConfig};
    pub use crate::scan::{ByteSource, FileFormat, FileSource, MemorySource, MmapSource, ReaderSource};
    pub use crate::stream::StreamDescriptor;
    pub use crate::header::{ArrayDeclaration, DataDefinition, DataFile, DataFileBuilder, FilterRegistry};
}

/// Crate version with build date and time.
pub fn build_info() -> String {
    format!(
        "ahds {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        env!("AHDS_BUILD_DATE"),
        env!("AHDS_BUILD_TIME")
    )
}
