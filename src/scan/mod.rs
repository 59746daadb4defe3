//! Scan layer - locating stream boundaries in the file body.
//!
//! This module provides:
//! - [`ByteSource`] - File, mmap, memory and non-seekable sources
//! - [`DelimiterScanner`] - Chunked, rescan-safe token search
//! - [`MarkerGrammar`] - AmiraMesh `@N` markers
//! - [`HyperGrammar`] / [`NestingTracker`] - HyperSurface labels and groups
//! - [`parse_designation`] - First line of a data file

mod format;
mod source;
mod scanner;
mod amira;
mod hypersurface;

pub use format::{parse_designation, rescan_overlap, Designation, FileFormat};
pub use source::{skip_to, ByteSource, FileSource, MemorySource, MmapSource, ReaderSource, SourceReader};
pub use scanner::{DelimiterScanner, ScanStep, Token};
pub use amira::{MarkerGrammar, MARKER_MAX_LEN};
pub use hypersurface::{
    Directive, HyperGrammar, InlineValue, LabelRule, LabelTable, NestingTracker, Owner, Scope, Target,
};
