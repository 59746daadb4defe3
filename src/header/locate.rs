//! Locating the end of the text header.

use crate::scan::{parse_designation, ByteSource, DelimiterScanner, Designation};
use crate::stream::BodyGrammar;
use crate::util::Result;

/// Longest designation line accepted.
const DESIGNATION_MAX: usize = 4096;

/// Designation, header size and header text of a data file.
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderLocation {
    pub designation: Designation,
    /// Offset of the first body token; the ledger cursor starts here
    pub header_len: u64,
    /// Header bytes, for the header grammar
    pub text: String,
}

/// Scan from byte 0 for the first body token of the file's own grammar.
///
/// A file without any body token is all header.
pub fn locate_header(source: &dyn ByteSource, chunk_size: usize) -> Result<HeaderLocation> {
    let mut scanner = DelimiterScanner::new(source.open_at(0)?, 0, chunk_size, 0);
    let line = scanner.peek_line(DESIGNATION_MAX)?;
    let designation = parse_designation(&String::from_utf8_lossy(&line))?;

    let grammar = BodyGrammar::for_format(designation.format, designation.encoding)?;
    scanner.set_overlap(grammar.overlap());
    let pattern = match &grammar {
        BodyGrammar::Marker(g) => g.marker(),
        BodyGrammar::Hyper(g) => g.token(),
    };
    let step = scanner.next_token(pattern, None, 0)?;
    let header_len = match &step.token {
        Some(token) => token.start,
        None => step.payload_start + step.payload.len() as u64,
    };
    tracing::debug!(
        format = %designation.format,
        encoding = %designation.encoding,
        header_len,
        source = %source.describe(),
        "located header"
    );
    Ok(HeaderLocation {
        designation,
        header_len,
        text: String::from_utf8_lossy(&step.payload).into_owned(),
    })
}
