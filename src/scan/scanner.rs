//! Chunked, rescan-safe delimiter search.
//!
//! The scanner keeps a growing buffer of unread source bytes and looks for
//! the next boundary token in it. Bytes already proven token-free are never
//! searched again except for the trailing `overlap` window, which is wide
//! enough to catch a token split across two reads.
//!
//! Offsets reported by the scanner are absolute source offsets, even when
//! comment lines have been cut out of the buffer.

use std::io::{ErrorKind, Read};
use std::ops::Range;

use regex::bytes::Regex;

use super::source::SourceReader;
use crate::util::{Error, Result};

/// A boundary token found by [`DelimiterScanner::next_token`].
///
/// Capture groups a grammar does not define stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Token {
    /// Absolute offset of the first token byte
    pub start: u64,
    /// Absolute offset of the byte following the token
    pub end: u64,
    /// `@N` stream index
    pub index: Option<usize>,
    /// Section label
    pub label: Option<String>,
    /// Decimal count following the label
    pub count: Option<u64>,
    /// Free-form name following the label
    pub name: Option<String>,
    /// Number of opening braces closing the token
    pub braces: usize,
}

/// Result of one scanning step.
#[derive(Debug)]
pub struct ScanStep {
    /// Bytes preceding the token (comments removed), or the rest of the
    /// source when `token` is `None`.
    pub payload: Vec<u8>,
    /// Absolute offset of the first payload byte
    pub payload_start: u64,
    pub token: Option<Token>,
}

enum Hit {
    Token(Range<usize>),
    Comment(Range<usize>),
    Eof,
}

/// Chunked search over a source reader.
pub struct DelimiterScanner {
    reader: SourceReader,
    chunk_size: usize,
    overlap: usize,
    buffer: Vec<u8>,
    /// Absolute offset of `buffer[0]`
    origin: u64,
    /// Source bytes cut out of the buffer (comments) since the last drain
    stripped: u64,
    /// Buffer index below which no token can start
    safe: usize,
    /// Buffer index where `^` may match
    anchor: usize,
    eof: bool,
}

impl DelimiterScanner {
    /// Scan `reader`, whose first byte sits at absolute offset `origin`.
    pub fn new(reader: SourceReader, origin: u64, chunk_size: usize, overlap: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            overlap,
            buffer: Vec::with_capacity(chunk_size.max(1) + overlap),
            origin,
            stripped: 0,
            safe: 0,
            anchor: 0,
            eof: false,
        }
    }

    /// Absolute offset of the first unconsumed byte.
    #[inline]
    pub fn position(&self) -> u64 {
        self.origin
    }

    #[inline]
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Switch grammars mid-scan, e.g. once the designation line is known.
    pub fn set_overlap(&mut self, overlap: usize) {
        self.overlap = overlap;
    }

    /// True once the source is exhausted and the buffer is empty.
    pub fn at_end(&self) -> bool {
        self.eof && self.buffer.is_empty()
    }

    /// Append the next chunk. Returns the number of bytes read.
    fn fill(&mut self) -> Result<usize> {
        if self.eof {
            return Ok(0);
        }
        let len = self.buffer.len();
        self.buffer.resize(len + self.chunk_size, 0);
        let read = loop {
            match self.reader.read(&mut self.buffer[len..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buffer.truncate(len);
                    return Err(e.into());
                }
            }
        };
        self.buffer.truncate(len + read);
        if read == 0 {
            self.eof = true;
        }
        tracing::trace!(read, buffered = self.buffer.len(), "scanner fill");
        Ok(read)
    }

    /// Drain `buffer[..n]` and shift every index back to zero.
    fn drain(&mut self, n: usize) -> Vec<u8> {
        let out: Vec<u8> = self.buffer.drain(..n).collect();
        self.origin += n as u64 + self.stripped;
        self.stripped = 0;
        self.safe = 0;
        self.anchor = 0;
        out
    }

    #[inline]
    fn absolute(&self, idx: usize) -> u64 {
        self.origin + self.stripped + idx as u64
    }

    fn find(&self, pattern: &Regex, from: usize) -> Option<Range<usize>> {
        let hay = &self.buffer[self.anchor..];
        pattern
            .find_at(hay, from - self.anchor)
            .map(|m| m.start() + self.anchor..m.end() + self.anchor)
    }

    /// Search from `safe` for `pattern`, cutting out `comments` on the way.
    fn search(&mut self, pattern: &Regex, comments: Option<&Regex>) -> Result<Option<Range<usize>>> {
        loop {
            let from = self.safe.max(self.anchor);
            let token = self.find(pattern, from);
            let comment = comments.and_then(|c| self.find(c, from));

            let hit = match (token, comment) {
                (Some(t), Some(c)) if c.start < t.start => Hit::Comment(c),
                (Some(t), _) => Hit::Token(t),
                (None, Some(c)) => Hit::Comment(c),
                (None, None) => Hit::Eof,
            };

            match hit {
                Hit::Token(range) => return Ok(Some(range)),
                Hit::Comment(range) => {
                    if range.end == self.buffer.len() && !self.eof {
                        // comment may continue in the next chunk
                        self.safe = range.start;
                        self.fill()?;
                        continue;
                    }
                    let cut = range.end - range.start;
                    self.buffer.drain(range.clone());
                    self.stripped += cut as u64;
                    self.safe = range.start;
                }
                Hit::Eof => {
                    if self.eof {
                        return Ok(None);
                    }
                    let len = self.buffer.len();
                    self.safe = self.safe.max(len.saturating_sub(self.overlap)).max(self.anchor);
                    self.fill()?;
                }
            }
        }
    }

    /// Pull chunks until at least `n` bytes are buffered or the source ends.
    fn fill_to(&mut self, n: usize) -> Result<()> {
        while self.buffer.len() < n {
            if self.fill()? == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Find the next token of `pattern`.
    ///
    /// No token may start before `skip_hint` payload bytes; a token exactly
    /// at the hint may use `^` instead of a leading newline. At end of source
    /// the remaining bytes are returned with `token: None`.
    pub fn next_token(
        &mut self,
        pattern: &Regex,
        comments: Option<&Regex>,
        skip_hint: usize,
    ) -> Result<ScanStep> {
        if skip_hint > 0 {
            self.fill_to(skip_hint)?;
            self.anchor = skip_hint.min(self.buffer.len());
            self.safe = self.anchor;
        }
        let payload_start = self.origin;

        let Some(range) = self.search(pattern, comments)? else {
            let len = self.buffer.len();
            let payload = self.drain(len);
            return Ok(ScanStep { payload, payload_start, token: None });
        };

        let mut token = Token {
            start: self.absolute(range.start),
            end: self.absolute(range.end),
            ..Default::default()
        };
        let hay = &self.buffer[self.anchor..];
        if let Some(caps) = pattern.captures_at(hay, range.start - self.anchor) {
            if let Some(m) = caps.name("index") {
                token.index = Some(parse_decimal(m.as_bytes(), "stream index")? as usize);
            }
            if let Some(m) = caps.name("label") {
                token.label = Some(String::from_utf8_lossy(m.as_bytes()).into_owned());
            }
            if let Some(m) = caps.name("count") {
                token.count = Some(parse_decimal(m.as_bytes(), "item count")?);
            }
            if let Some(m) = caps.name("name") {
                let name = String::from_utf8_lossy(m.as_bytes()).trim().to_string();
                token.name = Some(name);
            }
            if let Some(m) = caps.name("open") {
                token.braces = m.as_bytes().iter().filter(|&&b| b == b'{').count();
            }
        }

        let payload = self.buffer[..range.start].to_vec();
        self.drain(range.end);
        Ok(ScanStep { payload, payload_start, token: Some(token) })
    }

    /// Take the next `n` bytes verbatim. Fewer are returned only at end of source.
    pub fn take_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        self.fill_to(n)?;
        let n = n.min(self.buffer.len());
        Ok(self.drain(n))
    }

    /// Take bytes up to the next `terminator` match, which stays buffered.
    pub fn take_until(&mut self, terminator: &Regex, comments: Option<&Regex>) -> Result<Vec<u8>> {
        let end = match self.search(terminator, comments)? {
            Some(range) => range.start,
            None => self.buffer.len(),
        };
        Ok(self.drain(end))
    }

    /// First line of the unread bytes, without consuming it.
    pub fn peek_line(&mut self, limit: usize) -> Result<Vec<u8>> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                return Ok(self.buffer[..pos].to_vec());
            }
            if self.buffer.len() >= limit || self.fill()? == 0 {
                let end = self.buffer.len().min(limit);
                return Ok(self.buffer[..end].to_vec());
            }
        }
    }
}

fn parse_decimal(digits: &[u8], what: &str) -> Result<u64> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::corrupt(format!("{} '{}' out of range", what, String::from_utf8_lossy(digits))))
}
