//! AmiraMesh `@N` marker grammar.

use regex::bytes::Regex;

use super::format::rescan_overlap;
use crate::util::{Encoding, Error, Result};

/// Longest possible marker: newline, 16 blanks, `@`, 10 digits, 16 blanks, newline.
pub const MARKER_MAX_LEN: usize = 1 + 16 + 1 + 10 + 16 + 1;

const MARKER: &str = r"(?-u)(?:^|\n)[ \t\r\f\v]{0,16}@(?P<index>[0-9]{1,10})[ \t\r\f\v]{0,16}\n";
const COMMENT: &str = r"(?-u)#[^\n]*";

/// Flat numbered delimiter grammar.
#[derive(Clone, Debug)]
pub struct MarkerGrammar {
    marker: Regex,
    comments: Option<Regex>,
    overlap: usize,
}

impl MarkerGrammar {
    /// Binary bodies: markers only.
    pub fn binary() -> Result<Self> {
        Ok(Self {
            marker: compile(MARKER)?,
            comments: None,
            overlap: rescan_overlap(MARKER_MAX_LEN),
        })
    }

    /// ASCII bodies: markers plus `#` comment lines cut from payloads.
    pub fn ascii() -> Result<Self> {
        Ok(Self { comments: Some(compile(COMMENT)?), ..Self::binary()? })
    }

    pub fn for_encoding(encoding: Encoding) -> Result<Self> {
        if encoding.is_ascii() {
            Self::ascii()
        } else {
            Self::binary()
        }
    }

    #[inline]
    pub fn marker(&self) -> &Regex {
        &self.marker
    }

    #[inline]
    pub fn comments(&self) -> Option<&Regex> {
        self.comments.as_ref()
    }

    #[inline]
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

pub(crate) fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::other(format!("delimiter pattern: {}", e)))
}
