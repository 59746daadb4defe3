//! Forward-only stream ledger.
//!
//! The ledger owns the per-file scanning state: a cursor to the first unread
//! byte past the header, the table of stream descriptors, and for
//! HyperSurface bodies the group nesting state. Every scan starts at the
//! cursor and moves it forward; each byte range is read from the source at
//! most once. Streams passed on the way to the requested one are attached
//! as a side effect.
//!
//! The ledger is not synchronised. [`DataFile`](crate::DataFile) wraps it in
//! a mutex.

use std::sync::Arc;

use crate::core::LoadPolicy;
use crate::scan::{
    ByteSource, DelimiterScanner, Directive, FileFormat, HyperGrammar, MarkerGrammar,
    NestingTracker, Owner, Token,
};
use crate::util::{Encoding, Error, Result, Shape};

use super::arrays::ArrayArena;
use super::decoder::StreamDecoder;
use super::descriptor::StreamDescriptor;

/// Next unread byte of the stream section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamCursor {
    At(u64),
    Eof,
}

/// Delimiter grammar of the body.
#[derive(Clone, Debug)]
pub enum BodyGrammar {
    Marker(Arc<MarkerGrammar>),
    Hyper(Arc<HyperGrammar>),
}

impl BodyGrammar {
    pub fn for_format(format: FileFormat, encoding: Encoding) -> Result<Self> {
        Ok(match format {
            FileFormat::AmiraMesh => Self::Marker(Arc::new(MarkerGrammar::for_encoding(encoding)?)),
            FileFormat::HyperSurface => Self::Hyper(Arc::new(HyperGrammar::hypersurface(encoding)?)),
        })
    }

    pub fn overlap(&self) -> usize {
        match self {
            Self::Marker(g) => g.overlap(),
            Self::Hyper(g) => g.overlap(),
        }
    }
}

/// What a HyperSurface scan is looking for.
enum Wanted<'a> {
    Index(usize),
    Named { array: &'a str, field: &'a str },
    End,
}

/// Construction parameters of a [`StreamLedger`].
pub struct LedgerSetup {
    pub format: FileFormat,
    pub encoding: Encoding,
    pub policy: LoadPolicy,
    pub source: Arc<dyn ByteSource>,
    pub chunk_size: usize,
    /// Offset of the first byte after the header
    pub header_len: u64,
    pub arrays: ArrayArena,
    /// Declared streams; indices must be unique and non-zero
    pub streams: Vec<StreamDescriptor>,
}

/// Per-file cursor and stream table.
pub struct StreamLedger {
    format: FileFormat,
    policy: LoadPolicy,
    source: Arc<dyn ByteSource>,
    grammar: BodyGrammar,
    decoder: StreamDecoder,
    chunk_size: usize,
    cursor: StreamCursor,
    /// Slot 0 is the "no stream" sentinel
    table: Vec<Option<Arc<StreamDescriptor>>>,
    arrays: ArrayArena,
    tracker: NestingTracker,
    /// Highest stream index passed so far
    last_index: usize,
    poisoned: Option<String>,
}

impl StreamLedger {
    pub fn new(setup: LedgerSetup) -> Result<Self> {
        if setup.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".into()));
        }
        let max = setup.streams.iter().map(StreamDescriptor::index).max().unwrap_or(0);
        let mut table: Vec<Option<Arc<StreamDescriptor>>> = vec![None; max + 1];
        for desc in setup.streams {
            let index = desc.index();
            if index == 0 {
                return Err(Error::corrupt(format!("stream '{}' uses reserved index 0", desc.name())));
            }
            if table[index].is_some() {
                return Err(Error::corrupt(format!("duplicate data descriptor @{}", index)));
            }
            table[index] = Some(Arc::new(desc));
        }

        Ok(Self {
            format: setup.format,
            policy: setup.policy,
            grammar: BodyGrammar::for_format(setup.format, setup.encoding)?,
            decoder: StreamDecoder::new(setup.encoding),
            source: setup.source,
            chunk_size: setup.chunk_size,
            cursor: StreamCursor::At(setup.header_len),
            table,
            arrays: setup.arrays,
            tracker: NestingTracker::new(),
            last_index: 0,
            poisoned: None,
        })
    }

    #[inline]
    pub fn format(&self) -> FileFormat {
        self.format
    }

    #[inline]
    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }

    #[inline]
    pub fn cursor(&self) -> StreamCursor {
        self.cursor
    }

    #[inline]
    pub fn decoder(&self) -> &StreamDecoder {
        &self.decoder
    }

    pub fn arrays(&self) -> &ArrayArena {
        &self.arrays
    }

    pub fn grammar(&self) -> &BodyGrammar {
        &self.grammar
    }

    /// Refuse loading and decoding under [`LoadPolicy::HeaderOnly`].
    pub fn check_policy(&self) -> Result<()> {
        if self.policy.allows_loading() {
            Ok(())
        } else {
            Err(Error::policy("streams are not loaded under the HeaderOnly policy"))
        }
    }

    /// Highest index with a table slot.
    pub fn max_index(&self) -> usize {
        self.table.len().saturating_sub(1)
    }

    /// All descriptors known so far, in index order.
    pub fn streams(&self) -> impl Iterator<Item = &Arc<StreamDescriptor>> {
        self.table.iter().flatten()
    }

    fn slot(&self, index: usize) -> Option<&Arc<StreamDescriptor>> {
        self.table.get(index).and_then(Option::as_ref)
    }

    /// Descriptor of `index`. HyperSurface streams are discovered on demand.
    pub fn stream(&mut self, index: usize) -> Result<Arc<StreamDescriptor>> {
        if let Some(desc) = self.slot(index) {
            return Ok(Arc::clone(desc));
        }
        if index == 0 || self.format == FileFormat::AmiraMesh {
            return Err(Error::StreamNotFound { index });
        }
        self.check_policy()?;
        self.request(index)?;
        self.slot(index).cloned().ok_or(Error::StreamNotFound { index })
    }

    /// Descriptor named `field` of array `array`, scanning forward if needed.
    pub fn stream_by_name(&mut self, array: &str, field: &str) -> Result<Arc<StreamDescriptor>> {
        if let Some(desc) = self.find_named(array, field) {
            return Ok(desc);
        }
        if self.format == FileFormat::HyperSurface {
            self.check_policy()?;
            self.ensure_scannable()?;
            let result = self.scan_hyper(Wanted::Named { array, field });
            self.settle(result)?;
        }
        self.find_named(array, field).ok_or_else(|| {
            Error::other(format!("no data stream '{}' in array '{}'", field, array))
        })
    }

    fn find_named(&self, array: &str, field: &str) -> Option<Arc<StreamDescriptor>> {
        self.streams()
            .find(|d| d.array_name() == array && (d.name() == field || d.field_name() == Some(field)))
            .cloned()
    }

    /// Encoded bytes of stream `index`, scanning forward on first request.
    #[tracing::instrument(level = "debug", skip(self), fields(format = %self.format))]
    pub fn request(&mut self, index: usize) -> Result<&[u8]> {
        self.check_policy()?;
        if !self.is_loaded(index) {
            self.load(index)?;
        }
        self.slot(index)
            .and_then(|d| d.encoded())
            .ok_or(Error::StreamNotFound { index })
    }

    fn is_loaded(&self, index: usize) -> bool {
        self.slot(index).is_some_and(|d| d.is_loaded())
    }

    fn ensure_scannable(&self) -> Result<()> {
        match &self.poisoned {
            Some(reason) => Err(Error::corrupt(format!("ledger unusable after earlier error: {}", reason))),
            None => Ok(()),
        }
    }

    /// Remember cursor-poisoning failures.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.poisons_cursor() {
                tracing::warn!(error = %e, "stream scan failed, cursor abandoned");
                self.poisoned = Some(e.to_string());
            }
        }
        result
    }

    fn load(&mut self, index: usize) -> Result<()> {
        if index == 0 {
            return Err(Error::StreamNotFound { index });
        }
        self.ensure_scannable()?;
        match self.format {
            FileFormat::AmiraMesh => {
                if self.slot(index).is_none() || index <= self.last_index {
                    return Err(Error::StreamNotFound { index });
                }
                let result = self.scan_markers(index);
                self.settle(result)
            }
            FileFormat::HyperSurface => {
                let result = self.scan_hyper(Wanted::Index(index));
                if self.settle(result)? {
                    Ok(())
                } else {
                    Err(Error::StreamNotFound { index })
                }
            }
        }
    }

    fn open_scanner(&self, offset: u64) -> Result<DelimiterScanner> {
        let reader = self.source.open_at(offset)?;
        tracing::debug!(source = %self.source.describe(), offset, "scanning stream section");
        Ok(DelimiterScanner::new(reader, offset, self.chunk_size, self.grammar.overlap()))
    }

    /// AmiraMesh: walk `@N` markers until stream `target` is attached.
    fn scan_markers(&mut self, target: usize) -> Result<()> {
        let StreamCursor::At(offset) = self.cursor else {
            return Err(Error::StreamNotFound { index: target });
        };
        let BodyGrammar::Marker(grammar) = &self.grammar else {
            return Err(Error::other("marker scan on a HyperSurface body"));
        };
        let grammar = Arc::clone(grammar);
        let encoding = self.decoder.encoding();
        let mut scanner = self.open_scanner(offset)?;
        let mut open: Option<usize> = None;

        loop {
            let hint = match open.and_then(|k| self.slot(k)) {
                Some(d) => d.length_hint(encoding)?.unwrap_or(0),
                None => 0,
            };
            let step = scanner.next_token(grammar.marker(), grammar.comments(), hint)?;

            match open {
                Some(k) => {
                    let at_eof = step.token.is_none();
                    self.attach_marker_payload(k, step.payload_start, step.payload, hint, at_eof, &grammar)?;
                    if k == target {
                        self.cursor = match &step.token {
                            Some(t) => StreamCursor::At(t.start),
                            None => StreamCursor::Eof,
                        };
                        return Ok(());
                    }
                }
                None if step.payload.iter().any(|b| !b.is_ascii_whitespace()) => {
                    tracing::debug!(bytes = step.payload.len(), "ignoring bytes before first marker");
                }
                None => {}
            }

            let Some(token) = step.token else {
                self.cursor = StreamCursor::Eof;
                return Err(Error::StreamNotFound { index: target });
            };
            let k = self.check_marker(&token)?;
            self.last_index = k;
            open = Some(k);
        }
    }

    fn check_marker(&self, token: &Token) -> Result<usize> {
        let k = token
            .index
            .ok_or_else(|| Error::corrupt(format!("marker at offset {} lacks an index", token.start)))?;
        if k <= self.last_index {
            return Err(Error::corrupt(format!(
                "marker @{} at offset {} follows @{}",
                k, token.start, self.last_index
            )));
        }
        if self.slot(k).is_none() {
            return Err(Error::corrupt(format!("marker @{} at offset {} was never declared", k, token.start)));
        }
        Ok(k)
    }

    fn attach_marker_payload(
        &mut self,
        k: usize,
        offset: u64,
        mut payload: Vec<u8>,
        hint: usize,
        at_eof: bool,
        grammar: &MarkerGrammar,
    ) -> Result<()> {
        if hint > 0 {
            if payload.len() < hint {
                return Err(Error::TruncatedStream { index: k, expected: hint, actual: payload.len() });
            }
            if at_eof && k < self.max_index() {
                // later streams are still expected: a marker inside the skipped
                // region means this stream is shorter than declared
                if let Some(m) = grammar.marker().find(&payload[..hint]) {
                    return Err(Error::TruncatedStream { index: k, expected: hint, actual: m.start() });
                }
            }
            payload.truncate(hint);
        }
        let Some(desc) = self.slot(k) else {
            return Ok(());
        };
        let len = payload.len();
        if desc.attach(offset, payload) {
            tracing::debug!(index = k, offset, len, "attached stream");
        }
        Ok(())
    }

    /// HyperSurface: walk labels until `wanted` is satisfied. Returns `false`
    /// when the end of the body is reached first.
    fn scan_hyper(&mut self, wanted: Wanted<'_>) -> Result<bool> {
        let StreamCursor::At(offset) = self.cursor else {
            return Ok(false);
        };
        let BodyGrammar::Hyper(grammar) = &self.grammar else {
            return Err(Error::other("label scan on an AmiraMesh body"));
        };
        let grammar = Arc::clone(grammar);
        let ascii = self.decoder.encoding().is_ascii();
        let mut scanner = self.open_scanner(offset)?;

        loop {
            let step = scanner.next_token(grammar.token(), grammar.comments(), 0)?;
            let Some(token) = step.token else {
                let directives = self.tracker.finish(&step.payload, grammar.table())?;
                for d in directives {
                    self.apply_directive(d, &mut scanner, &grammar, ascii)?;
                }
                self.cursor = StreamCursor::Eof;
                return Ok(false);
            };

            let directives = self.tracker.on_token(&step.payload, &token, grammar.table())?;
            let mut satisfied = false;
            for d in directives {
                if let Some(index) = self.apply_directive(d, &mut scanner, &grammar, ascii)? {
                    satisfied |= match &wanted {
                        Wanted::Index(i) => *i == index,
                        Wanted::Named { array, field } => self
                            .slot(index)
                            .is_some_and(|s| s.array_name() == *array && s.name() == *field),
                        Wanted::End => false,
                    };
                }
            }
            if satisfied {
                self.cursor = StreamCursor::At(scanner.position());
                return Ok(true);
            }
        }
    }

    /// Apply one nesting event. Returns the index of a newly attached stream.
    fn apply_directive(
        &mut self,
        directive: Directive,
        scanner: &mut DelimiterScanner,
        grammar: &HyperGrammar,
        ascii: bool,
    ) -> Result<Option<usize>> {
        match directive {
            Directive::OpenGroup { name, count } => {
                let id = self.arrays.get_or_insert(&name, Some(Shape::d1(count as usize)));
                self.arrays.mark_collection(id);
                tracing::trace!(group = %name, count, "open group");
            }
            Directive::OpenItem { group, name, item } => {
                let parent = self.arrays.get_or_insert(&group, None);
                let id = self.arrays.get_or_insert(&name, None);
                self.arrays.link(id, parent, item as usize)?;
            }
            Directive::CloseGroup { name } => {
                tracing::trace!(group = %name, "close group");
            }
            Directive::Inline { owner, label, value } => {
                let owner = match owner {
                    Owner::TopLevel => None,
                    Owner::Item(name) => Some(self.arrays.get_or_insert(&name, None)),
                };
                self.arrays.set_attribute(owner, &label, value);
            }
            Directive::Payload { owner, label, field, items, per_item, elem } => {
                let items = items as usize;
                let (array_name, length) = match owner {
                    Owner::TopLevel => (label, Some(Shape::d1(items))),
                    Owner::Item(name) => (name, None),
                };
                let array = self.arrays.get_or_insert(&array_name, length);

                let index = self.last_index + 1;
                let offset = scanner.position();
                let bytes = if ascii {
                    scanner.take_until(grammar.terminator(), grammar.comments())?
                } else {
                    let expected = items
                        .checked_mul(per_item)
                        .and_then(|n| n.checked_mul(elem.byte_width()))
                        .ok_or_else(|| Error::corrupt(format!("'{}' item count {} out of range", field, items)))?;
                    let bytes = scanner.take_exact(expected)?;
                    if bytes.len() < expected {
                        return Err(Error::TruncatedStream { index, expected, actual: bytes.len() });
                    }
                    bytes
                };

                let desc = StreamDescriptor::new(field, array, array_name, index, elem, per_item, Shape::d1(items));
                let len = bytes.len();
                desc.attach(offset, bytes);
                if self.table.len() <= index {
                    self.table.resize(index + 1, None);
                }
                tracing::debug!(index, offset, len, array = %desc.array_name(), field = %desc.name(), "attached stream");
                self.table[index] = Some(Arc::new(desc));
                self.last_index = index;
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Drive the whole body once, then force anything still unloaded.
    #[tracing::instrument(level = "debug", skip_all, fields(format = %self.format))]
    pub fn load_all(&mut self) -> Result<()> {
        self.ensure_scannable()?;
        match self.format {
            FileFormat::AmiraMesh => {
                let max = self.max_index();
                if max > 0 && !self.is_loaded(max) {
                    match self.load(max) {
                        Ok(()) | Err(Error::StreamNotFound { .. }) => {}
                        Err(e) => return Err(e),
                    }
                }
                for index in 1..=max {
                    if self.slot(index).is_some() && !self.is_loaded(index) {
                        self.load(index)?;
                    }
                }
            }
            FileFormat::HyperSurface => {
                let result = self.scan_hyper(Wanted::End);
                self.settle(result)?;
            }
        }
        Ok(())
    }

    /// Offset of stream `index`: its payload start once loaded, otherwise
    /// the cursor the next scan starts from.
    pub fn stream_offset(&self, index: usize) -> Result<u64> {
        if let Some(offset) = self.slot(index).and_then(|d| d.byte_offset()) {
            return Ok(offset);
        }
        match self.cursor {
            StreamCursor::At(offset) => Ok(offset),
            StreamCursor::Eof => Err(Error::StreamNotFound { index }),
        }
    }

    /// Seed the cursor with the known marker offset of stream `index`.
    ///
    /// Forward only: streams below `index` count as passed.
    pub fn set_stream_offset(&mut self, index: usize, offset: u64) -> Result<()> {
        match self.cursor {
            StreamCursor::At(current) if offset >= current => {
                self.cursor = StreamCursor::At(offset);
                self.last_index = self.last_index.max(index.saturating_sub(1));
                Ok(())
            }
            StreamCursor::At(current) => Err(Error::corrupt(format!(
                "stream offset {} for @{} lies behind cursor {}",
                offset, index, current
            ))),
            StreamCursor::Eof => Err(Error::corrupt(format!("stream @{} seeded after end of body", index))),
        }
    }
}
