//! Stream layer - descriptors, decoding and the forward-only ledger.
//!
//! This module provides:
//! - [`ArrayArena`] - Arrays and group items addressed by [`ArrayId`]
//! - [`StreamDescriptor`] - One data stream with lazy payload and decode cells
//! - [`StreamDecoder`] - Decompression and typed reinterpretation
//! - [`StreamLedger`] - Cursor, stream table and side loading

mod arrays;
mod descriptor;
mod decoder;
mod ledger;

pub use arrays::{ArrayArena, ArrayId, ArrayNode};
pub use descriptor::{EncodedPayload, StreamDescriptor};
pub use decoder::StreamDecoder;
pub use ledger::{BodyGrammar, LedgerSetup, StreamCursor, StreamLedger};
