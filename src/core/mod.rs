//! Core layer - policies, configuration and payload codecs.
//!
//! This module provides:
//! - [`LoadPolicy`] - When stream payloads are read
//! - [`ReaderConfig`] - Serde-backed reader options
//! - [`Compression`] - Raw / HxByteRLE / HxZip payload schemes

mod policy;
mod config;
mod rle;
mod compression;

pub use policy::LoadPolicy;
pub use config::{ReaderConfig, DEFAULT_CHUNK_SIZE, ENV_CHUNK_SIZE, ENV_MMAP, ENV_POLICY};
pub use rle::{rle_decode, rle_encode};
pub use compression::{deflate, inflate, Compression};
