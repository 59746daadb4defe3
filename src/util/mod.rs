//! Utility types shared by every layer.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`ElementType`] / [`TypeCatalog`] - Closed set of stream element types
//! - [`Shape`] / [`TypedArray`] - Decoded array model
//! - [`init_logging`] - tracing subscriber setup

mod error;
mod element;
mod shape;
mod array;
mod logging;

pub use error::*;
pub use element::*;
pub use shape::*;
pub use array::*;
pub use logging::*;
