//! Core wire types for kwire.
//!
//! This crate provides the leaf types shared by the encode/decode
//! dispatch layer (`kwire`) and anything built on top of it.
//!
//! ## Modules
//!
//! - [`error`]: Encoding and decoding error families
//! - [`metrics`]: Instrumentation handle and metrics backends
//! - [`codec`]: Compression codec trait and implementations
//! - [`compression`]: Compression configuration types
//! - [`frame`]: Size-prefixed framing and size limits

mod codec;
mod compression;
mod error;
mod frame;
mod metrics;

pub use codec::*;
pub use compression::*;
pub use error::*;
pub use frame::*;
pub use metrics::*;
