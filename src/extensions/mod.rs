//! Extensions to the datagram path.
//!
//! ## Compression
//!
//! Payloads tagged with next-header `0x05` are decompressed through a
//! [`Decompress`](crate::core::Decompress) implementation before delivery.
//! [`default_decompressor`] picks LZO1X when the `compression` feature is on.

mod compression;

pub use compression::*;
