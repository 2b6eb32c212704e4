//! Transparent compression for byte streams.
//!
//! A [`Compression`] pairs an [`Algorithm`] with a [`Level`] and wraps sinks
//! and sources through the [`Middleware`] trait. The returned adapters hide
//! which codec produced them:
//!
//! ```
//! use squish::{Algorithm, Compression, Middleware, Setting};
//! use std::io::{Read, Write};
//!
//! let c = Compression::with_options(Algorithm::Gzip, [Setting::Level(9)]);
//!
//! let mut w = c.writer(Vec::new()).unwrap();
//! w.write_all(b"Hello, world! Hello, world! Hello, world! ").unwrap();
//! let compressed = w.finish().unwrap();
//!
//! let mut r = c.reader(&compressed[..]).unwrap();
//! let mut out = Vec::new();
//! r.read_to_end(&mut out).unwrap();
//! assert_eq!(out, b"Hello, world! Hello, world! Hello, world! ");
//! ```

pub mod compression;
pub mod error;
pub mod middleware;
pub mod util;

pub use compression::{Algorithm, Compression, Level, Setting};
pub use error::{Error, Phase, Result};
pub use middleware::{Compressor, Decompressor, Middleware};
