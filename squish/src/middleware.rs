//! The uniform surface a buffering layer sees, whatever codec sits behind it.

use crate::compression::Algorithm;
use crate::error::Result;
use std::io::{Read, Write};

/// Write side of a transform. Bytes written are compressed and forwarded to
/// the wrapped sink; nothing is finalized until [`Compressor::finish`].
pub trait Compressor<W>: Write {
    fn algorithm(&self) -> Algorithm;

    /// Flushes pending output, writes the format trailer and hands back the
    /// sink. Consumes the adapter, so it runs at most once.
    fn finish(self: Box<Self>) -> Result<W>;
}

/// Read side of a transform. Pulls from the wrapped source only as
/// decompressed bytes are requested.
pub trait Decompressor<R>: Read {
    fn algorithm(&self) -> Algorithm;

    /// Drops the codec state and returns the source. The source may have been
    /// read past the end of the compressed stream.
    fn finish(self: Box<Self>) -> R;
}

/// Something that can wrap sinks and sources with a stream transform.
pub trait Middleware {
    fn writer<'a, W: Write + 'a>(&self, w: W) -> Result<Box<dyn Compressor<W> + 'a>>;
    fn reader<'a, R: Read + 'a>(&self, r: R) -> Result<Box<dyn Decompressor<R> + 'a>>;
}
