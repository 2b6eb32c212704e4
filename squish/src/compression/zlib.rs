use super::{read_header, Algorithm, Codec, Level};
use crate::error::{annotate, Error, Phase, Result};
use crate::middleware::{Compressor, Decompressor};
use std::io::{self, Chain, Cursor, Read, Write};
use tracing::debug;

const ALGORITHM: Algorithm = Algorithm::Zlib;

const CM_DEFLATE: u8 = 8;
const MAX_CINFO: u8 = 7;
const FDICT: u8 = 0x20;

struct ZlibCompressor<W: Write> {
    w: flate2::write::ZlibEncoder<W>,
}

impl<W: Write> Write for ZlibCompressor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.w
            .write(buf)
            .map_err(|err| annotate(ALGORITHM, Phase::Write, err))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w
            .flush()
            .map_err(|err| annotate(ALGORITHM, Phase::Flush, err))
    }
}

impl<W: Write> Compressor<W> for ZlibCompressor<W> {
    fn algorithm(&self) -> Algorithm {
        ALGORITHM
    }

    fn finish(mut self: Box<Self>) -> Result<W> {
        self.w
            .try_finish()
            .map_err(|err| Error::stream(ALGORITHM, Phase::Finish, err))?;
        debug!(
            algorithm = %ALGORITHM,
            raw = self.w.total_in(),
            compressed = self.w.total_out(),
            "finished compressed stream"
        );
        self.w
            .finish()
            .map_err(|err| Error::stream(ALGORITHM, Phase::Finish, err))
    }
}

struct ZlibDecompressor<R: Read> {
    r: flate2::read::ZlibDecoder<Chain<Cursor<[u8; 2]>, R>>,
}

impl<R: Read> Read for ZlibDecompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.r
            .read(buf)
            .map_err(|err| annotate(ALGORITHM, Phase::Read, err))
    }
}

impl<R: Read> Decompressor<R> for ZlibDecompressor<R> {
    fn algorithm(&self) -> Algorithm {
        ALGORITHM
    }

    fn finish(self: Box<Self>) -> R {
        let (_, r) = self.r.into_inner().into_inner();
        r
    }
}

/// RFC 1950 zlib. Streams that need a preset dictionary are rejected.
pub struct ZlibCodec;

impl Codec for ZlibCodec {
    fn algorithm(&self) -> Algorithm {
        ALGORITHM
    }

    fn create_compressor<'a, W: Write + 'a>(
        &self,
        w: W,
        level: Level,
    ) -> Result<Box<dyn Compressor<W> + 'a>> {
        Ok(Box::new(ZlibCompressor {
            w: flate2::write::ZlibEncoder::new(w, level.into()),
        }))
    }

    fn create_decompressor<'a, R: Read + 'a>(
        &self,
        mut r: R,
    ) -> Result<Box<dyn Decompressor<R> + 'a>> {
        let header: [u8; 2] = read_header(self, &mut r)?;
        Ok(Box::new(ZlibDecompressor {
            r: flate2::read::ZlibDecoder::new(Cursor::new(header).chain(r)),
        }))
    }

    fn matches_header(&self, header: &[u8]) -> bool {
        let (cmf, flg) = match header {
            [cmf, flg, ..] => (*cmf, *flg),
            _ => return false,
        };

        cmf & 0x0f == CM_DEFLATE
            && cmf >> 4 <= MAX_CINFO
            && flg & FDICT == 0
            && (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0
    }
}
