use super::{read_header_exact, Algorithm, Codec, Level};
use crate::error::{annotate, Error, Phase, Result};
use crate::middleware::{Compressor, Decompressor};
use std::io::{self, Chain, Cursor, Read, Write};
use tracing::debug;

const ALGORITHM: Algorithm = Algorithm::Gzip;

// ID1, ID2, CM (deflate)
const MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

// MAGIC, FLG, MTIME, XFL, OS
const FIXED_LEN: usize = 10;

const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;
const FRESERVED: u8 = 0xe0;

struct GzipCompressor<W: Write> {
    w: flate2::write::GzEncoder<W>,
}

impl<W: Write> Write for GzipCompressor<W> {
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

impl<W: Write> Compressor<W> for GzipCompressor<W> {
    fn algorithm(&self) -> Algorithm {
        ALGORITHM
    }

    fn finish(mut self: Box<Self>) -> Result<W> {
        self.w
            .try_finish()
            .map_err(|err| Error::stream(ALGORITHM, Phase::Finish, err))?;
        debug!(algorithm = %ALGORITHM, "finished compressed stream");
        self.w
            .finish()
            .map_err(|err| Error::stream(ALGORITHM, Phase::Finish, err))
    }
}

struct GzipDecompressor<R: Read> {
    r: flate2::read::MultiGzDecoder<Chain<Cursor<Vec<u8>>, R>>,
}

impl<R: Read> Read for GzipDecompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.r
            .read(buf)
            .map_err(|err| annotate(ALGORITHM, Phase::Read, err))
    }
}

impl<R: Read> Decompressor<R> for GzipDecompressor<R> {
    fn algorithm(&self) -> Algorithm {
        ALGORITHM
    }

    fn finish(self: Box<Self>) -> R {
        let (_, r) = self.r.into_inner().into_inner();
        r
    }
}

fn read_field<R: Read>(r: &mut R, header: &mut Vec<u8>, len: usize) -> Result<()> {
    let at = header.len();
    header.resize(at + len, 0);
    read_header_exact(ALGORITHM, r, &mut header[at..])
}

fn read_zero_terminated<R: Read>(r: &mut R, header: &mut Vec<u8>) -> Result<()> {
    loop {
        read_field(r, header, 1)?;
        if header.last() == Some(&0) {
            return Ok(());
        }
    }
}

/// Reads the whole member header, including the optional fields its flags
/// announce, and returns the bytes consumed.
fn read_member_header<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let invalid = || Error::InvalidHeader {
        algorithm: ALGORITHM,
    };

    let mut header = Vec::with_capacity(FIXED_LEN);
    read_field(r, &mut header, FIXED_LEN)?;
    if !GzipCodec.matches_header(&header) {
        return Err(invalid());
    }

    let flg = header[3];
    if flg & FEXTRA != 0 {
        read_field(r, &mut header, 2)?;
        let xlen = u16::from_le_bytes([header[FIXED_LEN], header[FIXED_LEN + 1]]);
        read_field(r, &mut header, xlen as usize)?;
    }
    if flg & FNAME != 0 {
        read_zero_terminated(r, &mut header)?;
    }
    if flg & FCOMMENT != 0 {
        read_zero_terminated(r, &mut header)?;
    }
    if flg & FHCRC != 0 {
        let mut crc = flate2::Crc::new();
        crc.update(&header);
        read_field(r, &mut header, 2)?;
        let stored = u16::from_le_bytes([header[header.len() - 2], header[header.len() - 1]]);
        if stored != crc.sum() as u16 {
            return Err(invalid());
        }
    }

    Ok(header)
}

/// RFC 1952 gzip. Concatenated members are read back as one stream.
pub struct GzipCodec;

impl Codec for GzipCodec {
    fn algorithm(&self) -> Algorithm {
        ALGORITHM
    }

    fn create_compressor<'a, W: Write + 'a>(
        &self,
        w: W,
        level: Level,
    ) -> Result<Box<dyn Compressor<W> + 'a>> {
        Ok(Box::new(GzipCompressor {
            w: flate2::write::GzEncoder::new(w, level.into()),
        }))
    }

    fn create_decompressor<'a, R: Read + 'a>(
        &self,
        mut r: R,
    ) -> Result<Box<dyn Decompressor<R> + 'a>> {
        let header = read_member_header(&mut r)?;
        debug!(algorithm = %ALGORITHM, len = header.len(), "read member header");
        Ok(Box::new(GzipDecompressor {
            r: flate2::read::MultiGzDecoder::new(Cursor::new(header).chain(r)),
        }))
    }

    fn matches_header(&self, header: &[u8]) -> bool {
        header.starts_with(&MAGIC) && header.get(3).map_or(true, |flg| flg & FRESERVED == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Compression, Middleware};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut c = GzipCodec.create_compressor(Vec::new(), Level::DEFAULT).unwrap();
        c.write_all(data).unwrap();
        c.finish().unwrap()
    }

    #[test]
    fn test_magic() {
        let compressed = gzip(b"abc");
        assert_eq!(&compressed[..3], &MAGIC);
        assert!(GzipCodec.matches_header(&compressed));
        assert!(!GzipCodec.matches_header(&[0x1f, 0x8b]));
        assert!(!GzipCodec.matches_header(&[0x78, 0x9c, 0x00]));
    }

    #[test]
    fn test_truncated_header() {
        let c = Compression::new(Algorithm::Gzip);
        for len in [3, 9] {
            let good = gzip(b"cut short");
            let err = c.reader(&good[..len]).err().unwrap();
            assert!(
                matches!(err, Error::InvalidHeader { algorithm: Algorithm::Gzip }),
                "len {}",
                len
            );
        }
    }

    #[test]
    fn test_reserved_flags() {
        let mut stream = gzip(b"reserved bits");
        stream[3] |= FRESERVED;

        let err = Compression::new(Algorithm::Gzip)
            .reader(&stream[..])
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidHeader { algorithm: Algorithm::Gzip }));
        assert!(err.is_fatal());
        assert!(!GzipCodec.matches_header(&stream));
    }

    fn gzip_with_fields(data: &[u8]) -> Vec<u8> {
        let mut w = flate2::GzBuilder::new()
            .extra(vec![1, 2, 3])
            .filename("data.txt")
            .comment("note")
            .write(Vec::new(), flate2::Compression::default());
        w.write_all(data).unwrap();
        w.finish().unwrap()
    }

    #[test]
    fn test_optional_fields() {
        let stream = gzip_with_fields(b"with extra, name and comment");
        let mut d = GzipCodec.create_decompressor(&stream[..]).unwrap();
        let mut out = Vec::new();
        d.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"with extra, name and comment");

        // fixed part, XLEN, 3 extra bytes, then inside "data.txt\0"
        let cut = FIXED_LEN + 2 + 3 + 4;
        assert!(matches!(
            GzipCodec.create_decompressor(&stream[..cut]).err().unwrap(),
            Error::InvalidHeader { .. }
        ));

        // inside the extra field
        assert!(matches!(
            GzipCodec.create_decompressor(&stream[..FIXED_LEN + 3]).err().unwrap(),
            Error::InvalidHeader { .. }
        ));
    }

    fn with_header_crc(stream: &[u8], delta: u16) -> Vec<u8> {
        let mut header = stream[..FIXED_LEN].to_vec();
        header[3] |= FHCRC;
        let mut crc = flate2::Crc::new();
        crc.update(&header);
        let stored = (crc.sum() as u16).wrapping_add(delta);
        header.extend_from_slice(&stored.to_le_bytes());
        header.extend_from_slice(&stream[FIXED_LEN..]);
        header
    }

    #[test]
    fn test_header_crc() {
        let plain = gzip(b"header crc");

        let stream = with_header_crc(&plain, 0);
        let mut d = GzipCodec.create_decompressor(&stream[..]).unwrap();
        let mut out = Vec::new();
        d.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"header crc");

        let stream = with_header_crc(&plain, 1);
        assert!(matches!(
            GzipCodec.create_decompressor(&stream[..]).err().unwrap(),
            Error::InvalidHeader { .. }
        ));
    }

    #[test]
    fn test_finish_returns_source() {
        let mut stream = gzip(b"payload");
        let len = stream.len();
        stream.extend_from_slice(b"trailing");

        let mut d = GzipCodec
            .create_decompressor(io::Cursor::new(stream))
            .unwrap();
        assert_eq!(d.algorithm(), Algorithm::Gzip);
        let mut out = [0u8; 7];
        d.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"payload");

        let source = d.finish();
        assert!(source.position() as usize >= FIXED_LEN);
        assert!(source.position() as usize <= len + b"trailing".len());
        assert_eq!(source.get_ref().len(), len + b"trailing".len());
    }

    #[test]
    fn test_concatenated_members() {
        let mut compressed = gzip(b"first member, ");
        compressed.extend_from_slice(&gzip(b"second member"));

        let mut d = GzipCodec.create_decompressor(&compressed[..]).unwrap();
        let mut out = Vec::new();
        d.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"first member, second member");
    }

    #[test]
    fn test_corrupt_trailer() {
        let mut compressed = gzip(b"checksummed payload, checksummed payload");
        let crc_pos = compressed.len() - 8;
        compressed[crc_pos] ^= 0xff;

        let mut d = GzipCodec.create_decompressor(&compressed[..]).unwrap();
        let mut out = Vec::new();
        let err = d.read_to_end(&mut out).unwrap_err();
        assert!(err.to_string().contains("failed to read gzip stream"));

        let inner = err.into_inner().unwrap().downcast::<Error>().unwrap();
        assert!(!inner.is_fatal());
    }
}
