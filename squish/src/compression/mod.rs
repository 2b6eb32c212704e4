use crate::error::{Error, Result};
use crate::middleware::{Compressor, Decompressor, Middleware};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;
use tracing::{debug, trace, warn};

pub mod gzip;
pub use self::gzip::GzipCodec;

pub mod zlib;
pub use self::zlib::ZlibCodec;

/// Compression formats a [`Compression`] can delegate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Gzip,
    Zlib,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::Gzip, Algorithm::Zlib];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Gzip => "gzip",
            Algorithm::Zlib => "zlib",
        }
    }

    /// Guesses the format from the first bytes of a compressed stream.
    /// Three bytes are enough for every supported format.
    pub fn detect(header: &[u8]) -> Option<Algorithm> {
        let found = if GzipCodec.matches_header(header) {
            Some(Algorithm::Gzip)
        } else if ZlibCodec.matches_header(header) {
            Some(Algorithm::Zlib)
        } else {
            None
        };

        trace!(?found, len = header.len(), "detecting compression format");
        found
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" | "gz" => Ok(Algorithm::Gzip),
            "zlib" => Ok(Algorithm::Zlib),
            _ => Err(Error::UnsupportedAlgorithm(s.to_owned())),
        }
    }
}

impl TryFrom<u8> for Algorithm {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Algorithm::Gzip),
            1 => Ok(Algorithm::Zlib),
            _ => Err(Error::UnsupportedAlgorithm(id.to_string())),
        }
    }
}

/// Speed/ratio trade-off, from 1 (fastest) to 9 (smallest output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(u32);

impl Level {
    pub const FASTEST: Level = Level(1);
    pub const DEFAULT: Level = Level(6);
    pub const BEST: Level = Level(9);

    /// Returns `None` outside of 1..=9.
    pub fn new(level: i64) -> Option<Level> {
        if (1..=9).contains(&level) {
            Some(Level(level as u32))
        } else {
            None
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::DEFAULT
    }
}

impl From<Level> for flate2::Compression {
    fn from(level: Level) -> Self {
        flate2::Compression::new(level.0)
    }
}

/// A construction-time tweak for [`Compression`]. Values that make no sense
/// are ignored rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Level(i64),
}

impl Setting {
    pub fn apply(self, c: Compression) -> Compression {
        match self {
            Setting::Level(level) => match Level::new(level) {
                Some(level) => Compression { level, ..c },
                None => {
                    warn!(
                        level,
                        kept = c.level.get(),
                        "ignoring out of range compression level"
                    );
                    c
                }
            },
        }
    }
}

/// Per-format factory for stream adapters.
pub trait Codec {
    fn algorithm(&self) -> Algorithm;

    fn create_compressor<'a, W: Write + 'a>(
        &self,
        w: W,
        level: Level,
    ) -> Result<Box<dyn Compressor<W> + 'a>>;

    /// Reads and checks the format header before returning.
    fn create_decompressor<'a, R: Read + 'a>(&self, r: R)
        -> Result<Box<dyn Decompressor<R> + 'a>>;

    fn matches_header(&self, header: &[u8]) -> bool;
}

pub(crate) fn read_header<C: Codec, R: Read, const N: usize>(
    codec: &C,
    r: &mut R,
) -> Result<[u8; N]> {
    let algorithm = codec.algorithm();
    let mut header = [0u8; N];
    read_header_exact(algorithm, r, &mut header)?;

    if !codec.matches_header(&header) {
        return Err(Error::InvalidHeader { algorithm });
    }

    Ok(header)
}

/// A source that ends inside the header has an invalid header; any other
/// failure means the source could not be read.
pub(crate) fn read_header_exact<R: Read>(
    algorithm: Algorithm,
    r: &mut R,
    buf: &mut [u8],
) -> Result<()> {
    match r.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
            Err(Error::InvalidHeader { algorithm })
        }
        Err(source) => Err(Error::Open { algorithm, source }),
    }
}

/// An algorithm paired with a level. Cheap to copy, and can wrap any number of
/// sinks and sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression {
    algorithm: Algorithm,
    level: Level,
}

impl Compression {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            level: Level::DEFAULT,
        }
    }

    /// Applies `settings` in order on top of the defaults.
    pub fn with_options<I: IntoIterator<Item = Setting>>(algorithm: Algorithm, settings: I) -> Self {
        settings
            .into_iter()
            .fold(Self::new(algorithm), |c, setting| setting.apply(c))
    }

    pub fn with_level(self, level: i64) -> Self {
        Setting::Level(level).apply(self)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl Middleware for Compression {
    fn writer<'a, W: Write + 'a>(&self, w: W) -> Result<Box<dyn Compressor<W> + 'a>> {
        debug!(algorithm = %self.algorithm, level = self.level.get(), "wrapping sink");
        match self.algorithm {
            Algorithm::Gzip => GzipCodec.create_compressor(w, self.level),
            Algorithm::Zlib => ZlibCodec.create_compressor(w, self.level),
        }
    }

    fn reader<'a, R: Read + 'a>(&self, r: R) -> Result<Box<dyn Decompressor<R> + 'a>> {
        debug!(algorithm = %self.algorithm, "wrapping source");
        match self.algorithm {
            Algorithm::Gzip => GzipCodec.create_decompressor(r),
            Algorithm::Zlib => ZlibCodec.create_decompressor(r),
        }
    }
}
