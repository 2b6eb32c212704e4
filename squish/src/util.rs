use std::io::{self, Read, Write};

/// Counts the bytes that make it into the wrapped sink.
pub struct TrackedWrite<W: Write> {
    w: W,
    written: u64,
}

impl<W: Write> TrackedWrite<W> {
    pub fn new(w: W) -> Self {
        Self { w, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn take(self) -> W {
        self.w
    }
}

impl<W: Write> Write for TrackedWrite<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let num = self.w.write(buf)?;
        self.written += num as u64;
        Ok(num)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }
}

/// Counts the bytes pulled out of the wrapped source.
pub struct TrackedRead<R: Read> {
    r: R,
    read: u64,
}

impl<R: Read> TrackedRead<R> {
    pub fn new(r: R) -> Self {
        Self { r, read: 0 }
    }

    pub fn read_count(&self) -> u64 {
        self.read
    }

    pub fn take(self) -> R {
        self.r
    }
}

impl<R: Read> Read for TrackedRead<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let num = self.r.read(buf)?;
        self.read += num as u64;
        Ok(num)
    }
}

#[test]
fn test_tracked_counts() {
    let mut w = TrackedWrite::new(Vec::new());
    w.write_all(b"hello ").unwrap();
    w.write_all(b"world").unwrap();
    assert_eq!(w.written(), 11);
    assert_eq!(w.take(), b"hello world");

    let mut r = TrackedRead::new(&b"0123456789"[..]);
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).unwrap();
    assert_eq!(r.read_count(), 4);
    io::copy(&mut r, &mut io::sink()).unwrap();
    assert_eq!(r.read_count(), 10);
}
