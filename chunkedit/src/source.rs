use std::cmp::min;
use std::io;

/// Positional, read-only access to the bytes being edited.
///
/// Each call specifies its own offset, so the store's own reads never
/// disturb the cursor of a merge running off a separate handle.
pub trait Source {
    /// Reads bytes at the given offset into `buf`.
    ///
    /// Returns the number of bytes actually read. Zero means `offset` is at
    /// or past the end of the source.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Fills as much of `buf` as the source allows, starting at `offset`.
    ///
    /// Unlike [`read_at()`](Self::read_at) this keeps reading until `buf` is
    /// full or the end of the source is reached, so a short count always
    /// means end of data.
    fn read_full_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut total = 0;

        while total < buf.len() {
            match self.read_at(offset + total as u64, &mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(total)
    }
}

impl Source for std::fs::File {
    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }

    #[cfg(not(any(unix, windows)))]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::io::{Read, Seek, SeekFrom};

        let mut file = self;
        file.seek(SeekFrom::Start(offset))?;
        file.read(buf)
    }
}

impl<S: Source + ?Sized> Source for &S {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }
}

/// In-memory source backed by a byte slice.
#[derive(Debug, Clone, Copy)]
pub struct SliceSource<'a> {
    data: &'a [u8],
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Source for SliceSource<'_> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.data.len() as u64 {
            return Ok(0);
        }

        let start = offset as usize;
        let n = min(buf.len(), self.data.len() - start);

        buf[..n].copy_from_slice(&self.data[start..start + n]);

        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write;

    /// Hands out at most one byte per call to exercise the fill loop.
    struct Trickle<'a> {
        data: &'a [u8],
        calls: Cell<usize>,
    }

    impl Source for Trickle<'_> {
        fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            self.calls.set(self.calls.get() + 1);
            let start = offset as usize;
            if start >= self.data.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[start];
            Ok(1)
        }
    }

    #[test]
    fn slice_source_stops_at_end() {
        let source = SliceSource::new(b"abcdef");
        let mut buf = [0u8; 4];

        assert_eq!(source.read_at(4, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(source.read_at(6, &mut buf).unwrap(), 0);
        assert_eq!(source.read_at(u64::MAX, &mut buf).unwrap(), 0);
    }

    #[test]
    fn read_full_at_loops_over_short_reads() {
        let source = Trickle {
            data: b"0123456789",
            calls: Cell::new(0),
        };
        let mut buf = [0u8; 4];

        assert_eq!(source.read_full_at(7, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"789");
        // Three bytes plus the zero-length read that signals the end.
        assert_eq!(source.calls.get(), 4);
    }

    #[test]
    fn file_source_reads_positionally() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"hello, world").unwrap();

        let mut buf = [0u8; 5];
        assert_eq!(file.read_full_at(7, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"world");

        // Positional reads leave other offsets reachable in any order.
        assert_eq!(file.read_full_at(0, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }
}
