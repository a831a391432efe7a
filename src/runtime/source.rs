use std::io::{self, BufRead, BufReader, Read, Write};

/// Forward-only cursor over the external byte source.
///
/// The cursor never rewinds. Reads stop at end of input instead of failing,
/// so a bounded read near the end returns whatever is left.
pub struct ByteSource<R> {
    reader: BufReader<R>,
    consumed: u64,
}

impl<R: Read> ByteSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            consumed: 0,
        }
    }

    /// Reads up to `len` bytes.
    pub fn read_up_to(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.reader).take(len as u64).read_to_end(&mut buf)?;
        self.consumed += buf.len() as u64;
        Ok(buf)
    }

    /// Reads everything that is left.
    pub fn read_rest(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf)?;
        self.consumed += buf.len() as u64;
        Ok(buf)
    }

    /// Streams everything that is left into `sink` without buffering it.
    pub fn copy_rest_into<W: Write + ?Sized>(&mut self, sink: &mut W) -> io::Result<u64> {
        let copied = io::copy(&mut self.reader, sink)?;
        self.consumed += copied;
        Ok(copied)
    }

    /// True once no bytes remain. Does not consume anything.
    pub fn is_exhausted(&mut self) -> io::Result<bool> {
        Ok(self.reader.fill_buf()?.is_empty())
    }

    /// Total bytes pulled from the source so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}
