//! `Transfer-Encoding: chunked` request body writer.

use std::io::{self, Write};

/// Buffers writes into blocks and emits each block as one chunk.
pub struct ChunkedWriter<W: Write> {
    inner: W,
    buffer: Vec<u8>,
    block_size: usize,
}

impl<W: Write> ChunkedWriter<W> {
    /// Wraps `inner`; a zero `block_size` is treated as one byte.
    pub fn new(inner: W, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            inner,
            buffer: Vec::with_capacity(block_size),
            block_size,
        }
    }

    /// Writes any buffered data and the terminating zero-size chunk.
    pub fn finish(mut self) -> io::Result<W> {
        self.emit()?;
        self.inner.write_all(b"0\r\n\r\n")?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn emit(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        write!(self.inner, "{:X}\r\n", self.buffer.len())?;
        self.inner.write_all(&self.buffer)?;
        self.inner.write_all(b"\r\n")?;
        self.buffer.clear();
        Ok(())
    }
}

impl<W: Write> Write for ChunkedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.block_size - self.buffer.len();
        let n = room.min(buf.len());
        self.buffer.extend_from_slice(&buf[..n]);
        if self.buffer.len() == self.block_size {
            self.emit()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit()?;
        self.inner.flush()
    }
}
