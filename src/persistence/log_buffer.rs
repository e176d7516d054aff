//! Bounded in-memory log buffer
//!
//! Keeps only the most recent `capacity` bytes; older bytes are discarded as
//! new ones arrive.

use std::io;

#[derive(Debug, Clone)]
pub struct BoundedLog {
    capacity: usize,
    buffer: Vec<u8>,
}

impl BoundedLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: Vec::new(),
        }
    }

    /// Append bytes, dropping the oldest content beyond capacity
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.len() >= self.capacity {
            self.buffer.clear();
            self.buffer
                .extend_from_slice(&bytes[bytes.len() - self.capacity..]);
            return;
        }

        let overflow = (self.buffer.len() + bytes.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.buffer.drain(..overflow);
        }
        self.buffer.extend_from_slice(bytes);
    }

    /// Append a line, adding the trailing newline
    pub fn write_line(&mut self, line: &str) {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.append(&bytes);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl io::Write for BoundedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
