//! Owned byte FIFO with head-consuming semantics, the substrate every
//! packet body is decoded from.

use std::collections::VecDeque;
use std::io::{self, Read};

use flate2::read::ZlibDecoder;

use crate::{ProtocolError, Result};

#[derive(Debug, Clone, Default)]
pub struct Buffer {
    data: VecDeque<u8>,
}

impl Buffer {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Buffer {
            data: bytes.into(),
        }
    }

    pub fn next_byte(&mut self) -> Result<u8> {
        self.data.pop_front().ok_or(ProtocolError::BufferUnderrun {
            requested: 1,
            available: 0,
        })
    }

    pub fn next_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        if self.data.len() < n {
            return Err(ProtocolError::BufferUnderrun {
                requested: n,
                available: self.data.len(),
            });
        }
        Ok(self.data.drain(..n).collect())
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.data.extend(bytes.iter().copied());
    }

    #[must_use]
    pub fn length(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn copy(&self) -> Buffer {
        self.clone()
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }

    /// Inflates the buffer's current contents in place, zlib framing, to
    /// exactly `uncompressed_length` bytes.
    pub fn decompress(&mut self, uncompressed_length: usize) -> Result<()> {
        let compressed: Vec<u8> = self.data.drain(..).collect();
        let mut decoder = ZlibDecoder::new(&compressed[..]);
        let mut out = Vec::with_capacity(uncompressed_length);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| ProtocolError::Decompress(e.to_string()))?;
        self.data = out.into();
        Ok(())
    }
}

impl Read for Buffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.data.len());
        for slot in &mut buf[..n] {
            *slot = self.data.pop_front().expect("checked len above");
        }
        Ok(n)
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Self {
        Buffer::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_byte_consumes_head() {
        let mut buf = Buffer::new(vec![1, 2, 3]);
        assert_eq!(buf.next_byte().unwrap(), 1);
        assert_eq!(buf.length(), 2);
    }

    #[test]
    fn next_bytes_underrun_fails() {
        let mut buf = Buffer::new(vec![1, 2]);
        assert!(buf.next_bytes(3).is_err());
        // a failed read must not have consumed anything
        assert_eq!(buf.length(), 2);
    }

    #[test]
    fn read_impl_drains_like_next_bytes() {
        let mut buf = Buffer::new(vec![1, 2, 3, 4]);
        let mut out = [0u8; 2];
        buf.read_exact(&mut out).unwrap();
        assert_eq!(out, [1, 2]);
        assert_eq!(buf.length(), 2);
    }
}
