use {super::Transport, std::io};

/// An in-memory byte stream: writes append, reads consume from the front.
///
/// Reading and writing share one byte vector, so a package written through a
/// stream over this transport can be read back through the same stream. The
/// consumed prefix is dropped once it makes up more than half of the vector.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryTransport {
    data: Vec<u8>,
    position: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes not yet read.
    pub fn unread(&self) -> &[u8] {
        &self.data[self.position..]
    }

    /// The unread bytes.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.data.drain(..self.position);
        self.data
    }
}

impl From<Vec<u8>> for MemoryTransport {
    fn from(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }
}

impl From<&[u8]> for MemoryTransport {
    fn from(data: &[u8]) -> Self {
        Self::from(data.to_vec())
    }
}

impl From<String> for MemoryTransport {
    fn from(text: String) -> Self {
        Self::from(text.into_bytes())
    }
}

impl From<&str> for MemoryTransport {
    fn from(text: &str) -> Self {
        Self::from(text.as_bytes())
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let unread = &self.data[self.position..];
        let n = unread.len().min(dst.len());
        dst[..n].copy_from_slice(&unread[..n]);
        self.position += n;
        if self.position > self.data.len() / 2 {
            self.data.drain(..self.position);
            self.position = 0;
        }
        Ok(n)
    }

    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(src);
        Ok(src.len())
    }

    fn at_eof(&self) -> bool {
        self.position >= self.data.len()
    }
}

/// Discards writes; reads are always at end-of-stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn read(&mut self, _dst: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }

    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        Ok(src.len())
    }

    fn at_eof(&self) -> bool {
        true
    }
}
