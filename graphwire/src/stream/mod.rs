//! Buffered non-blocking streams.
//!
//! A [`Transport`] moves bytes without ever blocking: a read or write that
//! cannot make progress right now returns `0`. [`BufferedStream`] layers a
//! growable buffer on top and synthesizes the blocking-style helpers
//! ([`BufferedStream::read_exact`], [`BufferedStream::write_all`],
//! [`BufferedStream::read_to_delimiter_timeout`]) by retrying the
//! non-blocking primitive and waiting on [`wait_ready`] in between.
//!
//! ```
//! # use graphwire::stream::{BufferedStream, DelimiterMode, MemoryTransport};
//! let mut stream = BufferedStream::new(MemoryTransport::from("GET / HTTP/1.0\r\nHost: a\r\n"));
//! let line = stream.read_to_delimiter(&["\r\n", "\n"], DelimiterMode::Exclude).unwrap();
//! assert_eq!(line.as_deref(), Some(&b"GET / HTTP/1.0"[..]));
//! ```
use {
    crate::{
        config::Config,
        error::{
            delimiter_not_found, empty_delimiter, faulted, timeout, transport_fault,
            unexpected_eof, Error, Result,
        },
    },
    buffer::Buffer,
    core::time::Duration,
    std::{io, os::fd::BorrowedFd, time::Instant},
    tracing::{trace, warn},
};

mod buffer;
mod fd;
pub use fd::FdTransport;
mod memory;
pub use memory::{MemoryTransport, NullTransport};
mod ready;
pub use ready::{wait_ready, Interest};

/// A source and sink of bytes that never blocks.
///
/// Implementations return `Ok(0)` when no data (or no capacity) is available
/// right now and `Err` only for real failures. Errors of kind
/// [`WouldBlock`](io::ErrorKind::WouldBlock) and
/// [`Interrupted`](io::ErrorKind::Interrupted) are tolerated and treated as
/// "no progress".
pub trait Transport {
    /// Read up to `dst.len()` bytes.
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize>;

    /// Write up to `src.len()` bytes.
    fn write(&mut self, src: &[u8]) -> io::Result<usize>;

    /// Whether the transport has reported end-of-stream.
    fn at_eof(&self) -> bool;

    /// Flush any bytes the transport itself holds.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// The descriptor to wait on for `interest`.
    ///
    /// `None` means the transport is always ready (e.g., in-memory buffers).
    fn handle(&self, _interest: Interest) -> Option<BorrowedFd<'_>> {
        None
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    #[inline]
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        (**self).read(dst)
    }

    #[inline]
    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        (**self).write(src)
    }

    #[inline]
    fn at_eof(&self) -> bool {
        (**self).at_eof()
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    #[inline]
    fn handle(&self, interest: Interest) -> Option<BorrowedFd<'_>> {
        (**self).handle(interest)
    }
}

/// Whether [`BufferedStream::read_to_delimiter`] keeps the delimiter in the
/// returned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelimiterMode {
    #[default]
    Exclude,
    Include,
}

/// A [`Transport`] with an internal buffer.
///
/// The buffer is never handed out: callers only ever receive copies of its
/// contents.
#[derive(Debug)]
pub struct BufferedStream<T> {
    transport: T,
    buffer: Buffer,
    resource: String,
    read_timeout: Duration,
    write_timeout: Duration,
    faulted: bool,
    bytes_read: u64,
    bytes_written: u64,
}

impl<T: Transport> BufferedStream<T> {
    /// Create a new [`BufferedStream<T>`] with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, &Config::default())
    }

    /// Create a new [`BufferedStream<T>`] with the specified buffer capacity.
    pub fn with_capacity(transport: T, capacity: usize) -> Self {
        Self::with_config(transport, &Config::default().with_buffer_capacity(capacity))
    }

    pub fn with_config(transport: T, config: &Config) -> Self {
        Self {
            transport,
            buffer: Buffer::new(config.buffer_capacity),
            resource: String::from("anonymous"),
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            faulted: false,
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// Name the stream in diagnostics.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the stream and return the transport.
    ///
    /// Note that any unread data in the buffer will be lost.
    pub fn into_inner(self) -> T {
        self.transport
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Total bytes handed to callers.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Total bytes accepted by the transport.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn has_buffered(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Change the buffer capacity, keeping unread bytes.
    pub fn resize_buffer(&mut self, capacity: usize) -> Result<()> {
        self.buffer.resize(capacity)?;
        trace!(resource = %self.resource, capacity, "resized buffer");
        Ok(())
    }

    /// Compact the buffer and issue one non-blocking read sized to the free
    /// space. Returns the number of bytes added, `0` if none were available.
    pub fn fill_buffer(&mut self) -> Result<usize> {
        self.check_faulted()?;
        self.buffer.compact();
        if self.buffer.is_full() {
            return Ok(0);
        }
        let read = match read_transport(&mut self.transport, self.buffer.spare_mut()) {
            Ok(read) => read,
            Err(e) => return Err(self.fault("fill_buffer", e)),
        };
        self.buffer.commit(read);
        trace!(
            resource = %self.resource,
            read,
            buffered = self.buffer.len(),
            "filled buffer"
        );
        Ok(read)
    }

    /// Copy exactly `dst.len()` bytes out of the stream, or nothing.
    ///
    /// Succeeds only if the bytes are already buffered or arrive with one
    /// [`fill_buffer`](Self::fill_buffer); otherwise returns `0` and consumes
    /// nothing. The buffer grows if `dst` is larger than its capacity.
    pub fn read_all(&mut self, dst: &mut [u8]) -> Result<usize> {
        let amount = dst.len();
        if amount == 0 {
            return Ok(0);
        }
        if self.buffer.len() < amount {
            if amount > self.buffer.capacity() {
                self.buffer.resize(amount.next_power_of_two())?;
                trace!(
                    resource = %self.resource,
                    capacity = self.buffer.capacity(),
                    "grew buffer for read"
                );
            }
            self.fill_buffer()?;
            if self.buffer.len() < amount {
                return Ok(0);
            }
        }
        dst.copy_from_slice(&self.buffer.unread()[..amount]);
        self.consume(amount);
        Ok(amount)
    }

    /// Read exactly `dst.len()` bytes, waiting up to `timeout` for them.
    pub fn read_exact(&mut self, dst: &mut [u8], timeout: Duration) -> Result<()> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if self.read_all(dst)? == dst.len() {
                return Ok(());
            }
            if self.transport.at_eof() {
                return Err(unexpected_eof("read_exact", self.bytes_read));
            }
            self.wait_for_progress(Interest::Read, deadline, "read_exact", timeout)?;
        }
    }

    /// Copy out up to `max` bytes, filling once if nothing is buffered.
    pub fn read_available(&mut self, max: usize) -> Result<Vec<u8>> {
        if self.buffer.is_empty() {
            self.fill_buffer()?;
        }
        let amount = max.min(self.buffer.len());
        let out = self.buffer.unread()[..amount].to_vec();
        self.consume(amount);
        Ok(out)
    }

    /// Read up to the earliest occurrence of any of `delimiters`.
    ///
    /// Scans the buffered bytes, filling once if no delimiter is present.
    /// Returns `Ok(None)` when more data is needed and the read cursor is left
    /// untouched. Raises [`Error::DelimiterNotFound`] when the buffer is full
    /// and still holds no delimiter: the token cannot fit.
    ///
    /// When two delimiters start at the same position the longer one wins, so
    /// `"\r\n"` is preferred over `"\r"`.
    pub fn read_to_delimiter(
        &mut self,
        delimiters: &[&str],
        mode: DelimiterMode,
    ) -> Result<Option<Vec<u8>>> {
        if delimiters.iter().any(|delimiter| delimiter.is_empty()) {
            return Err(empty_delimiter());
        }
        let (position, len) = match find_earliest(self.buffer.unread(), delimiters) {
            Some(hit) => hit,
            None => {
                self.fill_buffer()?;
                match find_earliest(self.buffer.unread(), delimiters) {
                    Some(hit) => hit,
                    None if self.buffer.is_full() => {
                        return Err(delimiter_not_found(self.buffer.capacity()))
                    }
                    None => return Ok(None),
                }
            }
        };
        let end = position + len;
        let keep = match mode {
            DelimiterMode::Exclude => position,
            DelimiterMode::Include => end,
        };
        let token = self.buffer.unread()[..keep].to_vec();
        self.consume(end);
        Ok(Some(token))
    }

    /// [`read_to_delimiter`](Self::read_to_delimiter), waiting up to `timeout`
    /// for the delimiter to arrive.
    pub fn read_to_delimiter_timeout(
        &mut self,
        delimiters: &[&str],
        mode: DelimiterMode,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(token) = self.read_to_delimiter(delimiters, mode)? {
                return Ok(token);
            }
            if self.transport.at_eof() {
                return Err(unexpected_eof("read_to_delimiter", self.bytes_read));
            }
            self.wait_for_progress(Interest::Read, deadline, "read_to_delimiter", timeout)?;
        }
    }

    /// Write all of `src`, waiting up to the configured write timeout.
    pub fn write_all(&mut self, src: &[u8]) -> Result<usize> {
        self.write_all_timeout(src, self.write_timeout)
    }

    /// Write all of `src`, retrying partial writes until everything is
    /// accepted or `timeout` elapses. Returns `src.len()`.
    pub fn write_all_timeout(&mut self, src: &[u8], timeout: Duration) -> Result<usize> {
        self.check_faulted()?;
        let deadline = Instant::now().checked_add(timeout);
        let mut written = 0;
        while written < src.len() {
            let n = match write_transport(&mut self.transport, &src[written..]) {
                Ok(n) => n,
                Err(e) => return Err(self.fault("write_all", e)),
            };
            written += n;
            self.bytes_written += n as u64;
            if written == src.len() {
                break;
            }
            trace!(
                resource = %self.resource,
                written,
                remaining = src.len() - written,
                "partial write"
            );
            if n == 0 {
                self.wait_for_progress(Interest::Write, deadline, "write_all", timeout)?;
            }
        }
        Ok(written)
    }

    pub fn write_str(&mut self, text: &str) -> Result<usize> {
        self.write_all(text.as_bytes())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.check_faulted()?;
        if let Err(e) = self.transport.flush() {
            return Err(self.fault("flush", e));
        }
        Ok(())
    }

    /// True only when the transport reported end-of-stream (or faulted) and
    /// no unread bytes remain.
    pub fn eof(&mut self) -> Result<bool> {
        if !self.buffer.is_empty() {
            return Ok(false);
        }
        if self.faulted {
            return Ok(true);
        }
        self.fill_buffer()?;
        Ok(self.buffer.is_empty() && self.transport.at_eof())
    }

    /// Whether a read can make progress within `timeout`.
    pub fn is_read_ready(&self, timeout: Duration) -> Result<bool> {
        if !self.buffer.is_empty() {
            return Ok(true);
        }
        self.transport_ready(Interest::Read, timeout)
    }

    /// Whether a write can make progress within `timeout`.
    pub fn is_write_ready(&self, timeout: Duration) -> Result<bool> {
        self.transport_ready(Interest::Write, timeout)
    }

    fn transport_ready(&self, interest: Interest, timeout: Duration) -> Result<bool> {
        match self.transport.handle(interest) {
            Some(fd) => Ok(!wait_ready(timeout, &[fd], interest)?.is_empty()),
            None => Ok(true),
        }
    }

    /// Wait on the transport until `deadline`, raising a timeout once it has
    /// passed or the transport stays unready.
    fn wait_for_progress(
        &self,
        interest: Interest,
        deadline: Option<Instant>,
        operation: &'static str,
        requested: Duration,
    ) -> Result<()> {
        let remaining = deadline.map_or(Duration::MAX, |deadline| {
            deadline.saturating_duration_since(Instant::now())
        });
        if remaining.is_zero() || !self.transport_ready(interest, remaining)? {
            return Err(timeout(operation, requested));
        }
        Ok(())
    }

    #[inline]
    fn consume(&mut self, amt: usize) {
        self.buffer.consume(amt);
        self.bytes_read += amt as u64;
    }

    #[inline]
    fn check_faulted(&self) -> Result<()> {
        if self.faulted {
            return Err(faulted(&self.resource));
        }
        Ok(())
    }

    /// Latch the stream at end-of-data after a transport failure.
    #[cold]
    fn fault(&mut self, operation: &'static str, error: io::Error) -> Error {
        self.faulted = true;
        warn!(resource = %self.resource, operation, %error, "transport fault");
        transport_fault(operation, error)
    }
}

fn read_transport<T: Transport + ?Sized>(transport: &mut T, dst: &mut [u8]) -> io::Result<usize> {
    loop {
        match transport.read(dst) {
            Ok(n) => return Ok(n),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(0),
            Err(e) => return Err(e),
        }
    }
}

fn write_transport<T: Transport + ?Sized>(transport: &mut T, src: &[u8]) -> io::Result<usize> {
    loop {
        match transport.write(src) {
            Ok(n) => return Ok(n),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(0),
            Err(e) => return Err(e),
        }
    }
}

/// Position and length of the earliest delimiter in `haystack`.
fn find_earliest(haystack: &[u8], delimiters: &[&str]) -> Option<(usize, usize)> {
    delimiters
        .iter()
        .filter_map(|delimiter| {
            let needle = delimiter.as_bytes();
            haystack
                .windows(needle.len())
                .position(|window| window == needle)
                .map(|position| (position, needle.len()))
        })
        .min_by(|(a_pos, a_len), (b_pos, b_len)| a_pos.cmp(b_pos).then(b_len.cmp(a_len)))
}

/// Indices of the streams that can be read without waiting, or, if none can,
/// of those whose transports become readable within `timeout`.
///
/// Streams holding buffered bytes win immediately. Streams without a
/// descriptor count as readable until they reach end-of-stream.
pub fn have_data<T: Transport>(
    streams: &[BufferedStream<T>],
    timeout: Duration,
) -> Result<Vec<usize>> {
    let buffered: Vec<usize> = streams
        .iter()
        .enumerate()
        .filter(|(_, stream)| stream.has_buffered())
        .map(|(index, _)| index)
        .collect();
    if !buffered.is_empty() {
        return Ok(buffered);
    }

    let mut handles = Vec::new();
    let mut owners = Vec::new();
    let mut always_ready = Vec::new();
    for (index, stream) in streams.iter().enumerate() {
        if stream.faulted {
            continue;
        }
        match stream.transport.handle(Interest::Read) {
            Some(fd) => {
                handles.push(fd);
                owners.push(index);
            }
            None if !stream.transport.at_eof() => always_ready.push(index),
            None => {}
        }
    }
    if !always_ready.is_empty() {
        return Ok(always_ready);
    }
    if handles.is_empty() {
        return Ok(Vec::new());
    }
    Ok(wait_ready(timeout, &handles, Interest::Read)?
        .into_iter()
        .filter_map(|hit| owners.get(hit).copied())
        .collect())
}
