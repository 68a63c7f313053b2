use {
    super::{Interest, Transport},
    crate::error::{transport_fault, Result},
    nix::fcntl::{fcntl, FcntlArg, OFlag},
    std::{
        io::{self, Read, Write},
        os::fd::{AsFd, AsRawFd, BorrowedFd},
    },
};

/// A [`Transport`] over a file descriptor: sockets, pipes, terminals or
/// files.
///
/// The descriptor is switched to non-blocking mode on construction. A read
/// returning zero bytes marks end-of-stream.
#[derive(Debug)]
pub struct FdTransport<T> {
    inner: T,
    eof: bool,
}

impl<T: AsFd> FdTransport<T> {
    pub fn new(inner: T) -> Result<Self> {
        set_nonblocking(inner.as_fd())?;
        Ok(Self { inner, eof: false })
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn set_nonblocking(fd: BorrowedFd<'_>) -> Result<()> {
    let raw = fd.as_raw_fd();
    let flags = fcntl(raw, FcntlArg::F_GETFL)
        .map_err(|errno| transport_fault("set_nonblocking", io::Error::from(errno)))?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(raw, FcntlArg::F_SETFL(flags))
        .map_err(|errno| transport_fault("set_nonblocking", io::Error::from(errno)))?;
    Ok(())
}

impl<T: AsFd + Read + Write> Transport for FdTransport<T> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        match self.inner.read(dst) {
            Ok(0) => {
                self.eof = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        match self.inner.write(src) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn at_eof(&self) -> bool {
        self.eof
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn handle(&self, _interest: Interest) -> Option<BorrowedFd<'_>> {
        Some(self.inner.as_fd())
    }
}
