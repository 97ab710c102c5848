//! A raw, owned socket handle with the primitives the TCP operations in
//! [`crate::io::tcp`] need: non-blocking creation, connect/bind/listen/accept, and
//! the actual recv/send/shutdown I/O, since this runtime performs reads and writes
//! itself rather than only registering handles for readiness. Targets Linux only
//! (`accept4`/`SOCK_NONBLOCK` unconditionally, no other-unix `fcntl` fallback).

use crate::sys::unix::net::{from_socket_addr, to_socket_addr};
use std::io::{Error, ErrorKind, Result};
use std::mem::{self, MaybeUninit};
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};

macro_rules! syscall {
    ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
        let res = unsafe { libc::$fn($($arg, )*) };
        if res == -1 {
            Err(Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

#[derive(Debug)]
pub(crate) struct Socket {
    fd: libc::c_int,
}

impl Socket {
    pub(crate) fn new(domain: libc::c_int, socket_type: libc::c_int, protocol: libc::c_int) -> Result<Self> {
        let socket_type = socket_type | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC;
        let socket = syscall!(socket(domain, socket_type, protocol))?;
        Ok(unsafe { Socket::from_raw_fd(socket) })
    }

    pub(crate) fn from_addr(addr: SocketAddr, socket_type: libc::c_int, protocol: libc::c_int) -> Result<Self> {
        let domain = match addr {
            SocketAddr::V4(..) => libc::AF_INET,
            SocketAddr::V6(..) => libc::AF_INET6,
        };
        Self::new(domain, socket_type, protocol)
    }

    pub(crate) fn connect(&self, addr: SocketAddr) -> Result<()> {
        let (storage, len) = from_socket_addr(&addr);
        match syscall!(connect(self.fd, storage, len)) {
            Ok(_) => Ok(()),
            Err(ref err) if err.raw_os_error() == Some(libc::EINPROGRESS) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn bind(&self, addr: SocketAddr) -> Result<()> {
        let (storage, len) = from_socket_addr(&addr);
        syscall!(bind(self.fd, storage, len)).map(|_| ())
    }

    pub(crate) fn listen(&self, backlog: i32) -> Result<()> {
        syscall!(listen(self.fd, backlog)).map(|_| ())
    }

    pub(crate) fn accept(&self) -> Result<(Self, SocketAddr)> {
        let storage = MaybeUninit::<libc::sockaddr_storage>::zeroed();
        // Safety: zero-filled bytes are a valid `sockaddr_storage`.
        let mut storage = unsafe { storage.assume_init() };
        let mut len = mem::size_of_val(&storage) as libc::socklen_t;

        let socket = syscall!(accept4(
            self.fd,
            &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
            &mut len,
            libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
        ))?;
        let addr = unsafe { to_socket_addr(&storage as *const libc::sockaddr_storage)? };
        Ok((unsafe { Socket::from_raw_fd(socket) }, addr))
    }

    pub(crate) fn set_reuse_address(&self) -> Result<()> {
        syscall!(setsockopt(
            self.fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &1 as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        ))
        .map(|_| ())
    }

    /// Disables `SO_LINGER` so closing the handle never blocks waiting for
    /// unsent data to drain.
    pub(crate) fn set_no_linger(&self) -> Result<()> {
        let linger = libc::linger {
            l_onoff: 0,
            l_linger: 0,
        };
        syscall!(setsockopt(
            self.fd,
            libc::SOL_SOCKET,
            libc::SO_LINGER,
            &linger as *const libc::linger as *const libc::c_void,
            mem::size_of::<libc::linger>() as libc::socklen_t,
        ))
        .map(|_| ())
    }

    /// Non-blocking recv. `Ok(0)` means the peer performed an orderly shutdown.
    pub(crate) fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let n = syscall!(recv(
            self.fd,
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
            0,
        ))?;
        Ok(n as usize)
    }

    /// Non-blocking send.
    pub(crate) fn send(&self, buf: &[u8]) -> Result<usize> {
        let n = syscall!(send(
            self.fd,
            buf.as_ptr() as *const libc::c_void,
            buf.len(),
            libc::MSG_NOSIGNAL,
        ))?;
        Ok(n as usize)
    }

    /// Reads back the asynchronous connect's outcome via `SO_ERROR`: the socket
    /// becoming writable only means the kernel finished *trying*.
    pub(crate) fn take_error(&self) -> Result<Option<Error>> {
        let mut err: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
        syscall!(getsockopt(
            self.fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut err as *mut libc::c_int as *mut libc::c_void,
            &mut len,
        ))?;
        if err == 0 {
            Ok(None)
        } else {
            Ok(Some(Error::from_raw_os_error(err)))
        }
    }

    /// Orderly shutdown of both directions. `ENOTCONN` is treated as success, not
    /// failure, which is why calling `close` twice is harmless.
    pub(crate) fn shutdown_both(&self) -> Result<()> {
        match syscall!(shutdown(self.fd, libc::SHUT_RDWR)) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) if err.raw_os_error() == Some(libc::ENOTCONN) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl FromRawFd for Socket {
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Socket { fd }
    }
}

impl IntoRawFd for Socket {
    fn into_raw_fd(self) -> RawFd {
        let fd = self.fd;
        mem::forget(self);
        fd
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        let _ = syscall!(close(self.fd));
    }
}
