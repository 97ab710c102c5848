//! Synchronous socket setup shared by [`crate::io::tcp`]'s awaitables: creating,
//! binding, and listening never have to suspend, only accept/connect/recv/send do,
//! so this module does the blocking parts up front and hands a non-blocking
//! [`Socket`] back to the awaitable to drive to completion.

use super::socket::Socket;
use std::io;
use std::net::SocketAddr;

pub(crate) fn listen(port: u16) -> io::Result<Socket> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let socket = Socket::from_addr(addr, libc::SOCK_STREAM, 0)?;
    socket.set_reuse_address()?;
    socket.bind(addr)?;
    socket.listen(1024)?;
    Ok(socket)
}

/// Creates a non-blocking socket, binds an ephemeral local endpoint, and starts an
/// asynchronous `connect(2)` toward `addr`. Returns before the connect necessarily
/// finishes; the caller polls writability and reads back `SO_ERROR`.
pub(crate) fn connect(addr: SocketAddr) -> io::Result<Socket> {
    let socket = Socket::from_addr(addr, libc::SOCK_STREAM, 0)?;
    socket.set_reuse_address()?;
    let ephemeral = match addr {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    };
    socket.bind(ephemeral)?;
    socket.connect(addr)?;
    Ok(socket)
}
