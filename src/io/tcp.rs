//! TCP listen/accept/connect/recv/send as awaitable operations.
//!
//! Every operation follows the same shape under epoll: try the syscall immediately,
//! and if it would block, park the calling task's waker on the right direction
//! (readable for accept/recv, writable for connect/send) and let the reactor wake it
//! once the handle is ready. There's no pre-made socket or separate "submit" step to
//! prepare, unlike completion-port backends -- `accept(2)`/`connect(2)` need nothing
//! more than the non-blocking handle itself.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::os::unix::io::AsRawFd;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::interest::Interest;
use crate::reactor;
use crate::sys::{self, Socket};
use crate::timer::Timer;
use crate::token::Token;

struct Inner {
    socket: Option<Socket>,
    token: Option<Token>,
}

/// A shared handle to a kernel socket. `Clone` aliases the same underlying handle
/// rather than duplicating it; `close()` is idempotent on any clone.
#[derive(Clone)]
pub struct TcpSocket {
    inner: Rc<RefCell<Inner>>,
}

impl Default for TcpSocket {
    fn default() -> TcpSocket {
        TcpSocket::new()
    }
}

impl TcpSocket {
    /// Constructs an idle socket with no underlying handle yet.
    pub fn new() -> TcpSocket {
        TcpSocket {
            inner: Rc::new(RefCell::new(Inner {
                socket: None,
                token: None,
            })),
        }
    }

    fn from_parts(socket: Socket, token: Token) -> TcpSocket {
        TcpSocket {
            inner: Rc::new(RefCell::new(Inner {
                socket: Some(socket),
                token: Some(token),
            })),
        }
    }

    /// Binds to the wildcard address on `port` and transitions to the listening
    /// state. `bind` and `listen` are folded into this single call since callers
    /// never need them as separate steps.
    pub fn listen(&self, port: u16) -> bool {
        let socket = match sys::tcp_socket::listen(port) {
            Ok(socket) => socket,
            Err(err) => {
                log::debug!("TcpSocket::listen({port}) failed: {err}");
                return false;
            }
        };
        let fd = socket.as_raw_fd();
        match reactor::with_current(|r| r.register(fd, Interest::READABLE)) {
            Ok(token) => {
                let mut inner = self.inner.borrow_mut();
                inner.socket = Some(socket);
                inner.token = Some(token);
                true
            }
            Err(err) => {
                log::debug!("TcpSocket::listen({port}) failed to register: {err}");
                false
            }
        }
    }

    /// Submits an `accept(2)` on this (listening) socket.
    pub fn accept(&self) -> TcpAccept {
        TcpAccept {
            listener: self.inner.clone(),
        }
    }

    /// Resolves `host:port`, binds an ephemeral local endpoint, and submits an
    /// asynchronous connect.
    pub fn connect(&self, host: &str, port: u16) -> TcpConnect {
        let addr = (host, port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next());
        TcpConnect {
            socket: self.inner.clone(),
            addr,
        }
    }

    /// Submits one receive, optionally bounded by `timeout_ms` (`0` = unbounded).
    pub fn recv<'a>(&self, buf: &'a mut [u8], timeout_ms: u64) -> TcpRecv<'a> {
        TcpRecv {
            socket: self.inner.clone(),
            buf,
            timer: (timeout_ms > 0).then(|| Timer::new(timeout_ms)),
        }
    }

    /// Fills `buf` completely, looping recv until full, shutdown, or error.
    pub fn recv_all<'a>(&self, buf: &'a mut [u8], timeout_ms: u64) -> TcpRecvAll<'a> {
        TcpRecvAll {
            socket: self.inner.clone(),
            buf,
            total: Cell::new(0),
            timer: (timeout_ms > 0).then(|| Timer::new(timeout_ms)),
        }
    }

    /// Submits one send.
    pub fn send<'a>(&self, buf: &'a [u8]) -> TcpSend<'a> {
        TcpSend {
            socket: self.inner.clone(),
            buf,
        }
    }

    /// Sends `buf` completely, looping send until fully written or error.
    pub fn send_all<'a>(&self, buf: &'a [u8]) -> TcpSendAll<'a> {
        TcpSendAll {
            socket: self.inner.clone(),
            buf,
            total: Cell::new(0),
        }
    }

    /// Orderly shutdown, linger disabled, handle closed. Harmless to call more than
    /// once: a socket with no handle left is already closed.
    pub fn close(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        let socket = match inner.socket.take() {
            Some(socket) => socket,
            None => return true,
        };
        let _ = socket.shutdown_both();
        let _ = socket.set_no_linger();
        if let Some(token) = inner.token.take() {
            reactor::with_current(|r| r.deregister(socket.as_raw_fd(), token));
        }
        drop(socket);
        true
    }
}

#[derive(Debug, Clone)]
pub struct TcpAcceptResult {
    pub finished: bool,
    pub success: bool,
    pub socket: Option<TcpSocket>,
}

impl std::fmt::Debug for TcpSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSocket").finish_non_exhaustive()
    }
}

/// An in-flight `accept(2)`. Not preconstructed with a target socket (no `AcceptEx`
/// equivalent under epoll) -- the accepted socket is built on success and registered
/// with the reactor then.
pub struct TcpAccept {
    listener: Rc<RefCell<Inner>>,
}

impl Future for TcpAccept {
    type Output = TcpAcceptResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<TcpAcceptResult> {
        let inner = self.listener.borrow();
        let (socket, token) = match (inner.socket.as_ref(), inner.token) {
            (Some(socket), Some(token)) => (socket, token),
            _ => {
                return Poll::Ready(TcpAcceptResult {
                    finished: true,
                    success: false,
                    socket: None,
                })
            }
        };

        match socket.accept() {
            Ok((accepted, _addr)) => {
                let fd = accepted.as_raw_fd();
                match reactor::with_current(|r| r.register(fd, Interest::READABLE | Interest::WRITABLE)) {
                    Ok(new_token) => Poll::Ready(TcpAcceptResult {
                        finished: true,
                        success: true,
                        socket: Some(TcpSocket::from_parts(accepted, new_token)),
                    }),
                    Err(err) => {
                        log::debug!("TcpAccept: failed to register accepted socket: {err}");
                        Poll::Ready(TcpAcceptResult {
                            finished: true,
                            success: false,
                            socket: None,
                        })
                    }
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                reactor::with_current(|r| r.park_read(token, cx.waker().clone()));
                Poll::Pending
            }
            Err(err) => {
                log::debug!("TcpAccept failed: {err}");
                Poll::Ready(TcpAcceptResult {
                    finished: true,
                    success: false,
                    socket: None,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TcpConnectResult {
    pub finished: bool,
    pub success: bool,
}

/// An in-flight asynchronous connect. The first poll starts the non-blocking
/// `connect(2)` and parks on writability; completion (success or failure) can only
/// be told apart from "still connecting" by waiting for that wake and then reading
/// back `SO_ERROR`, so every later poll only does the `SO_ERROR` check.
pub struct TcpConnect {
    socket: Rc<RefCell<Inner>>,
    addr: Option<SocketAddr>,
}

impl Future for TcpConnect {
    type Output = TcpConnectResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<TcpConnectResult> {
        let mut inner = self.socket.borrow_mut();

        if inner.token.is_none() {
            let addr = match self.addr {
                Some(addr) => addr,
                None => {
                    return Poll::Ready(TcpConnectResult {
                        finished: true,
                        success: false,
                    })
                }
            };
            let socket = match sys::tcp_socket::connect(addr) {
                Ok(socket) => socket,
                Err(err) => {
                    log::debug!("TcpConnect to {addr} failed: {err}");
                    return Poll::Ready(TcpConnectResult {
                        finished: true,
                        success: false,
                    });
                }
            };
            let fd = socket.as_raw_fd();
            let token = match reactor::with_current(|r| r.register(fd, Interest::READABLE | Interest::WRITABLE)) {
                Ok(token) => token,
                Err(err) => {
                    log::debug!("TcpConnect: failed to register socket: {err}");
                    return Poll::Ready(TcpConnectResult {
                        finished: true,
                        success: false,
                    });
                }
            };
            inner.socket = Some(socket);
            inner.token = Some(token);
            reactor::with_current(|r| r.park_write(token, cx.waker().clone()));
            return Poll::Pending;
        }

        // Reached only once woken after the first poll armed the write waker, at
        // which point the kernel has finished trying (successfully or not).
        match inner.socket.as_ref().unwrap().take_error() {
            Ok(None) => Poll::Ready(TcpConnectResult {
                finished: true,
                success: true,
            }),
            Ok(Some(err)) => {
                log::debug!("TcpConnect completed with error: {err}");
                Poll::Ready(TcpConnectResult {
                    finished: true,
                    success: false,
                })
            }
            Err(err) => {
                log::debug!("TcpConnect: SO_ERROR lookup failed: {err}");
                Poll::Ready(TcpConnectResult {
                    finished: true,
                    success: false,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TcpRecvResult {
    pub finished: bool,
    pub success: bool,
    pub bytes: usize,
}

impl TcpRecvResult {
    /// A view over the filled prefix of the buffer this operation read into.
    pub fn filled<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[..self.bytes]
    }
}

/// A single `recv(2)`, optionally bounded by a [`Timer`]. `finished=false`
/// distinguishes "timed out" from both success and a hard failure/shutdown.
pub struct TcpRecv<'a> {
    socket: Rc<RefCell<Inner>>,
    buf: &'a mut [u8],
    timer: Option<Timer>,
}

impl<'a> Future for TcpRecv<'a> {
    type Output = TcpRecvResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<TcpRecvResult> {
        let this = self.get_mut();

        if this.buf.is_empty() {
            return Poll::Ready(TcpRecvResult {
                finished: true,
                success: true,
                bytes: 0,
            });
        }

        if let Some(timer) = this.timer.as_mut() {
            timer.start();
            if Pin::new(timer).poll(cx).is_ready() {
                let inner = this.socket.borrow();
                if let Some(token) = inner.token {
                    reactor::with_current(|r| r.cancel_read(token));
                }
                return Poll::Ready(TcpRecvResult {
                    finished: false,
                    success: false,
                    bytes: 0,
                });
            }
        }

        let inner = this.socket.borrow();
        let (socket, token) = match (inner.socket.as_ref(), inner.token) {
            (Some(socket), Some(token)) => (socket, token),
            _ => {
                return Poll::Ready(TcpRecvResult {
                    finished: true,
                    success: false,
                    bytes: 0,
                })
            }
        };

        match socket.recv(this.buf) {
            Ok(0) => {
                if let Some(timer) = this.timer.as_ref() {
                    timer.close();
                }
                Poll::Ready(TcpRecvResult {
                    finished: true,
                    success: false,
                    bytes: 0,
                })
            }
            Ok(n) => {
                if let Some(timer) = this.timer.as_ref() {
                    timer.close();
                }
                Poll::Ready(TcpRecvResult {
                    finished: true,
                    success: true,
                    bytes: n,
                })
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                reactor::with_current(|r| r.park_read(token, cx.waker().clone()));
                Poll::Pending
            }
            Err(err) => {
                log::debug!("TcpRecv failed: {err}");
                if let Some(timer) = this.timer.as_ref() {
                    timer.close();
                }
                Poll::Ready(TcpRecvResult {
                    finished: true,
                    success: false,
                    bytes: 0,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TcpRecvAllResult {
    pub finished: bool,
    pub success: bool,
    pub bytes: usize,
}

/// Loops `recv` until `buf` is completely filled, a timeout fires, the peer shuts
/// down early, or an error occurs.
pub struct TcpRecvAll<'a> {
    socket: Rc<RefCell<Inner>>,
    buf: &'a mut [u8],
    total: Cell<usize>,
    timer: Option<Timer>,
}

impl<'a> Future for TcpRecvAll<'a> {
    type Output = TcpRecvAllResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<TcpRecvAllResult> {
        let this = self.get_mut();

        if let Some(timer) = this.timer.as_mut() {
            timer.start();
            if Pin::new(timer).poll(cx).is_ready() {
                let inner = this.socket.borrow();
                if let Some(token) = inner.token {
                    reactor::with_current(|r| r.cancel_read(token));
                }
                return Poll::Ready(TcpRecvAllResult {
                    finished: false,
                    success: false,
                    bytes: this.total.get(),
                });
            }
        }

        let inner = this.socket.borrow();
        let (socket, token) = match (inner.socket.as_ref(), inner.token) {
            (Some(socket), Some(token)) => (socket, token),
            _ => {
                return Poll::Ready(TcpRecvAllResult {
                    finished: true,
                    success: false,
                    bytes: this.total.get(),
                })
            }
        };

        loop {
            let total = this.total.get();
            if total >= this.buf.len() {
                if let Some(timer) = this.timer.as_ref() {
                    timer.close();
                }
                return Poll::Ready(TcpRecvAllResult {
                    finished: true,
                    success: true,
                    bytes: total,
                });
            }

            match socket.recv(&mut this.buf[total..]) {
                Ok(0) => {
                    if let Some(timer) = this.timer.as_ref() {
                        timer.close();
                    }
                    return Poll::Ready(TcpRecvAllResult {
                        finished: true,
                        success: false,
                        bytes: total,
                    });
                }
                Ok(n) => {
                    this.total.set(total + n);
                    continue;
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    reactor::with_current(|r| r.park_read(token, cx.waker().clone()));
                    return Poll::Pending;
                }
                Err(err) => {
                    log::debug!("TcpRecvAll failed: {err}");
                    if let Some(timer) = this.timer.as_ref() {
                        timer.close();
                    }
                    return Poll::Ready(TcpRecvAllResult {
                        finished: true,
                        success: false,
                        bytes: total,
                    });
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TcpSendResult {
    pub finished: bool,
    pub success: bool,
    pub bytes_sent: usize,
}

/// A single `send(2)`.
pub struct TcpSend<'a> {
    socket: Rc<RefCell<Inner>>,
    buf: &'a [u8],
}

impl<'a> Future for TcpSend<'a> {
    type Output = TcpSendResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<TcpSendResult> {
        let this = self.get_mut();
        let inner = this.socket.borrow();
        let (socket, token) = match (inner.socket.as_ref(), inner.token) {
            (Some(socket), Some(token)) => (socket, token),
            _ => {
                return Poll::Ready(TcpSendResult {
                    finished: true,
                    success: false,
                    bytes_sent: 0,
                })
            }
        };

        match socket.send(this.buf) {
            Ok(n) => Poll::Ready(TcpSendResult {
                finished: true,
                success: true,
                bytes_sent: n,
            }),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                reactor::with_current(|r| r.park_write(token, cx.waker().clone()));
                Poll::Pending
            }
            Err(err) => {
                log::debug!("TcpSend failed: {err}");
                Poll::Ready(TcpSendResult {
                    finished: true,
                    success: false,
                    bytes_sent: 0,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TcpSendAllResult {
    pub finished: bool,
    pub success: bool,
    pub bytes_sent: usize,
}

/// Loops `send` until `buf` is completely written or an error occurs.
pub struct TcpSendAll<'a> {
    socket: Rc<RefCell<Inner>>,
    buf: &'a [u8],
    total: Cell<usize>,
}

impl<'a> Future for TcpSendAll<'a> {
    type Output = TcpSendAllResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<TcpSendAllResult> {
        let this = self.get_mut();
        let inner = this.socket.borrow();
        let (socket, token) = match (inner.socket.as_ref(), inner.token) {
            (Some(socket), Some(token)) => (socket, token),
            _ => {
                return Poll::Ready(TcpSendAllResult {
                    finished: true,
                    success: false,
                    bytes_sent: this.total.get(),
                })
            }
        };

        loop {
            let total = this.total.get();
            if total >= this.buf.len() {
                return Poll::Ready(TcpSendAllResult {
                    finished: true,
                    success: true,
                    bytes_sent: total,
                });
            }

            match socket.send(&this.buf[total..]) {
                Ok(n) => {
                    this.total.set(total + n);
                    continue;
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    reactor::with_current(|r| r.park_write(token, cx.waker().clone()));
                    return Poll::Pending;
                }
                Err(err) => {
                    log::debug!("TcpSendAll failed: {err}");
                    return Poll::Ready(TcpSendAllResult {
                        finished: true,
                        success: false,
                        bytes_sent: total,
                    });
                }
            }
        }
    }
}
