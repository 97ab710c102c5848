//! Awaitable I/O operation objects: file reads and TCP sockets.

mod file;
mod tcp;

pub use self::file::{FileReadAllResult, FileReadBufResult, FileReader};
pub use self::tcp::{
    TcpAccept, TcpAcceptResult, TcpConnect, TcpConnectResult, TcpRecv, TcpRecvAll,
    TcpRecvAllResult, TcpRecvResult, TcpSend, TcpSendAll, TcpSendAllResult, TcpSendResult,
    TcpSocket,
};
