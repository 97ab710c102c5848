//! `cotask` — a single-threaded cooperative task runtime with an epoll completion
//! backend.
//!
//! A [`Scheduler`] owns a run queue of [`Task`]s and a completion backend (`reactor`
//! module). Tasks suspend on [`io::tcp`]/[`io::file`] awaitables or a standalone
//! [`Timer`] without ever blocking the thread that drives [`Scheduler::execute`].
//!
//! ```no_run
//! use cotask::{spawn, Scheduler, TcpSocket};
//!
//! let mut scheduler = Scheduler::new().unwrap();
//! let root = spawn(async {
//!     let socket = TcpSocket::new();
//!     socket.listen(7000);
//!     let accepted = socket.accept().await;
//!     assert!(accepted.success);
//! });
//! scheduler.schedule_root(root);
//! scheduler.execute().unwrap();
//! ```

mod config;
mod interest;
mod net_init;
mod reactor;
mod scheduler;
mod sys;
mod task;
mod timer;
mod token;

pub mod io;

pub use config::Config;
pub use interest::Interest;
pub use net_init::NetworkInit;
pub use scheduler::Scheduler;
pub use task::{spawn, yield_now, Task, YieldNow};
pub use timer::Timer;
pub use token::Token;

pub use io::{
    FileReadAllResult, FileReadBufResult, FileReader, TcpAccept, TcpAcceptResult, TcpConnect,
    TcpConnectResult, TcpRecv, TcpRecvAll, TcpRecvAllResult, TcpRecvResult, TcpSend, TcpSendAll,
    TcpSendAllResult, TcpSendResult, TcpSocket,
};
