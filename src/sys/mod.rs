#[cfg(unix)]
pub(crate) mod unix;

#[cfg(unix)]
pub(crate) use self::unix::{event_is_readable, event_is_writable, event_token, Selector, Socket};

#[cfg(unix)]
pub(crate) use self::unix::tcp as tcp_socket;
