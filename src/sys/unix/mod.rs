pub(crate) mod net;
pub(crate) mod selector;
pub(crate) mod socket;
pub(crate) mod tcp;

pub(crate) use self::selector::{event_is_readable, event_is_writable, event_token, Selector};
pub(crate) use self::socket::Socket;
