mod epoll;

pub(crate) use self::epoll::{event_is_readable, event_is_writable, event_token, Selector};
