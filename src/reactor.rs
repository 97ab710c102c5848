//! The completion backend of the runtime: a registry of kernel handles keyed by
//! [`Token`], each slot holding up to one read-direction and one write-direction
//! waker. The `Token` identifies which handle completed; which of the two waker
//! slots a parked task occupies identifies which operation on that handle completed.

use std::cell::RefCell;
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::task::Waker;
use std::time::Duration;

use crate::config::Config;
use crate::interest::Interest;
use crate::sys::{event_is_readable, event_is_writable, event_token, Selector};
use crate::token::Token;

#[derive(Default)]
struct IoState {
    read: Option<Waker>,
    write: Option<Waker>,
}

/// Owns the epoll fd and the per-handle waker slots. One per [`crate::Scheduler`].
pub(crate) struct Reactor {
    selector: Selector,
    slots: Vec<Option<IoState>>,
    free: Vec<usize>,
    events: Vec<libc::epoll_event>,
    in_flight: usize,
}

impl Reactor {
    pub(crate) fn new(config: &Config) -> io::Result<Reactor> {
        Ok(Reactor {
            selector: Selector::new()?,
            slots: Vec::new(),
            free: Vec::new(),
            events: Vec::with_capacity(config.completion_batch_size),
            in_flight: 0,
        })
    }

    /// Registers `fd` and returns the [`Token`] future operations on it should use.
    pub(crate) fn register(&mut self, fd: RawFd, interests: Interest) -> io::Result<Token> {
        let token = self.alloc_slot();
        if let Err(err) = self.selector.register(fd, token, interests) {
            self.free_slot(token);
            return Err(err);
        }
        log::trace!("registered fd {} as {:?}", fd, token);
        Ok(token)
    }

    pub(crate) fn reregister(&mut self, fd: RawFd, token: Token, interests: Interest) -> io::Result<()> {
        self.selector.reregister(fd, token, interests)
    }

    pub(crate) fn deregister(&mut self, fd: RawFd, token: Token) {
        let _ = self.selector.deregister(fd);
        self.free_slot(token);
        log::trace!("deregistered fd {} ({:?})", fd, token);
    }

    fn alloc_slot(&mut self) -> Token {
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(IoState::default());
            Token(idx)
        } else {
            self.slots.push(Some(IoState::default()));
            Token(self.slots.len() - 1)
        }
    }

    fn free_slot(&mut self, token: Token) {
        if let Some(slot) = self.slots.get_mut(token.0) {
            *slot = None;
        }
        self.free.push(token.0);
    }

    /// Parks `waker` to be woken the next time `token`'s handle becomes readable.
    ///
    /// Each newly-parked waker counts as one in-flight operation for the scheduler's
    /// loop-exit condition; `cancel_read` and the wake in `turn` balance it back out.
    pub(crate) fn park_read(&mut self, token: Token, waker: Waker) {
        if let Some(Some(state)) = self.slots.get_mut(token.0) {
            if state.read.is_none() {
                self.in_flight += 1;
            }
            state.read = Some(waker);
        }
    }

    pub(crate) fn park_write(&mut self, token: Token, waker: Waker) {
        if let Some(Some(state)) = self.slots.get_mut(token.0) {
            if state.write.is_none() {
                self.in_flight += 1;
            }
            state.write = Some(waker);
        }
    }

    /// Cancels a previously parked read waker without waking it; used by the
    /// recv-with-timeout path once the bounding timer has fired.
    pub(crate) fn cancel_read(&mut self, token: Token) {
        if let Some(Some(state)) = self.slots.get_mut(token.0) {
            if state.read.take().is_some() {
                self.in_flight -= 1;
            }
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Drains one `epoll_wait` batch and wakes every task whose handle became ready.
    pub(crate) fn turn(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.events.clear();
        let n = self.selector.select(&mut self.events, timeout)?;
        for i in 0..n {
            let event = self.events[i];
            let token = event_token(&event);
            let readable = event_is_readable(&event);
            let writable = event_is_writable(&event);
            if let Some(Some(state)) = self.slots.get_mut(token.0) {
                if readable && state.read.is_some() {
                    self.in_flight -= 1;
                    state.read.take().unwrap().wake();
                }
                if writable && state.write.is_some() {
                    self.in_flight -= 1;
                    state.write.take().unwrap().wake();
                }
            }
        }
        Ok(())
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Rc<RefCell<Reactor>>>> = RefCell::new(None);
}

pub(crate) fn set_current(reactor: Rc<RefCell<Reactor>>) {
    CURRENT.with(|c| *c.borrow_mut() = Some(reactor));
}

pub(crate) fn clear_current() {
    CURRENT.with(|c| *c.borrow_mut() = None);
}

/// Borrows the reactor owned by the `Scheduler` running on this thread.
///
/// Panics if called off the scheduler's thread or outside any `Scheduler`'s lifetime
/// -- every public awaitable in `crate::io` can only be constructed while one runs.
pub(crate) fn with_current<R>(f: impl FnOnce(&mut Reactor) -> R) -> R {
    let reactor = CURRENT.with(|c| {
        c.borrow()
            .clone()
            .expect("no cotask::Scheduler is running on this thread")
    });
    let mut reactor = reactor.borrow_mut();
    f(&mut reactor)
}
