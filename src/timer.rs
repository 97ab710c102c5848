//! One-shot deadlines.
//!
//! There is no kernel timer object backing this: a single-threaded scheduler already
//! visits its loop head once per iteration, so a `BinaryHeap` of deadlines checked
//! there costs nothing extra beyond what the loop does anyway.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

#[derive(Default)]
struct TimerState {
    armed: bool,
    elapsed: bool,
    closed: bool,
    waker: Option<Waker>,
}

/// A one-shot deadline, in milliseconds. `start()` arms it; awaiting it suspends the
/// caller until it elapses or is closed.
#[derive(Debug)]
pub struct Timer {
    timeout: Duration,
    state: Rc<RefCell<TimerState>>,
    id: RefCell<Option<u64>>,
}

impl std::fmt::Debug for TimerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerState")
            .field("armed", &self.armed)
            .field("elapsed", &self.elapsed)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Timer {
    /// Constructs a timer for `timeout_ms` milliseconds. Idle until [`Timer::start`].
    pub fn new(timeout_ms: u64) -> Timer {
        Timer {
            timeout: Duration::from_millis(timeout_ms),
            state: Rc::new(RefCell::new(TimerState::default())),
            id: RefCell::new(None),
        }
    }

    /// Arms the deadline. A no-op if already armed or closed.
    pub fn start(&self) {
        let mut state = self.state.borrow_mut();
        if state.armed || state.closed {
            return;
        }
        state.armed = true;
        drop(state);

        let deadline = Instant::now() + self.timeout;
        let id = with_current(|wheel| wheel.arm(deadline, self.state.clone()));
        *self.id.borrow_mut() = Some(id);
    }

    /// Disarms the timer. If armed, any pending elapse callback is cancelled.
    pub fn close(&self) {
        let mut state = self.state.borrow_mut();
        state.closed = true;
        state.armed = false;
        drop(state);

        if let Some(id) = self.id.borrow_mut().take() {
            with_current(|wheel| wheel.cancel(id));
        }
    }

    pub fn is_elapsed(&self) -> bool {
        self.state.borrow().elapsed
    }
}

impl Future for Timer {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self.state.borrow_mut();
        if state.elapsed || state.closed {
            return Poll::Ready(());
        }
        state.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

/// The scheduler-owned deadline wheel. `Reverse` turns the max-heap into a min-heap
/// over `Instant`, so the earliest deadline is always at the top.
pub(crate) struct TimerWheel {
    heap: BinaryHeap<Reverse<(Instant, u64)>>,
    live: HashMap<u64, Rc<RefCell<TimerState>>>,
    next_id: u64,
}

impl TimerWheel {
    pub(crate) fn new() -> TimerWheel {
        TimerWheel {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_id: 0,
        }
    }

    fn arm(&mut self, deadline: Instant, state: Rc<RefCell<TimerState>>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(Reverse((deadline, id)));
        self.live.insert(id, state);
        id
    }

    fn cancel(&mut self, id: u64) {
        // Lazy deletion: the heap entry is left in place and skipped over in
        // `fire_elapsed` once its id is no longer in `live`.
        self.live.remove(&id);
    }

    pub(crate) fn pending(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse((when, _))| *when)
    }

    /// Fires every deadline that has passed `now`, waking whoever awaits it.
    pub(crate) fn fire_elapsed(&mut self, now: Instant) {
        while let Some(&Reverse((when, id))) = self.heap.peek() {
            if when > now {
                break;
            }
            self.heap.pop();
            if let Some(state) = self.live.remove(&id) {
                let waker = {
                    let mut state = state.borrow_mut();
                    state.armed = false;
                    state.elapsed = true;
                    state.waker.take()
                };
                if let Some(waker) = waker {
                    waker.wake();
                }
            }
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Rc<RefCell<TimerWheel>>>> = RefCell::new(None);
}

pub(crate) fn set_current(wheel: Rc<RefCell<TimerWheel>>) {
    CURRENT.with(|c| *c.borrow_mut() = Some(wheel));
}

pub(crate) fn clear_current() {
    CURRENT.with(|c| *c.borrow_mut() = None);
}

fn with_current<R>(f: impl FnOnce(&mut TimerWheel) -> R) -> R {
    let wheel = CURRENT.with(|c| {
        c.borrow()
            .clone()
            .expect("no cotask::Scheduler is running on this thread")
    });
    let mut wheel = wheel.borrow_mut();
    f(&mut wheel)
}
