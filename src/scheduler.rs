//! Run queue, roots, graveyard, and the event loop.
//!
//! Each iteration rotates the run queue once, drains the graveyard, then polls the
//! completion backend with a timeout chosen by whether any task is still runnable.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::reactor::{self, Reactor};
use crate::task::{RawTask, Task};
use crate::timer::{self, TimerWheel};

struct SchedulerState {
    run_queue: VecDeque<Rc<dyn RawTask>>,
    graveyard: Vec<Rc<dyn RawTask>>,
    roots: Vec<Rc<dyn RawTask>>,
    reactor: Rc<RefCell<Reactor>>,
    timers: Rc<RefCell<TimerWheel>>,
    config: Config,
}

/// Owns the run queue, the roots list, the graveyard, and the completion backend.
/// Exactly one `Scheduler` may run on a given thread at a time.
pub struct Scheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl Scheduler {
    /// Builds a scheduler with default [`Config`] and installs it as this thread's
    /// current scheduler -- `crate::spawn`, `TcpSocket`, `FileReader`, and `Timer`
    /// all resolve against whichever scheduler is current.
    pub fn new() -> io::Result<Scheduler> {
        Scheduler::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> io::Result<Scheduler> {
        let reactor = Rc::new(RefCell::new(Reactor::new(&config)?));
        let timers = Rc::new(RefCell::new(TimerWheel::new()));

        reactor::set_current(reactor.clone());
        timer::set_current(timers.clone());

        let state = Rc::new(RefCell::new(SchedulerState {
            run_queue: VecDeque::new(),
            graveyard: Vec::new(),
            roots: Vec::new(),
            reactor,
            timers,
            config,
        }));
        set_current(state.clone());

        Ok(Scheduler { state })
    }

    /// Adds `task` as an externally rooted task: its frame is kept alive, and
    /// destroyed by the scheduler, independently of whether anything ever awaits it.
    /// Valid only before or between `execute()` calls.
    pub fn schedule_root<T: 'static>(&mut self, task: Task<T>) {
        self.state.borrow_mut().roots.push(task.as_raw());
    }

    /// Runs the loop until the run queue is empty and no I/O operation is in flight.
    pub fn execute(&mut self) -> io::Result<()> {
        loop {
            let head = self.state.borrow_mut().run_queue.pop_front();
            if let Some(task) = head {
                if task.can_resume() {
                    task.clone().resume();
                    let mut state = self.state.borrow_mut();
                    if task.is_finished() {
                        state.graveyard.push(task);
                    } else {
                        state.run_queue.push_back(task);
                    }
                } else {
                    self.state.borrow_mut().run_queue.push_back(task);
                }
            }

            // Drain in reverse push order so children (pushed after the parent that
            // was still holding them as locals) are destroyed before their parents.
            loop {
                let finished = self.state.borrow_mut().graveyard.pop();
                match finished {
                    Some(task) => drop(task),
                    None => break,
                }
            }

            let (queue_empty, in_flight) = {
                let state = self.state.borrow();
                (
                    state.run_queue.is_empty(),
                    state.reactor.borrow().in_flight() > 0 || state.timers.borrow().pending() > 0,
                )
            };
            if queue_empty && !in_flight {
                break;
            }

            let timeout = self.next_poll_timeout();
            let (reactor, timers) = {
                let state = self.state.borrow();
                (state.reactor.clone(), state.timers.clone())
            };
            reactor.borrow_mut().turn(timeout)?;
            timers.borrow_mut().fire_elapsed(Instant::now());
        }

        loop {
            let root = self.state.borrow_mut().roots.pop();
            match root {
                Some(task) => drop(task),
                None => break,
            }
        }

        Ok(())
    }

    fn next_poll_timeout(&self) -> Option<Duration> {
        let state = self.state.borrow();
        let any_runnable = state.run_queue.iter().any(|task| task.can_resume());
        if any_runnable {
            return Some(Duration::ZERO);
        }
        let idle = state.config.idle_poll_timeout;
        match state.timers.borrow().next_deadline() {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                Some(remaining.min(idle))
            }
            None => Some(idle),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        clear_current();
        reactor::clear_current();
        timer::clear_current();
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Rc<RefCell<SchedulerState>>>> = RefCell::new(None);
}

fn set_current(state: Rc<RefCell<SchedulerState>>) {
    CURRENT.with(|c| *c.borrow_mut() = Some(state));
}

fn clear_current() {
    CURRENT.with(|c| *c.borrow_mut() = None);
}

/// Used by `crate::spawn` to reach the scheduler running on this thread without
/// threading a handle through every coroutine call site -- mirrors the thread-local
/// executor pattern single-threaded async runtimes in the wild use for the same
/// reason (e.g. a `thread_local!`-housed run queue).
pub(crate) fn with_current<R>(f: impl FnOnce(&mut SchedulerState) -> R) -> R {
    let state = CURRENT.with(|c| {
        c.borrow()
            .clone()
            .expect("no cotask::Scheduler is running on this thread")
    });
    let mut state = state.borrow_mut();
    f(&mut state)
}

impl SchedulerState {
    pub(crate) fn schedule_internal(&mut self, task: Rc<dyn RawTask>) {
        self.run_queue.push_back(task);
    }
}

/// The configured scratch size for `FileReadAll`'s re-submission loop.
pub(crate) fn file_read_all_scratch_size() -> usize {
    with_current(|state| state.config.file_read_all_scratch_size)
}
