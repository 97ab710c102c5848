//! `Task<T>` and the parent/child awaiting protocol.
//!
//! Every `Task` is an ordinary `std::future::Future` driven by a small hand-rolled
//! executor (see `scheduler.rs`). A task's run-queue eligibility is the `runnable`
//! cell below; it is cleared on every resume and set by whichever waker a task last
//! handed out, whether that waker belongs to the reactor, the timer wheel, or a
//! parent awaiting this task.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::mem::ManuallyDrop;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use crate::scheduler;

/// A spawned, independently-scheduled unit of work. Constructing one (via
/// [`crate::spawn`]) immediately enqueues it on the running scheduler; awaiting it
/// suspends the caller until it finishes and then yields its return value.
pub struct Task<T> {
    inner: Rc<TaskInner<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Task<T> {
        Task {
            inner: self.inner.clone(),
        }
    }
}

struct TaskInner<T> {
    output: RefCell<Option<T>>,
    finished: Cell<bool>,
    parent_waker: RefCell<Option<Waker>>,
    runnable: Cell<bool>,
    future: RefCell<Option<Pin<Box<dyn Future<Output = ()>>>>>,
}

/// Schedules `future` as a new, immediately-runnable [`Task`]. Must be called while a
/// [`crate::Scheduler`] is running on this thread.
pub fn spawn<F>(future: F) -> Task<F::Output>
where
    F: Future + 'static,
{
    let inner = Rc::new(TaskInner {
        output: RefCell::new(None),
        finished: Cell::new(false),
        parent_waker: RefCell::new(None),
        runnable: Cell::new(true),
        future: RefCell::new(None),
    });

    let driver: Pin<Box<dyn Future<Output = ()>>> = {
        let inner = inner.clone();
        Box::pin(async move {
            let value = future.await;
            *inner.output.borrow_mut() = Some(value);
            inner.finished.set(true);
            if let Some(waker) = inner.parent_waker.borrow_mut().take() {
                waker.wake();
            }
        })
    };
    *inner.future.borrow_mut() = Some(driver);

    scheduler::with_current(|sched| sched.schedule_internal(inner.clone() as Rc<dyn RawTask>));

    Task { inner }
}

impl<T: 'static> Future for Task<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        if self.inner.finished.get() {
            let value = self
                .inner
                .output
                .borrow_mut()
                .take()
                .expect("Task output already taken");
            Poll::Ready(value)
        } else {
            *self.inner.parent_waker.borrow_mut() = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

impl<T> Task<T> {
    pub(crate) fn as_raw(&self) -> Rc<dyn RawTask> {
        self.inner.clone()
    }
}

/// Suspends the calling task for exactly one scheduler iteration. The task is
/// immediately re-woken, so it goes to the back of the run queue rather than
/// actually waiting on anything.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

#[derive(Debug)]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// The scheduler's type-erased view of a task descriptor: `can_resume` is true
/// exactly when the task is neither finished nor currently waiting on anything.
pub(crate) trait RawTask {
    fn can_resume(&self) -> bool;
    fn is_finished(&self) -> bool;
    fn resume(self: Rc<Self>);
}

impl<T: 'static> RawTask for TaskInner<T> {
    fn can_resume(&self) -> bool {
        !self.finished.get() && self.runnable.get()
    }

    fn is_finished(&self) -> bool {
        self.finished.get()
    }

    fn resume(self: Rc<Self>) {
        self.runnable.set(false);
        let waker = make_waker(self.clone());
        let mut cx = Context::from_waker(&waker);

        let mut slot = self.future.borrow_mut();
        let done = match slot.as_mut() {
            Some(fut) => fut.as_mut().poll(&mut cx).is_ready(),
            None => true,
        };
        if done {
            // Drop the boxed future (and everything it captured) as soon as its last
            // resumption completes -- the graveyard drain that follows only has to
            // drop the `Rc<dyn RawTask>` itself, not any of the task's locals.
            *slot = None;
        }
    }
}

/// Builds a `std::task::Waker` over `Rc<TaskInner<T>>` by hand: `Waker::from` requires
/// `Arc<W: Send + Sync>`, which a single-threaded, `Rc`-based runtime cannot offer.
/// This is the same trick `Arc`-based executors use, just ref-counted with `Rc`
/// instead, which is sound because a waker built here never crosses a thread.
fn make_waker<T: 'static>(inner: Rc<TaskInner<T>>) -> Waker {
    let ptr = Rc::into_raw(inner) as *const ();
    unsafe { Waker::from_raw(RawWaker::new(ptr, vtable::<T>())) }
}

fn vtable<T: 'static>() -> &'static RawWakerVTable {
    &VTableHolder::<T>::VTABLE
}

struct VTableHolder<T>(std::marker::PhantomData<T>);

impl<T: 'static> VTableHolder<T> {
    const VTABLE: RawWakerVTable = RawWakerVTable::new(
        clone_waker::<T>,
        wake_waker::<T>,
        wake_waker_by_ref::<T>,
        drop_waker::<T>,
    );
}

unsafe fn clone_waker<T: 'static>(ptr: *const ()) -> RawWaker {
    Rc::increment_strong_count(ptr as *const TaskInner<T>);
    RawWaker::new(ptr, vtable::<T>())
}

unsafe fn wake_waker<T: 'static>(ptr: *const ()) {
    let inner = Rc::from_raw(ptr as *const TaskInner<T>);
    inner.runnable.set(true);
}

unsafe fn wake_waker_by_ref<T: 'static>(ptr: *const ()) {
    let inner = ManuallyDrop::new(Rc::from_raw(ptr as *const TaskInner<T>));
    inner.runnable.set(true);
}

unsafe fn drop_waker<T: 'static>(ptr: *const ()) {
    drop(Rc::from_raw(ptr as *const TaskInner<T>));
}
