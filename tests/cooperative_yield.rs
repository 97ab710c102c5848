//! End-to-end: a single root task that yields between steps runs them in order,
//! each on its own scheduler iteration.

use std::cell::RefCell;
use std::rc::Rc;

use cotask::{spawn, yield_now, Scheduler};

#[test]
fn ten_cooperative_yields_in_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut scheduler = Scheduler::new().expect("scheduler");

    let log_clone = log.clone();
    let root = spawn(async move {
        for i in 1..=10 {
            log_clone.borrow_mut().push(format!("step {i}"));
            yield_now().await;
        }
        log_clone.borrow_mut().push("done".to_string());
    });
    scheduler.schedule_root(root);
    scheduler.execute().expect("execute");

    let mut expected: Vec<String> = (1..=10).map(|i| format!("step {i}")).collect();
    expected.push("done".to_string());
    assert_eq!(*log.borrow(), expected);
}

#[test]
fn yield_now_resolves_exactly_once() {
    let mut scheduler = Scheduler::new().expect("scheduler");
    let polls = Rc::new(RefCell::new(0));
    let polls_clone = polls.clone();

    let root = spawn(async move {
        yield_now().await;
        *polls_clone.borrow_mut() += 1;
        yield_now().await;
        *polls_clone.borrow_mut() += 1;
    });
    scheduler.schedule_root(root);
    scheduler.execute().expect("execute");

    assert_eq!(*polls.borrow(), 2);
}
