//! End-to-end: a parent task spawns children and awaits them in order, picking up
//! each one's return value once it finishes.

use std::cell::RefCell;
use std::rc::Rc;

use cotask::{spawn, Scheduler};

#[test]
fn parent_awaits_children_in_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut scheduler = Scheduler::new().expect("scheduler");

    let log_a = log.clone();
    let log_b = log.clone();
    let root = spawn(async move {
        let child_a = spawn(async move {
            log_a.borrow_mut().push("child_a done".to_string());
        });
        let child_b = spawn(async move {
            log_b.borrow_mut().push("child_b done".to_string());
        });
        let child_c = spawn(async { "hello coroutine!".to_string() });

        child_a.await;
        child_b.await;
        let result = child_c.await;
        assert_eq!(result, "hello coroutine!");
    });

    scheduler.schedule_root(root);
    scheduler.execute().expect("execute");

    assert_eq!(
        *log.borrow(),
        vec!["child_a done".to_string(), "child_b done".to_string()]
    );
}

#[test]
fn awaiting_an_already_finished_task_yields_its_value_immediately() {
    let mut scheduler = Scheduler::new().expect("scheduler");
    let result = Rc::new(RefCell::new(None));
    let result_clone = result.clone();

    let root = spawn(async move {
        let child = spawn(async { 42 });
        // Give the child a full turn to finish before the parent ever awaits it.
        cotask::yield_now().await;
        cotask::yield_now().await;
        *result_clone.borrow_mut() = Some(child.await);
    });
    scheduler.schedule_root(root);
    scheduler.execute().expect("execute");

    assert_eq!(*result.borrow(), Some(42));
}
