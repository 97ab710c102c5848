//! End-to-end and boundary coverage for `FileReader`'s read-buf / read-all pair.

use std::cell::RefCell;
use std::rc::Rc;

use cotask::{spawn, FileReadAllResult, FileReadBufResult, FileReader, Scheduler};

fn unique_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("cotask-test-{name}-{}.bin", std::process::id()))
}

#[test]
fn read_all_matches_file_contents() {
    let content: Vec<u8> = (0..1234u32).map(|i| (i % 251) as u8).collect();
    let path = unique_path("read-all");
    std::fs::write(&path, &content).expect("write fixture");

    let mut scheduler = Scheduler::new().expect("scheduler");
    let result: Rc<RefCell<Option<FileReadAllResult>>> = Rc::new(RefCell::new(None));
    let result_clone = result.clone();
    let path_clone = path.clone();

    let root = spawn(async move {
        let reader = FileReader::open(&path_clone).expect("open fixture");
        *result_clone.borrow_mut() = Some(reader.read_all(0).await);
    });
    scheduler.schedule_root(root);
    scheduler.execute().expect("execute");

    std::fs::remove_file(&path).ok();

    let read = result.borrow_mut().take().expect("result set");
    assert!(read.success);
    assert!(read.finished);
    assert_eq!(read.as_bytes(), content.as_slice());
}

#[test]
fn read_all_on_empty_file_succeeds_with_no_bytes() {
    let path = unique_path("read-all-empty");
    std::fs::write(&path, []).expect("write fixture");

    let mut scheduler = Scheduler::new().expect("scheduler");
    let result: Rc<RefCell<Option<FileReadAllResult>>> = Rc::new(RefCell::new(None));
    let result_clone = result.clone();
    let path_clone = path.clone();

    let root = spawn(async move {
        let reader = FileReader::open(&path_clone).expect("open fixture");
        *result_clone.borrow_mut() = Some(reader.read_all(0).await);
    });
    scheduler.schedule_root(root);
    scheduler.execute().expect("execute");

    std::fs::remove_file(&path).ok();

    let read = result.borrow_mut().take().expect("result set");
    assert!(read.success);
    assert!(read.content.is_empty());
}

#[test]
fn read_buf_with_zero_size_buffer_resolves_with_no_bytes() {
    let path = unique_path("read-buf-zero");
    std::fs::write(&path, b"irrelevant").expect("write fixture");

    let mut scheduler = Scheduler::new().expect("scheduler");
    let result: Rc<RefCell<Option<FileReadBufResult>>> = Rc::new(RefCell::new(None));
    let result_clone = result.clone();
    let path_clone = path.clone();

    let root = spawn(async move {
        let reader = FileReader::open(&path_clone).expect("open fixture");
        let mut buf: [u8; 0] = [];
        *result_clone.borrow_mut() = Some(reader.read_buf(&mut buf, 0).await);
    });
    scheduler.schedule_root(root);
    scheduler.execute().expect("execute");

    std::fs::remove_file(&path).ok();

    let read = result.borrow_mut().take().expect("result set");
    assert!(read.success);
    assert_eq!(read.bytes, 0);
}

#[test]
fn read_buf_honors_offset() {
    let path = unique_path("read-buf-offset");
    std::fs::write(&path, b"0123456789").expect("write fixture");

    let mut scheduler = Scheduler::new().expect("scheduler");
    let result: Rc<RefCell<Option<([u8; 4], FileReadBufResult)>>> = Rc::new(RefCell::new(None));
    let result_clone = result.clone();
    let path_clone = path.clone();

    let root = spawn(async move {
        let reader = FileReader::open(&path_clone).expect("open fixture");
        let mut buf = [0u8; 4];
        let read = reader.read_buf(&mut buf, 3).await;
        *result_clone.borrow_mut() = Some((buf, read));
    });
    scheduler.schedule_root(root);
    scheduler.execute().expect("execute");

    std::fs::remove_file(&path).ok();

    let (buf, read) = result.borrow_mut().take().expect("result set");
    assert!(read.success);
    assert_eq!(read.bytes, 4);
    assert_eq!(&buf, b"3456");
}
