//! End-to-end: a client connects but the peer never sends anything, so a bounded
//! `recv` times out instead of hanging the scheduler forever.

mod util;

use std::cell::RefCell;
use std::rc::Rc;

use cotask::{spawn, Scheduler, TcpRecvResult, TcpSocket};

#[test]
fn recv_with_timeout_gives_up_when_no_data_arrives() {
    let port = util::next_port();
    let mut scheduler = Scheduler::new().expect("scheduler");

    let server = spawn(async move {
        let listener = TcpSocket::new();
        assert!(listener.listen(port));
        let accepted = listener.accept().await;
        assert!(accepted.success);
        let peer = accepted.socket.expect("accepted socket");

        // Hold the connection open without ever sending, then clean up once the
        // client's recv has had a chance to time out.
        let timer = cotask::Timer::new(300);
        timer.start();
        timer.await;
        peer.close();
        listener.close();
    });

    let result: Rc<RefCell<Option<TcpRecvResult>>> = Rc::new(RefCell::new(None));
    let result_clone = result.clone();
    let client = spawn(async move {
        let socket = TcpSocket::new();
        let connected = socket.connect("127.0.0.1", port).await;
        assert!(connected.success);

        let mut buf = [0u8; 16];
        let received = socket.recv(&mut buf, 100).await;
        *result_clone.borrow_mut() = Some(received);
        socket.close();
    });

    scheduler.schedule_root(server);
    scheduler.schedule_root(client);
    scheduler.execute().expect("execute");

    let received = result.borrow_mut().take().expect("result set");
    assert!(!received.finished);
    assert!(!received.success);
    assert_eq!(received.bytes, 0);
}
