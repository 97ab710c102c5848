//! End-to-end: one listening socket, two clients connecting independently. The
//! acceptor hands each connection off to its own handler task as soon as it's
//! accepted, so the listener itself only ever has one `accept` in flight at a time,
//! and the two handlers never see each other's bytes.

mod util;

use std::cell::RefCell;
use std::rc::Rc;

use cotask::{spawn, Scheduler, TcpSocket};

#[test]
fn two_accepted_connections_never_cross_talk() {
    let port = util::next_port();
    let mut scheduler = Scheduler::new().expect("scheduler");

    let handled: Rc<RefCell<Vec<Vec<u8>>>> = Rc::new(RefCell::new(Vec::new()));

    let handled_clone = handled.clone();
    let acceptor = spawn(async move {
        let listener = TcpSocket::new();
        assert!(listener.listen(port));

        let mut handlers = Vec::new();
        for _ in 0..2 {
            let accepted = listener.accept().await;
            assert!(accepted.success);
            let peer = accepted.socket.expect("accepted socket");
            let handled = handled_clone.clone();
            handlers.push(spawn(async move {
                let mut buf = [0u8; 5];
                let received = peer.recv_all(&mut buf, 0).await;
                assert!(received.success);
                handled.borrow_mut().push(buf.to_vec());
                peer.close();
            }));
        }
        for handler in handlers {
            handler.await;
        }
        listener.close();
    });

    let client_a = spawn(async move {
        let socket = TcpSocket::new();
        let connected = socket.connect("127.0.0.1", port).await;
        assert!(connected.success);
        let sent = socket.send_all(b"alice").await;
        assert!(sent.success);
        socket.close();
    });

    let client_b = spawn(async move {
        let socket = TcpSocket::new();
        let connected = socket.connect("127.0.0.1", port).await;
        assert!(connected.success);
        let sent = socket.send_all(b"bobby").await;
        assert!(sent.success);
        socket.close();
    });

    scheduler.schedule_root(acceptor);
    scheduler.schedule_root(client_a);
    scheduler.schedule_root(client_b);
    scheduler.execute().expect("execute");

    let mut seen = handled.borrow().clone();
    seen.sort();
    assert_eq!(seen, vec![b"alice".to_vec(), b"bobby".to_vec()]);
}
