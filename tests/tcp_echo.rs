//! End-to-end: a listening socket accepts one connection, the two peers exchange
//! fixed-size messages in both directions, and each side sees exactly the bytes the
//! other one sent.

mod util;

use std::cell::RefCell;
use std::rc::Rc;

use cotask::{spawn, Scheduler, TcpSocket};

#[test]
fn echo_round_trip_between_one_server_and_one_client() {
    let port = util::next_port();
    let mut scheduler = Scheduler::new().expect("scheduler");

    let server_seen: Rc<RefCell<Option<Vec<u8>>>> = Rc::new(RefCell::new(None));
    let client_seen: Rc<RefCell<Option<Vec<u8>>>> = Rc::new(RefCell::new(None));

    let server_seen_clone = server_seen.clone();
    let server = spawn(async move {
        let listener = TcpSocket::new();
        assert!(listener.listen(port));

        let accepted = listener.accept().await;
        assert!(accepted.success);
        let peer = accepted.socket.expect("accepted socket");

        let sent = peer.send_all(b"hello from tcp server!").await;
        assert!(sent.success);
        assert_eq!(sent.bytes_sent, 22);

        let mut buf = [0u8; 22];
        let received = peer.recv_all(&mut buf, 0).await;
        assert!(received.success);
        assert_eq!(received.bytes, 22);
        *server_seen_clone.borrow_mut() = Some(buf.to_vec());

        peer.close();
        listener.close();
    });

    let client_seen_clone = client_seen.clone();
    let client = spawn(async move {
        let socket = TcpSocket::new();
        let connected = socket.connect("127.0.0.1", port).await;
        assert!(connected.success);

        let mut buf = [0u8; 22];
        let received = socket.recv_all(&mut buf, 0).await;
        assert!(received.success);
        assert_eq!(received.bytes, 22);
        *client_seen_clone.borrow_mut() = Some(buf.to_vec());

        let sent = socket.send_all(b"hello from tcp client!").await;
        assert!(sent.success);
        assert_eq!(sent.bytes_sent, 22);

        socket.close();
    });

    scheduler.schedule_root(server);
    scheduler.schedule_root(client);
    scheduler.execute().expect("execute");

    assert_eq!(
        server_seen.borrow_mut().take().expect("server saw bytes"),
        b"hello from tcp client!"
    );
    assert_eq!(
        client_seen.borrow_mut().take().expect("client saw bytes"),
        b"hello from tcp server!"
    );
}
