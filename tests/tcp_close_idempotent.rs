//! Boundary: closing a socket (or a file reader) more than once is harmless, and a
//! peer that shuts down cleanly makes a pending `recv` resolve as a graceful EOF
//! rather than an error.

mod util;

use cotask::{spawn, FileReader, Scheduler, TcpSocket};

#[test]
fn closing_a_tcp_socket_twice_is_a_no_op() {
    let port = util::next_port();
    let mut scheduler = Scheduler::new().expect("scheduler");

    let server = spawn(async move {
        let listener = TcpSocket::new();
        assert!(listener.listen(port));
        let accepted = listener.accept().await;
        assert!(accepted.success);
        let peer = accepted.socket.expect("accepted socket");
        // The peer shuts down immediately without sending anything.
        assert!(peer.close());
        assert!(peer.close());
        assert!(listener.close());
        assert!(listener.close());
    });

    let client = spawn(async move {
        let socket = TcpSocket::new();
        let connected = socket.connect("127.0.0.1", port).await;
        assert!(connected.success);

        let mut buf = [0u8; 8];
        let received = socket.recv(&mut buf, 0).await;
        assert!(received.finished);
        assert!(!received.success);
        assert_eq!(received.bytes, 0);

        assert!(socket.close());
        assert!(socket.close());
    });

    scheduler.schedule_root(server);
    scheduler.schedule_root(client);
    scheduler.execute().expect("execute");
}

#[test]
fn closing_a_file_reader_twice_is_a_no_op() {
    let path = std::env::temp_dir().join(format!(
        "cotask-test-close-twice-{}.bin",
        std::process::id()
    ));
    std::fs::write(&path, b"abc").expect("write fixture");

    let mut scheduler = Scheduler::new().expect("scheduler");
    let path_clone = path.clone();
    let root = spawn(async move {
        let reader = FileReader::open(&path_clone).expect("open fixture");
        reader.close();
        reader.close();

        let read = reader.read_all(0).await;
        assert!(!read.success);
    });
    scheduler.schedule_root(root);
    scheduler.execute().expect("execute");

    std::fs::remove_file(&path).ok();
}
