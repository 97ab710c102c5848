//! Process-wide init/deinit for the networking stack.

use std::sync::atomic::{AtomicUsize, Ordering};

static INIT_COUNT: AtomicUsize = AtomicUsize::new(0);

/// RAII guard around process-wide networking setup.
///
/// On Linux there's no `WSAStartup`/`WSACleanup` pair to call, so construction and
/// drop only maintain an idempotency counter. The type is kept present anyway so code
/// written against it stays portable to a future backend where it would matter.
#[derive(Debug)]
pub struct NetworkInit {
    _private: (),
}

impl NetworkInit {
    pub fn new() -> std::io::Result<NetworkInit> {
        INIT_COUNT.fetch_add(1, Ordering::SeqCst);
        Ok(NetworkInit { _private: () })
    }
}

impl Drop for NetworkInit {
    fn drop(&mut self) {
        INIT_COUNT.fetch_sub(1, Ordering::SeqCst);
    }
}
