//! Tunables the runtime recognises.

use std::time::Duration;

/// Small, fixed defaults that are cheap to override.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Number of completions drained per reactor `turn()`.
    pub completion_batch_size: usize,
    /// Wait duration when the run queue has nothing runnable but I/O is in flight.
    pub idle_poll_timeout: Duration,
    /// Scratch buffer size `FileReadAll` re-submits with on each sub-read.
    pub file_read_all_scratch_size: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            completion_batch_size: 10,
            idle_poll_timeout: Duration::from_millis(500),
            file_read_all_scratch_size: 500,
        }
    }
}
