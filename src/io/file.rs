//! File-read-buffer and file-read-all operations.
//!
//! Regular files aren't pollable for readiness on epoll -- they're always "ready" --
//! so both operations perform their `pread(2)` synchronously at construction instead
//! of parking on the reactor, and resolve on the very first poll.

use std::cell::RefCell;
use std::future::Future;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::scheduler;

/// A kernel file handle opened for sequential reads. A single reader backs many
/// `read_buf`/`read_all` calls; each submits its own offset, so no shared cursor
/// state is needed between them.
#[derive(Debug)]
pub struct FileReader {
    file: RefCell<Option<std::fs::File>>,
}

impl FileReader {
    pub fn open(path: impl AsRef<Path>) -> io::Result<FileReader> {
        let file = std::fs::File::open(path)?;
        Ok(FileReader {
            file: RefCell::new(Some(file)),
        })
    }

    /// Submits a single read at `offset` into `buf`. Resolves immediately.
    pub fn read_buf<'a>(&self, buf: &'a mut [u8], offset: u64) -> FileReadBuf {
        FileReadBuf::new(self.read_at(buf, offset))
    }

    /// Reads the whole file from `offset` to EOF into a freshly grown buffer.
    pub fn read_all(&self, offset: u64) -> FileReadAll {
        let scratch_size = scheduler::file_read_all_scratch_size();
        FileReadAll::new(self, offset, scratch_size.max(1))
    }

    pub fn close(&self) {
        self.file.borrow_mut().take();
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        match self.file.borrow().as_ref() {
            Some(file) => file.read_at(buf, offset),
            None => Err(io::Error::new(io::ErrorKind::Other, "FileReader is closed")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FileReadBufResult {
    pub finished: bool,
    pub success: bool,
    pub bytes: usize,
}

/// Submits (and, under this backend, completes) a single `pread` on construction.
pub struct FileReadBuf {
    result: FileReadBufResult,
}

impl FileReadBuf {
    fn new(read: io::Result<usize>) -> FileReadBuf {
        let result = match read {
            Ok(bytes) => FileReadBufResult {
                finished: true,
                success: true,
                bytes,
            },
            Err(_) => FileReadBufResult {
                finished: true,
                success: false,
                bytes: 0,
            },
        };
        FileReadBuf { result }
    }
}

impl Future for FileReadBuf {
    type Output = FileReadBufResult;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<FileReadBufResult> {
        Poll::Ready(self.result)
    }
}

#[derive(Debug, Clone)]
pub struct FileReadAllResult {
    pub finished: bool,
    pub success: bool,
    pub content: Vec<u8>,
}

impl FileReadAllResult {
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    pub fn to_string_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Loops `read_at` over a scratch buffer until a short read signals EOF, or an error
/// stops the accumulation. Entirely synchronous: constructed already resolved.
pub struct FileReadAll {
    result: FileReadAllResult,
}

impl FileReadAll {
    fn new(reader: &FileReader, offset: u64, scratch_size: usize) -> FileReadAll {
        let mut scratch = vec![0u8; scratch_size];
        let mut content = Vec::new();
        let mut pos = offset;
        let mut success = true;

        loop {
            match reader.read_at(&mut scratch, pos) {
                Ok(0) => break,
                Ok(n) => {
                    content.extend_from_slice(&scratch[..n]);
                    pos += n as u64;
                    if n < scratch.len() {
                        break;
                    }
                }
                Err(_) => {
                    success = false;
                    break;
                }
            }
        }

        FileReadAll {
            result: FileReadAllResult {
                finished: true,
                success,
                content,
            },
        }
    }
}

impl Future for FileReadAll {
    type Output = FileReadAllResult;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<FileReadAllResult> {
        Poll::Ready(self.result.clone())
    }
}
