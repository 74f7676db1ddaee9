//! In-memory stream used to exercise the session without a network

use std::{
    io::{self, Cursor, Read, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

type MockCursor = Cursor<Vec<u8>>;

/// A scripted bidirectional stream
///
/// Reads come from a pre-loaded buffer of server replies, writes accumulate
/// in a separate buffer the test can inspect. Cloning shares both buffers.
#[derive(Clone, Debug, Default)]
pub struct MockStream {
    reader: Arc<Mutex<MockCursor>>,
    writer: Arc<Mutex<MockCursor>>,
    timeout_on_drain: Arc<AtomicBool>,
}

impl MockStream {
    /// Creates an empty mock stream
    pub fn new() -> MockStream {
        MockStream::default()
    }

    /// Creates a mock stream that will serve the given bytes to readers
    pub fn with_replies(replies: &[u8]) -> MockStream {
        MockStream {
            reader: Arc::new(Mutex::new(MockCursor::new(replies.to_vec()))),
            writer: Arc::new(Mutex::new(MockCursor::new(Vec::new()))),
            timeout_on_drain: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes reads past the scripted replies fail with a timeout instead
    /// of signalling end of stream
    pub fn timeout_when_drained(&self) {
        self.timeout_on_drain.store(true, Ordering::SeqCst);
    }

    /// Returns and clears everything written so far
    pub fn written(&self) -> Vec<u8> {
        let mut cursor = self.writer.lock().unwrap();
        let vec = cursor.get_ref().to_vec();
        cursor.set_position(0);
        cursor.get_mut().clear();
        vec
    }

    /// Replaces the pending server replies
    pub fn push_replies(&self, replies: &[u8]) {
        let mut cursor = self.reader.lock().unwrap();
        cursor.set_position(0);
        cursor.get_mut().clear();
        cursor.get_mut().extend_from_slice(replies);
    }
}

impl Write for MockStream {
    fn write(&mut self, msg: &[u8]) -> io::Result<usize> {
        self.writer.lock().unwrap().write(msg)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.lock().unwrap().flush()
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.reader.lock().unwrap().read(buf)?;
        if read == 0 && !buf.is_empty() && self.timeout_on_drain.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no reply arrived"));
        }
        Ok(read)
    }
}
