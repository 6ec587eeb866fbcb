//! Operator-facing output shared by the supervisor and all view workers.
//!
//! Every write takes the console lock once, so a table or a prompt printed by
//! one task is never interleaved with output from another.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

#[derive(Clone)]
pub struct Console {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn from_writer<W: Write + Send + 'static>(w: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(w))),
        }
    }

    /// Console writing into an in-memory buffer, plus a handle to read it.
    pub fn capture() -> (Self, Captured) {
        let buf = Captured::default();
        (Self::from_writer(buf.clone()), buf)
    }

    /// Write text as-is and flush (used for prompts).
    pub fn print(&self, text: &str) {
        let mut sink = self.sink.lock();
        // stdout going away is not something a worker can recover from
        let _ = sink.write_all(text.as_bytes());
        let _ = sink.flush();
    }

    pub fn line(&self, text: impl AsRef<str>) {
        let mut sink = self.sink.lock();
        let _ = sink.write_all(text.as_ref().as_bytes());
        let _ = sink.write_all(b"\n");
        let _ = sink.flush();
    }
}

/// In-memory sink behind [`Console::capture`].
#[derive(Clone, Default)]
pub struct Captured {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Captured {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    /// Return everything written so far and clear the buffer.
    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.buf.lock());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
