//! Output streams for tasks and the buffer used to hold back the output of
//! tasks run without the verbose switch.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// A cloneable, thread-safe handle to a writer.
#[derive(Clone)]
pub struct SharedWriter(Arc<Mutex<dyn Write + Send>>);

impl SharedWriter {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self(Arc::new(Mutex::new(writer)))
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write one line with a single write. Errors are ignored: there is
    /// nowhere left to report a broken output.
    pub fn write_line(&self, args: fmt::Arguments<'_>) {
        let mut line = args.to_string();
        line.push('\n');
        let _ = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_all(line.as_bytes());
    }
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).flush()
    }
}

impl fmt::Debug for SharedWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedWriter")
    }
}

/// The writers a task communicates through.
#[derive(Debug, Clone)]
pub struct Output {
    /// Output expected from the executed tasks.
    pub primary: SharedWriter,
    /// Status information such as logs, markers and error messages.
    pub message: SharedWriter,
}

impl Output {
    pub fn new(primary: SharedWriter, message: SharedWriter) -> Self {
        Self { primary, message }
    }

    /// Route both streams to the same writer.
    pub fn single(writer: SharedWriter) -> Self {
        Self {
            primary: writer.clone(),
            message: writer,
        }
    }

    pub fn stdout() -> Self {
        Self::single(SharedWriter::stdout())
    }

    pub fn write_message(&self, args: fmt::Arguments<'_>) {
        self.message.write_line(args);
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::stdout()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Primary,
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedEntry {
    pub stream: Stream,
    pub data: Vec<u8>,
}

/// Stores everything written to its [`Output`] in memory, remembering which
/// stream each write went to.
#[derive(Debug, Clone, Default)]
pub struct BufferedOutput {
    entries: Arc<Mutex<Vec<BufferedEntry>>>,
}

impl BufferedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writers that append to this buffer.
    pub fn output(&self) -> Output {
        Output {
            primary: SharedWriter::new(BufferedWriter {
                entries: Arc::clone(&self.entries),
                stream: Stream::Primary,
            }),
            message: SharedWriter::new(BufferedWriter {
                entries: Arc::clone(&self.entries),
                stream: Stream::Message,
            }),
        }
    }

    /// Replay the buffered writes into `destination`, in their original
    /// order and on their original streams. The buffer is left intact.
    pub fn write_to(&self, destination: &Output) -> io::Result<()> {
        let entries = self.entries();
        let mut primary = destination.primary.clone();
        let mut message = destination.message.clone();
        for entry in entries {
            match entry.stream {
                Stream::Primary => primary.write_all(&entry.data)?,
                Stream::Message => message.write_all(&entry.data)?,
            }
        }
        Ok(())
    }

    /// Snapshot of the buffered writes.
    pub fn entries(&self) -> Vec<BufferedEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct BufferedWriter {
    entries: Arc<Mutex<Vec<BufferedEntry>>>,
    stream: Stream,
}

impl Write for BufferedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let entry = BufferedEntry {
            stream: self.stream,
            data: buf.to_vec(),
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
