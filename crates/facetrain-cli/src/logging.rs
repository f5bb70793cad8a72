//! Log output for the interactive binary.
//!
//! Events go to stderr so prompts on stdout stay clean. While the terminal
//! preview owns the screen, output is held in memory and written out once
//! the preview closes.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Upper bound on log output held while the preview is open.
const MAX_HELD_BYTES: usize = 1 << 20;

#[derive(Debug, Default)]
struct Held {
    buf: Vec<u8>,
    dropped: usize,
}

/// Writer factory for the fmt layer: stderr, or memory while held.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    held: Arc<Mutex<Option<Held>>>,
}

impl LogSink {
    /// Buffer events until the returned guard is dropped.
    pub fn hold(&self) -> LogHold {
        let mut held = lock(&self.held);
        if held.is_none() {
            *held = Some(Held::default());
        }
        LogHold { sink: self.clone() }
    }

    /// Stop holding and write out anything buffered.
    fn release_into(&self, out: &mut impl Write) {
        let Some(held) = lock(&self.held).take() else {
            return;
        };
        let _ = out.write_all(&held.buf);
        if held.dropped > 0 {
            let _ = writeln!(out, "({} bytes of log output dropped while the preview was open)", held.dropped);
        }
        let _ = out.flush();
    }
}

/// Keeps a [`LogSink`] holding output; releases it on drop.
#[must_use]
pub struct LogHold {
    sink: LogSink,
}

impl Drop for LogHold {
    fn drop(&mut self) {
        self.sink.release_into(&mut io::stderr());
    }
}

pub struct LogWriter {
    held: Arc<Mutex<Option<Held>>>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut held = lock(&self.held);
        match held.as_mut() {
            Some(held) if held.buf.len() + buf.len() <= MAX_HELD_BYTES => {
                held.buf.extend_from_slice(buf);
                Ok(buf.len())
            }
            Some(held) => {
                held.dropped += buf.len();
                Ok(buf.len())
            }
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if lock(&self.held).is_some() {
            return Ok(());
        }
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            held: Arc::clone(&self.held),
        }
    }
}

fn lock(held: &Mutex<Option<Held>>) -> MutexGuard<'_, Option<Held>> {
    held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init() -> LogSink {
    let sink = LogSink::default();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(sink.clone())
        .init();
    sink
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_held_output_is_buffered_then_released() {
        let sink = LogSink::default();
        let hold = sink.hold();
        sink.make_writer().write_all(b"captured encoding\n").unwrap();

        let mut out = Vec::new();
        sink.release_into(&mut out);
        assert_eq!(out, b"captured encoding\n");

        // The buffer is emptied by the first release.
        let mut again = Vec::new();
        sink.release_into(&mut again);
        assert!(again.is_empty());
        drop(hold);
    }

    #[test]
    fn test_held_output_is_bounded() {
        let sink = LogSink::default();
        let _hold = sink.hold();
        let mut writer = sink.make_writer();
        let chunk = vec![b'x'; MAX_HELD_BYTES / 2 + 1];
        writer.write_all(&chunk).unwrap();
        writer.write_all(&chunk).unwrap();

        let mut out = Vec::new();
        sink.release_into(&mut out);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(&"x".repeat(chunk.len())));
        assert!(text.ends_with(&format!("({} bytes of log output dropped while the preview was open)\n", chunk.len())));
    }

    #[test]
    fn test_not_held_after_release() {
        let sink = LogSink::default();
        drop(sink.hold());
        assert!(lock(&sink.held).is_none());
    }
}
