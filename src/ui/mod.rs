//! Operator-facing output sink for build progress.
//!
//! Steps report progress through a [`Ui`] rather than writing to stdio
//! directly, so library consumers can route messages wherever they like and
//! tests can capture them.

use std::io::Write;
use std::sync::Mutex;

/// Leveled sink for human-readable build progress.
///
/// Implementations must tolerate concurrent callers; the build itself is
/// sequential but cleanup messages may interleave with caller output.
pub trait Ui: Send + Sync {
    /// Reports normal progress.
    fn say(&self, message: &str);

    /// Reports a problem. Errors here never affect the build outcome.
    fn error(&self, message: &str);
}

/// [`Ui`] implementation that writes to any [`Write`] target.
#[derive(Debug)]
pub struct WriterUi<W: Write + Send> {
    target: Mutex<W>,
}

impl<W: Write + Send> WriterUi<W> {
    /// Wraps a writer in a line-oriented UI sink.
    pub const fn new(target: W) -> Self {
        Self {
            target: Mutex::new(target),
        }
    }

    fn write_line(&self, prefix: &str, message: &str) {
        if let Ok(mut target) = self.target.lock() {
            writeln!(target, "{prefix}{message}").ok();
        }
    }
}

impl<W: Write + Send> Ui for WriterUi<W> {
    fn say(&self, message: &str) {
        self.write_line("", message);
    }

    fn error(&self, message: &str) {
        self.write_line("error: ", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .map_err(|_| std::io::Error::other("poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            self.0
                .lock()
                .map_or_else(|_| String::new(), |buf| String::from_utf8_lossy(&buf).into_owned())
        }
    }

    #[test]
    fn say_writes_plain_line() {
        let buffer = SharedBuffer::default();
        let ui = WriterUi::new(buffer.clone());
        ui.say("creating instance");
        assert_eq!(buffer.contents(), "creating instance\n");
    }

    #[test]
    fn error_prefixes_line() {
        let buffer = SharedBuffer::default();
        let ui = WriterUi::new(buffer.clone());
        ui.error("capture failed");
        assert_eq!(buffer.contents(), "error: capture failed\n");
    }
}
