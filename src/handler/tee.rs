//! Side-file recording stage.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{HandlerError, OutputHandler};

/// Records every delivered line to a side file, then forwards.
///
/// Used to capture raw build or test output for later symbol extraction while
/// the rest of the chain parses it live. Writes are buffered and flushed when
/// the final status arrives.
pub struct TeeHandler {
    writer: BufWriter<File>,
    path: PathBuf,
    next: Box<dyn OutputHandler>,
}

impl TeeHandler {
    /// Create (truncating) the side file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be created.
    pub fn create(path: impl AsRef<Path>, next: Box<dyn OutputHandler>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = BufWriter::new(File::create(&path)?);
        Ok(Self { writer, path, next })
    }

    /// The side file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputHandler for TeeHandler {
    fn handle_stdout(&mut self, line: &str) -> Result<(), HandlerError> {
        self.writer.write_all(line.as_bytes())?;
        self.next.handle_stdout(line)
    }

    fn handle_stderr(&mut self, line: &str) -> Result<(), HandlerError> {
        self.writer.write_all(line.as_bytes())?;
        self.next.handle_stderr(line)
    }

    fn handle_timeout(&mut self) -> Result<(), HandlerError> {
        self.next.handle_timeout()
    }

    fn is_done(&self) -> bool {
        self.next.is_done()
    }

    fn handle_terminate(&mut self, returncode: i32) -> Result<i32, HandlerError> {
        self.writer.flush()?;
        self.next.handle_terminate(returncode)
    }
}
