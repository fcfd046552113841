//! Output sink
//!
//! Extraction writes through a [`Sink`] using paths relative to the
//! sink's root, so the extractor never touches the filesystem itself.

use crate::error::Result;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Destination for extracted message content.
#[allow(clippy::missing_errors_doc)]
pub trait Sink {
    /// Write `content` to `path`, replacing any existing file.
    fn write_text(&self, path: &Path, content: &str) -> Result<()>;

    /// Write each line followed by a newline.
    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<()>;

    /// Copy `reader` to `path` byte for byte.
    fn copy_stream(&self, path: &Path, reader: &mut dyn Read) -> Result<u64>;

    /// Create `path` and any missing parents.
    fn make_directory(&self, path: &Path) -> Result<()>;
}

/// Writes under a base directory on the local filesystem. Parent
/// directories are created on demand.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn create(&self, path: &Path) -> Result<BufWriter<File>> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(BufWriter::new(File::create(full)?))
    }
}

impl Sink for FsSink {
    fn write_text(&self, path: &Path, content: &str) -> Result<()> {
        let mut file = self.create(path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<()> {
        let mut file = self.create(path)?;
        for line in lines {
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        Ok(())
    }

    fn copy_stream(&self, path: &Path, reader: &mut dyn Read) -> Result<u64> {
        let mut file = self.create(path)?;
        let copied = std::io::copy(reader, &mut file)?;
        file.flush()?;
        Ok(copied)
    }

    fn make_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(self.root.join(path))?;
        Ok(())
    }
}
