//! Client-owned FIFOs

use std::path::{Path, PathBuf};

use crate::channel::fifo::{create_fifo, remove_fifo};
use crate::error::{Error, Result};

/// A FIFO the client created; removed again when dropped
#[derive(Debug)]
pub struct ReplyPipe {
    path: PathBuf,
    name: String,
}

impl ReplyPipe {
    pub fn create(path: &Path) -> Result<Self> {
        let name = path
            .to_str()
            .ok_or_else(|| Error::Config(format!("pipe path is not UTF-8: {}", path.display())))?
            .to_string();

        create_fifo(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            name,
        })
    }

    /// Path as it goes on the wire
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ReplyPipe {
    fn drop(&mut self) {
        if let Err(e) = remove_fifo(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "Failed to remove pipe");
        }
    }
}
