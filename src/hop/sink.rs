//! Persistence of command results.
//!
//! The file format is one block per command:
//!
//! ```text
//! === uname -a ===
//! Linux worker 6.1.0 ...
//!
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::hop::types::CommandResult;

/// Destination for a finished batch.
pub trait ResultSink {
    fn write(&mut self, results: &[CommandResult]) -> io::Result<()>;
}

/// Render results as `=== command ===` blocks followed by stdout.
pub fn render_results(results: &[CommandResult]) -> String {
    let mut rendered = String::new();
    for result in results {
        rendered.push_str(&format!("=== {} ===\n", result.command));
        rendered.push_str(&result.stdout);
        rendered.push_str("\n\n");
    }
    rendered
}

/// Writes results to a file, replacing previous content.
pub struct FileResultSink {
    path: PathBuf,
}

impl FileResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for FileResultSink {
    fn write(&mut self, results: &[CommandResult]) -> io::Result<()> {
        fs::write(&self.path, render_results(results))?;
        info!(
            "Saved {} result(s) to {}",
            results.len(),
            self.path.display()
        );
        Ok(())
    }
}
