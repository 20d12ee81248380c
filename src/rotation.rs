//! Output file rotation
//!
//! Produces a fresh sink identity from the configured strftime-style
//! filename template and the wall clock, and sequences the close/reopen of
//! the document through the writer. Rotation never opens a segment; that is
//! left to the next segmenter decision, so a rotation cannot fabricate an
//! empty one.

use crate::error::{Error, Result};
use crate::gpx::GpxWriter;
use chrono::Local;
use log::{debug, info};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Write};

/// Decides when and how the output document moves to a new file
pub struct RotationController {
    template: Option<String>,
}

impl RotationController {
    /// Create a controller; `None` means "write to stdout, never rotate"
    pub fn new(template: Option<String>) -> Self {
        Self { template }
    }

    /// Whether a filename template is configured
    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    /// Format the template against the current wall-clock time.
    ///
    /// An empty or unformattable template is a configuration error.
    fn format_name(&self, template: &str) -> Result<String> {
        let mut name = String::new();
        if write!(name, "{}", Local::now().format(template)).is_err() {
            return Err(Error::BadTemplate(template.to_string()));
        }
        if name.is_empty() {
            return Err(Error::BadTemplate(template.to_string()));
        }
        Ok(name)
    }

    fn make_sink(&self) -> Result<Box<dyn Write + Send>> {
        match &self.template {
            Some(template) => {
                let name = self.format_name(template)?;
                let file = File::create(&name)?;
                debug!("opened {} for writing", name);
                Ok(Box::new(file))
            }
            None => Ok(Box::new(io::stdout())),
        }
    }

    /// Open the first document of the process lifetime
    pub fn open_initial(&self, writer: &mut GpxWriter) -> Result<()> {
        writer.open_document(self.make_sink()?)
    }

    /// Close the current document and start a new one under a freshly
    /// formatted name.
    ///
    /// Returns `false` without touching the writer when no template is
    /// configured (rotating stdout makes no sense).
    pub fn rotate(&self, writer: &mut GpxWriter) -> Result<bool> {
        if self.template.is_none() {
            return Ok(false);
        }
        if writer.document_open() {
            writer.close_document()?;
        }
        writer.open_document(self.make_sink()?)?;
        info!("rotated output document");
        Ok(true)
    }
}
