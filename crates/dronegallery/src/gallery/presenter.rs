//! Frame sinks for the live gallery.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::render::{render_fragment, render_page, RenderOptions};
use super::view::ViewState;
use crate::error::{Error, Result};

/// Receives every new frame of the gallery.
pub trait Presenter {
    /// Draw `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written out.
    fn present(&mut self, state: &ViewState) -> Result<()>;
}

/// Writes each frame as a full HTML page to a file.
///
/// The page is written to a sibling temp file and renamed over the target,
/// so a browser reloading the file never sees a half-written page.
#[derive(Debug, Clone)]
pub struct HtmlFilePresenter {
    path: PathBuf,
    options: RenderOptions,
}

impl HtmlFilePresenter {
    /// Present into the page at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, options: RenderOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    /// The target page.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Presenter for HtmlFilePresenter {
    fn present(&mut self, state: &ViewState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let page = render_page(state, &self.options);
        let temp = self.temp_path();
        std::fs::write(&temp, page)?;
        std::fs::rename(&temp, &self.path)?;
        debug!(
            "Wrote {} records to {}",
            state.records.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Writes each frame as an HTML fragment to a stream.
#[derive(Debug)]
pub struct WriterPresenter<W> {
    writer: W,
    options: RenderOptions,
    frames: u64,
}

/// Fragments on standard output.
pub type StdoutPresenter = WriterPresenter<std::io::Stdout>;

impl<W: Write> WriterPresenter<W> {
    /// Present into `writer`.
    #[must_use]
    pub fn new(writer: W, options: RenderOptions) -> Self {
        Self {
            writer,
            options,
            frames: 0,
        }
    }

    /// Number of frames written so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl StdoutPresenter {
    /// Present on standard output.
    #[must_use]
    pub fn stdout(options: RenderOptions) -> Self {
        Self::new(std::io::stdout(), options)
    }
}

impl<W: Write> Presenter for WriterPresenter<W> {
    fn present(&mut self, state: &ViewState) -> Result<()> {
        self.frames += 1;
        writeln!(self.writer, "<!-- frame {} -->", self.frames)?;
        self.writer
            .write_all(render_fragment(state, &self.options).as_bytes())?;
        self.writer.flush()?;
        trace!("Presented frame {}", self.frames);
        Ok(())
    }
}
