use crate::assembly::{self, AssemblyRequest, OutputTarget};
use crate::config::{Dpi, ImageFormat, OutputConfig};
use crate::document::DocumentModel;
use crate::error::{Error, Result};
use crate::preview::{PageTile, Preview, PREVIEW_DPI};
use crate::raster::{PageSubset, Rasterizer};
use crate::selection::SelectionSet;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// Nothing loaded yet.
    Empty,
    /// A document is loaded and no page is selected.
    Loaded,
    /// At least one page is selected.
    Selecting,
}

/// Owns the loaded documents and the live selection.
///
/// Every structural operation reads from here; nothing else keeps a document
/// or an index list past the call it was handed to.
#[derive(Debug)]
pub struct Session<D, R> {
    primary: Option<D>,
    secondary: Option<D>,
    selection: SelectionSet,
    config: OutputConfig,
    rasterizer: R,
}

impl<D, R> Session<D, R>
where
    D: DocumentModel,
    R: Rasterizer<D>,
{
    pub fn new(rasterizer: R, config: OutputConfig) -> Self {
        Self {
            primary: None,
            secondary: None,
            selection: SelectionSet::default(),
            config,
            rasterizer,
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.primary, self.selection.is_empty()) {
            (None, _) => SessionState::Empty,
            (Some(_), true) => SessionState::Loaded,
            (Some(_), false) => SessionState::Selecting,
        }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: OutputConfig) {
        self.config = config;
    }

    pub fn set_basename(&mut self, basename: impl Into<String>) {
        self.config.basename = basename.into();
    }

    pub fn set_dpi(&mut self, dpi: Dpi) {
        self.config.dpi = dpi;
    }

    pub fn set_image_format(&mut self, format: ImageFormat) {
        self.config.image_format = format;
    }

    pub fn primary(&self) -> Option<&D> {
        self.primary.as_ref()
    }

    pub fn secondary(&self) -> Option<&D> {
        self.secondary.as_ref()
    }

    /// Opens `path` as the working document. On failure the session is left as it was.
    pub fn load_primary(&mut self, path: &Path) -> Result<usize> {
        let document = D::open(path)?;
        info!("Opened {} ({} pages)", path.display(), document.page_count());
        Ok(self.set_primary(document))
    }

    /// Replaces the working document and starts a fresh selection for it.
    pub fn set_primary(&mut self, document: D) -> usize {
        let page_count = document.page_count();
        self.selection.rebind(page_count);
        self.primary = Some(document);
        page_count
    }

    /// Opens `path` as the document appended by [`Session::merge`].
    pub fn load_secondary(&mut self, path: &Path) -> Result<usize> {
        let document = D::open(path)?;
        info!(
            "Opened {} for merging ({} pages)",
            path.display(),
            document.page_count()
        );
        Ok(self.set_secondary(document))
    }

    pub fn set_secondary(&mut self, document: D) -> usize {
        let page_count = document.page_count();
        self.secondary = Some(document);
        page_count
    }

    /// Selects or deselects a page of the working document.
    pub fn toggle(&mut self, index: usize) -> Result<bool> {
        if self.primary.is_none() {
            return Err(Error::NoDocument);
        }

        let selected = self.selection.toggle(index)?;
        if selected {
            debug!("Selected page {}", index + 1);
        } else {
            debug!("Deselected page {}", index + 1);
        }
        Ok(selected)
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selection.is_selected(index)
    }

    pub fn selected_pages(&self) -> Vec<usize> {
        self.selection.members()
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// One tile per page, highlighted from the current selection.
    pub fn tiles(&self) -> Vec<PageTile> {
        (0..self.selection.page_count())
            .map(|index| PageTile {
                index,
                number: index + 1,
                selected: self.selection.is_selected(index),
            })
            .collect()
    }

    /// Thumbnails of every page of the working document.
    pub fn previews(&self) -> Result<Vec<Preview>> {
        let document = self.primary.as_ref().ok_or(Error::NoDocument)?;

        self.rasterizer
            .render(document, PREVIEW_DPI, PageSubset::All)?
            .iter()
            .enumerate()
            .map(|(index, bitmap)| Preview::from_bitmap(index, bitmap))
            .collect()
    }

    /// Thumbnails of the selected pages only.
    pub fn selected_previews(&self) -> Result<Vec<Preview>> {
        let document = self.primary.as_ref().ok_or(Error::NoDocument)?;
        let members = self.selection.members();

        self.rasterizer
            .render(document, PREVIEW_DPI, PageSubset::Only(&members))?
            .iter()
            .zip(members.iter())
            .map(|(bitmap, &index)| Preview::from_bitmap(index, bitmap))
            .collect()
    }

    /// Writes the selected pages to `{basename}.pdf` and clears the selection.
    pub fn extract(&mut self) -> Result<PathBuf> {
        let document = self.primary.as_ref().ok_or(Error::NoDocument)?;
        let indices = self.selection.members();
        if indices.is_empty() {
            warn!("Nothing to extract: no pages are selected");
            return Err(Error::EmptySelection);
        }

        info!(
            "Extracting pages {:?} from {}",
            indices.iter().map(|i| i + 1).collect::<Vec<_>>(),
            document.name()
        );

        let path = assembly::extract_to(document, &indices, &self.output_target()?)?;

        self.selection.clear();
        Ok(path)
    }

    /// Writes the working document followed by the second one to `{basename}_merged.pdf`.
    pub fn merge(&self) -> Result<PathBuf> {
        let primary = self.primary.as_ref().ok_or(Error::NoDocument)?;
        let secondary = self.secondary.as_ref();
        if secondary.is_none() {
            warn!("Nothing to merge: no second PDF is loaded");
            return Err(Error::MissingSecondDocument);
        }

        assembly::merge_to(primary, secondary, &self.output_target()?)
    }

    /// Writes every page of the working document as an image.
    pub fn rasterize_all(&self) -> Result<Vec<PathBuf>> {
        let document = self.primary.as_ref().ok_or(Error::NoDocument)?;

        info!(
            "Converting {} to {} at {} dpi",
            document.name(),
            self.config.image_format,
            self.config.dpi.value()
        );

        let request = AssemblyRequest::RasterizeAll {
            document,
            dpi: self.config.dpi,
            format: self.config.image_format,
            target: self.output_target()?,
        };
        assembly::execute(request, &self.rasterizer)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            primary: self.primary.as_ref().map(DocumentSummary::of),
            secondary: self.secondary.as_ref().map(DocumentSummary::of),
            selected_pages: self.selection.members(),
            config: self.config.clone(),
        }
    }

    fn output_target(&self) -> Result<OutputTarget> {
        OutputTarget::new(&self.config.output_dir, &self.config.basename)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub page_count: usize,
}

impl DocumentSummary {
    fn of<D: DocumentModel>(document: &D) -> Self {
        Self {
            name: document.name().to_string(),
            page_count: document.page_count(),
        }
    }
}

/// Serializable view of a session for a UI.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub primary: Option<DocumentSummary>,
    pub secondary: Option<DocumentSummary>,
    pub selected_pages: Vec<usize>,
    pub config: OutputConfig,
}

/// A session that can be driven from several threads.
///
/// Long operations hold the lock while they run. Selection changes never
/// wait for them: they fail with [`Error::Busy`] instead, so the running
/// operation keeps reading the selection it started with.
#[derive(Debug)]
pub struct SharedSession<D, R> {
    inner: Arc<Mutex<Session<D, R>>>,
}

impl<D, R> Clone for SharedSession<D, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D, R> SharedSession<D, R>
where
    D: DocumentModel,
    R: Rasterizer<D>,
{
    pub fn new(session: Session<D, R>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Waits for any running operation and locks the session.
    pub fn lock(&self) -> Result<MutexGuard<'_, Session<D, R>>> {
        self.inner.lock().map_err(|_| Error::StatePoisoned)
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, Session<D, R>>> {
        self.inner.try_lock().map_err(|e| match e {
            TryLockError::WouldBlock => {
                warn!("Selection change rejected: another operation is in progress");
                Error::Busy
            }
            TryLockError::Poisoned(_) => Error::StatePoisoned,
        })
    }

    pub fn toggle(&self, index: usize) -> Result<bool> {
        self.try_lock()?.toggle(index)
    }

    pub fn clear_selection(&self) -> Result<()> {
        self.try_lock()?.clear_selection();
        Ok(())
    }

    pub fn load_primary(&self, path: &Path) -> Result<usize> {
        self.lock()?.load_primary(path)
    }

    pub fn load_secondary(&self, path: &Path) -> Result<usize> {
        self.lock()?.load_secondary(path)
    }

    pub fn extract(&self) -> Result<PathBuf> {
        self.lock()?.extract()
    }

    pub fn merge(&self) -> Result<PathBuf> {
        self.lock()?.merge()
    }

    pub fn rasterize_all(&self) -> Result<Vec<PathBuf>> {
        self.lock()?.rasterize_all()
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        Ok(self.lock()?.snapshot())
    }
}
