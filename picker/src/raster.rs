use crate::document::{DocumentModel, PdfDocument};
use crate::error::{Error, Result};
use log::debug;
use pdfium_render::prelude::*;
use std::env::consts::{ARCH, OS};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::mpsc;

const POINTS_PER_INCH: f32 = 72.0;

pub type Bitmap = image::RgbImage;

/// Which pages of a document to render.
#[derive(Debug, Clone, Copy)]
pub enum PageSubset<'a> {
    All,
    Only(&'a [usize]),
}

impl PageSubset<'_> {
    /// Resolves the subset against a document, in document order.
    pub fn indices(&self, page_count: usize) -> Result<Vec<usize>> {
        match self {
            PageSubset::All => Ok((0..page_count).collect()),
            PageSubset::Only(indices) => {
                if let Some(&index) = indices.iter().find(|&&index| index >= page_count) {
                    return Err(Error::IndexOutOfRange { index, page_count });
                }
                let mut indices = indices.to_vec();
                indices.sort_unstable();
                indices.dedup();
                Ok(indices)
            }
        }
    }
}

/// Turns a document into one bitmap per page.
///
/// Previews and exports share this path; only the resolution and the subset
/// differ.
pub trait Rasterizer<D> {
    fn render(&self, document: &D, dpi: u32, subset: PageSubset<'_>) -> Result<Vec<Bitmap>>;
}

#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
    progress: Option<mpsc::Sender<(usize, usize)>>,
}

impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks for the pdfium shared library in `dir` before the default locations.
    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    /// Reports `(rendered, total)` after each page.
    pub fn with_progress(mut self, sender: mpsc::Sender<(usize, usize)>) -> Self {
        self.progress = Some(sender);
        self
    }

    fn pdfium(&self) -> Result<Pdfium> {
        let mut candidates = Vec::new();

        if let Some(dir) = &self.library_dir {
            candidates.push(dir.as_os_str().to_owned());
        }

        for path in ["./", "./frameworks/"].iter() {
            let mut prefix = OsString::new();
            prefix.push(path);
            prefix.push(ARCH);
            prefix.push("-");
            prefix.push(OS);
            candidates.push(prefix);
        }

        for prefix in candidates {
            let name = Pdfium::pdfium_platform_library_name_at_path(&prefix);

            if let Ok(lib) = Pdfium::bind_to_library(name) {
                return Ok(Pdfium::new(lib));
            }
        }

        Pdfium::bind_to_system_library()
            .map(Pdfium::new)
            .map_err(|e| Error::rasterization_failed(format!("Failed to load Pdfium library: {e}")))
    }
}

impl Rasterizer<PdfDocument> for PdfiumRasterizer {
    fn render(&self, document: &PdfDocument, dpi: u32, subset: PageSubset<'_>) -> Result<Vec<Bitmap>> {
        let indices = subset.indices(document.page_count())?;
        let bytes = document.to_bytes().map_err(Error::RasterizationFailed)?;

        let pdfium = self.pdfium()?;
        let pdf = pdfium
            .load_pdf_from_byte_slice(&bytes, None)
            .map_err(|e| Error::rasterization_failed(e.to_string()))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / POINTS_PER_INCH);

        debug!(
            "Rendering {} page(s) of {} at {} dpi",
            indices.len(),
            document.name(),
            dpi
        );

        let total = indices.len();
        let mut bitmaps = Vec::with_capacity(total);

        for (index, page) in pdf.pages().iter().enumerate() {
            if indices.binary_search(&index).is_err() {
                continue;
            }

            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| Error::rasterization_failed(format!("page {}: {}", index + 1, e)))?
                .as_image()
                .into_rgb8();

            bitmaps.push(bitmap);

            if let Some(sender) = &self.progress {
                let _ = sender.send((bitmaps.len(), total));
            }
        }

        ensure_rendered(bitmaps, &indices)
    }
}

/// Fails unless one bitmap came back for every requested page.
fn ensure_rendered(bitmaps: Vec<Bitmap>, indices: &[usize]) -> Result<Vec<Bitmap>> {
    if bitmaps.len() != indices.len() {
        return Err(Error::rasterization_failed(format!(
            "rendered {} of {} requested page(s)",
            bitmaps.len(),
            indices.len()
        )));
    }

    Ok(bitmaps)
}
