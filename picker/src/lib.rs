//! Page selection and document assembly for PDF files.
//!
//! A [`Session`] holds the working PDF, an optional second PDF for merging and
//! the set of selected pages. From those it can extract the selected pages into
//! a new PDF, append the second PDF to the first, or write every page out as an
//! image.

pub mod assembly;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod preview;
pub mod raster;
pub mod selection;
pub mod session;

#[cfg(test)]
mod test_support;

use rand::distr::Alphanumeric;
use rand::Rng;

pub use crate::assembly::{AssemblyKind, AssemblyRequest, OutputTarget};
pub use crate::config::{Dpi, ImageFormat, OutputConfig, DEFAULT_BASENAME, DEFAULT_OUTPUT_DIR};
pub use crate::document::{DocumentModel, PdfDocument, Selector};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::preview::{PageTile, Preview};
pub use crate::raster::{Bitmap, PageSubset, PdfiumRasterizer, Rasterizer};
pub use crate::selection::SelectionSet;
pub use crate::session::{Session, SessionSnapshot, SessionState, SharedSession};

/// The session used by applications: lopdf documents rendered with pdfium.
pub type PdfSession = Session<PdfDocument, PdfiumRasterizer>;

pub(crate) fn random_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect()
}
