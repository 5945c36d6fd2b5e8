//! Structural operations that derive new documents from loaded ones.
//!
//! `extract` and `merge` are pure: they return a new document and never touch
//! their inputs. `execute` runs a whole request, including writing the result
//! into the output directory.

use crate::config::{Dpi, ImageFormat};
use crate::document::{DocumentModel, Selector};
use crate::error::{Error, Result};
use crate::output::{ensure_dir, write_atomically};
use crate::raster::{PageSubset, Rasterizer};
use log::info;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Where the files of one operation go and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    dir: PathBuf,
    basename: String,
}

impl OutputTarget {
    pub fn new(dir: impl Into<PathBuf>, basename: &str) -> Result<Self> {
        let basename = basename.trim();
        if basename.is_empty() {
            return Err(Error::EmptyOutputName);
        }

        Ok(Self {
            dir: dir.into(),
            basename: basename.to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn extract_path(&self) -> PathBuf {
        self.dir.join(format!("{}.pdf", self.basename))
    }

    pub fn merge_path(&self) -> PathBuf {
        self.dir.join(format!("{}_merged.pdf", self.basename))
    }

    pub fn image_path(&self, index: usize, format: ImageFormat) -> PathBuf {
        self.dir
            .join(format!("{}_{}.{}", self.basename, index, format.extension()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyKind {
    Extract,
    Merge,
    RasterizeAll,
}

impl Display for AssemblyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AssemblyKind::Extract => write!(f, "extract"),
            AssemblyKind::Merge => write!(f, "merge"),
            AssemblyKind::RasterizeAll => write!(f, "rasterize"),
        }
    }
}

/// One user action against the loaded documents.
#[derive(Debug)]
pub enum AssemblyRequest<'a, D> {
    Extract {
        document: &'a D,
        /// Ascending, as produced by [`crate::SelectionSet::members`].
        indices: &'a [usize],
        target: OutputTarget,
    },
    Merge {
        primary: &'a D,
        secondary: Option<&'a D>,
        target: OutputTarget,
    },
    RasterizeAll {
        document: &'a D,
        dpi: Dpi,
        format: ImageFormat,
        target: OutputTarget,
    },
}

impl<D> AssemblyRequest<'_, D> {
    pub fn kind(&self) -> AssemblyKind {
        match self {
            AssemblyRequest::Extract { .. } => AssemblyKind::Extract,
            AssemblyRequest::Merge { .. } => AssemblyKind::Merge,
            AssemblyRequest::RasterizeAll { .. } => AssemblyKind::RasterizeAll,
        }
    }
}

/// New document made of `indices` pages of `document`, in that order.
pub fn extract<D: DocumentModel>(document: &D, indices: &[usize]) -> Result<D> {
    if indices.is_empty() {
        return Err(Error::EmptySelection);
    }

    let page_count = document.page_count();
    if let Some(&index) = indices.iter().find(|&&index| index >= page_count) {
        return Err(Error::IndexOutOfRange { index, page_count });
    }

    if indices.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(Error::UnsortedSelection);
    }

    let selectors = indices
        .iter()
        .map(|&page_index| Selector::new(0, page_index))
        .collect::<Vec<_>>();

    D::compose(&[document], &selectors)
}

/// New document with every page of `primary` followed by every page of `secondary`.
pub fn merge<D: DocumentModel>(primary: &D, secondary: Option<&D>) -> Result<D> {
    let secondary = secondary.ok_or(Error::MissingSecondDocument)?;

    let selectors = (0..primary.page_count())
        .map(|page_index| Selector::new(0, page_index))
        .chain((0..secondary.page_count()).map(|page_index| Selector::new(1, page_index)))
        .collect::<Vec<_>>();

    D::compose(&[primary, secondary], &selectors)
}

/// Extracts `indices` pages of `document` into `{basename}.pdf`.
pub fn extract_to<D: DocumentModel>(
    document: &D,
    indices: &[usize],
    target: &OutputTarget,
) -> Result<PathBuf> {
    let extracted = extract(document, indices)?;
    save_document(extracted, &target.extract_path())
}

/// Merges `primary` and `secondary` into `{basename}_merged.pdf`.
pub fn merge_to<D: DocumentModel>(
    primary: &D,
    secondary: Option<&D>,
    target: &OutputTarget,
) -> Result<PathBuf> {
    let merged = merge(primary, secondary)?;
    save_document(merged, &target.merge_path())
}

/// Writes one image per page, named `{basename}_{index}.{ext}`.
///
/// A failure on any page stops the run; pages written before it stay on disk.
pub fn rasterize_all<D, R>(
    document: &D,
    rasterizer: &R,
    dpi: Dpi,
    format: ImageFormat,
    target: &OutputTarget,
) -> Result<Vec<PathBuf>>
where
    D: DocumentModel,
    R: Rasterizer<D>,
{
    let bitmaps = rasterizer.render(document, dpi.value(), PageSubset::All)?;

    ensure_dir(target.dir())?;

    let mut written = Vec::with_capacity(bitmaps.len());
    for (index, bitmap) in bitmaps.into_iter().enumerate() {
        let path = target.image_path(index, format);

        write_atomically(&path, |temporary| {
            bitmap.save_with_format(temporary, format.as_image_format())?;
            Ok(())
        })?;

        info!("Saved: {}", path.display());
        written.push(path);
    }

    Ok(written)
}

/// Runs `request` and returns the files it produced.
pub fn execute<D, R>(request: AssemblyRequest<'_, D>, rasterizer: &R) -> Result<Vec<PathBuf>>
where
    D: DocumentModel,
    R: Rasterizer<D>,
{
    match request {
        AssemblyRequest::Extract {
            document,
            indices,
            target,
        } => extract_to(document, indices, &target).map(|path| vec![path]),
        AssemblyRequest::Merge {
            primary,
            secondary,
            target,
        } => merge_to(primary, secondary, &target).map(|path| vec![path]),
        AssemblyRequest::RasterizeAll {
            document,
            dpi,
            format,
            target,
        } => rasterize_all(document, rasterizer, dpi, format, &target),
    }
}

fn save_document<D: DocumentModel>(mut document: D, path: &Path) -> Result<PathBuf> {
    if let Some(dir) = path.parent() {
        ensure_dir(dir)?;
    }

    write_atomically(path, |temporary| document.save(temporary))?;

    info!(
        "Saved {} page(s) to {}",
        document.page_count(),
        path.display()
    );

    Ok(path.to_path_buf())
}
