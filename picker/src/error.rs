use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use thiserror::Error;

/// Underlying failure reported by a collaborator (pdf parser, pdfium, file system).
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No PDF is loaded")]
    NoDocument,

    #[error("Page {index} is out of range (document has {page_count} pages)")]
    IndexOutOfRange { index: usize, page_count: usize },

    #[error("No pages are selected")]
    EmptySelection,

    #[error("Page indices must be strictly ascending")]
    UnsortedSelection,

    #[error("No second PDF is loaded for merging")]
    MissingSecondDocument,

    #[error("The output file name is empty")]
    EmptyOutputName,

    #[error("DPI must be between 150 and 400 in steps of 10, got {0}")]
    InvalidDpi(u32),

    #[error("Failed to rasterize the document: {0}")]
    RasterizationFailed(#[source] Cause),

    #[error("Failed to load {}: {source}", path.display())]
    DocumentLoadFailed {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    #[error("Invalid PDF: {0}")]
    MalformedDocument(String),

    #[error("Failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    #[error("Another operation is in progress")]
    Busy,

    #[error("Couldn't lock the session state")]
    StatePoisoned,
}

impl Error {
    pub fn load_failed(path: impl Into<PathBuf>, source: impl Into<Cause>) -> Self {
        Error::DocumentLoadFailed {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn write_failed(path: impl Into<PathBuf>, source: impl Into<Cause>) -> Self {
        Error::WriteFailed {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn rasterization_failed(source: impl Into<Cause>) -> Self {
        Error::RasterizationFailed(source.into())
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from(self)
    }
}

/// Stable discriminant for reporting failures across the UI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NoDocument = 1,
    IndexOutOfRange = 2,
    EmptySelection = 3,
    UnsortedSelection = 4,
    MissingSecondDocument = 5,
    EmptyOutputName = 6,
    InvalidDpi = 7,
    RasterizationFailed = 8,
    DocumentLoadFailed = 9,
    MalformedDocument = 10,
    WriteFailed = 11,
    Busy = 12,
    StatePoisoned = 13,
}

impl ErrorKind {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

impl From<&Error> for ErrorKind {
    fn from(err: &Error) -> Self {
        match err {
            Error::NoDocument => ErrorKind::NoDocument,
            Error::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Error::EmptySelection => ErrorKind::EmptySelection,
            Error::UnsortedSelection => ErrorKind::UnsortedSelection,
            Error::MissingSecondDocument => ErrorKind::MissingSecondDocument,
            Error::EmptyOutputName => ErrorKind::EmptyOutputName,
            Error::InvalidDpi(_) => ErrorKind::InvalidDpi,
            Error::RasterizationFailed(_) => ErrorKind::RasterizationFailed,
            Error::DocumentLoadFailed { .. } => ErrorKind::DocumentLoadFailed,
            Error::MalformedDocument(_) => ErrorKind::MalformedDocument,
            Error::WriteFailed { .. } => ErrorKind::WriteFailed,
            Error::Busy => ErrorKind::Busy,
            Error::StatePoisoned => ErrorKind::StatePoisoned,
        }
    }
}
