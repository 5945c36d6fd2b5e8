use crate::document::{DocumentModel, PdfDocument, Selector};
use crate::error::{Cause, Error, Result};
use crate::raster::{Bitmap, PageSubset, Rasterizer};
use image::Rgb;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Document whose pages are plain labels; a file holds one label per line.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeDocument {
    name: String,
    pages: Vec<String>,
}

impl FakeDocument {
    pub fn new(name: &str, page_count: usize) -> Self {
        Self {
            name: name.to_string(),
            pages: (0..page_count).map(|i| format!("{name} {i}")).collect(),
        }
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }
}

impl DocumentModel for FakeDocument {
    fn open(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| Error::load_failed(path, e))?;
        Ok(Self {
            name: path.to_string_lossy().to_string(),
            pages: contents.lines().map(str::to_string).collect(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn compose(sources: &[&Self], selectors: &[Selector]) -> Result<Self> {
        let pages = selectors
            .iter()
            .map(|selector| {
                let source = sources[selector.source_index];
                source
                    .pages
                    .get(selector.page_index)
                    .cloned()
                    .ok_or(Error::IndexOutOfRange {
                        index: selector.page_index,
                        page_count: source.pages.len(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: sources
                .iter()
                .map(|source| source.name.as_str())
                .collect::<Vec<_>>()
                .join(" + "),
            pages,
        })
    }

    fn save(&mut self, path: &Path) -> std::result::Result<(), Cause> {
        if self.name.contains("unwritable") {
            return Err("refusing to write".into());
        }
        fs::write(path, self.pages.join("\n"))?;
        Ok(())
    }
}

/// Paints each page as a tiny bitmap whose red channel is the page index.
#[derive(Debug, Default)]
pub struct FakeRasterizer {
    failing: bool,
    calls: Mutex<Vec<u32>>,
}

impl FakeRasterizer {
    pub fn failing() -> Self {
        Self {
            failing: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// DPI of every render call so far.
    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

impl Rasterizer<FakeDocument> for FakeRasterizer {
    fn render(&self, document: &FakeDocument, dpi: u32, subset: PageSubset<'_>) -> Result<Vec<Bitmap>> {
        self.calls.lock().unwrap().push(dpi);

        if self.failing {
            return Err(Error::rasterization_failed("document is encrypted"));
        }

        subset
            .indices(document.page_count())?
            .into_iter()
            .map(|index| Ok(Bitmap::from_pixel(4, 6, Rgb([index as u8, 0, 0]))))
            .collect()
    }
}

/// A lopdf document with `page_count` letter pages, each showing "`name` n" (1-indexed).
pub fn pdf_fixture(name: &str, page_count: usize) -> PdfDocument {
    build_fixture(name, page_count, false, Dictionary::new())
}

/// Like [`pdf_fixture`] but the pages inherit a legal media box from the page tree root.
pub fn pdf_fixture_with_inherited_media_box(name: &str, page_count: usize) -> PdfDocument {
    build_fixture(name, page_count, true, Dictionary::new())
}

/// Like [`pdf_fixture`] with `entries` added to the catalog.
pub fn pdf_fixture_with_catalog(name: &str, page_count: usize, entries: Dictionary) -> PdfDocument {
    build_fixture(name, page_count, false, entries)
}

fn build_fixture(
    name: &str,
    page_count: usize,
    inherit_media_box: bool,
    catalog_entries: Dictionary,
) -> PdfDocument {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for i in 0..page_count {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(24)]),
                Operation::new("Td", vec![Object::Integer(100), Object::Integer(600)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("{} {}", name, i + 1).into_bytes(),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if !inherit_media_box {
            page.set("MediaBox", media_box(612, 792));
        }
        page_ids.push(doc.add_object(page));
    }

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Count" => page_count as i64,
        "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    };
    if inherit_media_box {
        pages.set("MediaBox", media_box(612, 1008));
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    catalog.extend(&catalog_entries);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    PdfDocument::from_lopdf(name, doc)
}

fn media_box(width: i64, height: i64) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(width),
        Object::Integer(height),
    ])
}

/// The text shown on each page, in page order.
pub fn page_labels(document: &Document) -> Vec<String> {
    document
        .page_iter()
        .map(|page_id| {
            let content = document.get_page_content(page_id).unwrap();
            let start = content.iter().position(|b| *b == b'(').unwrap() + 1;
            let end = content.iter().rposition(|b| *b == b')').unwrap();
            String::from_utf8_lossy(&content[start..end]).to_string()
        })
        .collect()
}
