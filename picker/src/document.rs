use crate::error::{Cause, Error, Result};
use lopdf::{Bookmark, Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guards against cyclic `Parent` chains in broken files.
const MAX_TREE_DEPTH: usize = 64;

/// The document collaborator the assembly engine works against.
///
/// Documents are never mutated by assembly: every structural operation goes
/// through [`DocumentModel::compose`], which builds a new document out of
/// pages picked from one or more sources.
pub trait DocumentModel: Sized {
    fn open(path: &Path) -> Result<Self>;

    /// Human readable identity, used for logging and outlines.
    fn name(&self) -> &str;

    fn page_count(&self) -> usize;

    /// Builds a new document whose pages are copies of the selected pages, in
    /// selector order.
    fn compose(sources: &[&Self], selectors: &[Selector]) -> Result<Self>;

    fn save(&mut self, path: &Path) -> std::result::Result<(), Cause>;
}

/// Points at one page of one of the sources handed to [`DocumentModel::compose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
    pub source_index: usize,
    pub page_index: usize,
}

impl Selector {
    pub fn new(source_index: usize, page_index: usize) -> Self {
        Self {
            source_index,
            page_index,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PdfDocument {
    id: String,
    name: String,
    path: Option<PathBuf>,
    document: Document,
}

impl PdfDocument {
    /// Wraps an in-memory document that has no file behind it.
    pub fn from_lopdf(name: impl Into<String>, document: Document) -> Self {
        Self {
            id: crate::random_id(),
            name: name.into(),
            path: None,
            document,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn lopdf(&self) -> &Document {
        &self.document
    }

    /// Serializes the document, leaving `self` untouched.
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, Cause> {
        let mut bytes = Vec::new();
        self.document.clone().save_to(&mut bytes)?;
        Ok(bytes)
    }
}

impl DocumentModel for PdfDocument {
    fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::load_failed(path, e))?;

        // Some producers emit junk before the header.
        let head = &bytes[..bytes.len().min(1024)];
        let offset = head
            .windows(5)
            .position(|w| w == b"%PDF-")
            .ok_or_else(|| Error::load_failed(path, "Failed to find PDF header"))?;

        let document = Document::load_from(Cursor::new(&bytes[offset..]))
            .map_err(|e| Error::load_failed(path, e))?;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        Ok(Self {
            id: crate::random_id(),
            name,
            path: Some(path.to_path_buf()),
            document,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    fn compose(sources: &[&Self], selectors: &[Selector]) -> Result<Self> {
        // Starting id for the first source; each source is renumbered past the previous one.
        let mut max_id = 1;
        let mut documents_objects = BTreeMap::new();
        let mut document = Document::with_version("1.5");

        let mut source_pages: Vec<Vec<(ObjectId, Dictionary)>> = Vec::new();

        for source in sources {
            let mut doc = source.document.clone();

            doc.renumber_objects_with(max_id);

            max_id = doc.max_id + 1;

            let pages = doc
                .get_pages()
                .into_values()
                .map(|object_id| {
                    let mut page = doc.get_dictionary(object_id)?.clone();
                    inherit_attributes(&doc, &mut page);
                    Ok((object_id, page))
                })
                .collect::<lopdf::Result<Vec<_>>>()
                .map_err(|e| Error::MalformedDocument(e.to_string()))?;

            source_pages.push(pages);
            documents_objects.extend(doc.objects);
        }

        for selector in selectors {
            let pages = source_pages.get(selector.source_index).ok_or_else(|| {
                Error::MalformedDocument(format!("No source at index {}", selector.source_index))
            })?;
            if selector.page_index >= pages.len() {
                return Err(Error::IndexOutOfRange {
                    index: selector.page_index,
                    page_count: pages.len(),
                });
            }
        }

        // "Catalog" and "Pages" are mandatory.
        let mut catalog_object: Option<(ObjectId, Object)> = None;
        let mut pages_object: Option<(ObjectId, Object)> = None;

        for (object_id, object) in documents_objects.iter() {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" => {
                    // The first source's catalog becomes the root of the new document.
                    if catalog_object.is_none() {
                        catalog_object = Some((*object_id, object.clone()));
                    }
                }
                b"Pages" => {
                    // Every page tree node is folded into a single root.
                    if let Ok(dictionary) = object.as_dict() {
                        let mut dictionary = dictionary.clone();
                        if let Some((_, ref object)) = pages_object {
                            if let Ok(old_dictionary) = object.as_dict() {
                                dictionary.extend(old_dictionary);
                            }
                        }

                        pages_object = Some((
                            if let Some((id, _)) = pages_object {
                                id
                            } else {
                                *object_id
                            },
                            Object::Dictionary(dictionary),
                        ));
                    }
                }
                b"Page" => {}     // Only selected pages are inserted, below
                b"Outlines" => {} // Outlines of the sources are not carried over
                b"Outline" => {}
                _ => {
                    document.objects.insert(*object_id, object.clone());
                }
            }
        }

        let pages_object = pages_object
            .ok_or_else(|| Error::MalformedDocument("Pages root not found".to_string()))?;
        let catalog_object = catalog_object
            .ok_or_else(|| Error::MalformedDocument("Catalog root not found".to_string()))?;

        let contributing_sources = {
            let mut indices = selectors.iter().map(|s| s.source_index).collect::<Vec<_>>();
            indices.sort_unstable();
            indices.dedup();
            indices.len()
        };
        let mut bookmarked = vec![false; sources.len()];

        let mut selected_pages = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let (object_id, page) = &source_pages[selector.source_index][selector.page_index];

            let mut dictionary = page.clone();
            dictionary.set("Parent", pages_object.0);

            if contributing_sources > 1 && !bookmarked[selector.source_index] {
                let bookmark = Bookmark::new(
                    sources[selector.source_index].name().to_string(),
                    [0.0, 0.0, 0.0],
                    0,
                    *object_id,
                );
                document.add_bookmark(bookmark, None);
                bookmarked[selector.source_index] = true;
            }

            selected_pages.push(*object_id);

            document
                .objects
                .insert(*object_id, Object::Dictionary(dictionary));
        }

        if let Ok(dictionary) = pages_object.1.as_dict() {
            let mut dictionary = dictionary.clone();

            // Folded intermediate nodes may have left their own parent behind.
            dictionary.remove(b"Parent");
            dictionary.set("Count", selected_pages.len() as u32);
            dictionary.set(
                "Kids",
                selected_pages
                    .into_iter()
                    .map(Object::Reference)
                    .collect::<Vec<_>>(),
            );

            document
                .objects
                .insert(pages_object.0, Object::Dictionary(dictionary));
        }

        if let Ok(dictionary) = catalog_object.1.as_dict() {
            let mut dictionary = dictionary.clone();
            dictionary.set("Pages", pages_object.0);
            dictionary.remove(b"Outlines");
            // Labels are keyed by page position, which no longer matches.
            dictionary.remove(b"PageLabels");

            document
                .objects
                .insert(catalog_object.0, Object::Dictionary(dictionary));
        }

        document.trailer.set("Root", catalog_object.0);

        document.max_id = document
            .objects
            .keys()
            .map(|(id, _)| *id)
            .max()
            .unwrap_or(0);

        // Object ids are left as assigned above; bookmarks refer to them.
        document.adjust_zero_pages();

        if let Some(outline_id) = document.build_outline() {
            if let Ok(Object::Dictionary(dict)) = document.get_object_mut(catalog_object.0) {
                dict.set("Outlines", Object::Reference(outline_id));
            }
        }

        document.prune_objects();
        document.compress();

        let name = sources
            .iter()
            .map(|source| source.name())
            .collect::<Vec<_>>()
            .join(" + ");

        Ok(Self::from_lopdf(name, document))
    }

    fn save(&mut self, path: &Path) -> std::result::Result<(), Cause> {
        self.document.save(path)?;
        Ok(())
    }
}

fn inherit_attributes(doc: &Document, page: &mut Dictionary) {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let Some(parent_id) = parent else {
            return;
        };
        let Ok(node) = doc.get_dictionary(parent_id) else {
            return;
        };

        for key in INHERITABLE_ATTRIBUTES {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }

        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
}
