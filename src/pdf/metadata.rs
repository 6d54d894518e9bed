//! PDF metadata and page geometry extraction

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::placement::PageGeometry;

/// Count pages by reading the Count field from the Pages dictionary.
/// More reliable than get_pages() for documents with nested page trees.
fn count_pages_from_catalog(doc: &Document) -> Result<usize> {
    let catalog_ref = doc
        .trailer
        .get(b"Root")
        .map_err(|_| Error::General("No Root in trailer".to_string()))?;

    let catalog_id = match catalog_ref {
        Object::Reference(id) => *id,
        _ => return Err(Error::General("Root is not a reference".to_string())),
    };

    let catalog_dict = match doc.get_object(catalog_id)? {
        Object::Dictionary(dict) => dict,
        _ => return Err(Error::General("Catalog is not a dictionary".to_string())),
    };

    let pages_id = match catalog_dict.get(b"Pages") {
        Ok(Object::Reference(id)) => *id,
        _ => return Err(Error::General("No Pages reference in catalog".to_string())),
    };

    let pages_dict = match doc.get_object(pages_id)? {
        Object::Dictionary(dict) => dict,
        _ => return Err(Error::General("Pages is not a dictionary".to_string())),
    };

    match pages_dict.get(b"Count") {
        Ok(Object::Integer(n)) => Ok(*n as usize),
        _ => Err(Error::General("No Count in Pages".to_string())),
    }
}

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
}

/// Extract metadata from an in-memory PDF
pub fn extract_metadata(bytes: &[u8]) -> Result<PdfMetadata> {
    let doc = Document::load_mem(bytes)?;

    let page_count = count_pages_from_catalog(&doc)?;
    if page_count == 0 {
        return Err(Error::NoPages);
    }

    let mut title = None;
    let mut author = None;

    if let Ok(Object::Reference(info_id)) = doc.trailer.get(b"Info") {
        if let Ok(Object::Dictionary(info_dict)) = doc.get_object(*info_id) {
            title = info_string(info_dict, b"Title");
            author = info_string(info_dict, b"Author");
        }
    }

    Ok(PdfMetadata {
        page_count,
        title,
        author,
    })
}

/// Extract metadata from a PDF file on disk
pub fn inspect_file(path: &Path) -> Result<PdfMetadata> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path)?;
    extract_metadata(&bytes)
}

/// Count the number of pages in an in-memory PDF
pub fn count_pages(bytes: &[u8]) -> Result<usize> {
    let doc = Document::load_mem(bytes)?;

    let page_count = count_pages_from_catalog(&doc)?;
    if page_count == 0 {
        return Err(Error::NoPages);
    }

    Ok(page_count)
}

fn info_string(info: &Dictionary, key: &[u8]) -> Option<String> {
    let obj = info.get(key).ok()?;
    let bytes = obj.as_str().ok()?;
    String::from_utf8(bytes.to_vec()).ok()
}

/// Read a page's size from its MediaBox
///
/// MediaBox is inheritable: when a page dictionary omits it, the Parent
/// chain is searched. Pages with no resolvable MediaBox fall back to US
/// Letter, the same default the underlying viewers assume.
pub fn page_geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    let mut current = Some(page_id);

    // Bounded walk in case of a malformed circular Parent chain
    for _ in 0..32 {
        let id = match current {
            Some(id) => id,
            None => break,
        };

        let dict = match doc.get_object(id) {
            Ok(Object::Dictionary(dict)) => dict,
            _ => break,
        };

        if let Some(geometry) = media_box_of(doc, dict) {
            return geometry;
        }

        current = match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => Some(*parent_id),
            _ => None,
        };
    }

    PageGeometry::letter()
}

fn media_box_of(doc: &Document, dict: &Dictionary) -> Option<PageGeometry> {
    let media_box = match dict.get(b"MediaBox").ok()? {
        Object::Array(values) => values.clone(),
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Array(values) => values.clone(),
            _ => return None,
        },
        _ => return None,
    };

    if media_box.len() != 4 {
        return None;
    }

    let corner: Vec<f64> = media_box.iter().filter_map(number).collect();
    if corner.len() != 4 {
        return None;
    }

    // MediaBox is [x0 y0 x1 y1]; the origin is not always (0, 0)
    Some(PageGeometry::new(
        corner[2] - corner[0],
        corner[3] - corner[1],
    ))
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}
