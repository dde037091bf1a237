// src/ingest/pdf.rs
//! PDF reading: per-page text layer, plus embedded page images for pages that
//! have no text (scans).

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::DetectError;

/// Inherited-attribute lookups stop after this many `Parent` hops.
const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub struct PageImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct PdfPage {
    pub number: u32,
    pub text: String,
    /// Only collected when `text` is empty.
    pub images: Vec<PageImage>,
}

/// Parse the document and return its pages in order.
pub fn read_pages(bytes: &[u8]) -> Result<Vec<PdfPage>, DetectError> {
    let doc = Document::load_mem(bytes).map_err(|e| DetectError::extraction("pdf", e))?;
    if doc.is_encrypted() {
        return Err(DetectError::extraction("pdf", "document is encrypted"));
    }

    let pages = doc
        .get_pages()
        .into_iter()
        .map(|(number, page_id)| {
            let text = match doc.extract_text(&[number]) {
                Ok(t) => t.trim().to_string(),
                Err(e) => {
                    tracing::debug!(page = number, error = %e, "no usable text layer");
                    String::new()
                }
            };
            let images = if text.is_empty() {
                page_images(&doc, page_id)
            } else {
                Vec::new()
            };
            PdfPage {
                number,
                text,
                images,
            }
        })
        .collect();
    Ok(pages)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

/// `Resources` of a page, following `Parent` links for inherited values.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(res) = node.get(b"Resources") {
            return resolve_dict(doc, res);
        }
        node = match node.get(b"Parent").ok()? {
            Object::Reference(id) => doc.get_dictionary(*id).ok()?,
            _ => return None,
        };
    }
    None
}

fn page_images(doc: &Document, page_id: ObjectId) -> Vec<PageImage> {
    let Some(xobjects) = page_resources(doc, page_id)
        .and_then(|r| r.get(b"XObject").ok())
        .and_then(|x| resolve_dict(doc, x))
    else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(_, obj)| match resolve(doc, obj)? {
            Object::Stream(s) if name_of(&s.dict, b"Subtype") == Some(b"Image".as_slice()) => {
                decode_image(s)
            }
            _ => None,
        })
        .collect()
}

fn name_of<'a>(dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    match dict.get(key).ok()? {
        Object::Name(n) => Some(n.as_slice()),
        _ => None,
    }
}

fn int_of(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    match dict.get(key).ok()? {
        Object::Integer(i) => u32::try_from(*i).ok(),
        _ => None,
    }
}

/// JPEG streams pass through; raw 8-bit RGB/Gray bitmaps are re-encoded as PNG.
/// Anything else (JBIG2, CCITT, indexed colour) is skipped.
fn decode_image(stream: &Stream) -> Option<PageImage> {
    let filter: Option<&[u8]> = match stream.dict.get(b"Filter").ok() {
        Some(Object::Name(n)) => Some(n.as_slice()),
        Some(Object::Array(a)) if a.len() == 1 => match &a[0] {
            Object::Name(n) => Some(n.as_slice()),
            _ => return None,
        },
        Some(_) => return None,
        None => None,
    };

    let raw = match filter {
        Some(b"DCTDecode") => {
            return Some(PageImage {
                bytes: stream.content.clone(),
                mime_type: "image/jpeg",
            })
        }
        Some(b"FlateDecode") => stream.decompressed_content().ok()?,
        None => stream.content.clone(),
        Some(_) => return None,
    };

    if int_of(&stream.dict, b"BitsPerComponent") != Some(8) {
        return None;
    }
    let width = int_of(&stream.dict, b"Width")?;
    let height = int_of(&stream.dict, b"Height")?;
    let img = match name_of(&stream.dict, b"ColorSpace")? {
        b"DeviceRGB" => DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, raw)?),
        b"DeviceGray" => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, raw)?),
        _ => return None,
    };

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).ok()?;
    Some(PageImage {
        bytes: png,
        mime_type: "image/png",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_an_extraction_error() {
        let err = read_pages(b"%PDF-1.4 truncated").unwrap_err();
        assert!(matches!(err, DetectError::Extraction { format: "pdf", .. }));
    }

    #[test]
    fn raw_gray_bitmap_becomes_png() {
        let mut dict = Dictionary::new();
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", Object::Integer(2));
        dict.set("Height", Object::Integer(2));
        dict.set("BitsPerComponent", Object::Integer(8));
        dict.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
        let stream = Stream::new(dict, vec![0, 64, 128, 255]);
        let img = decode_image(&stream).unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert!(img.bytes.starts_with(b"\x89PNG"));
    }

    #[test]
    fn unsupported_filters_are_skipped() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Name(b"JBIG2Decode".to_vec()));
        assert!(decode_image(&Stream::new(dict, vec![1, 2, 3])).is_none());
    }
}
