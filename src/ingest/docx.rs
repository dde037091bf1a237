// src/ingest/docx.rs
//! DOCX text extraction: unzip `word/document.xml` and walk WordprocessingML runs.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::DetectError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Paragraphs end with `\n`; tabs become a space and breaks a newline.
/// Runs inside a paragraph are concatenated as stored.
pub fn extract_text(bytes: &[u8]) -> Result<String, DetectError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DetectError::extraction("docx", format!("not a zip container: {e}")))?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| DetectError::extraction("docx", format!("{DOCUMENT_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| DetectError::extraction("docx", e))?;
    document_xml_text(&xml)
}

fn document_xml_text(xml: &str) -> Result<String, DetectError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::with_capacity(xml.len() / 4);
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push(' '),
                b"br" | b"cr" | b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| DetectError::extraction("docx", e))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DetectError::extraction(
                    "docx",
                    format!("malformed XML at {}: {e}", reader.buffer_position()),
                ))
            }
            _ => {}
        }
    }
    Ok(out)
}
