//! Document-information metadata for the rendered PDF.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, StringFormat};
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::model::mail::Message;
use crate::parser::header::decode_header;

/// Value written to the `Producer` key.
pub const PRODUCER: &str = "eml2pdf";

/// PDF info keys filled from message headers.
const HEADER_MAPPING: [(&str, &str); 3] = [
    ("Author", "From"),
    ("Title", "Subject"),
    ("X-eml2pdf-To", "To"),
];

/// Info-dictionary entries for `msg`: decoded headers plus the producer.
pub fn message_metadata(msg: &Message) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = HEADER_MAPPING
        .iter()
        .filter_map(|(key, header)| {
            msg.header_value(header)
                .map(|value| (key.to_string(), decode_header(value)))
        })
        .collect();
    map.insert("Producer".to_string(), PRODUCER.to_string());
    map
}

/// Merge `entries` into the info dictionary of the PDF at `path`.
///
/// Keys not in `entries` are preserved. The file is rewritten through a
/// temporary file in the same directory and renamed over the original.
pub fn merge_pdf_metadata(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    let mut doc = Document::load(path)?;

    let info_id = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };

    match info_id {
        Some(id) => {
            let info = doc.get_object_mut(id)?.as_dict_mut()?;
            apply_entries(info, entries);
        }
        None => {
            let mut info = match doc.trailer.get(b"Info") {
                Ok(Object::Dictionary(existing)) => existing.clone(),
                _ => Dictionary::new(),
            };
            apply_entries(&mut info, entries);
            let id = doc.add_object(info);
            doc.trailer.set("Info", Object::Reference(id));
        }
    }

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix("eml2pdf_metadata")
        .suffix(".pdf")
        .tempfile_in(dir)
        .map_err(|e| ConvertError::io(dir, e))?;
    doc.save_to(tmp.as_file_mut())?;
    tmp.persist(path)
        .map_err(|e| ConvertError::io(path, e.error))?;

    debug!(path = %path.display(), keys = entries.len(), "Merged PDF metadata");
    Ok(())
}

fn apply_entries(info: &mut Dictionary, entries: &BTreeMap<String, String>) {
    for (key, value) in entries {
        info.set(key.as_bytes().to_vec(), pdf_text_string(value));
    }
}

/// A PDF text string: literal for ASCII, UTF-16BE with a byte order mark otherwise.
fn pdf_text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn write_minimal_pdf(path: &Path, info: Option<Dictionary>) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        if let Some(info) = info {
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", Object::Reference(info_id));
        }
        doc.save(path).unwrap();
    }

    fn read_info(path: &Path) -> Dictionary {
        let doc = Document::load(path).unwrap();
        let id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        doc.get_object(id).unwrap().as_dict().unwrap().clone()
    }

    fn string_value(info: &Dictionary, key: &[u8]) -> Vec<u8> {
        match info.get(key).unwrap() {
            Object::String(bytes, _) => bytes.clone(),
            other => panic!("not a string: {other:?}"),
        }
    }

    #[test]
    fn test_merge_creates_info_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        write_minimal_pdf(&path, None);

        let entries = BTreeMap::from([("Title".to_string(), "Quarterly report".to_string())]);
        merge_pdf_metadata(&path, &entries).unwrap();

        let info = read_info(&path);
        assert_eq!(string_value(&info, b"Title"), b"Quarterly report");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_merge_preserves_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        write_minimal_pdf(
            &path,
            Some(dictionary! {
                "Creator" => Object::string_literal("wkhtmltopdf"),
                "Title" => Object::string_literal("old"),
            }),
        );

        let entries = BTreeMap::from([
            ("Title".to_string(), "new".to_string()),
            ("Producer".to_string(), PRODUCER.to_string()),
        ]);
        merge_pdf_metadata(&path, &entries).unwrap();

        let info = read_info(&path);
        assert_eq!(string_value(&info, b"Creator"), b"wkhtmltopdf");
        assert_eq!(string_value(&info, b"Title"), b"new");
        assert_eq!(string_value(&info, b"Producer"), b"eml2pdf");
    }

    #[test]
    fn test_non_ascii_is_utf16_with_bom() {
        match pdf_text_string("café") {
            Object::String(bytes, _) => {
                assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
                assert_eq!(bytes.len(), 2 + 4 * 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_message_metadata_mapping() {
        let msg = crate::parser::mime::parse_message(
            b"From: =?utf-8?q?J=C3=B6rg?= <j@example.com>\r\nSubject: Hi\r\n\r\nbody\r\n",
        )
        .unwrap();
        let map = message_metadata(&msg);
        assert_eq!(map.get("Author").map(String::as_str), Some("Jörg <j@example.com>"));
        assert_eq!(map.get("Title").map(String::as_str), Some("Hi"));
        assert_eq!(map.get("Producer").map(String::as_str), Some("eml2pdf"));
        assert!(!map.contains_key("X-eml2pdf-To"));
    }
}
