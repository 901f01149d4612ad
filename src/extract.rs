use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use zip::ZipArchive;

const SLIDE_PREFIX: &str = "ppt/slides/slide";
const SLIDE_SUFFIX: &str = ".xml";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("payload is not a readable presentation archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("slide entry {name} could not be read")]
    SlideRead {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("slide entry {name} is not valid XML")]
    SlideXml {
        name: String,
        #[source]
        source: quick_xml::Error,
    },
    #[error("presentation contains no slides")]
    EmptyDeck,
}

pub fn extract_slide_texts(payload: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut archive = ZipArchive::new(Cursor::new(payload))?;

    let mut slide_entries: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect();
    slide_entries.sort();

    if slide_entries.is_empty() {
        return Err(ExtractError::EmptyDeck);
    }

    let mut texts = Vec::with_capacity(slide_entries.len());
    for (_, name) in slide_entries {
        let mut entry = archive.by_name(&name)?;
        let mut xml = String::new();
        entry
            .read_to_string(&mut xml)
            .map_err(|source| ExtractError::SlideRead {
                name: name.clone(),
                source,
            })?;
        texts.push(slide_text_from_xml(&name, &xml)?);
    }

    Ok(texts)
}

fn slide_number(entry_name: &str) -> Option<u32> {
    entry_name
        .strip_prefix(SLIDE_PREFIX)?
        .strip_suffix(SLIDE_SUFFIX)?
        .parse()
        .ok()
}

fn slide_text_from_xml(entry_name: &str, xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut runs: Vec<String> = Vec::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = false;
                }
            }
            Ok(Event::Text(e)) => {
                if in_text_run {
                    let decoded = e.xml_content().unwrap_or_default();
                    let trimmed = decoded.trim();
                    if !trimmed.is_empty() {
                        runs.push(trimmed.to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(source) => {
                return Err(ExtractError::SlideXml {
                    name: entry_name.to_string(),
                    source,
                });
            }
            _ => {}
        }
    }

    Ok(runs.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn slide_xml(runs: &[&str]) -> String {
        let body: String = runs
            .iter()
            .map(|r| format!("<a:r><a:t>{r}</a:t></a:r>"))
            .collect();
        format!(
            "<p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
             xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\">\
             <p:txBody><a:p>{body}</a:p></p:txBody></p:sld>"
        )
    }

    fn build_deck(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            writer.start_file(name.to_string(), options).expect("entry");
            writer.write_all(content.as_bytes()).expect("content");
        }
        writer.finish().expect("finish").into_inner()
    }

    #[test]
    fn slides_come_back_in_numeric_order() {
        let s1 = slide_xml(&["Intro"]);
        let s2 = slide_xml(&["Middle", "part"]);
        let s10 = slide_xml(&["Outro"]);
        let deck = build_deck(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("docProps/app.xml", "<Properties/>"),
            ("ppt/slides/slide1.xml", s1.as_str()),
            ("ppt/slides/_rels/slide1.xml.rels", "<Relationships/>"),
        ]);

        let texts = extract_slide_texts(&deck).expect("extract");
        assert_eq!(texts, vec!["Intro", "Middle part", "Outro"]);
    }

    #[test]
    fn textless_slide_yields_empty_string() {
        let s1 = slide_xml(&[]);
        let deck = build_deck(&[("ppt/slides/slide1.xml", s1.as_str())]);

        let texts = extract_slide_texts(&deck).expect("extract");
        assert_eq!(texts, vec![String::new()]);
    }

    #[test]
    fn garbage_payload_is_an_archive_error() {
        let err = extract_slide_texts(b"this is not a deck").expect_err("must fail");
        assert!(matches!(err, ExtractError::Archive(_)));
    }

    #[test]
    fn archive_without_slides_is_an_empty_deck() {
        let deck = build_deck(&[("docProps/app.xml", "<Properties/>")]);
        let err = extract_slide_texts(&deck).expect_err("must fail");
        assert!(matches!(err, ExtractError::EmptyDeck));
    }
}
