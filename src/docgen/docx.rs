//! Minimal WordprocessingML writer: one `word/document.xml` with headings
//! and paragraphs, packed into an OPC container.

use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::FileOptions;
use zip::CompressionMethod;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const WORDPROCESSINGML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocLine {
    Heading(String),
    Paragraph(String),
}

/// Splits substituted template text into document lines: `# ` prefixed
/// lines become headings, everything else (including blanks) paragraphs.
pub fn parse_lines(text: &str) -> Vec<DocLine> {
    text.lines()
        .map(|line| match line.strip_prefix("# ") {
            Some(heading) => DocLine::Heading(heading.trim().to_string()),
            None => DocLine::Paragraph(line.trim_end().to_string()),
        })
        .collect()
}

/// Assembles a complete `.docx` byte buffer from document lines.
pub fn build_docx(lines: &[DocLine]) -> Result<Vec<u8>> {
    let document_xml = build_document_xml(lines)?;

    let mut archive = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    archive
        .start_file("[Content_Types].xml", options)
        .context("failed to start [Content_Types].xml")?;
    archive.write_all(CONTENT_TYPES_XML.as_bytes())?;

    archive
        .start_file("_rels/.rels", options)
        .context("failed to start _rels/.rels")?;
    archive.write_all(ROOT_RELS_XML.as_bytes())?;

    archive
        .start_file("word/document.xml", options)
        .context("failed to start word/document.xml")?;
    archive.write_all(&document_xml)?;

    let cursor = archive.finish().context("failed to finalize docx archive")?;
    Ok(cursor.into_inner())
}

fn build_document_xml(lines: &[DocLine]) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut document = BytesStart::new("w:document");
    document.push_attribute(("xmlns:w", WORDPROCESSINGML_NS));
    writer.write_event(Event::Start(document))?;
    writer.write_event(Event::Start(BytesStart::new("w:body")))?;

    for line in lines {
        match line {
            DocLine::Heading(text) => write_paragraph(&mut writer, text, true)?,
            DocLine::Paragraph(text) => write_paragraph(&mut writer, text, false)?,
        }
    }

    writer.write_event(Event::Empty(BytesStart::new("w:sectPr")))?;
    writer.write_event(Event::End(BytesEnd::new("w:body")))?;
    writer.write_event(Event::End(BytesEnd::new("w:document")))?;

    Ok(writer.into_inner().into_inner())
}

fn write_paragraph(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    text: &str,
    heading: bool,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;

    if text.is_empty() {
        writer.write_event(Event::End(BytesEnd::new("w:p")))?;
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    if heading {
        writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;
        writer.write_event(Event::Empty(BytesStart::new("w:b")))?;
        let mut size = BytesStart::new("w:sz");
        size.push_attribute(("w:val", "28"));
        writer.write_event(Event::Empty(size))?;
        writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;
    }

    let mut run_text = BytesStart::new("w:t");
    run_text.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(run_text))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("w:t")))?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_and_paragraphs_are_classified() {
        let lines = parse_lines("# Titre\n\ncorps du texte");
        assert_eq!(
            lines,
            vec![
                DocLine::Heading("Titre".to_string()),
                DocLine::Paragraph(String::new()),
                DocLine::Paragraph("corps du texte".to_string()),
            ]
        );
    }

    #[test]
    fn output_is_a_zip_with_document_part() {
        let bytes = build_docx(&parse_lines("# PV\nRésolution adoptée.")).unwrap();
        // OPC containers are plain zip archives.
        assert_eq!(&bytes[..2], b"PK");

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"[Content_Types].xml".to_string()));
        assert!(names.contains(&"word/document.xml".to_string()));
    }

    #[test]
    fn reserved_xml_characters_are_escaped() {
        let bytes = build_docx(&[DocLine::Paragraph("Société <A> & Fils".to_string())]).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut part = archive.by_name("word/document.xml").unwrap();
        let mut xml = String::new();
        std::io::Read::read_to_string(&mut part, &mut xml).unwrap();
        assert!(xml.contains("Société &lt;A&gt; &amp; Fils"));
    }
}
