//! Raw text from Word 2007+ (`.docx`) archives.

use super::ExtractError;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::Read;

const DOCUMENT_PART: &str = "word/document.xml";

/// Upper bound on the decompressed main document part.
const MAX_DOCUMENT_PART_BYTES: u64 = 50 * 1024 * 1024;

/// Extract the body text of a DOCX archive, one line per paragraph.
pub(super) fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|err| ExtractError::Ooxml(err.to_string()))?;
    let entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|err| ExtractError::Ooxml(format!("{DOCUMENT_PART}: {err}")))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_DOCUMENT_PART_BYTES)
        .read_to_end(&mut xml)
        .map_err(|err| ExtractError::Ooxml(err.to_string()))?;
    if xml.len() as u64 >= MAX_DOCUMENT_PART_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "{DOCUMENT_PART} exceeds size limit"
        )));
    }

    paragraph_text(&xml)
}

/// Concatenate `w:t` runs, breaking lines at paragraph ends and explicit breaks.
///
/// Tabs and breaks only count inside a `w:r` run; outside one (e.g. tab stops under `w:pPr`)
/// they are layout definitions, not content.
fn paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut out = String::new();
    let mut run_depth = 0usize;
    let mut in_run_text = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"r" => run_depth += 1,
                b"t" => in_run_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"r" => run_depth = run_depth.saturating_sub(1),
                b"t" => in_run_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) if run_depth > 0 => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(text)) if in_run_text => {
                let unescaped = text
                    .unescape()
                    .map_err(|err| ExtractError::Ooxml(err.to_string()))?;
                out.push_str(&unescaped);
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(ExtractError::Ooxml(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"";

    #[test]
    fn joins_runs_and_breaks_paragraphs() {
        let xml = format!(
            "<w:document {NS}><w:body>\
             <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space=\"preserve\"> world</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Tom &amp; Jerry</w:t><w:tab/><w:t>end</w:t></w:r></w:p>\
             </w:body></w:document>"
        );
        let text = paragraph_text(xml.as_bytes()).expect("parse");
        assert_eq!(text, "Hello world\nTom & Jerry\tend");
    }

    #[test]
    fn ignores_text_outside_runs() {
        let xml = format!(
            "<w:document {NS}>\n  <w:body>\n    <w:p><w:pPr><w:pStyle w:val=\"Title\"/></w:pPr><w:r><w:t>Title</w:t></w:r></w:p>\n  </w:body>\n</w:document>"
        );
        assert_eq!(paragraph_text(xml.as_bytes()).expect("parse"), "Title");
    }

    #[test]
    fn tab_stop_definitions_are_not_text() {
        let xml = format!(
            "<w:document {NS}><w:body>\
             <w:p><w:pPr><w:tabs><w:tab w:val=\"left\" w:pos=\"720\"/><w:tab w:val=\"right\" w:pos=\"9360\"/></w:tabs></w:pPr>\
             <w:r><w:t>Heading</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Line one</w:t><w:br/><w:t>Line two</w:t></w:r></w:p>\
             </w:body></w:document>"
        );
        let text = paragraph_text(xml.as_bytes()).expect("parse");
        assert_eq!(text, "Heading\nLine one\nLine two");
    }

    #[test]
    fn archive_without_document_part_is_rejected() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("docProps/core.xml", zip::write::SimpleFileOptions::default())
                .expect("start entry");
            zip.finish().expect("finish");
        }
        let error = extract_docx(&buf).expect_err("missing part");
        assert!(error.to_string().contains(DOCUMENT_PART));
    }
}
