//! Report export: lays the analysis text out as a paginated PDF, entirely
//! in memory.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use thiserror::Error;

const REPORT_TITLE: &str = "Medical Analysis Report";

// A4 portrait, in points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const TITLE_FONT_SIZE: f32 = 16.0;
const BODY_FONT_SIZE: f32 = 11.0;
const LEADING: f32 = 14.0;
const MAX_LINE_CHARS: usize = 88;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no text to export")]
    EmptyText,

    #[error("failed to assemble PDF document: {0}")]
    Assembly(String),
}

/// Render the analysis text into PDF bytes.
///
/// The glyph set is the PDF base Helvetica font; characters outside its
/// encoding are substituted so the document stays valid for any input.
pub fn render_report(text: &str) -> Result<Vec<u8>, ExportError> {
    if text.trim().is_empty() {
        return Err(ExportError::EmptyText);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let lines = wrap_text(text, MAX_LINE_CHARS);
    // The title block occupies the top of the first page; pages share a
    // uniform capacity so the layout below stays simple.
    let lines_per_page =
        ((PAGE_HEIGHT - 2.0 * MARGIN - 2.0 * LEADING) / LEADING) as usize;

    let mut page_ids: Vec<Object> = Vec::new();
    for (page_index, page_lines) in lines.chunks(lines_per_page).enumerate() {
        let content = page_content(page_index, page_lines);
        let encoded = content
            .encode()
            .map_err(|e| ExportError::Assembly(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id.into());
    }

    let page_count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ExportError::Assembly(e.to_string()))?;
    Ok(buffer)
}

fn page_content(page_index: usize, lines: &[String]) -> Content {
    let mut operations = Vec::new();
    let mut top = PAGE_HEIGHT - MARGIN;

    if page_index == 0 {
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), TITLE_FONT_SIZE.into()]),
            Operation::new("Td", vec![MARGIN.into(), top.into()]),
            Operation::new("Tj", vec![Object::string_literal(REPORT_TITLE)]),
            Operation::new("ET", vec![]),
        ]);
        top -= 2.0 * LEADING;
    }

    operations.extend([
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), BODY_FONT_SIZE.into()]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new("Td", vec![MARGIN.into(), top.into()]),
    ]);
    for (i, line) in lines.iter().enumerate() {
        let literal = Object::string_literal(encode_line(line));
        if i == 0 {
            operations.push(Operation::new("Tj", vec![literal]));
        } else {
            // ' moves to the next line (per TL) and shows the text.
            operations.push(Operation::new("'", vec![literal]));
        }
    }
    operations.push(Operation::new("ET", vec![]));

    Content { operations }
}

/// Wrap paragraphs on word boundaries; blank lines survive as paragraph
/// separators.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars
            {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// Restrict a line to bytes Helvetica/WinAnsi can show; anything else is
/// substituted with '?'.
fn encode_line(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() {
                c as u8
            } else {
                b'?'
            }
        })
        .collect()
}
