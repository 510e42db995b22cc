//! Markdown to PDF export.
//!
//! Supports the subset of markdown the dispatch reports use: headings,
//! bullet and numbered lists, tables, paragraphs, horizontal rules and image
//! links. Text is laid out on A4 pages with the built-in Helvetica fonts,
//! wrapped to the page width, with page breaks inserted as needed.

use std::io::BufWriter;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use crate::ReportError;
use crate::markdown::strip_inline;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const BODY_SIZE: f32 = 11.0;
const PT_TO_MM: f32 = 0.3528;

/// One laid-out line of the document.
#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    size: f32,
    bold: bool,
    indent: f32,
    /// Extra space before the line, in millimetres.
    space_before: f32,
}

fn pdf_error(e: impl std::fmt::Display) -> ReportError {
    ReportError::Pdf {
        message: e.to_string(),
    }
}

/// Strips inline markup and replaces characters the built-in fonts lack.
fn plain_text(text: &str) -> String {
    // Built-in fonts only cover Latin-1.
    strip_inline(text)
        .chars()
        .map(|c| if (c as u32) < 0x100 { c } else { '?' })
        .collect()
}

/// Word-wraps `text` to at most `max_chars` characters per line.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > max_chars {
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
    lines
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn max_chars(size: f32, indent: f32) -> usize {
    // Helvetica averages roughly half an em per character.
    let usable = 2.0f32.mul_add(-MARGIN, PAGE_WIDTH) - indent;
    (usable / (size * PT_TO_MM * 0.5)).floor().max(10.0) as usize
}

fn push_wrapped(lines: &mut Vec<Line>, text: &str, size: f32, bold: bool, indent: f32, space_before: f32) {
    let wrapped = wrap_text(text, max_chars(size, indent));
    for (i, text) in wrapped.into_iter().enumerate() {
        lines.push(Line {
            text,
            size,
            bold,
            indent,
            space_before: if i == 0 { space_before } else { 0.0 },
        });
    }
}

/// Turns markdown into styled lines.
#[allow(clippy::cast_precision_loss)]
fn layout(markdown: &str) -> Vec<Line> {
    let mut lines = Vec::new();

    for raw in markdown.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        let hashes = trimmed.chars().take_while(|&c| c == '#').count();
        if (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ') {
            let size = match hashes {
                1 => 18.0,
                2 => 14.0,
                _ => 12.0,
            };
            push_wrapped(&mut lines, &plain_text(trimmed[hashes..].trim()), size, true, 0.0, 6.0);
            continue;
        }

        if trimmed.chars().all(|c| c == '-' || c == '*' || c == '_') && trimmed.len() >= 3 {
            lines.push(Line {
                text: String::new(),
                size: BODY_SIZE,
                bold: false,
                indent: 0.0,
                space_before: 4.0,
            });
            continue;
        }

        if trimmed.starts_with('|') {
            let cells: Vec<&str> = trimmed
                .trim_matches('|')
                .split('|')
                .map(str::trim)
                .collect();
            if cells.iter().all(|c| c.chars().all(|ch| ch == '-' || ch == ':')) {
                continue;
            }
            let row = cells.join("   ").replace('\\', "");
            push_wrapped(&mut lines, &plain_text(&row), BODY_SIZE, false, 0.0, 1.0);
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("![") {
            let alt = rest.split(']').next().unwrap_or_default();
            push_wrapped(&mut lines, &format!("[image: {alt}]"), BODY_SIZE, false, 0.0, 2.0);
            continue;
        }

        let leading = raw.len() - raw.trim_start().len();
        let depth = leading / 2;
        let bullet = ["- ", "* ", "+ "]
            .iter()
            .find_map(|p| trimmed.strip_prefix(p));

        if let Some(item) = bullet {
            let indent = 5.0 + 5.0 * depth as f32;
            push_wrapped(&mut lines, &format!("- {}", plain_text(item)), BODY_SIZE, false, indent, 1.0);
        } else if trimmed.split_once(". ").is_some_and(|(n, _)| n.chars().all(|c| c.is_ascii_digit()) && !n.is_empty()) {
            let indent = 5.0 + 5.0 * depth as f32;
            push_wrapped(&mut lines, &plain_text(trimmed), BODY_SIZE, false, indent, 1.0);
        } else {
            let text = plain_text(trimmed.trim_matches('_'));
            push_wrapped(&mut lines, &text, BODY_SIZE, false, 0.0, 2.0);
        }
    }

    lines
}

struct Cursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
}

impl Cursor<'_> {
    fn advance(&mut self, height: f32) {
        if self.y - height < MARGIN {
            let (page, layer) = self.doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Page {}", self.pages + 1),
            );
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.pages += 1;
            self.y = PAGE_HEIGHT - MARGIN;
        }
        self.y -= height;
    }
}

/// Renders a markdown report to PDF bytes.
///
/// # Errors
///
/// Returns [`ReportError::Pdf`] if a font cannot be embedded or the
/// document cannot be serialized.
pub fn render_pdf(title: &str, markdown: &str) -> Result<Vec<u8>, ReportError> {
    let (doc, page1, layer1) =
        PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Page 1");

    let font: IndirectFontRef = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;
    let font_bold: IndirectFontRef = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;

    let layer = doc.get_page(page1).get_layer(layer1);
    let mut cursor = Cursor {
        doc: &doc,
        layer,
        y: PAGE_HEIGHT - MARGIN,
        pages: 1,
    };

    for line in layout(markdown) {
        cursor.advance(line.size.mul_add(PT_TO_MM * 1.4, line.space_before));
        if line.text.is_empty() {
            continue;
        }
        cursor.layer.use_text(
            line.text,
            line.size,
            Mm(MARGIN + line.indent),
            Mm(cursor.y),
            if line.bold { &font_bold } else { &font },
        );
    }

    log::debug!("Rendered report PDF with {} page(s)", cursor.pages);

    let mut pdf_bytes = Vec::new();
    doc.save(&mut BufWriter::new(&mut pdf_bytes))
        .map_err(pdf_error)?;

    Ok(pdf_bytes)
}
