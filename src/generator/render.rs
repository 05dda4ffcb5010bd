//! Rendering generated agreements into document files.
//!
//! [`PdfRenderer`] lays the text out on Letter pages with one-inch margins,
//! Helvetica with `**bold**` runs in Helvetica-Bold, and hands the result to
//! `printpdf`. Paragraphs are separated by blank lines in the source text;
//! single newlines are kept as line breaks.

use std::sync::OnceLock;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use regex::Regex;
use thiserror::Error;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const FONT_SIZE: f32 = 10.0;
const LEADING: f32 = 14.0;
const PARAGRAPH_SPACING: f32 = 14.4;
const MAX_LINE_CHARS: usize = 90;
const LAYER_NAME: &str = "Text";

#[derive(Debug, Error)]
#[error("PDF rendering failed: {0}")]
pub struct RenderError(String);

impl From<printpdf::Error> for RenderError {
    fn from(e: printpdf::Error) -> Self {
        Self(e.to_string())
    }
}

/// Turns agreement text into a stored document.
pub trait DocumentRenderer: Send + Sync {
    fn extension(&self) -> &'static str;
    fn mime_type(&self) -> &'static str;
    fn render(&self, text: &str) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn mime_type(&self) -> &'static str {
        "application/pdf"
    }

    fn render(&self, text: &str) -> Result<Vec<u8>, RenderError> {
        render_pdf(text)
    }
}

/// Writes the agreement as-is; handy for local runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl DocumentRenderer for PlainTextRenderer {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn mime_type(&self) -> &'static str {
        "text/plain"
    }

    fn render(&self, text: &str) -> Result<Vec<u8>, RenderError> {
        Ok(text.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Word {
    text: String,
    bold: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Line(Vec<Word>),
    Space(f32),
}

fn bold_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"))
}

fn push_words(out: &mut Vec<Word>, text: &str, bold: bool) {
    for word in text.split_whitespace() {
        let word = word.replace("**", "");
        if !word.is_empty() {
            out.push(Word { text: word, bold });
        }
    }
}

fn line_words(line: &str) -> Vec<Word> {
    let mut words = Vec::new();

    // Markdown headings render bold without their hashes.
    let heading = line.trim_start();
    if heading.starts_with('#') {
        push_words(&mut words, heading.trim_start_matches('#'), true);
        return words;
    }

    let mut last = 0;
    for caps in bold_pattern().captures_iter(line) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_words(&mut words, &line[last..whole.start()], false);
        push_words(&mut words, inner.as_str(), true);
        last = whole.end();
    }
    push_words(&mut words, &line[last..], false);
    words
}

fn wrap(words: Vec<Word>, max_chars: usize) -> Vec<Vec<Word>> {
    let mut lines = Vec::new();
    let mut current: Vec<Word> = Vec::new();
    let mut len = 0;

    for word in words {
        let word_len = word.text.chars().count();
        if !current.is_empty() && len + 1 + word_len > max_chars {
            lines.push(std::mem::take(&mut current));
            len = 0;
        }
        if !current.is_empty() {
            len += 1;
        }
        len += word_len;
        current.push(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn layout(text: &str) -> Vec<Item> {
    let normalized = text.replace("\r\n", "\n");
    let mut items = Vec::new();

    for paragraph in normalized.split("\n\n") {
        let mut any = false;
        for line in paragraph.lines() {
            for wrapped in wrap(line_words(line), MAX_LINE_CHARS) {
                items.push(Item::Line(wrapped));
                any = true;
            }
        }
        if any {
            items.push(Item::Space(PARAGRAPH_SPACING));
        }
    }
    items
}

/// Map typography to Latin-1 so the standard fonts can draw it.
fn plain_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2022}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            ' '..='~' | '\u{00A0}'..='\u{00FF}' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Consecutive words in the same font.
#[derive(Debug, Clone, PartialEq)]
struct Run {
    text: String,
    bold: bool,
}

/// One line of text with its baseline height in points.
#[derive(Debug, Clone, PartialEq)]
struct PlacedLine {
    y: f32,
    runs: Vec<Run>,
}

fn runs(words: &[Word]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for word in words {
        let text = plain_text(&word.text);
        match runs.last_mut() {
            Some(run) if run.bold == word.bold => {
                run.text.push(' ');
                run.text.push_str(&text);
            }
            Some(_) => runs.push(Run {
                text: format!(" {}", text),
                bold: word.bold,
            }),
            None => runs.push(Run {
                text,
                bold: word.bold,
            }),
        }
    }
    runs
}

/// Split laid-out items into pages of placed lines.
fn paginate(items: &[Item]) -> Vec<Vec<PlacedLine>> {
    let top = PAGE_HEIGHT - MARGIN - FONT_SIZE;
    let mut pages = Vec::new();
    let mut current = Vec::new();
    let mut y = top;

    for item in items {
        match item {
            Item::Line(words) => {
                if y < MARGIN {
                    pages.push(std::mem::take(&mut current));
                    y = top;
                }
                current.push(PlacedLine {
                    y,
                    runs: runs(words),
                });
                y -= LEADING;
            }
            Item::Space(space) => {
                if y < top {
                    y -= space;
                }
            }
        }
    }
    pages.push(current);
    pages
}

fn mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

fn write_line(
    layer: &PdfLayerReference,
    line: &PlacedLine,
    regular: &IndirectFontRef,
    bold: &IndirectFontRef,
) {
    layer.begin_text_section();
    layer.set_text_cursor(mm(MARGIN), mm(line.y));
    for run in &line.runs {
        let font = if run.bold { bold } else { regular };
        layer.set_font(font, FONT_SIZE);
        layer.write_text(run.text.clone(), font);
    }
    layer.end_text_section();
}

/// Render text into a complete PDF file.
pub fn render_pdf(text: &str) -> Result<Vec<u8>, RenderError> {
    let pages = paginate(&layout(text));

    let (doc, first_page, first_layer) = PdfDocument::new(
        "Land Lease Agreement",
        mm(PAGE_WIDTH),
        mm(PAGE_HEIGHT),
        LAYER_NAME,
    );
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    let mut first = Some((first_page, first_layer));
    for lines in &pages {
        let (page, layer) = match first.take() {
            Some(indices) => indices,
            None => doc.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), LAYER_NAME),
        };
        let layer = doc.get_page(page).get_layer(layer);
        for line in lines {
            write_line(&layer, line, &regular, &bold);
        }
    }

    Ok(doc.save_to_bytes()?)
}
