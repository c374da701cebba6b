//! Content-stream layout analysis.
//!
//! Walks a page's content stream, tracks the text matrix, and emits one
//! positioned [`TextSpan`] per show-text operation. Spans are then split
//! into [`WordToken`]s in top-left page coordinates.

use std::collections::BTreeMap;

use lopdf::{Document as LopdfDocument, Object, ObjectId};

use crate::error::{Result, UnreadableReason};
use crate::model::WordToken;

/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f32 = 0.5;

/// TJ adjustments beyond this (in 1/1000 text space units) read as a word break.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// A run of text drawn by one show-text operation.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// X position (left edge, PDF user space)
    pub x: f32,
    /// Y position (baseline, PDF user space, origin bottom-left)
    pub y: f32,
    /// Estimated advance width
    pub width: f32,
    /// Effective font size in points
    pub font_size: f32,
}

impl TextSpan {
    pub fn new(text: String, x: f32, y: f32, font_size: f32) -> Self {
        let width = text.chars().count() as f32 * font_size * GLYPH_WIDTH_RATIO;
        Self {
            text,
            x,
            y,
            width,
            font_size,
        }
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom Y coordinate (approximate descender).
    pub fn bottom(&self) -> f32 {
        self.y - self.font_size * 0.2
    }

    /// Top Y coordinate (approximate ascender).
    pub fn top(&self) -> f32 {
        self.y + self.font_size * 0.8
    }

    /// Split into whitespace-free words, flipping to a top-left origin.
    pub fn to_words(&self, page_height: f32) -> Vec<WordToken> {
        let advance = self.font_size * GLYPH_WIDTH_RATIO;
        let top = page_height - self.top();
        let bottom = page_height - self.bottom();

        let mut words = Vec::new();
        let mut current = String::new();
        let mut start = 0usize;

        for (idx, ch) in self.text.chars().enumerate() {
            if ch.is_whitespace() {
                if !current.is_empty() {
                    let x0 = self.x + start as f32 * advance;
                    let x1 = self.x + idx as f32 * advance;
                    words.push(WordToken::new(std::mem::take(&mut current), x0, top, x1, bottom));
                }
                continue;
            }
            if current.is_empty() {
                start = idx;
            }
            current.push(ch);
        }
        if !current.is_empty() {
            let end = start + current.chars().count();
            let x0 = self.x + start as f32 * advance;
            let x1 = self.x + end as f32 * advance;
            words.push(WordToken::new(current, x0, top, x1, bottom));
        }

        words
    }
}

/// Convert spans to word tokens in reading order (top to bottom, then left to right).
pub fn spans_to_words(spans: &[TextSpan], page_height: f32) -> Vec<WordToken> {
    let mut words: Vec<WordToken> = spans
        .iter()
        .flat_map(|span| span.to_words(page_height))
        .collect();
    words.sort_by(|a, b| {
        a.bbox
            .top
            .total_cmp(&b.bbox.top)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });
    words
}

/// Extracts positioned text from the pages of a loaded document.
pub struct LayoutAnalyzer<'a> {
    doc: &'a LopdfDocument,
}

impl<'a> LayoutAnalyzer<'a> {
    pub fn new(doc: &'a LopdfDocument) -> Self {
        Self { doc }
    }

    /// Extract text spans from a page (1-based page number).
    pub fn extract_page_spans(&self, page_num: u32) -> Result<Vec<TextSpan>> {
        let pages = self.doc.get_pages();
        let page_id = pages.get(&page_num).ok_or_else(|| {
            UnreadableReason::Corrupted(format!(
                "page {} out of range (document has {} pages)",
                page_num,
                pages.len()
            ))
        })?;

        let fonts = self.doc.get_page_fonts(*page_id)?;
        let content = self.get_page_content(*page_id)?;
        self.parse_content_stream(&content, &fonts)
    }

    fn get_page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page_dict = self.doc.get_dictionary(page_id)?;

        // A page without /Contents is legal and simply blank.
        let Ok(contents) = page_dict.get(b"Contents") else {
            return Ok(Vec::new());
        };

        match contents {
            Object::Reference(r) => match self.doc.get_object(*r)? {
                Object::Stream(s) => Ok(s.decompressed_content()?),
                Object::Array(arr) => Ok(self.concat_streams(arr)),
                _ => Err(UnreadableReason::Corrupted("invalid content stream".to_string()).into()),
            },
            Object::Array(arr) => Ok(self.concat_streams(arr)),
            _ => Err(UnreadableReason::Corrupted("invalid content stream".to_string()).into()),
        }
    }

    fn concat_streams(&self, refs: &[Object]) -> Vec<u8> {
        let mut content = Vec::new();
        for obj in refs {
            if let Object::Reference(r) = obj {
                if let Ok(Object::Stream(s)) = self.doc.get_object(*r) {
                    if let Ok(data) = s.decompressed_content() {
                        content.extend_from_slice(&data);
                        content.push(b' ');
                    }
                }
            }
        }
        content
    }

    fn parse_content_stream(
        &self,
        content: &[u8],
        fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    ) -> Result<Vec<TextSpan>> {
        let content = lopdf::content::Content::decode(content)?;

        let mut spans = Vec::new();
        let mut font_name: Vec<u8> = Vec::new();
        let mut font_size: f32 = 12.0;
        let mut matrix = TextMatrix::default();
        let mut in_text = false;

        for op in content.operations {
            match op.operator.as_str() {
                "BT" => {
                    in_text = true;
                    matrix.reset();
                }
                "ET" => in_text = false,
                "Tf" => {
                    if let (Some(Object::Name(name)), Some(size)) =
                        (op.operands.first(), op.operands.get(1))
                    {
                        font_name = name.clone();
                        font_size = get_number(size).unwrap_or(12.0);
                    }
                }
                "TL" => {
                    if let Some(leading) = op.operands.first().and_then(get_number) {
                        matrix.leading = leading;
                    }
                }
                "Td" | "TD" => {
                    if op.operands.len() >= 2 {
                        let tx = get_number(&op.operands[0]).unwrap_or(0.0);
                        let ty = get_number(&op.operands[1]).unwrap_or(0.0);
                        if op.operator == "TD" {
                            matrix.leading = -ty;
                        }
                        matrix.translate(tx, ty);
                    }
                }
                "Tm" => {
                    if op.operands.len() >= 6 {
                        let n = |i: usize, d: f32| get_number(&op.operands[i]).unwrap_or(d);
                        matrix.set(n(0, 1.0), n(1, 0.0), n(2, 0.0), n(3, 1.0), n(4, 0.0), n(5, 0.0));
                    }
                }
                "T*" => matrix.next_line(),
                "Tj" | "TJ" | "'" | "\"" => {
                    if matches!(op.operator.as_str(), "'" | "\"") {
                        matrix.next_line();
                    }
                    if !in_text {
                        continue;
                    }
                    let encoding = fonts
                        .get(&font_name)
                        .and_then(|f| f.get_font_encoding(self.doc).ok());
                    let decode = |bytes: &[u8]| match &encoding {
                        Some(enc) => LopdfDocument::decode_text(enc, bytes).unwrap_or_default(),
                        None => decode_text_simple(bytes),
                    };

                    let text = match op.operator.as_str() {
                        "TJ" => match op.operands.first() {
                            Some(Object::Array(items)) => decode_tj(items, decode),
                            _ => String::new(),
                        },
                        other => {
                            let idx = if other == "\"" { 2 } else { 0 };
                            match op.operands.get(idx) {
                                Some(Object::String(bytes, _)) => decode(bytes),
                                _ => String::new(),
                            }
                        }
                    };

                    if !text.trim().is_empty() {
                        let (x, y) = matrix.position();
                        let span = TextSpan::new(text, x, y, font_size * matrix.scale());
                        matrix.advance(span.width);
                        spans.push(span);
                    }
                }
                _ => {}
            }
        }

        log::debug!("content stream yielded {} text spans", spans.len());
        Ok(spans)
    }
}

/// Decode a TJ array, turning large negative adjustments into spaces.
fn decode_tj(items: &[Object], decode: impl Fn(&[u8]) -> String) -> String {
    let mut combined = String::new();
    for item in items {
        let adjustment = match item {
            Object::String(bytes, _) => {
                combined.push_str(&decode(bytes));
                continue;
            }
            Object::Integer(n) => -(*n as f32),
            Object::Real(n) => -*n,
            _ => continue,
        };
        if adjustment > TJ_SPACE_THRESHOLD && !combined.is_empty() && !combined.ends_with(' ') {
            combined.push(' ');
        }
    }
    combined
}

/// Text matrix for tracking position in a content stream.
#[derive(Debug, Clone)]
struct TextMatrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
    /// Start of the current line, restored by line moves
    line_e: f32,
    line_f: f32,
    leading: f32,
}

impl Default for TextMatrix {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
            line_e: 0.0,
            line_f: 0.0,
            leading: 12.0,
        }
    }
}

impl TextMatrix {
    /// BT resets the matrix but the leading is graphics state and survives.
    fn reset(&mut self) {
        let leading = self.leading;
        *self = Self {
            leading,
            ..Self::default()
        };
    }

    fn set(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        self.a = a;
        self.b = b;
        self.c = c;
        self.d = d;
        self.e = e;
        self.f = f;
        self.line_e = e;
        self.line_f = f;
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        self.line_e += tx * self.a + ty * self.c;
        self.line_f += tx * self.b + ty * self.d;
        self.e = self.line_e;
        self.f = self.line_f;
    }

    fn next_line(&mut self) {
        self.translate(0.0, -self.leading);
    }

    /// Move the pen past text just shown (in unscaled text space).
    fn advance(&mut self, width: f32) {
        let scale = self.scale();
        if scale > 0.0 {
            self.e += width / scale * self.a;
            self.f += width / scale * self.b;
        }
    }

    fn position(&self) -> (f32, f32) {
        (self.e, self.f)
    }

    fn scale(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }
}

fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Fallback decoding when the font has no usable encoding.
fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}
