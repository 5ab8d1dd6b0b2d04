use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::overlay::font::{FontMetrics, average_glyph_width, is_wide, text_width_px};

/// Entries kept before the memo table is flushed. Results never depend on it.
const MEASURE_CACHE_CAPACITY: usize = 4096;
/// Line gap in em before the stroke is taken out of it.
const LINE_GAP_EM: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measured {
    pub lines: Vec<String>,
    pub width: f32,
    pub height: f32,
    pub stroke: u32,
    pub spacing: u32,
}

impl Measured {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MeasureKey {
    text: String,
    font_size: u32,
    align: Alignment,
    stroke: u32,
    spacing: u32,
}

/// Wraps and sizes text blocks for one layout call.
///
/// Rendered sizes are memoized on `(text, font_size, align, stroke, spacing)`;
/// both placement engines re-measure the same candidates many times.
pub struct Measurer<'a> {
    font: Option<&'a FontMetrics>,
    stroke_scale: f32,
    align: Alignment,
    cache: HashMap<MeasureKey, (f32, f32)>,
    hits: usize,
    misses: usize,
}

impl<'a> Measurer<'a> {
    pub fn new(font: Option<&'a FontMetrics>, stroke_scale: f32, align: Alignment) -> Self {
        Self {
            font,
            stroke_scale: stroke_scale.max(0.0),
            align,
            cache: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn align(&self) -> Alignment {
        self.align
    }

    pub fn stroke_width(&self, font_size: u32) -> u32 {
        (font_size as f32 * self.stroke_scale).round() as u32
    }

    pub fn line_spacing(&self, font_size: u32) -> u32 {
        let gap = (font_size as f32 * LINE_GAP_EM).round() as u32;
        gap.saturating_sub(self.stroke_width(font_size))
    }

    /// Column budget for `max_width` pixels at `font_size`; never below one.
    pub fn columns_for(&self, font_size: u32, max_width: f32) -> usize {
        let glyph = average_glyph_width(font_size as f32, self.font);
        let columns = (max_width.max(0.0) / glyph).floor();
        if columns.is_finite() {
            (columns as usize).max(1)
        } else {
            1
        }
    }

    pub fn measure(
        &mut self,
        text: &str,
        font_size: u32,
        max_width: f32,
        hyphenate: bool,
    ) -> Measured {
        let stroke = self.stroke_width(font_size);
        let spacing = self.line_spacing(font_size);
        if text.trim().is_empty() {
            return Measured {
                lines: Vec::new(),
                width: 0.0,
                height: 0.0,
                stroke,
                spacing,
            };
        }
        let columns = self.columns_for(font_size, max_width);
        let lines = wrap_text(text, columns, hyphenate);
        let (width, height) = self.rendered_size(&lines, font_size, stroke, spacing);
        Measured {
            lines,
            width,
            height,
            stroke,
            spacing,
        }
    }

    fn rendered_size(
        &mut self,
        lines: &[String],
        font_size: u32,
        stroke: u32,
        spacing: u32,
    ) -> (f32, f32) {
        if lines.is_empty() {
            return (0.0, 0.0);
        }
        let key = MeasureKey {
            text: lines.join("\n"),
            font_size,
            align: self.align,
            stroke,
            spacing,
        };
        if let Some(size) = self.cache.get(&key) {
            self.hits += 1;
            return *size;
        }
        self.misses += 1;

        let size = font_size as f32;
        let widest = lines
            .iter()
            .map(|line| text_width_px(line, size, self.font))
            .fold(0.0, f32::max);
        let count = lines.len() as f32;
        let width = widest + stroke as f32 * 2.0;
        let height = count * size + (count - 1.0) * spacing as f32 + stroke as f32 * 2.0;

        if self.cache.len() >= MEASURE_CACHE_CAPACITY {
            self.cache.clear();
        }
        self.cache.insert(key, (width, height));
        (width, height)
    }

    pub fn cache_stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Space,
    Break,
}

fn char_columns(ch: char) -> usize {
    if is_wide(ch) { 2 } else { 1 }
}

fn columns(text: &str) -> usize {
    text.chars().map(char_columns).sum()
}

/// Greedy word wrap to `max_columns`. Words wider than a line are hyphen
/// broken only when `hyphenate` is set, otherwise they sit alone on a line.
pub(crate) fn wrap_text(text: &str, max_columns: usize, hyphenate: bool) -> Vec<String> {
    let tokens = tokenize_text(text);
    wrap_tokens(&tokens, max_columns.max(1), hyphenate)
}

fn wrap_tokens(tokens: &[Token], max_columns: usize, hyphenate: bool) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut used = 0usize;

    for token in tokens {
        match token {
            Token::Break => {
                if !current.trim().is_empty() {
                    result.push(current.trim_end().to_string());
                }
                current.clear();
                used = 0;
            }
            Token::Space => {
                if !current.is_empty() && !current.ends_with(' ') {
                    current.push(' ');
                    used += 1;
                }
            }
            Token::Word(word) => {
                let word_columns = columns(word);
                if used + word_columns > max_columns && !current.trim().is_empty() {
                    result.push(current.trim_end().to_string());
                    current.clear();
                    used = 0;
                }
                if word_columns > max_columns && hyphenate {
                    let mut pieces = hyphenate_word(word, max_columns);
                    let tail = pieces.pop().unwrap_or_default();
                    result.extend(pieces);
                    used = columns(&tail);
                    current = tail;
                    continue;
                }
                current.push_str(word);
                used += word_columns;
            }
        }
    }

    if !current.trim().is_empty() {
        result.push(current.trim_end().to_string());
    }
    result
}

fn hyphenate_word(word: &str, max_columns: usize) -> Vec<String> {
    let with_hyphen = max_columns >= 2;
    let budget = if with_hyphen { max_columns - 1 } else { 1 };
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut used = 0usize;
    for ch in word.chars() {
        let width = char_columns(ch);
        if used + width > budget && !piece.is_empty() {
            pieces.push(std::mem::take(&mut piece));
            used = 0;
        }
        piece.push(ch);
        used += width;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    if with_hyphen {
        let last = pieces.len().saturating_sub(1);
        for piece in pieces.iter_mut().take(last) {
            piece.push('-');
        }
    }
    pieces
}

fn tokenize_text(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch == '\n' {
            if !current.is_empty() {
                tokens.push(Token::Word(std::mem::take(&mut current)));
            }
            tokens.push(Token::Break);
            continue;
        }
        if ch.is_whitespace() {
            if !current.is_empty() {
                tokens.push(Token::Word(std::mem::take(&mut current)));
            }
            tokens.push(Token::Space);
            continue;
        }
        if is_wide(ch) {
            if !current.is_empty() {
                tokens.push(Token::Word(std::mem::take(&mut current)));
            }
            tokens.push(Token::Word(ch.to_string()));
            continue;
        }
        current.push(ch);
    }
    if !current.is_empty() {
        tokens.push(Token::Word(current));
    }
    tokens
}
