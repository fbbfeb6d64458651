//! Built-in measurement oracle.
//!
//! [`TextMetrics`] lays out a render unit into positioned [`DrawItem`]s using
//! font advances from [`FontBook`]. The same layout feeds both measurement
//! (its height) and the PDF renderer (its items), so a page never renders
//! taller than the packer accounted for.
//!
//! Heights are additive: a segment measures the role-label band (when shown)
//! plus the sum of its chunk heights, and every chunk height includes the
//! trailing block gap.

use serde::{Deserialize, Serialize};

use crate::content::{code_lines, tokenize, Block, InlineRun};
use crate::error::LayoutError;
use crate::fonts::{FontBook, FontFace};
use crate::markup::flatten_markup;
use crate::measure::Measure;
use crate::plan::{MessageSegment, RenderUnit};

/// Typography knobs of the built-in oracle, in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsStyle {
    pub font_size: f32,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
    pub code_font_size: f32,
    pub heading_font_size: f32,
    pub citation_font_size: f32,
    /// Space between the role label and the first chunk.
    pub role_label_gap: f32,
    /// Space after every chunk and opaque line group.
    pub block_gap: f32,
    pub cell_padding: f32,
    pub code_padding: f32,
}

impl Default for MetricsStyle {
    fn default() -> Self {
        Self {
            font_size: 10.0,
            line_height: 1.4,
            code_font_size: 9.0,
            heading_font_size: 16.0,
            citation_font_size: 7.0,
            role_label_gap: 4.0,
            block_gap: 6.0,
            cell_padding: 4.0,
            code_padding: 6.0,
        }
    }
}

/// A positioned drawing primitive. Coordinates are relative to the unit's
/// top-left corner with `y` growing downwards; text `y` is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawItem {
    Text {
        x: f32,
        y: f32,
        text: String,
        size: f32,
        face: FontFace,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        /// Filled with `gray` when true, stroked otherwise.
        fill: bool,
        gray: f32,
    },
}

/// Layout result for one render unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnitLayout {
    pub height: f32,
    pub items: Vec<DrawItem>,
}

const HEADER_GRAY: f32 = 0.9;
const CODE_GRAY: f32 = 0.95;
const RULE_GRAY: f32 = 0.6;
/// Baseline offset from the top of a line box, as a fraction of font size.
const ASCENT: f32 = 0.8;

/// A run of text drawn with a single face and size.
#[derive(Debug, Clone)]
struct Fragment {
    text: String,
    face: FontFace,
    size: f32,
    width: f32,
}

/// A fragment placed on a wrapped line.
#[derive(Debug, Clone)]
struct Placed {
    x: f32,
    fragment: Fragment,
}

/// Font-metrics oracle and layout engine.
#[derive(Debug, Clone, Default)]
pub struct TextMetrics {
    pub fonts: FontBook,
    pub style: MetricsStyle,
}

impl TextMetrics {
    pub fn new(fonts: FontBook, style: MetricsStyle) -> Self {
        Self { fonts, style }
    }

    /// Lay out `unit` at content width `width`.
    pub fn layout_unit(&self, unit: &RenderUnit, width: f32) -> UnitLayout {
        let mut items = Vec::new();
        let height = match unit {
            RenderUnit::Opaque { markup } => self.layout_opaque(markup, width, &mut items),
            RenderUnit::MessageSegment(seg) => self.layout_segment(seg, width, &mut items),
        };
        UnitLayout { height, items }
    }

    fn line_box(&self, size: f32) -> f32 {
        size * self.style.line_height
    }

    fn layout_segment(&self, seg: &MessageSegment, width: f32, items: &mut Vec<DrawItem>) -> f32 {
        let mut y = 0.0;
        if let (true, Some(label)) = (seg.show_role, seg.role.label()) {
            let size = self.style.font_size;
            items.push(DrawItem::Text {
                x: 0.0,
                y: size * ASCENT,
                text: label.to_string(),
                size,
                face: FontFace::Bold,
            });
            y += self.line_box(size) + self.style.role_label_gap;
        }
        for chunk in &seg.chunks {
            y += self.layout_block(chunk, y, width, items);
        }
        y
    }

    /// Height of `block` including the trailing gap.
    fn layout_block(&self, block: &Block, top: f32, width: f32, items: &mut Vec<DrawItem>) -> f32 {
        let body = match block {
            Block::Paragraph { inlines } => {
                let lines = self.wrap_inlines(inlines, width, false);
                self.emit_lines(&lines, 0.0, top, items)
            }
            Block::Table { rows } => self.layout_table(rows, top, width, items),
            Block::Code { text } => self.layout_code(text, top, width, items),
        };
        body + self.style.block_gap
    }

    fn layout_table(
        &self,
        rows: &[Vec<Vec<InlineRun>>],
        top: f32,
        width: f32,
        items: &mut Vec<DrawItem>,
    ) -> f32 {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return 0.0;
        }
        let pad = self.style.cell_padding;
        let column_width = width / columns as f32;
        let inner = (column_width - 2.0 * pad).max(1.0);

        let mut y = top;
        for (r, row) in rows.iter().enumerate() {
            let header = r == 0;
            let cells: Vec<Vec<Vec<Placed>>> = row
                .iter()
                .map(|cell| self.wrap_inlines(cell, inner, header))
                .collect();
            let content = cells
                .iter()
                .map(|lines| self.lines_height(lines))
                .fold(self.line_box(self.style.font_size), f32::max);
            let row_height = content + 2.0 * pad;

            if header {
                items.push(DrawItem::Rect {
                    x: 0.0,
                    y,
                    width,
                    height: row_height,
                    fill: true,
                    gray: HEADER_GRAY,
                });
            }
            for (c, lines) in cells.iter().enumerate() {
                let x = c as f32 * column_width;
                items.push(DrawItem::Rect {
                    x,
                    y,
                    width: column_width,
                    height: row_height,
                    fill: false,
                    gray: RULE_GRAY,
                });
                self.emit_lines(lines, x + pad, y + pad, items);
            }
            y += row_height;
        }
        y - top
    }

    fn layout_code(&self, text: &str, top: f32, width: f32, items: &mut Vec<DrawItem>) -> f32 {
        let size = self.style.code_font_size;
        let pad = self.style.code_padding;
        let inner = (width - 2.0 * pad).max(1.0);

        let mut wrapped: Vec<String> = Vec::new();
        for line in code_lines(text) {
            let fragment = self.fragment(line, FontFace::Mono, size);
            if fragment.width <= inner {
                wrapped.push(fragment.text);
            } else {
                wrapped.extend(
                    self.break_fragment(&fragment, inner)
                        .into_iter()
                        .map(|f| f.text),
                );
            }
        }

        let height = wrapped.len() as f32 * self.line_box(size) + 2.0 * pad;
        items.push(DrawItem::Rect {
            x: 0.0,
            y: top,
            width,
            height,
            fill: true,
            gray: CODE_GRAY,
        });
        for (i, text) in wrapped.into_iter().enumerate() {
            if text.is_empty() {
                continue;
            }
            items.push(DrawItem::Text {
                x: pad,
                y: top + pad + i as f32 * self.line_box(size) + size * ASCENT,
                text,
                size,
                face: FontFace::Mono,
            });
        }
        height
    }

    fn layout_opaque(&self, markup: &str, width: f32, items: &mut Vec<DrawItem>) -> f32 {
        let lines = flatten_markup(markup);
        if lines.is_empty() {
            return 0.0;
        }
        let mut y = 0.0;
        for line in lines {
            let (size, face) = if line.heading {
                (self.style.heading_font_size, FontFace::Bold)
            } else {
                (self.style.font_size, FontFace::Regular)
            };
            let words: Vec<Vec<Fragment>> = line
                .text
                .split_whitespace()
                .map(|w| vec![self.fragment(w.to_string(), face, size)])
                .collect();
            let placed = self.fill_lines(words, width, size);
            y += self.emit_lines(&placed, 0.0, y, items);
        }
        y + self.style.block_gap
    }

    fn fragment(&self, text: String, face: FontFace, size: f32) -> Fragment {
        let width = self.fonts.text_width(&text, size, face);
        Fragment {
            text,
            face,
            size,
            width,
        }
    }

    /// Fragments of one paragraph word; citations render as `[id]`.
    fn word_fragments(&self, pieces: &[InlineRun], force_bold: bool) -> Vec<Fragment> {
        pieces
            .iter()
            .map(|piece| match piece {
                InlineRun::Text { text, bold, italic } => self.fragment(
                    text.clone(),
                    FontFace::for_style(*bold || force_bold, *italic),
                    self.style.font_size,
                ),
                InlineRun::Citation { id, .. } => self.fragment(
                    format!("[{id}]"),
                    FontFace::Regular,
                    self.style.citation_font_size,
                ),
            })
            .collect()
    }

    fn wrap_inlines(&self, runs: &[InlineRun], width: f32, force_bold: bool) -> Vec<Vec<Placed>> {
        let words: Vec<Vec<Fragment>> = tokenize(runs, usize::MAX)
            .iter()
            .map(|token| self.word_fragments(&token.pieces, force_bold))
            .collect();
        self.fill_lines(words, width, self.style.font_size)
    }

    /// Greedy line filling. Words wider than the line are broken by
    /// characters onto lines of their own.
    fn fill_lines(&self, words: Vec<Vec<Fragment>>, width: f32, size: f32) -> Vec<Vec<Placed>> {
        let space = self.fonts.text_width(" ", size, FontFace::Regular);
        let mut lines: Vec<Vec<Placed>> = Vec::new();
        let mut line: Vec<Placed> = Vec::new();
        let mut cursor = 0.0f32;

        for word in words {
            let word_width: f32 = word.iter().map(|f| f.width).sum();
            if word_width > width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let mut x = 0.0f32;
                for fragment in word {
                    for piece in self.break_fragment(&fragment, width) {
                        if x > 0.0 && x + piece.width > width {
                            lines.push(std::mem::take(&mut line));
                            x = 0.0;
                        }
                        let w = piece.width;
                        line.push(Placed { x, fragment: piece });
                        x += w;
                    }
                }
                cursor = x;
                continue;
            }

            let start = if line.is_empty() { 0.0 } else { cursor + space };
            if !line.is_empty() && start + word_width > width {
                lines.push(std::mem::take(&mut line));
                cursor = 0.0;
            } else {
                cursor = start;
            }
            for fragment in word {
                let w = fragment.width;
                line.push(Placed {
                    x: cursor,
                    fragment,
                });
                cursor += w;
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
        lines
    }

    /// Split a fragment into pieces no wider than `width` (at least one char
    /// each).
    fn break_fragment(&self, fragment: &Fragment, width: f32) -> Vec<Fragment> {
        let mut out = Vec::new();
        let mut buf = String::new();
        for ch in fragment.text.chars() {
            let mut candidate = buf.clone();
            candidate.push(ch);
            let w = self.fonts.text_width(&candidate, fragment.size, fragment.face);
            if w > width && !buf.is_empty() {
                out.push(self.fragment(std::mem::take(&mut buf), fragment.face, fragment.size));
                buf.push(ch);
            } else {
                buf = candidate;
            }
        }
        if !buf.is_empty() {
            out.push(self.fragment(buf, fragment.face, fragment.size));
        }
        out
    }

    fn line_height_of(&self, line: &[Placed]) -> f32 {
        let size = line
            .iter()
            .map(|p| p.fragment.size)
            .fold(self.style.font_size.min(self.style.citation_font_size), f32::max);
        self.line_box(size)
    }

    fn lines_height(&self, lines: &[Vec<Placed>]) -> f32 {
        lines.iter().map(|l| self.line_height_of(l)).sum()
    }

    /// Emit text items for wrapped lines starting at (`x`, `top`); returns the
    /// height used.
    fn emit_lines(
        &self,
        lines: &[Vec<Placed>],
        x: f32,
        top: f32,
        items: &mut Vec<DrawItem>,
    ) -> f32 {
        let mut y = top;
        for line in lines {
            let height = self.line_height_of(line);
            let baseline = y + (height / self.style.line_height) * ASCENT;
            for placed in line {
                items.push(DrawItem::Text {
                    x: x + placed.x,
                    y: baseline,
                    text: placed.fragment.text.clone(),
                    size: placed.fragment.size,
                    face: placed.fragment.face,
                });
            }
            y += height;
        }
        y - top
    }
}

impl Measure for TextMetrics {
    fn measure(&self, unit: &RenderUnit, width: f32) -> Result<f32, LayoutError> {
        if !(width.is_finite() && width > 0.0) {
            return Err(LayoutError::Measurement(format!(
                "cannot lay out at width {width}"
            )));
        }
        Ok(self.layout_unit(unit, width).height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Role;
    use crate::plan::{Continuation, SegmentTag};

    fn segment(chunks: Vec<Block>, show_role: bool) -> RenderUnit {
        RenderUnit::MessageSegment(MessageSegment {
            role: Role::User,
            chunks,
            show_role,
            segment: SegmentTag::Single,
            continuation: Continuation::Fresh,
        })
    }

    fn height(unit: &RenderUnit, width: f32) -> f32 {
        TextMetrics::default().measure(unit, width).unwrap()
    }

    #[test]
    fn one_line_paragraph() {
        // line box 14 + gap 6
        let h = height(&segment(vec![Block::text("hello world")], false), 400.0);
        assert!((h - 20.0).abs() < 1e-3);
    }

    #[test]
    fn role_label_adds_a_band() {
        let chunks = vec![Block::text("hello")];
        let without = height(&segment(chunks.clone(), false), 400.0);
        let with = height(&segment(chunks, true), 400.0);
        assert!((with - without - 18.0).abs() < 1e-3);
    }

    #[test]
    fn heights_are_additive() {
        let a = Block::text("one two three four five six seven eight nine ten");
        let b = Block::code("fn main() {}\nlet x = 1;");
        let ha = height(&segment(vec![a.clone()], false), 120.0);
        let hb = height(&segment(vec![b.clone()], false), 120.0);
        let both = height(&segment(vec![a, b], true), 120.0);
        assert!((both - (ha + hb + 18.0)).abs() < 1e-3);
    }

    #[test]
    fn narrow_width_wraps_more() {
        let unit = segment(
            vec![Block::text("the quick brown fox jumps over the lazy dog")],
            false,
        );
        assert!(height(&unit, 60.0) > height(&unit, 600.0));
    }

    #[test]
    fn long_word_breaks_by_chars() {
        let metrics = TextMetrics::default();
        let word = "x".repeat(60); // 300pt at 10pt Helvetica
        let layout = metrics.layout_unit(&segment(vec![Block::text(word)], false), 100.0);
        let texts: Vec<&str> = layout
            .items
            .iter()
            .filter_map(|i| match i {
                DrawItem::Text { text, .. } => Some(text.as_str()),
                DrawItem::Rect { .. } => None,
            })
            .collect();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts.concat(), "x".repeat(60));
    }

    #[test]
    fn code_height_counts_lines() {
        // 3 lines × 9 × 1.4 + padding 12 + gap 6
        let h = height(&segment(vec![Block::code("a\nb\nc")], false), 400.0);
        assert!((h - (3.0 * 12.6 + 18.0)).abs() < 1e-3);
    }

    #[test]
    fn table_header_is_bold_and_shaded() {
        let metrics = TextMetrics::default();
        let table = Block::table(vec![
            vec![vec![InlineRun::plain("Name")], vec![InlineRun::plain("Qty")]],
            vec![vec![InlineRun::plain("apple")], vec![InlineRun::plain("3")]],
        ]);
        let layout = metrics.layout_unit(&segment(vec![table], false), 300.0);
        assert!(layout
            .items
            .iter()
            .any(|i| matches!(i, DrawItem::Rect { fill: true, .. })));
        assert!(layout.items.iter().any(|i| matches!(
            i,
            DrawItem::Text { text, face: FontFace::Bold, .. } if text == "Name"
        )));
        assert!(layout.items.iter().any(|i| matches!(
            i,
            DrawItem::Text { text, face: FontFace::Regular, .. } if text == "apple"
        )));
    }

    #[test]
    fn opaque_heading_is_taller() {
        let plain = height(
            &RenderUnit::Opaque {
                markup: "<p>Title</p>".into(),
            },
            400.0,
        );
        let heading = height(
            &RenderUnit::Opaque {
                markup: "<h1>Title</h1>".into(),
            },
            400.0,
        );
        assert!(heading > plain);
    }

    #[test]
    fn citation_renders_bracketed() {
        let metrics = TextMetrics::default();
        let para = Block::paragraph(vec![
            InlineRun::plain("claim"),
            InlineRun::citation("3", "https://example.org"),
        ]);
        let layout = metrics.layout_unit(&segment(vec![para], false), 400.0);
        assert!(layout.items.iter().any(|i| matches!(
            i,
            DrawItem::Text { text, size, .. } if text == "[3]" && (*size - 7.0).abs() < 1e-6
        )));
    }

    #[test]
    fn rejects_zero_width() {
        let err = TextMetrics::default()
            .measure(&segment(vec![Block::text("a")], false), 0.0)
            .unwrap_err();
        assert!(matches!(err, LayoutError::Measurement(_)));
    }
}
