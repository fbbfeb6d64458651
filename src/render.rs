//! PDF renderer – takes a [`PagePlan`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).
//!
//! Every placed unit is laid out again with the same [`TextMetrics`] that
//! measured it and stacked top-down inside the page margins.

use printpdf::*;

use crate::error::{Error, Result};
use crate::fonts::FontFace;
use crate::metrics::{DrawItem, TextMetrics};
use crate::plan::PagePlan;

const PT_TO_MM: f32 = 0.352778;
const FOOTER_SIZE: f32 = 8.0;

/// Render a page plan into PDF bytes.
pub fn render_pdf(plan: &PagePlan, metrics: &TextMetrics) -> Result<Vec<u8>> {
    let width = plan.content_width();
    if !(width.is_finite() && width > 0.0 && plan.capacity() > 0.0) {
        return Err(Error::Render(format!(
            "page {}x{} with margin {} leaves no content area",
            plan.page_width_pt, plan.page_height_pt, plan.margin_pt
        )));
    }

    let page_w = Mm(plan.page_width_pt * PT_TO_MM);
    let page_h = Mm(plan.page_height_pt * PT_TO_MM);
    let total = plan.pages.len();

    let mut doc = PdfDocument::new(&plan.title);
    let mut pages = Vec::with_capacity(total.max(1));

    for page in &plan.pages {
        let mut ops = Vec::new();
        let mut top = plan.margin_pt;
        for placed in &page.units {
            let layout = metrics.layout_unit(&placed.unit, width);
            for item in &layout.items {
                draw_item(&mut ops, item, plan.margin_pt, top, plan.page_height_pt);
            }
            top += placed.height;
        }
        if total > 1 {
            let label = format!("{} / {}", page.page_index + 1, total);
            let label_w = metrics.fonts.text_width(&label, FOOTER_SIZE, FontFace::Regular);
            write_text(
                &mut ops,
                &label,
                (plan.page_width_pt - label_w) / 2.0,
                plan.margin_pt / 2.0,
                FOOTER_SIZE,
                FontFace::Regular,
            );
        }
        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    // Ensure at least one page.
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());
    log::debug!("rendered {} page(s), {} bytes", total, bytes.len());
    Ok(bytes)
}

fn builtin_font(face: FontFace) -> BuiltinFont {
    match face {
        FontFace::Regular => BuiltinFont::Helvetica,
        FontFace::Bold => BuiltinFont::HelveticaBold,
        FontFace::Italic => BuiltinFont::HelveticaOblique,
        FontFace::BoldItalic => BuiltinFont::HelveticaBoldOblique,
        FontFace::Mono => BuiltinFont::Courier,
    }
}

fn gray(level: f32) -> Color {
    Color::Rgb(Rgb {
        r: level,
        g: level,
        b: level,
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Draw one layout item. Layout coordinates grow downwards from the unit's
/// top-left corner; PDF coordinates grow upwards from the page's bottom-left.
fn draw_item(ops: &mut Vec<Op>, item: &DrawItem, left: f32, top: f32, page_height: f32) {
    match item {
        DrawItem::Text {
            x,
            y,
            text,
            size,
            face,
        } => {
            if text.is_empty() {
                return;
            }
            write_text(ops, text, left + x, page_height - (top + y), *size, *face);
        }
        DrawItem::Rect {
            x,
            y,
            width,
            height,
            fill,
            gray: level,
        } => {
            let x1 = left + x;
            let x2 = x1 + width;
            let y2 = page_height - (top + y);
            let y1 = y2 - height;
            let corners = vec![point(x1, y1), point(x2, y1), point(x2, y2), point(x1, y2)];
            if *fill {
                ops.push(Op::SetFillColor { col: gray(*level) });
                ops.push(Op::DrawPolygon {
                    polygon: Polygon {
                        rings: vec![PolygonRing { points: corners }],
                        mode: PaintMode::Fill,
                        winding_order: WindingOrder::NonZero,
                    },
                });
            } else {
                ops.push(Op::SetOutlineColor { col: gray(*level) });
                ops.push(Op::SetOutlineThickness { pt: Pt(0.5) });
                ops.push(Op::DrawLine {
                    line: Line {
                        points: corners,
                        is_closed: true,
                    },
                });
            }
        }
    }
}

fn write_text(ops: &mut Vec<Op>, text: &str, x: f32, y: f32, size: f32, face: FontFace) {
    let font = builtin_font(face);
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font,
    });
    ops.push(Op::SetFillColor { col: gray(0.0) });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(to_winlatin(text))],
        font,
    });
    ops.push(Op::EndTextSection);
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: intentionally non-UTF-8 for 0x80-0xFF; printpdf passes these
    // bytes straight to the PDF stream, decoded by WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Block, Role};
    use crate::plan::{Continuation, MessageSegment, Page, PlacedUnit, RenderUnit, SegmentTag};
    use crate::references::References;

    fn plan(pages: Vec<Page>) -> PagePlan {
        PagePlan {
            title: "render test".into(),
            page_width_pt: 595.28,
            page_height_pt: 841.89,
            margin_pt: 40.0,
            pages,
            references: References::default(),
        }
    }

    #[test]
    fn render_empty_plan() {
        let bytes = render_pdf(&plan(Vec::new()), &TextMetrics::default()).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn render_segments_and_code() {
        let unit = RenderUnit::MessageSegment(MessageSegment {
            role: Role::Assistant,
            chunks: vec![Block::text("Hello “world”"), Block::code("let x = 1;")],
            show_role: true,
            segment: SegmentTag::Single,
            continuation: Continuation::Fresh,
        });
        let pages = vec![
            Page {
                page_index: 0,
                units: vec![PlacedUnit { height: 60.0, unit }],
            },
            Page {
                page_index: 1,
                units: vec![PlacedUnit {
                    height: 20.0,
                    unit: RenderUnit::Opaque {
                        markup: "<h2>References</h2>".into(),
                    },
                }],
            },
        ];
        let bytes = render_pdf(&plan(pages), &TextMetrics::default()).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn rejects_degenerate_page() {
        let mut bad = plan(Vec::new());
        bad.margin_pt = 400.0;
        assert!(matches!(
            render_pdf(&bad, &TextMetrics::default()),
            Err(Error::Render(_))
        ));
    }

    #[test]
    fn winlatin_maps_quotes() {
        assert_eq!(to_winlatin("a\u{2019}b").as_bytes(), &[b'a', 0x92, b'b']);
        assert_eq!(to_winlatin("\u{4e2d}").as_bytes(), b"?");
    }
}
