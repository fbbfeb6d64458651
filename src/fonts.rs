//! Font loading and text width measurement using `ttf-parser`.
//!
//! Without loaded faces we fall back to average-advance heuristics that match
//! the PDF builtin fonts closely enough for pagination (Helvetica ≈ 0.5 em,
//! bold ≈ 0.55 em, Courier = 0.6 em).

use std::collections::HashMap;

use crate::error::{Error, Result};

/// The faces the metrics oracle and the PDF renderer distinguish.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum FontFace {
    Regular,
    Bold,
    Italic,
    BoldItalic,
    Mono,
}

impl FontFace {
    pub fn for_style(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (true, true) => FontFace::BoldItalic,
            (true, false) => FontFace::Bold,
            (false, true) => FontFace::Italic,
            (false, false) => FontFace::Regular,
        }
    }

    fn heuristic_advance(self) -> f32 {
        match self {
            FontFace::Regular | FontFace::Italic => 0.5,
            FontFace::Bold | FontFace::BoldItalic => 0.55,
            FontFace::Mono => 0.6,
        }
    }
}

/// A parsed face; bytes are kept for ttf-parser's zero-copy API.
#[derive(Clone)]
struct FaceData {
    bytes: Vec<u8>,
    units_per_em: f32,
}

/// Loaded font faces keyed by [`FontFace`].
#[derive(Clone, Default)]
pub struct FontBook {
    faces: HashMap<FontFace, FaceData>,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF face from bytes.
    pub fn load_face(&mut self, face: FontFace, bytes: Vec<u8>) -> Result<()> {
        let parsed = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| Error::Font(format!("failed to parse font: {e}")))?;
        let units_per_em = parsed.units_per_em() as f32;
        self.faces.insert(
            face,
            FaceData {
                bytes,
                units_per_em,
            },
        );
        Ok(())
    }

    pub fn has_real_face(&self, face: FontFace) -> bool {
        self.faces.contains_key(&face)
    }

    /// Width of `text` at `font_size` in points.
    pub fn text_width(&self, text: &str, font_size: f32, face: FontFace) -> f32 {
        let heuristic = || text.chars().count() as f32 * font_size * face.heuristic_advance();

        let Some(data) = self.faces.get(&face) else {
            return heuristic();
        };
        let Ok(parsed) = ttf_parser::Face::parse(&data.bytes, 0) else {
            return heuristic();
        };

        let scale = font_size / data.units_per_em;
        text.chars()
            .map(|ch| match parsed.glyph_index(ch) {
                Some(gid) => parsed.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                None => font_size * face.heuristic_advance(),
            })
            .sum()
    }
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("faces", &self.faces.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_text_width() {
        let book = FontBook::default();
        // 5 chars × 16 × 0.5 = 40
        let w = book.text_width("Hello", 16.0, FontFace::Regular);
        assert!((w - 40.0).abs() < 0.1);
        let mono = book.text_width("Hello", 10.0, FontFace::Mono);
        assert!((mono - 30.0).abs() < 0.1);
    }

    #[test]
    fn bold_is_wider() {
        let book = FontBook::default();
        assert!(
            book.text_width("wide", 12.0, FontFace::Bold)
                > book.text_width("wide", 12.0, FontFace::Regular)
        );
    }

    #[test]
    fn rejects_garbage_font() {
        let mut book = FontBook::new();
        let err = book.load_face(FontFace::Regular, vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::Font(_)));
        assert!(!book.has_real_face(FontFace::Regular));
    }
}
