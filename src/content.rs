//! Content model – the typed document handed over by the scraper.
//!
//! A [`ContentStream`] is an ordered list of [`Unit`]s: role-grouped
//! [`Message`]s made of [`Block`]s, and opaque decorative markup. Blocks are
//! normalised before packing:
//! - paragraph whitespace is collapsed and adjacent same-style runs merged
//! - tokens longer than the cap are pre-split into fixed-length pieces
//! - ragged table rows are padded with empty cells
//! - code newlines are unified and trailing blank lines dropped

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Longest paragraph token (in characters) kept in one piece.
pub const MAX_TOKEN_CHARS: usize = 80;

// ---------------------------------------------------------------------------
// Inline runs
// ---------------------------------------------------------------------------

/// Bold / italic flags of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
}

/// One inline run inside a paragraph or table cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InlineRun {
    /// Styled text span.
    Text {
        text: String,
        #[serde(default)]
        bold: bool,
        #[serde(default)]
        italic: bool,
    },
    /// Citation marker; carries no literal text.
    Citation { id: String, source: String },
}

impl InlineRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::styled(text, TextStyle::default())
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self::styled(
            text,
            TextStyle {
                bold: true,
                italic: false,
            },
        )
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self::styled(
            text,
            TextStyle {
                bold: false,
                italic: true,
            },
        )
    }

    pub fn styled(text: impl Into<String>, style: TextStyle) -> Self {
        InlineRun::Text {
            text: text.into(),
            bold: style.bold,
            italic: style.italic,
        }
    }

    pub fn citation(id: impl Into<String>, source: impl Into<String>) -> Self {
        InlineRun::Citation {
            id: id.into(),
            source: source.into(),
        }
    }

    /// Style of a text run, `None` for citations.
    pub fn style(&self) -> Option<TextStyle> {
        match self {
            InlineRun::Text { bold, italic, .. } => Some(TextStyle {
                bold: *bold,
                italic: *italic,
            }),
            InlineRun::Citation { .. } => None,
        }
    }

    /// Literal text of a text run, `None` for citations.
    pub fn text(&self) -> Option<&str> {
        match self {
            InlineRun::Text { text, .. } => Some(text),
            InlineRun::Citation { .. } => None,
        }
    }
}

/// Append `run`, merging it into the previous run when both are text with the
/// same style.
pub(crate) fn push_run(out: &mut Vec<InlineRun>, run: InlineRun) {
    if let InlineRun::Text {
        text: ref new_text,
        bold,
        italic,
    } = run
    {
        if new_text.is_empty() {
            return;
        }
        if let Some(InlineRun::Text {
            text,
            bold: last_bold,
            italic: last_italic,
        }) = out.last_mut()
        {
            if *last_bold == bold && *last_italic == italic {
                text.push_str(new_text);
                return;
            }
        }
    }
    out.push(run);
}

// ---------------------------------------------------------------------------
// Paragraph tokens
// ---------------------------------------------------------------------------

/// A whitespace-free word of a paragraph: the atom a paragraph is split on.
///
/// A token may mix styles and citations (`word[1]`). `glued` marks a piece of
/// a pre-split long token that follows its predecessor without a separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub pieces: Vec<InlineRun>,
    pub glued: bool,
}

impl Token {
    /// Number of text characters in the token (citations count as zero).
    pub fn char_len(&self) -> usize {
        self.pieces
            .iter()
            .filter_map(InlineRun::text)
            .map(|t| t.chars().count())
            .sum()
    }

    fn leading_style(&self) -> Option<TextStyle> {
        self.pieces.iter().find_map(InlineRun::style)
    }

    fn trailing_style(&self) -> Option<TextStyle> {
        self.pieces.iter().rev().find_map(InlineRun::style)
    }
}

/// Style of the space between two words: shared when both sides agree,
/// plain otherwise.
fn gap_style(before: Option<&Token>, after: Option<&Token>) -> TextStyle {
    match (
        before.and_then(Token::trailing_style),
        after.and_then(Token::leading_style),
    ) {
        (Some(left), Some(right)) if left == right => left,
        _ => TextStyle::default(),
    }
}

/// Split inline runs into tokens at whitespace, breaking any token longer
/// than `max_chars` into glued pieces of exactly `max_chars` characters (the
/// last piece may be shorter).
pub fn tokenize(runs: &[InlineRun], max_chars: usize) -> Vec<Token> {
    let mut words: Vec<Vec<InlineRun>> = Vec::new();
    let mut current: Vec<InlineRun> = Vec::new();

    for run in runs {
        match run {
            InlineRun::Citation { .. } => current.push(run.clone()),
            InlineRun::Text { text, bold, italic } => {
                let style = TextStyle {
                    bold: *bold,
                    italic: *italic,
                };
                let mut word = String::new();
                for ch in text.chars() {
                    if ch.is_whitespace() {
                        if !word.is_empty() {
                            let text = std::mem::take(&mut word);
                            push_run(&mut current, InlineRun::styled(text, style));
                        }
                        if !current.is_empty() {
                            words.push(std::mem::take(&mut current));
                        }
                    } else {
                        word.push(ch);
                    }
                }
                if !word.is_empty() {
                    push_run(&mut current, InlineRun::styled(word, style));
                }
            }
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .into_iter()
        .flat_map(|pieces| break_long_token(pieces, max_chars))
        .collect()
}

fn break_long_token(pieces: Vec<InlineRun>, max_chars: usize) -> Vec<Token> {
    let token = Token {
        pieces,
        glued: false,
    };
    if max_chars == 0 || token.char_len() <= max_chars {
        return vec![token];
    }

    let mut out: Vec<Token> = Vec::new();
    let mut current: Vec<InlineRun> = Vec::new();
    let mut count = 0usize;

    for piece in token.pieces {
        let (text, style) = match piece {
            InlineRun::Text { text, bold, italic } => (text, TextStyle { bold, italic }),
            citation => {
                current.push(citation);
                continue;
            }
        };
        let mut buf = String::new();
        for ch in text.chars() {
            if count == max_chars {
                if !buf.is_empty() {
                    push_run(&mut current, InlineRun::styled(std::mem::take(&mut buf), style));
                }
                let glued = !out.is_empty();
                out.push(Token {
                    pieces: std::mem::take(&mut current),
                    glued,
                });
                count = 0;
            }
            buf.push(ch);
            count += 1;
        }
        if !buf.is_empty() {
            push_run(&mut current, InlineRun::styled(buf, style));
        }
    }
    if !current.is_empty() {
        let glued = !out.is_empty();
        out.push(Token {
            pieces: current,
            glued,
        });
    }
    out
}

/// Render tokens back into normalised inline runs: one space between
/// non-glued tokens, no leading or trailing whitespace, adjacent same-style
/// runs merged.
pub fn render_tokens(tokens: &[Token]) -> Vec<InlineRun> {
    let mut out = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && !token.glued {
            let style = gap_style(tokens.get(i - 1), Some(token));
            push_run(&mut out, InlineRun::styled(" ", style));
        }
        for piece in &token.pieces {
            push_run(&mut out, piece.clone());
        }
    }
    out
}

fn normalize_inlines(runs: &[InlineRun], max_chars: usize) -> Vec<InlineRun> {
    render_tokens(&tokenize(runs, max_chars))
}

/// Style of the space that joins two normalised paragraph slices; agrees
/// with what [`render_tokens`] puts between the same two words.
pub(crate) fn separator_style(head: &[InlineRun], tail: &[InlineRun]) -> TextStyle {
    gap_style(tokenize(head, 0).last(), tokenize(tail, 0).first())
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// A chunk of message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Paragraph { inlines: Vec<InlineRun> },
    /// Rows of cells; row 0 is the header repeated on every split piece.
    Table { rows: Vec<Vec<Vec<InlineRun>>> },
    Code { text: String },
}

impl Block {
    pub fn paragraph(inlines: Vec<InlineRun>) -> Self {
        Block::Paragraph { inlines }.normalized(MAX_TOKEN_CHARS)
    }

    /// Convenience for a single plain-text paragraph.
    pub fn text(text: impl Into<String>) -> Self {
        Self::paragraph(vec![InlineRun::plain(text)])
    }

    pub fn table(rows: Vec<Vec<Vec<InlineRun>>>) -> Self {
        Block::Table { rows }.normalized(MAX_TOKEN_CHARS)
    }

    pub fn code(text: impl Into<String>) -> Self {
        Block::Code { text: text.into() }.normalized(MAX_TOKEN_CHARS)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Block::Paragraph { .. } => "paragraph",
            Block::Table { .. } => "table",
            Block::Code { .. } => "code",
        }
    }

    /// Return the canonical form of this block.
    ///
    /// Normalisation is idempotent for a fixed `max_token_chars`.
    pub fn normalized(&self, max_token_chars: usize) -> Block {
        match self {
            Block::Paragraph { inlines } => Block::Paragraph {
                inlines: normalize_inlines(inlines, max_token_chars),
            },
            Block::Table { rows } => Block::Table {
                rows: normalize_rows(rows, max_token_chars),
            },
            Block::Code { text } => Block::Code {
                text: normalize_code(text),
            },
        }
    }

    /// Inline runs in traversal order (paragraph runs, or table cells row by
    /// row). Code blocks have none.
    pub fn inline_runs(&self) -> Box<dyn Iterator<Item = &InlineRun> + '_> {
        match self {
            Block::Paragraph { inlines } => Box::new(inlines.iter()),
            Block::Table { rows } => Box::new(rows.iter().flatten().flatten()),
            Block::Code { .. } => Box::new(std::iter::empty()),
        }
    }
}

fn normalize_rows(rows: &[Vec<Vec<InlineRun>>], max_chars: usize) -> Vec<Vec<Vec<InlineRun>>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    rows.iter()
        .map(|row| {
            let mut cells: Vec<Vec<InlineRun>> = row
                .iter()
                .map(|cell| normalize_inlines(cell, max_chars))
                .collect();
            cells.resize(width, Vec::new());
            cells
        })
        .collect()
}

fn normalize_code(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = unified.split('\n').collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Lines of a normalised code block; empty text has no lines.
pub fn code_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n').map(str::to_string).collect()
}

// ---------------------------------------------------------------------------
// Messages and the content stream
// ---------------------------------------------------------------------------

/// Who authored a message. `Note` is the flat document shape and never shows
/// a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Note,
}

impl Role {
    /// Label printed above the message, if any.
    pub fn label(self) -> Option<&'static str> {
        match self {
            Role::User => Some("You"),
            Role::Assistant => Some("Assistant"),
            Role::Note => None,
        }
    }

    /// Styling class handed to renderers.
    pub fn class_name(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Note => "note",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub chunks: Vec<Block>,
}

impl Message {
    pub fn new(role: Role, chunks: Vec<Block>) -> Self {
        Self { role, chunks }
    }

    pub fn normalized(&self, max_token_chars: usize) -> Message {
        Message {
            role: self.role,
            chunks: self
                .chunks
                .iter()
                .map(|chunk| chunk.normalized(max_token_chars))
                .collect(),
        }
    }
}

/// One entry of the content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Unit {
    Message(Message),
    /// Atomic decorative markup (title banner, references section).
    Opaque { markup: String },
}

/// The ordered document to paginate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStream {
    pub units: Vec<Unit>,
}

impl ContentStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a flat block list (the note shape) as a single label-less message.
    pub fn from_note(blocks: Vec<Block>) -> Self {
        Self {
            units: vec![Unit::Message(Message::new(Role::Note, blocks))],
        }
    }

    pub fn push_message(&mut self, role: Role, chunks: Vec<Block>) -> &mut Self {
        self.units.push(Unit::Message(Message::new(role, chunks)));
        self
    }

    pub fn push_opaque(&mut self, markup: impl Into<String>) -> &mut Self {
        self.units.push(Unit::Opaque {
            markup: markup.into(),
        });
        self
    }

    /// Messages in stream order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.units.iter().filter_map(|unit| match unit {
            Unit::Message(m) => Some(m),
            Unit::Opaque { .. } => None,
        })
    }

    pub fn normalized(&self, max_token_chars: usize) -> ContentStream {
        ContentStream {
            units: self
                .units
                .iter()
                .map(|unit| match unit {
                    Unit::Message(m) => Unit::Message(m.normalized(max_token_chars)),
                    Unit::Opaque { markup } => Unit::Opaque {
                        markup: markup.clone(),
                    },
                })
                .collect(),
        }
    }

    /// Parse a scraper payload. The result is not yet normalised.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
