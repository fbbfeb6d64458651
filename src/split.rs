//! Splitter – carves the largest prefix of a block that fits a height budget.
//!
//! Each splittable block kind is viewed as a sequence of atoms:
//! - paragraph → tokens (whole words; over-long words are pre-split)
//! - table     → body rows (the header row rides along on every slice)
//! - code      → whole lines
//!
//! [`Splitter::max_prefix_fitting`] binary-searches the atom count against the
//! measurement oracle. Only counts that were actually measured to fit are ever
//! returned, so a non-monotonic oracle degrades to a smaller prefix rather than
//! an over-full one.

use crate::content::{
    code_lines, push_run, render_tokens, separator_style, tokenize, Block, InlineRun, Role, Token,
};
use crate::error::LayoutError;
use crate::measure::{measure_unit, Measure};
use crate::plan::{Continuation, MessageSegment, RenderUnit, SegmentTag};

type Row = Vec<Vec<InlineRun>>;

/// A block viewed as a sequence of splittable atoms.
#[derive(Debug, Clone)]
pub enum Atoms {
    Tokens(Vec<Token>),
    Rows { header: Row, body: Vec<Row> },
    Lines(Vec<String>),
    /// No splitting rule applies (header-only table, empty block).
    Whole(Block),
}

impl Atoms {
    /// View a normalised block as atoms.
    pub fn of(block: &Block, max_token_chars: usize) -> Self {
        match block {
            Block::Paragraph { inlines } => {
                let tokens = tokenize(inlines, max_token_chars);
                if tokens.is_empty() {
                    Atoms::Whole(block.clone())
                } else {
                    Atoms::Tokens(tokens)
                }
            }
            Block::Table { rows } => match rows.split_first() {
                Some((header, body)) if !body.is_empty() => Atoms::Rows {
                    header: header.clone(),
                    body: body.to_vec(),
                },
                _ => Atoms::Whole(block.clone()),
            },
            Block::Code { text } => {
                let lines = code_lines(text);
                if lines.is_empty() {
                    Atoms::Whole(block.clone())
                } else {
                    Atoms::Lines(lines)
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Atoms::Tokens(tokens) => tokens.len(),
            Atoms::Rows { body, .. } => body.len(),
            Atoms::Lines(lines) => lines.len(),
            Atoms::Whole(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether there is more than one atom to split between.
    pub fn is_splittable(&self) -> bool {
        self.len() > 1
    }

    /// Whether the atom at `index` continues the previous one without a
    /// separator (a piece of a pre-split long token).
    pub fn glued_at(&self, index: usize) -> bool {
        match self {
            Atoms::Tokens(tokens) => tokens.get(index).is_some_and(|t| t.glued),
            _ => false,
        }
    }

    /// Build the block holding atoms `start .. start + count`.
    pub fn slice(&self, start: usize, count: usize) -> Block {
        let end = (start + count).min(self.len());
        let start = start.min(end);
        match self {
            Atoms::Tokens(tokens) => Block::Paragraph {
                inlines: render_tokens(&tokens[start..end]),
            },
            Atoms::Rows { header, body } => Block::Table {
                rows: std::iter::once(header.clone())
                    .chain(body[start..end].iter().cloned())
                    .collect(),
            },
            Atoms::Lines(lines) => Block::Code {
                text: lines[start..end].join("\n"),
            },
            Atoms::Whole(block) => block.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Atoms::Tokens(_) => "paragraph token",
            Atoms::Rows { .. } => "table row",
            Atoms::Lines(_) => "code line",
            Atoms::Whole(block) => block.kind(),
        }
    }
}

/// The message context a candidate slice is measured in: the segment it
/// would land in, with the chunks that segment already holds on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFrame {
    pub role: Role,
    pub show_role: bool,
    pub lead: Vec<Block>,
}

impl SegmentFrame {
    /// A segment that starts with the candidate.
    pub fn fresh(role: Role, show_role: bool) -> Self {
        Self {
            role,
            show_role,
            lead: Vec::new(),
        }
    }

    /// The segment as it would be placed with `block` appended.
    pub fn wrap(&self, block: Block) -> RenderUnit {
        let mut chunks = Vec::with_capacity(self.lead.len() + 1);
        chunks.extend(self.lead.iter().cloned());
        chunks.push(block);
        RenderUnit::MessageSegment(MessageSegment {
            role: self.role,
            chunks,
            show_role: self.show_role,
            segment: SegmentTag::Single,
            continuation: Continuation::Fresh,
        })
    }
}

pub struct Splitter<'a, M: Measure + ?Sized> {
    oracle: &'a M,
    width: f32,
}

impl<'a, M: Measure + ?Sized> Splitter<'a, M> {
    pub fn new(oracle: &'a M, width: f32) -> Self {
        Self { oracle, width }
    }

    /// Height of the segment `frame` with the slice `start .. start + count`
    /// appended.
    pub fn measure_prefix(
        &self,
        atoms: &Atoms,
        start: usize,
        count: usize,
        frame: &SegmentFrame,
    ) -> Result<f32, LayoutError> {
        measure_unit(self.oracle, &frame.wrap(atoms.slice(start, count)), self.width)
    }

    /// Largest atom count starting at `start` whose slice, appended to
    /// `frame`, fits `budget`.
    ///
    /// Returns 0 when not even one atom fits.
    pub fn max_prefix_fitting(
        &self,
        atoms: &Atoms,
        start: usize,
        budget: f32,
        frame: &SegmentFrame,
    ) -> Result<usize, LayoutError> {
        let remaining = atoms.len().saturating_sub(start);
        let (mut lo, mut hi, mut best) = (1usize, remaining, 0usize);
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let height = self.measure_prefix(atoms, start, mid, frame)?;
            if height <= budget {
                best = mid;
                lo = mid + 1;
            } else {
                hi = mid - 1;
            }
        }
        log::trace!(
            "{} prefix from {start}: {best}/{remaining} fit in {budget:.1}",
            atoms.kind()
        );
        Ok(best)
    }
}

/// Rebuild a message's chunk list from its segments, in order, joining
/// continuation slices back together and dropping repeated table headers.
pub fn reassemble(segments: &[MessageSegment]) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for segment in segments {
        for (i, chunk) in segment.chunks.iter().enumerate() {
            let joins = i == 0 && segment.continuation != Continuation::Fresh;
            match blocks.last_mut() {
                Some(head) if joins && head.kind() == chunk.kind() => {
                    join_continuation(head, chunk, segment.continuation);
                }
                _ => blocks.push(chunk.clone()),
            }
        }
    }
    blocks
}

fn join_continuation(head: &mut Block, tail: &Block, continuation: Continuation) {
    match (head, tail) {
        (Block::Paragraph { inlines }, Block::Paragraph { inlines: rest }) => {
            if continuation != Continuation::ContinuesWord {
                let style = separator_style(inlines, rest);
                push_run(inlines, InlineRun::styled(" ", style));
            }
            for run in rest {
                push_run(inlines, run.clone());
            }
        }
        (Block::Table { rows }, Block::Table { rows: rest }) => {
            rows.extend(rest.iter().skip(1).cloned());
        }
        (Block::Code { text }, Block::Code { text: rest }) => {
            text.push('\n');
            text.push_str(rest);
        }
        _ => {}
    }
}
