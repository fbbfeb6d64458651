//! Page packer – walks a content stream and greedily fills fixed-height pages.
//!
//! Handles:
//! - atomic opaque units (moved to a fresh page when they do not fit)
//! - message chunks placed whole when they fit, split by atoms otherwise
//! - forced placement of anything taller than an empty page
//! - continuation tags and role-label visibility per message
//!
//! Every loop step advances either the stream position or a chunk cursor, so
//! packing always terminates, and at least one (possibly empty) page is
//! produced.

use log::{debug, warn};

use crate::content::{Block, ContentStream, Message, Role, Unit, MAX_TOKEN_CHARS};
use crate::error::LayoutError;
use crate::measure::{measure_unit, Measure};
use crate::plan::{Continuation, MessageSegment, Page, PlacedUnit, RenderUnit, SegmentTag};
use crate::segments::{label_segments, should_show_role};
use crate::split::{Atoms, SegmentFrame, Splitter};

/// Page geometry and splitting limits for one packing run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackConfig {
    /// Usable content height per page.
    pub capacity: f32,
    /// Content width handed to the oracle.
    pub width: f32,
    /// Paragraph tokens longer than this are pre-split.
    pub max_token_chars: usize,
}

impl PackConfig {
    pub fn new(capacity: f32, width: f32) -> Self {
        Self {
            capacity,
            width,
            max_token_chars: MAX_TOKEN_CHARS,
        }
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if positive(self.capacity) && positive(self.width) {
            Ok(())
        } else {
            Err(LayoutError::InvalidGeometry {
                capacity: self.capacity,
                width: self.width,
            })
        }
    }
}

/// Where a segment of the message being packed ended up.
#[derive(Debug, Clone, Copy)]
struct SegmentRef {
    page: usize,
    unit: usize,
}

#[derive(Debug)]
struct MessageState {
    role: Role,
    role_shown: bool,
    segments: Vec<SegmentRef>,
}

/// Incremental packer. Feed units in stream order, then call
/// [`Packer::finish`].
pub struct Packer<'a, M: Measure + ?Sized> {
    oracle: &'a M,
    config: PackConfig,
    pages: Vec<Page>,
    current: Vec<PlacedUnit>,
    current_height: f32,
    /// Index in `current` of the segment the active message is filling.
    open_segment: Option<usize>,
}

impl<'a, M: Measure + ?Sized> Packer<'a, M> {
    pub fn new(oracle: &'a M, config: PackConfig) -> Result<Self, LayoutError> {
        config.validate()?;
        Ok(Self {
            oracle,
            config,
            pages: Vec::new(),
            current: Vec::new(),
            current_height: 0.0,
            open_segment: None,
        })
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Pages committed so far.
    pub fn committed(&self) -> &[Page] {
        &self.pages
    }

    pub fn push_unit(&mut self, unit: &Unit) -> Result<(), LayoutError> {
        match unit {
            Unit::Message(message) => self.push_message(message),
            Unit::Opaque { markup } => self.push_opaque(markup),
        }
    }

    /// Place an atomic unit, moving it to a fresh page if it does not fit.
    pub fn push_opaque(&mut self, markup: &str) -> Result<(), LayoutError> {
        self.open_segment = None;
        let unit = RenderUnit::Opaque {
            markup: markup.to_string(),
        };
        let height = measure_unit(self.oracle, &unit, self.config.width)?;
        if let Err(placed) = self.try_add(PlacedUnit { height, unit }) {
            self.commit();
            if height > self.config.capacity {
                warn!(
                    "opaque unit of height {height:.1} exceeds page capacity {:.1}; placing it anyway",
                    self.config.capacity
                );
            }
            self.force_add(placed);
        }
        Ok(())
    }

    pub fn push_message(&mut self, message: &Message) -> Result<(), LayoutError> {
        self.open_segment = None;
        let message = message.normalized(self.config.max_token_chars);
        let mut state = MessageState {
            role: message.role,
            role_shown: false,
            segments: Vec::new(),
        };

        for (index, chunk) in message.chunks.iter().enumerate() {
            self.place_chunk(&mut state, chunk, index == 0)?;
        }
        if state.segments.is_empty() {
            debug!("skipping empty {:?} message", message.role);
        }

        self.apply_labels(&state);
        self.open_segment = None;
        Ok(())
    }

    /// Start the next unit on a fresh page.
    pub fn page_break(&mut self) {
        self.commit();
    }

    /// Commit the last page and return all pages (at least one).
    pub fn finish(mut self) -> Vec<Page> {
        self.commit();
        if self.pages.is_empty() {
            self.pages.push(Page {
                page_index: 0,
                units: Vec::new(),
            });
        }
        self.pages
    }

    fn place_chunk(
        &mut self,
        state: &mut MessageState,
        chunk: &Block,
        first_chunk: bool,
    ) -> Result<(), LayoutError> {
        let width = self.config.width;
        let frame = self.frame(state, first_chunk);
        let whole = measure_unit(self.oracle, &frame.wrap(chunk.clone()), width)?;
        if whole <= self.room() {
            self.place(state, chunk.clone(), whole, &frame, Continuation::Fresh);
            return Ok(());
        }

        let atoms = Atoms::of(chunk, self.config.max_token_chars);
        if !atoms.is_splittable() {
            self.commit();
            let frame = self.frame(state, first_chunk);
            let height = measure_unit(self.oracle, &frame.wrap(chunk.clone()), width)?;
            if height > self.config.capacity {
                warn!(
                    "{} of height {height:.1} exceeds page capacity {:.1}; placing it anyway",
                    chunk.kind(),
                    self.config.capacity
                );
            }
            self.place(state, chunk.clone(), height, &frame, Continuation::Fresh);
            return Ok(());
        }

        let splitter = Splitter::new(self.oracle, width);
        let mut cursor = 0;
        while cursor < atoms.len() {
            let frame = self.frame(state, first_chunk);
            let budget = self.room();
            let mut count = splitter.max_prefix_fitting(&atoms, cursor, budget, &frame)?;
            if count == 0 {
                if !self.current.is_empty() {
                    self.commit();
                    continue;
                }
                warn!(
                    "{} {cursor} does not fit an empty page; placing it anyway",
                    atoms.kind()
                );
                count = 1;
            }

            let height = splitter.measure_prefix(&atoms, cursor, count, &frame)?;
            let continuation = match cursor {
                0 => Continuation::Fresh,
                c if atoms.glued_at(c) => Continuation::ContinuesWord,
                _ => Continuation::Continues,
            };
            debug!(
                "placing {count} of {} {}s from {cursor} ({height:.1}pt)",
                atoms.len(),
                atoms.kind()
            );
            self.place(state, atoms.slice(cursor, count), height, &frame, continuation);
            cursor += count;
            if cursor < atoms.len() {
                self.commit();
            }
        }
        Ok(())
    }

    /// The segment the active message is filling on the current page, with
    /// its accounted height.
    fn open(&self) -> Option<(&MessageSegment, f32)> {
        let placed = self.current.get(self.open_segment?)?;
        placed.unit.as_segment().map(|segment| (segment, placed.height))
    }

    /// Measurement context for a chunk placed right now: the open segment
    /// with its chunks so far, or a new segment.
    fn frame(&self, state: &MessageState, first_chunk: bool) -> SegmentFrame {
        match self.open() {
            Some((segment, _)) => SegmentFrame {
                role: segment.role,
                show_role: segment.show_role,
                lead: segment.chunks.clone(),
            },
            None => SegmentFrame::fresh(
                state.role,
                should_show_role(
                    state.role,
                    first_chunk,
                    self.current.is_empty(),
                    state.role_shown,
                ),
            ),
        }
    }

    /// Height the open segment (or a new one) may grow to on this page.
    fn room(&self) -> f32 {
        let open = self.open().map_or(0.0, |(_, height)| height);
        self.config.capacity - (self.current_height - open)
    }

    /// Append a block to the open segment, or open a new one. `height` is
    /// the measure of the whole segment with `block` in it.
    fn place(
        &mut self,
        state: &mut MessageState,
        block: Block,
        height: f32,
        frame: &SegmentFrame,
        continuation: Continuation,
    ) {
        if let Some(index) = self.open_segment {
            if let Some(placed) = self.current.get_mut(index) {
                if let RenderUnit::MessageSegment(segment) = &mut placed.unit {
                    segment.chunks.push(block);
                    self.current_height += height - placed.height;
                    placed.height = height;
                    return;
                }
            }
        }

        if frame.show_role {
            state.role_shown = true;
        }
        self.force_add(PlacedUnit {
            height,
            unit: RenderUnit::MessageSegment(MessageSegment {
                role: state.role,
                chunks: vec![block],
                show_role: frame.show_role,
                segment: SegmentTag::Single,
                continuation,
            }),
        });
        let unit = self.current.len() - 1;
        self.open_segment = Some(unit);
        state.segments.push(SegmentRef {
            page: self.pages.len(),
            unit,
        });
    }

    fn apply_labels(&mut self, state: &MessageState) {
        let tags = label_segments(state.segments.len());
        for (seg_ref, tag) in state.segments.iter().zip(tags) {
            let placed = if seg_ref.page < self.pages.len() {
                self.pages[seg_ref.page].units.get_mut(seg_ref.unit)
            } else {
                self.current.get_mut(seg_ref.unit)
            };
            if let Some(PlacedUnit {
                unit: RenderUnit::MessageSegment(segment),
                ..
            }) = placed
            {
                segment.segment = tag;
            }
        }
    }

    fn try_add(&mut self, placed: PlacedUnit) -> Result<(), PlacedUnit> {
        if self.current.is_empty() || self.current_height + placed.height <= self.config.capacity {
            self.force_add(placed);
            Ok(())
        } else {
            Err(placed)
        }
    }

    fn force_add(&mut self, placed: PlacedUnit) {
        self.current_height += placed.height;
        self.current.push(placed);
    }

    fn commit(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let units = std::mem::take(&mut self.current);
        debug!(
            "page {} committed: {} units, {:.1}/{:.1}pt",
            self.pages.len(),
            units.len(),
            self.current_height,
            self.config.capacity
        );
        self.pages.push(Page {
            page_index: self.pages.len(),
            units,
        });
        self.current_height = 0.0;
        self.open_segment = None;
    }
}

/// Pack a whole stream.
pub fn pack<M: Measure + ?Sized>(
    stream: &ContentStream,
    oracle: &M,
    config: PackConfig,
) -> Result<Vec<Page>, LayoutError> {
    let mut packer = Packer::new(oracle, config)?;
    for unit in &stream.units {
        packer.push_unit(unit)?;
    }
    Ok(packer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{code_lines, tokenize, InlineRun};
    use crate::plan::group_segments;
    use crate::split::reassemble;
    use crate::plan::SegmentTag::*;

    /// Label 10; paragraph 5 per token; code 10 per line; table 20 per row;
    /// opaque `h:<height>`.
    fn oracle(unit: &RenderUnit, _: f32) -> f32 {
        match unit {
            RenderUnit::Opaque { markup } => markup
                .strip_prefix("h:")
                .and_then(|h| h.parse().ok())
                .unwrap_or(10.0),
            RenderUnit::MessageSegment(seg) => {
                let label = if seg.show_role { 10.0 } else { 0.0 };
                label + seg.chunks.iter().map(chunk_height).sum::<f32>()
            }
        }
    }

    fn chunk_height(block: &Block) -> f32 {
        match block {
            Block::Paragraph { inlines } => 5.0 * tokenize(inlines, MAX_TOKEN_CHARS).len() as f32,
            Block::Code { text } => 10.0 * code_lines(text).len() as f32,
            Block::Table { rows } => 20.0 * rows.len() as f32,
        }
    }

    fn code(n: usize) -> Block {
        Block::code(
            (0..n)
                .map(|i| format!("let x{i} = {i};"))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    fn table(body_rows: usize) -> Block {
        let header = vec![vec![InlineRun::bold("Name")], vec![InlineRun::bold("Value")]];
        let mut rows = vec![header];
        for i in 0..body_rows {
            rows.push(vec![
                vec![InlineRun::plain(format!("item {i}"))],
                vec![InlineRun::plain(format!("{i}"))],
            ]);
        }
        Block::table(rows)
    }

    fn segments(pages: &[Page]) -> Vec<&MessageSegment> {
        pages.iter().flat_map(Page::segments).collect()
    }

    #[test]
    fn message_that_fits_is_single() {
        let mut stream = ContentStream::new();
        stream.push_message(Role::User, vec![Block::text("short question"), code(3)]);
        let pages = pack(&stream, &oracle, PackConfig::new(300.0, 500.0)).unwrap();
        assert_eq!(pages.len(), 1);
        let segs = segments(&pages);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].segment, Single);
        assert!(segs[0].show_role);
        assert_eq!(segs[0].chunks.len(), 2);
        assert!((pages[0].height() - 50.0).abs() < 1e-4);
    }

    #[test]
    fn three_page_message_is_start_middle_end() {
        let mut stream = ContentStream::new();
        stream.push_message(Role::Assistant, vec![code(25)]);
        let pages = pack(&stream, &oracle, PackConfig::new(100.0, 500.0)).unwrap();
        assert_eq!(pages.len(), 3);
        let segs = segments(&pages);
        let tags: Vec<_> = segs.iter().map(|s| s.segment).collect();
        assert_eq!(tags, vec![Start, Middle, End]);
        // The first chunk continues at the top of each page, so the label repeats.
        assert!(segs.iter().all(|s| s.show_role));
        let lines: Vec<usize> = segs
            .iter()
            .map(|s| match &s.chunks[0] {
                Block::Code { text } => code_lines(text).len(),
                _ => 0,
            })
            .collect();
        assert_eq!(lines, vec![9, 9, 7]);
    }

    #[test]
    fn later_chunks_do_not_repeat_label() {
        let mut stream = ContentStream::new();
        stream.push_message(Role::User, vec![Block::text("hi there"), code(20)]);
        let pages = pack(&stream, &oracle, PackConfig::new(100.0, 500.0)).unwrap();
        assert_eq!(pages.len(), 3);
        let segs = segments(&pages);
        assert_eq!(
            segs.iter().map(|s| s.show_role).collect::<Vec<_>>(),
            vec![true, false, false]
        );
        assert_eq!(segs[0].chunks.len(), 2);
        assert_eq!(segs[1].continuation, Continuation::Continues);
        assert!((pages[0].height() - 100.0).abs() < 1e-4);
    }

    #[test]
    fn table_header_repeats_on_every_page() {
        let stream = ContentStream::from_note(vec![table(50)]);
        let pages = pack(&stream, &oracle, PackConfig::new(300.0, 500.0)).unwrap();
        assert_eq!(pages.len(), 4);

        let mut header = None;
        let mut body_rows = Vec::new();
        for seg in segments(&pages) {
            let Block::Table { rows } = &seg.chunks[0] else {
                panic!("expected table");
            };
            let first = header.get_or_insert_with(|| rows[0].clone()).clone();
            assert_eq!(rows[0], first);
            body_rows.push(rows.len() - 1);
            assert!(!seg.show_role);
        }
        assert_eq!(body_rows, vec![14, 14, 14, 8]);
        assert!(pages.iter().all(|p| p.height() <= 300.0));
    }

    #[test]
    fn opaque_moves_to_next_page() {
        let mut stream = ContentStream::new();
        stream.push_opaque("h:60").push_opaque("h:60");
        let pages = pack(&stream, &oracle, PackConfig::new(100.0, 500.0)).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].page_index, 1);
    }

    #[test]
    fn oversized_opaque_terminates() {
        let mut stream = ContentStream::new();
        stream
            .push_opaque("h:10")
            .push_opaque("h:1000")
            .push_opaque("h:10");
        let pages = pack(&stream, &oracle, PackConfig::new(100.0, 500.0)).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1].units.len(), 1);
        assert!((pages[1].height() - 1000.0).abs() < 1e-4);
    }

    #[test]
    fn oversized_atom_is_forced_alone() {
        // Every code line is taller than a page.
        let tall = |unit: &RenderUnit, _: f32| -> f32 {
            match unit {
                RenderUnit::MessageSegment(seg) => {
                    seg.chunks.iter().map(|c| 10.0 * chunk_height(c)).sum()
                }
                RenderUnit::Opaque { .. } => 5.0,
            }
        };
        let stream = ContentStream::from_note(vec![code(4)]);
        let pages = pack(&stream, &tall, PackConfig::new(50.0, 500.0)).unwrap();
        assert_eq!(pages.len(), 4);
        assert!(pages.iter().all(|p| p.units.len() == 1));
    }

    #[test]
    fn empty_stream_yields_one_page() {
        let pages = pack(&ContentStream::new(), &oracle, PackConfig::new(100.0, 500.0)).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].units.is_empty());
    }

    #[test]
    fn long_token_spreads_over_pages_and_reassembles() {
        let word = "q".repeat(500);
        let block = Block::paragraph(vec![InlineRun::plain(word)]);
        let stream = ContentStream::from_note(vec![block.clone()]);
        // Two pieces (10) per page.
        let pages = pack(&stream, &oracle, PackConfig::new(12.0, 500.0)).unwrap();
        assert_eq!(pages.len(), 4);
        let segs: Vec<MessageSegment> = segments(&pages).into_iter().cloned().collect();
        assert_eq!(segs[1].continuation, Continuation::ContinuesWord);
        assert_eq!(reassemble(&segs), vec![block]);
    }

    #[test]
    fn mixed_stream_preserves_content_and_height_bound() {
        let mut stream = ContentStream::new();
        stream
            .push_opaque("h:40")
            .push_message(
                Role::User,
                vec![Block::paragraph(vec![
                    InlineRun::plain("Can you "),
                    InlineRun::bold("compare"),
                    InlineRun::plain(" these?"),
                    InlineRun::citation("c1", "Docs"),
                ])],
            )
            .push_message(
                Role::Assistant,
                vec![
                    Block::text("word ".repeat(60)),
                    table(12),
                    code(30),
                    Block::text("Done."),
                ],
            )
            .push_message(Role::User, vec![code(2)]);

        // Split right after a bold word, before a citation-only word.
        let cited = ContentStream::from_note(vec![
            Block::code("x"),
            Block::paragraph(vec![
                InlineRun::bold("a "),
                InlineRun::citation("c", "Cite"),
                InlineRun::plain(" b"),
            ]),
        ]);

        for (stream, capacity) in [(stream, 120.0), (cited, 15.0)] {
            let pages = pack(&stream, &oracle, PackConfig::new(capacity, 500.0)).unwrap();

            for page in &pages {
                let oversized = page.units.len() == 1 && page.units[0].height > capacity;
                assert!(oversized || page.height() <= capacity + 1e-3);
            }

            let expected: Vec<Vec<Block>> = stream
                .normalized(MAX_TOKEN_CHARS)
                .messages()
                .map(|m| m.chunks.clone())
                .collect();
            let rebuilt: Vec<Vec<Block>> = group_segments(&pages)
                .iter()
                .map(|segs| reassemble(segs))
                .collect();
            assert_eq!(rebuilt, expected);
        }
    }

    #[test]
    fn non_monotonic_oracle_terminates_within_bounds() {
        let bumpy = |unit: &RenderUnit, _: f32| -> f32 {
            match unit {
                RenderUnit::MessageSegment(seg) => seg
                    .chunks
                    .iter()
                    .map(|c| {
                        let h = chunk_height(c);
                        if (h as usize / 10) % 3 == 0 {
                            h * 2.0
                        } else {
                            h
                        }
                    })
                    .sum(),
                RenderUnit::Opaque { .. } => 5.0,
            }
        };
        let stream = ContentStream::from_note(vec![code(40)]);
        let pages = pack(&stream, &bumpy, PackConfig::new(95.0, 500.0)).unwrap();
        assert!(!pages.is_empty());
        for page in &pages {
            assert!(page.height() <= 95.0 || page.units.len() == 1);
        }
        let segs: Vec<MessageSegment> = segments(&pages).into_iter().cloned().collect();
        assert_eq!(reassemble(&segs), vec![code(40)]);
    }

    struct Broken;

    impl Measure for Broken {
        fn measure(&self, unit: &RenderUnit, _: f32) -> Result<f32, LayoutError> {
            match unit {
                RenderUnit::Opaque { .. } => Ok(5.0),
                RenderUnit::MessageSegment(_) => {
                    Err(LayoutError::Measurement("no layout pass".into()))
                }
            }
        }
    }

    #[test]
    fn oracle_failure_aborts() {
        let mut stream = ContentStream::new();
        stream
            .push_opaque("<h1>ok</h1>")
            .push_message(Role::User, vec![Block::text("boom")]);
        let err = pack(&stream, &Broken, PackConfig::new(100.0, 500.0)).unwrap_err();
        assert_eq!(err, LayoutError::Measurement("no layout pass".into()));
    }

    #[test]
    fn rejects_bad_geometry() {
        assert!(matches!(
            pack(&ContentStream::new(), &oracle, PackConfig::new(0.0, 500.0)),
            Err(LayoutError::InvalidGeometry { .. })
        ));
        assert!(PackConfig::new(100.0, f32::NAN).validate().is_err());
    }
}
