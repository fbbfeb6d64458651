//! Page plan – the intermediate representation between packing and
//! rendering. This is the "frozen" structure that encodes exactly which render
//! units go on each page, in order, together with the collected references.

use serde::{Deserialize, Serialize};

use crate::content::{Block, Role};
use crate::error::Result;
use crate::references::References;

/// Position of a segment within its message's full split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentTag {
    Single,
    Start,
    Middle,
    End,
}

/// How the first chunk of a segment relates to the previous segment of the
/// same message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Continuation {
    /// Starts a new chunk.
    #[default]
    Fresh,
    /// Continues the previous segment's last chunk at an atom boundary.
    Continues,
    /// Continues inside a pre-split long token; no separator when re-joined.
    ContinuesWord,
}

/// A contiguous slice of one message placed together on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSegment {
    pub role: Role,
    pub chunks: Vec<Block>,
    pub show_role: bool,
    pub segment: SegmentTag,
    #[serde(default)]
    pub continuation: Continuation,
}

/// Something placed on a page by the packer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderUnit {
    Opaque { markup: String },
    MessageSegment(MessageSegment),
}

impl RenderUnit {
    pub fn kind(&self) -> &'static str {
        match self {
            RenderUnit::Opaque { .. } => "opaque",
            RenderUnit::MessageSegment(_) => "segment",
        }
    }

    pub fn as_segment(&self) -> Option<&MessageSegment> {
        match self {
            RenderUnit::MessageSegment(seg) => Some(seg),
            RenderUnit::Opaque { .. } => None,
        }
    }
}

/// A render unit with the height the packer accounted for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedUnit {
    pub height: f32,
    pub unit: RenderUnit,
}

/// One page of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page_index: usize,
    pub units: Vec<PlacedUnit>,
}

impl Page {
    /// Sum of the heights of all units on the page.
    pub fn height(&self) -> f32 {
        self.units.iter().map(|u| u.height).sum()
    }

    pub fn segments(&self) -> impl Iterator<Item = &MessageSegment> {
        self.units.iter().filter_map(|u| u.unit.as_segment())
    }
}

/// A complete document plan ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePlan {
    /// Document title embedded in the output metadata.
    #[serde(default = "PagePlan::default_title")]
    pub title: String,
    /// Width of each page in points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of each page in points.
    pub page_height_pt: f32,
    /// Margin on every side, in points.
    pub margin_pt: f32,
    /// Ordered list of pages.
    pub pages: Vec<Page>,
    /// Citations in first-seen order.
    #[serde(default)]
    pub references: References,
}

impl PagePlan {
    fn default_title() -> String {
        "chat-pager export".to_string()
    }

    /// Usable content height per page.
    pub fn capacity(&self) -> f32 {
        self.page_height_pt - 2.0 * self.margin_pt
    }

    /// Usable content width.
    pub fn content_width(&self) -> f32 {
        self.page_width_pt - 2.0 * self.margin_pt
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Re-group the segments of every message, in document order, using their
/// tags: `Single` and `Start` open a group, `Middle` and `End` extend it.
pub fn group_segments(pages: &[Page]) -> Vec<Vec<MessageSegment>> {
    let mut groups: Vec<Vec<MessageSegment>> = Vec::new();
    for seg in pages.iter().flat_map(|p| p.segments()) {
        match (seg.segment, groups.last_mut()) {
            (SegmentTag::Middle | SegmentTag::End, Some(open)) => open.push(seg.clone()),
            _ => groups.push(vec![seg.clone()]),
        }
    }
    groups
}
