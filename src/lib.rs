//! # chat-pager – pagination planner for chat and note exports
//!
//! This crate partitions a typed content stream (role-grouped messages of
//! paragraphs, tables and code, plus opaque decorative markup) into
//! fixed-height pages. The pipeline stages are:
//!
//! 1. **Model** – content stream, blocks and inline runs ([`content`])
//! 2. **Collect** – citation references in first-seen order ([`references`])
//! 3. **Pack** – greedy page filling ([`packer`]) with binary-search
//!    splitting ([`split`]) against a height oracle ([`measure`])
//! 4. **Label** – continuation tags and role labels ([`segments`])
//! 5. **Render** – emit PDF bytes via printpdf ([`render`]) using the
//!    built-in font metrics ([`metrics`], [`fonts`])
//!
//! A C-compatible FFI surface is exposed via the [`ffi`] module.

pub mod content;
pub mod error;
pub mod ffi;
pub mod fonts;
pub mod markup;
pub mod measure;
pub mod metrics;
pub mod packer;
pub mod pipeline;
pub mod plan;
pub mod references;
pub mod render;
pub mod samples;
pub mod segments;
pub mod split;

// Re-exports for convenience
pub use content::{Block, ContentStream, InlineRun, Message, Role, Unit};
pub use error::{Error, LayoutError, Result};
pub use measure::Measure;
pub use metrics::TextMetrics;
pub use packer::{pack, PackConfig};
pub use pipeline::{export_pdf, plan_document, ExportConfig, PageOrientation};
pub use plan::{MessageSegment, Page, PagePlan, RenderUnit, SegmentTag};
