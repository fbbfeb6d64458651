//! Pipeline – ties together reference collection, packing, and rendering
//! into a single function call.

use log::info;
use serde::{Deserialize, Serialize};

use crate::content::{ContentStream, MAX_TOKEN_CHARS};
use crate::error::Result;
use crate::markup::escape_text;
use crate::measure::Measure;
use crate::metrics::{MetricsStyle, TextMetrics};
use crate::packer::{PackConfig, Packer};
use crate::plan::PagePlan;
use crate::references;
use crate::render::render_pdf;

/// Default page margin in points.
pub const PAGE_MARGIN_PT: f32 = 40.0;

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

/// Configuration for one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Document title embedded in the PDF metadata (default: "chat-pager export").
    pub title: String,
    /// Page width in points (default: A4 = 595.28).
    pub page_width: f32,
    /// Page height in points (default: A4 = 841.89).
    pub page_height: f32,
    /// Page margin in points (default: 40).
    pub page_margin: f32,
    /// Page orientation; swaps effective width/height when `Landscape`.
    pub orientation: PageOrientation,
    /// Paragraph tokens longer than this are pre-split (default: 80).
    pub max_token_chars: usize,
    /// Append the collected references on trailing pages (default: true).
    pub append_references: bool,
    /// Open the document with the title as a heading (default: false).
    pub title_banner: bool,
    pub style: MetricsStyle,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: "chat-pager export".to_string(),
            page_width: 595.28,
            page_height: 841.89,
            page_margin: PAGE_MARGIN_PT,
            orientation: PageOrientation::Portrait,
            max_token_chars: MAX_TOKEN_CHARS,
            append_references: true,
            title_banner: false,
            style: MetricsStyle::default(),
        }
    }
}

impl ExportConfig {
    /// Effective page width after applying orientation.
    pub fn effective_width(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_width,
            PageOrientation::Landscape => self.page_height,
        }
    }

    /// Effective page height after applying orientation.
    pub fn effective_height(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_height,
            PageOrientation::Landscape => self.page_width,
        }
    }

    /// Create an A4 landscape config.
    pub fn a4_landscape() -> Self {
        Self {
            orientation: PageOrientation::Landscape,
            ..Self::default()
        }
    }

    /// Packing geometry: the page minus its margins.
    pub fn pack_config(&self) -> PackConfig {
        PackConfig {
            capacity: self.effective_height() - 2.0 * self.page_margin,
            width: self.effective_width() - 2.0 * self.page_margin,
            max_token_chars: self.max_token_chars,
        }
    }

    pub fn metrics(&self) -> TextMetrics {
        TextMetrics {
            style: self.style.clone(),
            ..TextMetrics::default()
        }
    }
}

/// Plan `stream` into pages using `oracle` for every height.
///
/// References are collected up front; when `append_references` is set and
/// there are any, they start on a fresh page after the content.
pub fn plan_document<M: Measure + ?Sized>(
    stream: &ContentStream,
    config: &ExportConfig,
    oracle: &M,
) -> Result<PagePlan> {
    let references = references::collect(stream);
    let mut packer = Packer::new(oracle, config.pack_config())?;

    if config.title_banner {
        packer.push_opaque(&format!("<h1>{}</h1>", escape_text(&config.title)))?;
    }
    for unit in &stream.units {
        packer.push_unit(unit)?;
    }
    if config.append_references && !references.is_empty() {
        packer.page_break();
        for markup in references.to_markup() {
            packer.push_opaque(&markup)?;
        }
    }

    let pages = packer.finish();
    info!(
        "planned {} unit(s) onto {} page(s), {} reference(s)",
        stream.units.len(),
        pages.len(),
        references.len()
    );
    Ok(PagePlan {
        title: config.title.clone(),
        page_width_pt: config.effective_width(),
        page_height_pt: config.effective_height(),
        margin_pt: config.page_margin,
        pages,
        references,
    })
}

/// Plan with the built-in metrics oracle.
pub fn plan_with_metrics(stream: &ContentStream, config: &ExportConfig) -> Result<PagePlan> {
    plan_document(stream, config, &config.metrics())
}

/// Full pipeline: content stream → PDF bytes.
///
/// Returns `(pdf_bytes, page_plan)`.
pub fn export_pdf(stream: &ContentStream, config: &ExportConfig) -> Result<(Vec<u8>, PagePlan)> {
    let metrics = config.metrics();
    let plan = plan_document(stream, config, &metrics)?;
    let bytes = render_pdf(&plan, &metrics)?;
    Ok((bytes, plan))
}

/// Convenience: export with the default A4 config.
pub fn export_pdf_default(stream: &ContentStream) -> Result<Vec<u8>> {
    let (bytes, _) = export_pdf(stream, &ExportConfig::default())?;
    Ok(bytes)
}
