//! Reference collection – gathers citation markers in traversal order into a
//! deduplicated list that is rendered as trailing pages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::content::{Block, ContentStream, InlineRun};
use crate::markup::escape_text;

/// Collected citations: ids in first-seen order plus the first source seen
/// for each id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct References {
    pub order: Vec<String>,
    pub sources: BTreeMap<String, String>,
}

impl References {
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn source(&self, id: &str) -> Option<&str> {
        self.sources.get(id).map(String::as_str)
    }

    /// `(number, id, source)` in first-seen order, numbered from 1.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str, &str)> {
        self.order.iter().enumerate().map(|(i, id)| {
            let source = self.sources.get(id).map(String::as_str).unwrap_or("");
            (i + 1, id.as_str(), source)
        })
    }

    /// Markup for the trailing references section: a heading followed by one
    /// opaque unit per entry so long lists can span pages.
    pub fn to_markup(&self) -> Vec<String> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(self.len() + 1);
        out.push("<h2>References</h2>".to_string());
        for (n, id, source) in self.entries() {
            out.push(format!(
                "<p class=\"reference\">{n}. [{}] {}</p>",
                escape_text(id),
                escape_text(source)
            ));
        }
        out
    }
}

/// Walks inline runs and records each citation id the first time it is seen.
#[derive(Debug, Default)]
pub struct ReferenceCollector {
    refs: References,
}

impl ReferenceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a citation. Returns `true` if the id was new.
    pub fn record(&mut self, id: &str, source: &str) -> bool {
        if self.refs.sources.contains_key(id) {
            return false;
        }
        self.refs.sources.insert(id.to_string(), source.to_string());
        self.refs.order.push(id.to_string());
        true
    }

    pub fn collect_run(&mut self, run: &InlineRun) {
        if let InlineRun::Citation { id, source } = run {
            self.record(id, source);
        }
    }

    pub fn collect_block(&mut self, block: &Block) {
        for run in block.inline_runs() {
            self.collect_run(run);
        }
    }

    pub fn collect_stream(&mut self, stream: &ContentStream) {
        for message in stream.messages() {
            for chunk in &message.chunks {
                self.collect_block(chunk);
            }
        }
    }

    pub fn references(&self) -> &References {
        &self.refs
    }

    pub fn finish(self) -> References {
        self.refs
    }
}

/// Collect every citation in `stream`.
pub fn collect(stream: &ContentStream) -> References {
    let mut collector = ReferenceCollector::new();
    collector.collect_stream(stream);
    collector.finish()
}
