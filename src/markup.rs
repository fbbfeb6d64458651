//! Opaque markup flattening – turns the small HTML subset used for banners and
//! reference sections into text lines the metrics oracle can wrap.
//!
//! Block-level tags (`p`, `div`, `h1`–`h6`, `li`, `br`, …) end the current
//! line; heading tags mark their line as a heading. `script`/`style` bodies,
//! comments and doctypes are skipped. Everything else is treated as inline.

/// One flattened line of markup text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupLine {
    pub text: String,
    pub heading: bool,
}

/// Flatten `markup` into whitespace-collapsed lines.
pub fn flatten_markup(markup: &str) -> Vec<MarkupLine> {
    let mut parser = Parser::new(markup);
    parser.run();
    parser.finish()
}

/// Escape text for inclusion in generated markup.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "section"
            | "header"
            | "footer"
            | "article"
            | "blockquote"
            | "ul"
            | "ol"
            | "li"
            | "tr"
            | "table"
            | "hr"
            | "br"
            | "pre"
    ) || heading_level(tag).is_some()
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    lines: Vec<MarkupLine>,
    current: String,
    current_heading: bool,
    heading_depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            lines: Vec::new(),
            current: String::new(),
            current_heading: false,
            heading_depth: 0,
        }
    }

    fn run(&mut self) {
        while !self.eof() {
            if self.starts_with("<!--") {
                self.skip_past("-->");
            } else if self.starts_with("<!") || self.starts_with("<?") {
                self.skip_past(">");
            } else if self.starts_with("<") {
                self.parse_tag();
            } else {
                self.parse_text();
            }
        }
    }

    fn finish(mut self) -> Vec<MarkupLine> {
        self.break_line();
        self.lines
    }

    fn parse_tag(&mut self) {
        self.advance(1); // '<'
        let closing = self.current_char() == Some('/');
        if closing {
            self.advance(1);
        }
        let name = self.parse_tag_name();
        self.skip_past(">");

        if name.is_empty() {
            return;
        }
        if !closing && (name == "script" || name == "style") {
            self.skip_past(&format!("</{name}"));
            self.skip_past(">");
            return;
        }
        if is_block_tag(&name) {
            self.break_line();
        }
        if heading_level(&name).is_some() {
            if closing {
                self.heading_depth = self.heading_depth.saturating_sub(1);
            } else {
                self.heading_depth += 1;
            }
        }
    }

    fn parse_tag_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_ascii_alphanumeric() || c == '-' {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_ascii_lowercase()
    }

    fn parse_text(&mut self) {
        let start = self.pos;
        while !self.eof() && !self.starts_with("<") {
            let step = self.current_char().map(char::len_utf8).unwrap_or(1);
            self.advance(step);
        }
        let text = decode_entities(&self.input[start..self.pos]);
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !self.current.is_empty() && !self.current.ends_with(' ') {
                    self.current.push(' ');
                }
            } else {
                if self.heading_depth > 0 {
                    self.current_heading = true;
                }
                self.current.push(ch);
            }
        }
    }

    fn break_line(&mut self) {
        let text = self.current.trim();
        if !text.is_empty() {
            self.lines.push(MarkupLine {
                text: text.to_string(),
                heading: self.current_heading,
            });
        }
        self.current.clear();
        self.current_heading = false;
    }

    /// Advance past the next occurrence of `pat`, or to the end of input.
    fn skip_past(&mut self, pat: &str) {
        match self.input[self.pos..].find(pat) {
            Some(idx) => self.pos += idx + pat.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&amp;", "&")
}
