use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^###\s*(\|+)\s*(.*)$").unwrap());
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^###\s+([^|].*)$").unwrap());
static PAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"PageV([^\sP]+)P([0-9A-Za-z]+)").unwrap());
static MILESTONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bms\d+\b").unwrap());

const MAGIC: &str = "######OpenITI#";
const META_PREFIX: &str = "#META#";
const HEADER_END: &str = "#META#Header#End#";
const HEMISTICH_SEP: &str = "%~%";

/// Raw `{volume, page}` strings as they appear in the page token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMarker {
    pub volume: String,
    pub page: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum ContentBlock {
    #[serde(rename = "pageNumber")]
    PageNumber(PageMarker),
    #[serde(rename = "title")]
    Title(String),
    #[serde(rename = "header-1")]
    Header1(String),
    #[serde(rename = "header-2")]
    Header2(String),
    #[serde(rename = "header-3")]
    Header3(String),
    #[serde(rename = "verse")]
    Verse(Vec<String>),
    #[serde(rename = "blockquote")]
    Blockquote(String),
    #[serde(rename = "paragraph")]
    Paragraph(String),
}

impl ContentBlock {
    /// Text that belongs in the table of contents, if this block is a heading.
    pub fn heading_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Title(t)
            | ContentBlock::Header1(t)
            | ContentBlock::Header2(t)
            | ContentBlock::Header3(t) => Some(t),
            ContentBlock::PageNumber(_)
            | ContentBlock::Verse(_)
            | ContentBlock::Blockquote(_)
            | ContentBlock::Paragraph(_) => None,
        }
    }

    /// Heading depth: 0 for a title, 1..=3 for headers.
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            ContentBlock::Title(_) => Some(0),
            ContentBlock::Header1(_) => Some(1),
            ContentBlock::Header2(_) => Some(2),
            ContentBlock::Header3(_) => Some(3),
            ContentBlock::PageNumber(_)
            | ContentBlock::Verse(_)
            | ContentBlock::Blockquote(_)
            | ContentBlock::Paragraph(_) => None,
        }
    }

    pub fn is_page_marker(&self) -> bool {
        matches!(self, ContentBlock::PageNumber(_))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedText {
    pub metadata: Vec<(String, String)>,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Paragraph,
    Blockquote,
    Title,
    Header(u8),
}

/// Accumulates the text of the block being read; page tokens cut it in two.
struct BlockBuilder {
    blocks: Vec<ContentBlock>,
    kind: Option<RunKind>,
    buf: String,
}

impl BlockBuilder {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            kind: None,
            buf: String::new(),
        }
    }

    fn start(&mut self, kind: RunKind) {
        self.close();
        self.kind = Some(kind);
    }

    fn append(&mut self, text: &str) {
        if self.kind.is_none() {
            self.kind = Some(RunKind::Paragraph);
        }
        let mut last = 0;
        for caps in PAGE_RE.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            self.extend_buf(&text[last..whole.start()]);
            self.flush();
            self.blocks.push(ContentBlock::PageNumber(PageMarker {
                volume: caps[1].to_string(),
                page: caps[2].to_string(),
            }));
            last = whole.end();
        }
        self.extend_buf(&text[last..]);
    }

    /// Append a one-line block that must stay whole; its page tokens follow it.
    fn append_unsplit(&mut self, text: &str) {
        let mut markers = Vec::new();
        let mut last = 0;
        for caps in PAGE_RE.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            self.extend_buf(&text[last..whole.start()]);
            markers.push(ContentBlock::PageNumber(PageMarker {
                volume: caps[1].to_string(),
                page: caps[2].to_string(),
            }));
            last = whole.end();
        }
        self.extend_buf(&text[last..]);
        self.flush();
        self.blocks.extend(markers);
    }

    fn extend_buf(&mut self, piece: &str) {
        let cleaned = MILESTONE_RE.replace_all(piece, "");
        for word in cleaned.split_whitespace() {
            if !self.buf.is_empty() {
                self.buf.push(' ');
            }
            self.buf.push_str(word);
        }
    }

    /// Emit the buffered text but stay in the same run.
    fn flush(&mut self) {
        let text = std::mem::take(&mut self.buf);
        if text.is_empty() {
            return;
        }
        let Some(kind) = self.kind else { return };
        let block = match kind {
            RunKind::Paragraph if text.contains(HEMISTICH_SEP) => ContentBlock::Verse(
                text.split(HEMISTICH_SEP)
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            RunKind::Paragraph => ContentBlock::Paragraph(text),
            RunKind::Blockquote => ContentBlock::Blockquote(text),
            RunKind::Title => ContentBlock::Title(text),
            RunKind::Header(1) => ContentBlock::Header1(text),
            RunKind::Header(2) => ContentBlock::Header2(text),
            RunKind::Header(_) => ContentBlock::Header3(text),
        };
        self.blocks.push(block);
    }

    fn close(&mut self) {
        self.flush();
        self.kind = None;
    }

    fn finish(mut self) -> Vec<ContentBlock> {
        self.close();
        self.blocks
    }
}

/// Parse an OpenITI mARkdown file into its metadata header and a flat block stream.
pub fn parse_blocks(text: &str) -> Result<ParsedText, ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines().map(str::trim_end).skip_while(|l| l.trim().is_empty());

    match lines.next() {
        Some(first) if first.trim_start().starts_with(MAGIC) => {}
        _ => return Err(ParseError::MissingMagic),
    }

    let mut metadata = Vec::new();
    let mut header_closed = false;
    for line in lines.by_ref() {
        let line = line.trim();
        if line.starts_with(HEADER_END) {
            header_closed = true;
            break;
        }
        if let Some(rest) = line.strip_prefix(META_PREFIX) {
            if let Some((key, value)) = rest.split_once("::") {
                metadata.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
    }
    if !header_closed {
        return Err(ParseError::UnterminatedHeader);
    }

    let mut builder = BlockBuilder::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // ── Continuation of the previous block ──
        if let Some(rest) = line.strip_prefix("~~") {
            builder.append(rest);
            continue;
        }

        // ── Headings: ### | / ### || / ### ||| ──
        if let Some(caps) = HEADER_RE.captures(line) {
            let text = caps[2].trim();
            if text.starts_with("EDITOR") {
                builder.close();
                continue;
            }
            let level = caps[1].len().min(3) as u8;
            builder.start(RunKind::Header(level));
            builder.append_unsplit(text);
            builder.close();
            continue;
        }

        // ── Title: ### text ──
        if let Some(caps) = TITLE_RE.captures(line) {
            builder.start(RunKind::Title);
            builder.append_unsplit(&caps[1]);
            builder.close();
            continue;
        }

        // ── Paragraph / blockquote: # text, # > text ──
        if let Some(rest) = line.strip_prefix('#') {
            let rest = rest.trim_start();
            match rest.strip_prefix('>') {
                Some(quoted) => {
                    builder.start(RunKind::Blockquote);
                    builder.append(quoted);
                }
                None => {
                    builder.start(RunKind::Paragraph);
                    builder.append(rest);
                }
            }
            continue;
        }

        // ── Bare text outside the mARkdown conventions ──
        builder.start(RunKind::Paragraph);
        builder.append(line);
    }

    Ok(ParsedText {
        metadata,
        content: builder.finish(),
    })
}
