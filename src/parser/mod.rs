pub mod blocks;
pub mod pages;
pub mod slug;

use crate::error::ParseError;
use blocks::ParsedText;
use pages::{Document, SegmentOptions};

/// Two-pass pipeline: mARkdown → blocks → pages.
pub fn parse_document(
    text: &str,
    opts: SegmentOptions,
) -> Result<(Vec<(String, String)>, Document), ParseError> {
    let ParsedText { metadata, content } = blocks::parse_blocks(text)?;
    Ok((metadata, pages::segment(content, opts)))
}
