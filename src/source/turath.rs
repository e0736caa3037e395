use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use super::TextFetcher;
use crate::error::{BookError, ParseError};
use crate::parser::blocks::{ContentBlock, PageMarker};
use crate::parser::pages::{segment, Document, HeadingEntry, LocatorValue, SegmentOptions};
use crate::parser::slug::AnchorSlugRegistry;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

#[derive(Debug, Deserialize)]
pub struct TurathBook {
    pub pages: Vec<TurathPage>,
    #[serde(default)]
    pub indexes: TurathIndexes,
}

#[derive(Debug, Deserialize)]
pub struct TurathPage {
    pub text: String,
    #[serde(default = "first_volume")]
    pub vol: LocatorValue,
    pub page: LocatorValue,
}

fn first_volume() -> LocatorValue {
    LocatorValue::Number(1)
}

#[derive(Debug, Default, Deserialize)]
pub struct TurathIndexes {
    #[serde(default)]
    pub headings: Vec<TurathHeading>,
}

#[derive(Debug, Deserialize)]
pub struct TurathHeading {
    pub title: String,
    #[serde(default = "top_level")]
    pub level: u8,
    /// 1-based index into `pages`.
    pub page: usize,
}

fn top_level() -> u8 {
    1
}

pub async fn fetch_turath_book<F>(fetcher: &F, base: &str, id: &str) -> Result<Document, BookError>
where
    F: TextFetcher + ?Sized,
{
    let url = format!("{}/{}.json", base.trim_end_matches('/'), id);
    let body = fetcher.get_text(&url).await.map_err(|e| {
        warn!("Turath fetch failed for {}: {}", url, e);
        BookError::SourceNotFound {
            key: id.to_string(),
            attempts: vec![format!("{url} ({e})")],
        }
    })?;

    let book: TurathBook = serde_json::from_str(&body).map_err(|e| BookError::ParseFailure {
        key: id.to_string(),
        source: ParseError::Json(e),
    })?;
    let document = to_document(book);
    info!(
        "Turath book {}: {} pages, {} headings",
        id,
        document.pages.len(),
        document.headings.len()
    );
    Ok(document)
}

/// Every Turath page is closed by a synthesized marker, so page `i` of the
/// payload becomes page `i` of the document.
pub fn to_document(book: TurathBook) -> Document {
    let mut blocks = Vec::new();
    for page in &book.pages {
        let plain = TAG_RE.replace_all(&page.text, "");
        blocks.extend(
            plain
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| ContentBlock::Paragraph(l.to_string())),
        );
        blocks.push(ContentBlock::PageNumber(PageMarker {
            volume: page.vol.to_string(),
            page: page.page.to_string(),
        }));
    }

    let mut document = segment(blocks, SegmentOptions { collect_headings: false });

    let mut slugs = AnchorSlugRegistry::new();
    let headings = book
        .indexes
        .headings
        .iter()
        .map(|h| HeadingEntry {
            id: slugs.generate_header_id(&h.title),
            text: h.title.clone(),
            level: h.level.clamp(1, 3),
            locator: h
                .page
                .checked_sub(1)
                .and_then(|i| document.pages.get(i))
                .and_then(|p| p.locator.clone()),
            page_index: h.page.checked_sub(1).filter(|&i| i < document.pages.len()),
        })
        .collect();
    document.headings = headings;
    document
}
