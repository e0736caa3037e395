use std::fmt;

use serde::{Deserialize, Serialize};

use super::blocks::{ContentBlock, PageMarker};
use super::slug::AnchorSlugRegistry;

/// One half of a locator: numeric when the token is an integer, else the raw label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocatorValue {
    Number(i64),
    Text(String),
}

impl LocatorValue {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) => LocatorValue::Number(n),
            Err(_) => LocatorValue::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for LocatorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorValue::Number(n) => write!(f, "{n}"),
            LocatorValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageLocator {
    pub volume: LocatorValue,
    pub page: LocatorValue,
}

impl PageLocator {
    pub fn from_marker(marker: &PageMarker) -> Self {
        Self {
            volume: LocatorValue::parse(&marker.volume),
            page: LocatorValue::parse(&marker.page),
        }
    }
}

impl fmt::Display for PageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.volume, self.page)
    }
}

/// Blocks between two page markers. `locator` is `None` only for a trailing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub locator: Option<PageLocator>,
    pub blocks: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingEntry {
    pub id: String,
    pub text: String,
    pub level: u8,
    /// Locator of the first page marker after the heading.
    pub locator: Option<PageLocator>,
    /// Positional index of the page the heading was stamped on.
    #[serde(default)]
    pub page_index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub pages: Vec<Page>,
    pub headings: Vec<HeadingEntry>,
}

impl Document {
    /// Positional index of the first page carrying `locator`.
    pub fn page_index_of(&self, locator: &PageLocator) -> Option<usize> {
        self.pages
            .iter()
            .position(|p| p.locator.as_ref() == Some(locator))
    }

    /// Page index a "jump to heading" link should open.
    /// Locators can repeat, so this is the position recorded by `segment`.
    pub fn heading_page_index(&self, id: &str) -> Option<usize> {
        self.headings.iter().find(|h| h.id == id)?.page_index
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    pub collect_headings: bool,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            collect_headings: true,
        }
    }
}

/// Split a flat block stream into pages at each page marker.
///
/// Markers themselves are consumed. Headings are given unique anchor ids in
/// encounter order and stamped with the locator of the next marker; headings
/// after the last marker keep a `None` locator.
pub fn segment<I>(blocks: I, opts: SegmentOptions) -> Document
where
    I: IntoIterator<Item = ContentBlock>,
{
    let mut pages: Vec<Page> = Vec::new();
    let mut headings: Vec<HeadingEntry> = Vec::new();
    let mut current_blocks: Vec<ContentBlock> = Vec::new();
    let mut current_headings: Vec<HeadingEntry> = Vec::new();
    let mut slugs = AnchorSlugRegistry::new();

    for block in blocks {
        if let ContentBlock::PageNumber(marker) = &block {
            let locator = PageLocator::from_marker(marker);
            let index = pages.len();
            for mut h in current_headings.drain(..) {
                h.locator = Some(locator.clone());
                h.page_index = Some(index);
                headings.push(h);
            }
            pages.push(Page {
                locator: Some(locator),
                blocks: std::mem::take(&mut current_blocks),
            });
            continue;
        }

        if opts.collect_headings {
            if let (Some(text), Some(level)) = (block.heading_text(), block.heading_level()) {
                current_headings.push(HeadingEntry {
                    id: slugs.generate_header_id(text),
                    text: text.to_string(),
                    level,
                    locator: None,
                    page_index: None,
                });
            }
        }
        current_blocks.push(block);
    }

    // Trailing headings sit in `current_blocks`, so the tail page exists for them.
    let tail_index = (!current_blocks.is_empty()).then_some(pages.len());
    if !current_blocks.is_empty() {
        pages.push(Page {
            locator: None,
            blocks: current_blocks,
        });
    }
    headings.extend(current_headings.into_iter().map(|mut h| {
        h.page_index = tail_index;
        h
    }));

    Document { pages, headings }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title(t: &str) -> ContentBlock {
        ContentBlock::Title(t.into())
    }

    fn text(t: &str) -> ContentBlock {
        ContentBlock::Paragraph(t.into())
    }

    fn marker(volume: &str, page: &str) -> ContentBlock {
        ContentBlock::PageNumber(PageMarker {
            volume: volume.into(),
            page: page.into(),
        })
    }

    fn loc(volume: i64, page: i64) -> PageLocator {
        PageLocator {
            volume: LocatorValue::Number(volume),
            page: LocatorValue::Number(page),
        }
    }

    #[test]
    fn worked_example() {
        let blocks = vec![
            title("Ch 1"),
            text("hello"),
            marker("1", "1"),
            text("world"),
            title("Ch 1"),
            marker("1", "2"),
        ];
        let doc = segment(blocks, SegmentOptions::default());

        assert_eq!(
            doc.pages,
            vec![
                Page {
                    locator: Some(loc(1, 1)),
                    blocks: vec![title("Ch 1"), text("hello")],
                },
                Page {
                    locator: Some(loc(1, 2)),
                    blocks: vec![text("world"), title("Ch 1")],
                },
            ]
        );
        let ids: Vec<_> = doc.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["ch-1", "ch-1-1"]);
        assert_eq!(doc.headings[0].locator, Some(loc(1, 1)));
        assert_eq!(doc.headings[1].locator, Some(loc(1, 2)));
        assert!(doc.headings.iter().all(|h| h.text == "Ch 1" && h.level == 0));
    }

    #[test]
    fn non_numeric_locator_kept_verbatim() {
        let doc = segment(vec![text("a"), marker("IV", "3")], SegmentOptions::default());
        assert_eq!(
            doc.pages[0].locator,
            Some(PageLocator {
                volume: LocatorValue::Text("IV".into()),
                page: LocatorValue::Number(3),
            })
        );
    }

    #[test]
    fn leading_zeros_parse_as_numbers() {
        let doc = segment(vec![marker("01", "005")], SegmentOptions::default());
        assert_eq!(doc.pages[0].locator, Some(loc(1, 5)));
    }

    #[test]
    fn trailing_page_has_no_locator() {
        let doc = segment(
            vec![text("a"), marker("1", "1"), ContentBlock::Header1("Tail".into()), text("b")],
            SegmentOptions::default(),
        );
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[1].locator, None);
        assert_eq!(doc.headings.len(), 1);
        assert_eq!(doc.headings[0].locator, None);
        assert_eq!(doc.heading_page_index("tail"), Some(1));
    }

    #[test]
    fn consecutive_markers_make_empty_pages() {
        let doc = segment(vec![marker("1", "1"), marker("1", "2")], SegmentOptions::default());
        assert_eq!(doc.pages.len(), 2);
        assert!(doc.pages.iter().all(|p| p.blocks.is_empty() && p.locator.is_some()));
    }

    #[test]
    fn empty_input() {
        let doc = segment(Vec::new(), SegmentOptions::default());
        assert!(doc.pages.is_empty());
        assert!(doc.headings.is_empty());
    }

    #[test]
    fn page_count_matches_marker_count() {
        let blocks = vec![
            text("a"),
            marker("1", "1"),
            text("b"),
            marker("1", "2"),
            marker("1", "3"),
            text("c"),
        ];
        let doc = segment(blocks, SegmentOptions::default());
        let located = doc.pages.iter().filter(|p| p.locator.is_some()).count();
        assert_eq!(located, 3);
        assert_eq!(doc.pages.len(), 4);
    }

    #[test]
    fn flattening_pages_restores_stream_without_markers() {
        let blocks = vec![
            title("T"),
            text("a"),
            marker("1", "1"),
            ContentBlock::Verse(vec!["x".into(), "y".into()]),
            marker("1", "2"),
            ContentBlock::Blockquote("q".into()),
        ];
        let expected: Vec<_> = blocks.iter().filter(|b| !b.is_page_marker()).cloned().collect();
        let doc = segment(blocks, SegmentOptions::default());
        let flat: Vec<_> = doc.pages.into_iter().flat_map(|p| p.blocks).collect();
        assert_eq!(flat, expected);
    }

    #[test]
    fn idempotent() {
        let blocks = vec![title("A"), marker("1", "1"), title("A"), title("A"), text("z")];
        let first = segment(blocks.clone(), SegmentOptions::default());
        let second = segment(blocks, SegmentOptions::default());
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn headings_disabled() {
        let blocks = vec![title("A"), marker("1", "1"), title("B")];
        let doc = segment(blocks, SegmentOptions { collect_headings: false });
        assert!(doc.headings.is_empty());
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[0].blocks, vec![title("A")]);
    }

    #[test]
    fn heading_jump_resolves_to_page_index() {
        let blocks = vec![
            text("front"),
            marker("1", "1"),
            ContentBlock::Header2("Bab".into()),
            marker("1", "2"),
        ];
        let doc = segment(blocks, SegmentOptions::default());
        assert_eq!(doc.heading_page_index("bab"), Some(1));
        assert_eq!(doc.heading_page_index("missing"), None);
        assert_eq!(doc.page_index_of(&loc(1, 1)), Some(0));
    }

    #[test]
    fn repeated_locator_keeps_heading_position() {
        let blocks = vec![
            text("front"),
            marker("00", "000"),
            ContentBlock::Header1("Intro".into()),
            text("preface"),
            marker("00", "000"),
            ContentBlock::Header1("Bab".into()),
            text("body"),
            marker("01", "001"),
        ];
        let doc = segment(blocks, SegmentOptions::default());
        assert_eq!(doc.pages[0].locator, doc.pages[1].locator);
        assert_eq!(doc.heading_page_index("intro"), Some(1));
        assert_eq!(doc.heading_page_index("bab"), Some(2));
        assert_eq!(doc.page_index_of(&loc(0, 0)), Some(0));
    }

    #[test]
    fn locator_json_shape() {
        let json = serde_json::to_value(PageLocator {
            volume: LocatorValue::Text("IV".into()),
            page: LocatorValue::Number(3),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "volume": "IV", "page": 3 }));
    }
}
