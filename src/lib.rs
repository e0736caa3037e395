//! Book-content pipeline for the Usul reader.
//!
//! Raw OpenITI mARkdown (or a Turath JSON payload) is fetched, parsed into a
//! flat stream of [`ContentBlock`]s and split into positional pages at each
//! page marker, together with a table of contents whose anchor ids are unique
//! within one book.
//!
//! ```no_run
//! use usul_reader::prelude::*;
//!
//! # async fn run() -> Result<(), BookError> {
//! let config = Config::default();
//! let fetcher = HttpFetcher::new(config.fetch_timeout)?;
//! let source = BookSource::Openiti {
//!     author_id: "0179MalikIbnAnas".into(),
//!     book_id: "0179MalikIbnAnas.Muwatta".into(),
//!     version_id: "0179MalikIbnAnas.Muwatta.Shamela0001699-ara1".into(),
//! };
//! let book = fetch_book(&fetcher, &config, &source).await?;
//! if let Some(doc) = book.document() {
//!     println!("{} pages, {} headings", doc.pages.len(), doc.headings.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod parser;
pub mod source;
pub mod warm;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{AttemptError, BookError, ParseError};
    pub use crate::parser::blocks::{parse_blocks, ContentBlock, PageMarker, ParsedText};
    pub use crate::parser::pages::{
        segment, Document, HeadingEntry, LocatorValue, Page, PageLocator, SegmentOptions,
    };
    pub use crate::parser::parse_document;
    pub use crate::parser::slug::{slugify, AnchorSlugRegistry};
    pub use crate::source::openiti::fetch_raw_source;
    pub use crate::source::{fetch_book, Book, BookSource, HttpFetcher, TextFetcher};
}

pub use parser::blocks::ContentBlock;
pub use parser::pages::{segment, Document, SegmentOptions};
