pub mod openiti;
pub mod turath;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::error::{AttemptError, BookError};
use crate::parser::pages::{Document, SegmentOptions};

/// Seam over HTTP so the fallback chain can be driven without a network.
#[async_trait]
pub trait TextFetcher: Send + Sync {
    /// Body of a 2xx response, even when empty.
    async fn get_text(&self, url: &str) -> Result<String, AttemptError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TextFetcher for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String, AttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BookSource {
    Openiti {
        author_id: String,
        book_id: String,
        version_id: String,
    },
    Turath {
        id: String,
    },
    Pdf {
        url: String,
    },
    External {
        url: String,
    },
}

impl BookSource {
    /// `(book, version)` pair the document cache is keyed by.
    pub fn cache_key(&self) -> (String, String) {
        match self {
            BookSource::Openiti {
                book_id, version_id, ..
            } => (book_id.clone(), version_id.clone()),
            BookSource::Turath { id } => ("turath".to_string(), id.clone()),
            BookSource::Pdf { url } => ("pdf".to_string(), url.clone()),
            BookSource::External { url } => ("external".to_string(), url.clone()),
        }
    }
}

impl fmt::Display for BookSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSource::Openiti {
                author_id,
                book_id,
                version_id,
            } => write!(f, "openiti {author_id} {book_id} {version_id}"),
            BookSource::Turath { id } => write!(f, "turath {id}"),
            BookSource::Pdf { url } => write!(f, "pdf {url}"),
            BookSource::External { url } => write!(f, "external {url}"),
        }
    }
}

impl FromStr for BookSource {
    type Err = anyhow::Error;

    /// Parses the `Display` form: `openiti <author> <book> <version>`, `turath <id>`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            ["openiti", author, book, version] => Ok(BookSource::Openiti {
                author_id: author.to_string(),
                book_id: book.to_string(),
                version_id: version.to_string(),
            }),
            ["turath", id] => Ok(BookSource::Turath { id: id.to_string() }),
            ["pdf", url] => Ok(BookSource::Pdf { url: url.to_string() }),
            ["external", url] => Ok(BookSource::External { url: url.to_string() }),
            _ => Err(anyhow::anyhow!("unrecognised book source line: {s:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Book {
    Openiti {
        metadata: Vec<(String, String)>,
        document: Document,
    },
    Turath {
        document: Document,
    },
    Pdf {
        url: String,
    },
    External {
        url: String,
    },
}

impl Book {
    pub fn document(&self) -> Option<&Document> {
        match self {
            Book::Openiti { document, .. } | Book::Turath { document } => Some(document),
            Book::Pdf { .. } | Book::External { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Book::Openiti { .. } => "openiti",
            Book::Turath { .. } => "turath",
            Book::Pdf { .. } => "pdf",
            Book::External { .. } => "external",
        }
    }
}

/// Fetch, parse and paginate one book version.
pub async fn fetch_book<F>(fetcher: &F, config: &Config, source: &BookSource) -> Result<Book, BookError>
where
    F: TextFetcher + ?Sized,
{
    match source {
        BookSource::Openiti {
            author_id,
            book_id,
            version_id,
        } => {
            let raw = openiti::fetch_raw_source(
                fetcher,
                &config.openiti_base_url,
                author_id,
                book_id,
                version_id,
            )
            .await?;
            let (metadata, document) =
                crate::parser::parse_document(&raw, SegmentOptions::default()).map_err(|e| {
                    BookError::ParseFailure {
                        key: version_id.clone(),
                        source: e,
                    }
                })?;
            info!(
                "Segmented {}: {} pages, {} headings",
                version_id,
                document.pages.len(),
                document.headings.len()
            );
            Ok(Book::Openiti { metadata, document })
        }
        BookSource::Turath { id } => {
            let document = turath::fetch_turath_book(fetcher, &config.turath_base_url, id).await?;
            Ok(Book::Turath { document })
        }
        BookSource::Pdf { url } => Ok(Book::Pdf { url: url.clone() }),
        BookSource::External { url } => Ok(Book::External { url: url.clone() }),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Serves canned responses and records every URL requested, in order.
    #[derive(Default)]
    pub struct FakeFetcher {
        responses: HashMap<String, Result<String, AttemptError>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn with(mut self, url: &str, response: Result<&str, AttemptError>) -> Self {
            self.responses
                .insert(url.to_string(), response.map(str::to_string));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextFetcher for FakeFetcher {
        async fn get_text(&self, url: &str) -> Result<String, AttemptError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .unwrap_or(Err(AttemptError::Status(404)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeFetcher;
    use super::*;

    fn config() -> Config {
        Config {
            openiti_base_url: "http://r".into(),
            turath_base_url: "http://t".into(),
            ..Config::default()
        }
    }

    fn openiti_source() -> BookSource {
        BookSource::Openiti {
            author_id: "0179Malik".into(),
            book_id: "0179Malik.Muwatta".into(),
            version_id: "0179Malik.Muwatta.Shamela01-ara1".into(),
        }
    }

    const URL: &str = "http://r/0179Malik/0179Malik.Muwatta/0179Malik.Muwatta.Shamela01-ara1";

    #[test]
    fn source_line_round_trip() {
        let src = openiti_source();
        let parsed: BookSource = src.to_string().parse().unwrap();
        assert_eq!(parsed, src);
        assert!("turath".parse::<BookSource>().is_err());
        assert_eq!(
            "pdf https://x/y.pdf".parse::<BookSource>().unwrap(),
            BookSource::Pdf { url: "https://x/y.pdf".into() }
        );
    }

    #[tokio::test]
    async fn openiti_book_is_segmented() {
        let text = "######OpenITI#\n#META#Header#End#\n### | Bab\n# a PageV01P001\n# b";
        let fetcher = FakeFetcher::default().with(URL, Ok(text));
        let book = fetch_book(&fetcher, &config(), &openiti_source()).await.unwrap();
        let doc = book.document().unwrap();
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.headings[0].id, "bab");
        assert_eq!(book.kind(), "openiti");
    }

    #[tokio::test]
    async fn parse_failure_is_distinct_from_not_found() {
        let fetcher = FakeFetcher::default().with(URL, Ok("not a mARkdown file"));
        let err = fetch_book(&fetcher, &config(), &openiti_source()).await.unwrap_err();
        assert!(matches!(err, BookError::ParseFailure { .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn pdf_and_external_skip_the_network() {
        let fetcher = FakeFetcher::default();
        let book = fetch_book(&fetcher, &config(), &BookSource::Pdf { url: "u".into() })
            .await
            .unwrap();
        assert_eq!(book, Book::Pdf { url: "u".into() });
        let book = fetch_book(&fetcher, &config(), &BookSource::External { url: "e".into() })
            .await
            .unwrap();
        assert!(book.document().is_none());
        assert!(fetcher.calls().is_empty());
    }
}
