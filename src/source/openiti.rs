use tracing::{debug, info, warn};

use super::TextFetcher;
use crate::error::BookError;

/// Suffixes tried in order; different corpus releases publish under different names.
pub const FALLBACK_SUFFIXES: [&str; 3] = ["", ".completed", ".mARkdown"];

pub fn source_url(base: &str, author_id: &str, book_id: &str, version_id: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        base.trim_end_matches('/'),
        author_id,
        book_id,
        version_id
    )
}

/// Fetch the raw mARkdown for one version, walking the suffix fallbacks sequentially.
///
/// Only a failed attempt (non-2xx or transport error) moves on to the next
/// suffix; an ok response is returned as-is even if the body is empty.
pub async fn fetch_raw_source<F>(
    fetcher: &F,
    base: &str,
    author_id: &str,
    book_id: &str,
    version_id: &str,
) -> Result<String, BookError>
where
    F: TextFetcher + ?Sized,
{
    let base_url = source_url(base, author_id, book_id, version_id);
    let mut attempts = Vec::with_capacity(FALLBACK_SUFFIXES.len());

    for suffix in FALLBACK_SUFFIXES {
        let url = format!("{base_url}{suffix}");
        debug!("GET {}", url);
        match fetcher.get_text(&url).await {
            Ok(body) => {
                if !suffix.is_empty() {
                    info!("Fetched {} via fallback suffix {}", version_id, suffix);
                }
                return Ok(body);
            }
            Err(e) => {
                warn!("Fetch failed for {}: {}", url, e);
                attempts.push(format!("{url} ({e})"));
            }
        }
    }

    Err(BookError::SourceNotFound {
        key: version_id.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttemptError;
    use crate::source::testing::FakeFetcher;

    const BASE: &str = "http://r/A/A.B/A.B.v1";

    async fn fetch(fetcher: &FakeFetcher) -> Result<String, BookError> {
        fetch_raw_source(fetcher, "http://r/", "A", "A.B", "A.B.v1").await
    }

    #[test]
    fn url_layout() {
        assert_eq!(source_url("http://r/", "A", "A.B", "A.B.v1"), BASE);
    }

    #[tokio::test]
    async fn bare_path_succeeds_with_one_request() {
        let fetcher = FakeFetcher::default().with(BASE, Ok("text"));
        assert_eq!(fetch(&fetcher).await.unwrap(), "text");
        assert_eq!(fetcher.calls(), vec![BASE.to_string()]);
    }

    #[tokio::test]
    async fn falls_back_in_order() {
        let fetcher = FakeFetcher::default()
            .with(BASE, Err(AttemptError::Status(404)))
            .with(&format!("{BASE}.completed"), Err(AttemptError::Status(404)))
            .with(&format!("{BASE}.mARkdown"), Ok("md"));
        assert_eq!(fetch(&fetcher).await.unwrap(), "md");
        assert_eq!(
            fetcher.calls(),
            vec![
                BASE.to_string(),
                format!("{BASE}.completed"),
                format!("{BASE}.mARkdown"),
            ]
        );
    }

    #[tokio::test]
    async fn transport_error_also_falls_back() {
        let fetcher = FakeFetcher::default()
            .with(BASE, Err(AttemptError::Transport("timed out".into())))
            .with(&format!("{BASE}.completed"), Ok("done"));
        assert_eq!(fetch(&fetcher).await.unwrap(), "done");
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn empty_ok_body_does_not_fall_back() {
        let fetcher = FakeFetcher::default()
            .with(BASE, Ok(""))
            .with(&format!("{BASE}.completed"), Ok("other"));
        assert_eq!(fetch(&fetcher).await.unwrap(), "");
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn all_attempts_fail() {
        let fetcher = FakeFetcher::default();
        let err = fetch(&fetcher).await.unwrap_err();
        match err {
            BookError::SourceNotFound { key, attempts } => {
                assert_eq!(key, "A.B.v1");
                assert_eq!(attempts.len(), 3);
                assert!(attempts[2].contains(".mARkdown"));
            }
            other => panic!("expected SourceNotFound, got {other:?}"),
        }
        assert_eq!(fetcher.calls().len(), 3);
    }
}
