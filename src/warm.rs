use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Config;
use crate::db;
use crate::error::BookError;
use crate::source::{fetch_book, Book, BookSource, TextFetcher};

/// Warm stats returned after completion.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct WarmStats {
    pub total: usize,
    pub cached: usize,
    pub ok: usize,
    pub errors: usize,
}

/// One source per line; blank lines and `#` comments are skipped.
pub fn parse_source_list(text: &str) -> Result<Vec<BookSource>> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
        .map(|(n, l)| l.parse().with_context(|| format!("line {n}")))
        .collect()
}

/// Fetch and segment every source not yet cached, saving each result as it arrives.
///
/// Books are fetched concurrently up to `config.concurrency`; each book still
/// walks its own fallback chain one request at a time.
pub async fn warm<F>(
    conn: &Connection,
    fetcher: Arc<F>,
    config: &Config,
    sources: Vec<BookSource>,
    refresh: bool,
) -> Result<WarmStats>
where
    F: TextFetcher + 'static,
{
    let total = sources.len();
    let mut stats = WarmStats {
        total,
        ..WarmStats::default()
    };

    let mut pending = Vec::with_capacity(total);
    for source in sources {
        if !refresh && db::load_book(conn, &source)?.is_some() {
            stats.cached += 1;
        } else {
            pending.push(source);
        }
    }
    if pending.is_empty() {
        return Ok(stats);
    }

    let pb = ProgressBar::new(pending.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let config = Arc::new(config.clone());
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let (tx, mut rx) =
        tokio::sync::mpsc::channel::<(BookSource, Result<Book, BookError>)>(config.concurrency.max(1) * 2);

    for source in pending {
        let fetcher = Arc::clone(&fetcher);
        let config = Arc::clone(&config);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let result = fetch_book(fetcher.as_ref(), &config, &source).await;
            let _ = tx.send((source, result)).await;
        });
    }

    // rx closes once every task has dropped its sender
    drop(tx);

    while let Some((source, result)) = rx.recv().await {
        match result {
            Ok(book) => {
                db::save_book(conn, &source, &book)?;
                stats.ok += 1;
            }
            Err(e) => {
                warn!("Failed {}: {}", source, e);
                stats.errors += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Warmed {} books ({} ok, {} cached, {} errors)",
        total, stats.ok, stats.cached, stats.errors
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::FakeFetcher;

    const MARKDOWN: &str = "######OpenITI#\n#META#Header#End#\n# a PageV01P001";

    fn config() -> Config {
        Config {
            openiti_base_url: "http://r".into(),
            concurrency: 2,
            ..Config::default()
        }
    }

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn source_list_skips_comments() {
        let list = "# books\nopeniti a a.b a.b.v1\n\nturath 7\n";
        let sources = parse_source_list(list).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1], BookSource::Turath { id: "7".into() });
    }

    #[test]
    fn source_list_reports_line() {
        let err = parse_source_list("turath 1\nbogus").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn warms_and_counts() {
        let conn = memory();
        let fetcher = Arc::new(FakeFetcher::default().with("http://r/a/a.b/a.b.v1", Ok(MARKDOWN)));
        let sources = parse_source_list("openiti a a.b a.b.v1\nopeniti x x.y x.y.v1\npdf http://p").unwrap();

        let stats = warm(&conn, Arc::clone(&fetcher), &config(), sources.clone(), false)
            .await
            .unwrap();
        assert_eq!(
            stats,
            WarmStats {
                total: 3,
                cached: 0,
                ok: 2,
                errors: 1,
            }
        );
        assert!(db::load_book(&conn, &sources[0]).unwrap().is_some());

        let again = warm(&conn, fetcher, &config(), sources, false).await.unwrap();
        assert_eq!(again.cached, 2);
        assert_eq!(again.errors, 1);
    }
}
