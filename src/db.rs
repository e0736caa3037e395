use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::source::{Book, BookSource};

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id            INTEGER PRIMARY KEY,
            book_key      TEXT NOT NULL,
            version_key   TEXT NOT NULL,
            kind          TEXT NOT NULL CHECK(kind IN ('openiti','turath','pdf','external')),
            body          TEXT NOT NULL,
            page_count    INTEGER NOT NULL DEFAULT 0,
            heading_count INTEGER NOT NULL DEFAULT 0,
            cached_at     TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(book_key, version_key)
        );
        CREATE INDEX IF NOT EXISTS idx_documents_kind ON documents(kind);
        ",
    )?;
    Ok(())
}

pub fn load_book(conn: &Connection, source: &BookSource) -> Result<Option<Book>> {
    let (book_key, version_key) = source.cache_key();
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE book_key = ?1 AND version_key = ?2",
            rusqlite::params![book_key, version_key],
            |row| row.get(0),
        )
        .optional()?;
    body.map(|b| serde_json::from_str::<Book>(&b).context("Corrupt cached document"))
        .transpose()
}

pub fn save_book(conn: &Connection, source: &BookSource, book: &Book) -> Result<()> {
    let (book_key, version_key) = source.cache_key();
    let (pages, headings) = book
        .document()
        .map(|d| (d.pages.len(), d.headings.len()))
        .unwrap_or((0, 0));
    conn.execute(
        "INSERT OR REPLACE INTO documents
         (book_key, version_key, kind, body, page_count, heading_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            book_key,
            version_key,
            book.kind(),
            serde_json::to_string(book)?,
            pages as i64,
            headings as i64,
        ],
    )?;
    Ok(())
}

pub struct Stats {
    pub total: i64,
    pub openiti: i64,
    pub turath: i64,
    pub links: i64,
    pub pages: i64,
    pub headings: i64,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let s = conn.query_row(
        "SELECT
            COUNT(*),
            COALESCE(SUM(kind = 'openiti'), 0),
            COALESCE(SUM(kind = 'turath'), 0),
            COALESCE(SUM(kind IN ('pdf','external')), 0),
            COALESCE(SUM(page_count), 0),
            COALESCE(SUM(heading_count), 0)
         FROM documents",
        [],
        |row| {
            Ok(Stats {
                total: row.get(0)?,
                openiti: row.get(1)?,
                turath: row.get(2)?,
                links: row.get(3)?,
                pages: row.get(4)?,
                headings: row.get(5)?,
            })
        },
    )?;
    Ok(s)
}
