use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use usul_reader::config::Config;
use usul_reader::db;
use usul_reader::error::BookError;
use usul_reader::parser::pages::{Document, SegmentOptions};
use usul_reader::parser::parse_document;
use usul_reader::source::{fetch_book, BookSource, HttpFetcher};
use usul_reader::warm;

#[derive(Parser)]
#[command(name = "usul-reader", about = "Fetch and paginate Usul library books")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one book version and print its pages and headings as JSON
    Fetch {
        #[command(subcommand)]
        source: FetchSource,
        /// Skip the document cache (neither read nor written)
        #[arg(long, global = true)]
        no_cache: bool,
        /// Pretty-print the JSON output
        #[arg(long, global = true)]
        pretty: bool,
    },
    /// Parse and paginate a local mARkdown file
    Segment {
        file: PathBuf,
        /// Do not build the heading index
        #[arg(long)]
        no_headings: bool,
        #[arg(long)]
        pretty: bool,
    },
    /// Print the table of contents of a local mARkdown file
    Toc { file: PathBuf },
    /// Fetch, paginate and cache every book listed in a file
    Warm {
        /// One source per line: `openiti <author> <book> <version>`, `turath <id>`, ...
        list: PathBuf,
        /// Re-fetch books that are already cached
        #[arg(long)]
        refresh: bool,
    },
    /// Show cache statistics
    Stats,
}

#[derive(Subcommand)]
enum FetchSource {
    /// OpenITI release file
    Openiti {
        author: String,
        book: String,
        version: String,
    },
    /// Turath JSON book
    Turath { id: String },
}

impl From<FetchSource> for BookSource {
    fn from(src: FetchSource) -> Self {
        match src {
            FetchSource::Openiti {
                author,
                book,
                version,
            } => BookSource::Openiti {
                author_id: author,
                book_id: book,
                version_id: version,
            },
            FetchSource::Turath { id } => BookSource::Turath { id },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let result = match cli.command {
        Commands::Fetch {
            source,
            no_cache,
            pretty,
        } => {
            let source = BookSource::from(source);
            let conn = if no_cache {
                None
            } else {
                let conn = db::connect(&config.cache_path)?;
                db::init_schema(&conn)?;
                Some(conn)
            };

            if let Some(book) = conn.as_ref().map(|c| db::load_book(c, &source)).transpose()?.flatten() {
                info!("Cache hit for {}", source);
                print_json(&book, pretty)?;
                return Ok(());
            }

            let fetcher = HttpFetcher::new(config.fetch_timeout)?;
            let book = match fetch_book(&fetcher, &config, &source).await {
                Ok(book) => book,
                Err(e) => {
                    report_book_error(&e);
                    return Err(e.into());
                }
            };
            if let Some(conn) = &conn {
                db::save_book(conn, &source, &book)?;
            }
            print_json(&book, pretty)
        }
        Commands::Segment {
            file,
            no_headings,
            pretty,
        } => {
            let text = read_file(&file)?;
            let opts = SegmentOptions {
                collect_headings: !no_headings,
            };
            let (_, document) = parse_document(&text, opts)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            print_json(&document, pretty)
        }
        Commands::Toc { file } => {
            let text = read_file(&file)?;
            let (_, document) = parse_document(&text, SegmentOptions::default())
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            print_toc(&document);
            Ok(())
        }
        Commands::Warm { list, refresh } => {
            let sources = warm::parse_source_list(&read_file(&list)?)?;
            if sources.is_empty() {
                println!("No sources listed in {}.", list.display());
                return Ok(());
            }
            let conn = db::connect(&config.cache_path)?;
            db::init_schema(&conn)?;
            let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout)?);
            println!("Warming {} books...", sources.len());
            let stats = warm::warm(&conn, fetcher, &config, sources, refresh).await?;
            println!(
                "Done: {} books ({} fetched, {} already cached, {} errors).",
                stats.total, stats.ok, stats.cached, stats.errors
            );
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&config.cache_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Cached:    {}", s.total);
            println!("OpenITI:   {}", s.openiti);
            println!("Turath:    {}", s.turath);
            println!("Links:     {}", s.links);
            println!("Pages:     {}", s.pages);
            println!("Headings:  {}", s.headings);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn report_book_error(e: &BookError) {
    match e {
        BookError::SourceNotFound { key, .. } => warn!("Book not found: {}", key),
        BookError::ParseFailure { key, .. } => warn!("Book not found (unparsable source): {}", key),
        BookError::Http(_) => {}
    }
}

fn read_file(path: &PathBuf) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

fn print_toc(doc: &Document) {
    if doc.headings.is_empty() {
        println!("No headings.");
        return;
    }
    println!("{:>5} | {:<9} | {:<32} | {}", "Page", "Locator", "Anchor", "Heading");
    println!("{}", "-".repeat(80));
    for h in &doc.headings {
        let index = doc
            .heading_page_index(&h.id)
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".into());
        let locator = h
            .locator
            .as_ref()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".into());
        let indent = "  ".repeat(h.level.saturating_sub(1) as usize);
        println!(
            "{:>5} | {:<9} | {:<32} | {}{}",
            index,
            locator,
            truncate(&h.id, 32),
            indent,
            h.text
        );
    }
    println!("\n{} headings across {} pages", doc.headings.len(), doc.pages.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
