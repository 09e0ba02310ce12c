//! photofeed - browse a paginated photo feed from the terminal
#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use unicode_width::UnicodeWidthChar;

use photofeed::api::{FetchClient, ReqwestTransport};
use photofeed::feed::{LoadOutcome, PagedPhotoFeed, sanitize_query};
use photofeed::images::ImageCache;
use photofeed::{Config, PhotoRecord};

/// Width of the author column
const AUTHOR_COLUMN: usize = 24;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG=debug for verbose output)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match parse_args()? {
        Command::List { pages, width } => list_cli(pages, width).await,
        Command::Search { query, pages } => search_cli(&query, pages).await,
        Command::Thumbs { width, limit } => thumbs_cli(width, limit).await,
        Command::Config => show_config(),
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            print_version();
            Ok(())
        }
    }
}

/// CLI commands
enum Command {
    List { pages: u32, width: Option<u32> },
    Search { query: String, pages: u32 },
    Thumbs { width: Option<u32>, limit: usize },
    Config,
    Help,
    Version,
}

/// Value following `--name` or `-n`, parsed
fn flag<T: std::str::FromStr>(args: &[String], long: &str, short: &str) -> Option<T> {
    args.iter()
        .position(|a| a == long || a == short)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() == 1 {
        return Ok(Command::List {
            pages: 1,
            width: None,
        });
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),

        "list" | "ls" => Ok(Command::List {
            pages: flag(&args, "--pages", "-p").unwrap_or(1),
            width: flag(&args, "--width", "-w"),
        }),

        "search" => {
            let query = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing search text"))?
                .clone();
            Ok(Command::Search {
                query,
                pages: flag(&args, "--pages", "-p").unwrap_or(1),
            })
        }

        "thumbs" => Ok(Command::Thumbs {
            width: flag(&args, "--width", "-w"),
            limit: flag(&args, "--limit", "-l").unwrap_or(10),
        }),

        "config" => Ok(Command::Config),

        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\nRun 'photofeed --help' for usage"
        )),
    }
}

fn print_help() {
    let config_path = photofeed::paths::config_path()
        .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());

    println!(
        r#"photofeed - browse a paginated photo feed

USAGE:
    photofeed                          List the first page
    photofeed [COMMAND]

COMMANDS:
    list [OPTIONS]                     List photos
      Options:
        -p, --pages <n>                Pages to load (default: 1)
        -w, --width <px>               Row width (default: display_width)

    search <text> [OPTIONS]            Filter photos by ID or author
      Options:
        -p, --pages <n>                Pages to load first (default: 1)

    thumbs [OPTIONS]                   Load thumbnails for the first page
      Options:
        -w, --width <px>               Row width (default: display_width)
        -l, --limit <n>                Number of thumbnails (default: 10)

    config                             Show the effective configuration

OPTIONS:
    -h, --help                         Show this help message
    -v, --version                      Show version information

ENVIRONMENT:
    {}                 API base URL (overrides config)
    RUST_LOG                           Log filter (default: warn)

CONFIG:
    {}
"#,
        photofeed::config::BASE_URL_ENV,
        config_path
    );
}

fn print_version() {
    println!("photofeed {}", photofeed::VERSION);
}

/// Everything a command needs, built from the config
struct Pipeline {
    config: Config,
    feed: PagedPhotoFeed,
    cache: ImageCache,
}

fn build_pipeline() -> Result<Pipeline> {
    let config = Config::load()?;
    let base_url = config.base_url()?.to_string();

    let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
    let client = FetchClient::new(&base_url, transport.clone());
    let feed = PagedPhotoFeed::new(Arc::new(client), config.feed());
    let cache = ImageCache::new(&config.image_cache(), transport);

    Ok(Pipeline {
        config,
        feed,
        cache,
    })
}

/// Load up to `pages` pages, stopping early at the end of the feed
async fn load_pages(feed: &PagedPhotoFeed, pages: u32) -> Result<()> {
    for _ in 0..pages {
        match feed.load_more().await {
            LoadOutcome::Appended { .. } => {}
            LoadOutcome::Exhausted | LoadOutcome::Skipped => break,
            LoadOutcome::Failed(err) => {
                return Err(err).context("Failed to load photos");
            }
            LoadOutcome::Discarded => break,
        }
    }
    Ok(())
}

/// Pad or cut `text` to exactly `width` terminal columns
fn fit(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push_str(&" ".repeat(width - used));
    out
}

fn print_row(photo: &PhotoRecord, width: u32) {
    println!(
        "{:>5}  {}  {:<20}  {:>5.2}:1  row {}px",
        photo.id,
        fit(&photo.author, AUTHOR_COLUMN),
        photo.size_label(),
        photo.aspect_ratio(),
        photo.row_height(width)
    );
}

async fn list_cli(pages: u32, width: Option<u32>) -> Result<()> {
    let pipeline = build_pipeline()?;
    let width = width.unwrap_or(pipeline.config.display_width);

    load_pages(&pipeline.feed, pages).await?;

    let snapshot = pipeline.feed.snapshot();
    for photo in snapshot.visible_records.iter() {
        print_row(photo, width);
    }
    println!(
        "\n{} photos, next page {}{}",
        snapshot.total_records,
        snapshot.page,
        if snapshot.has_more { "" } else { " (end of feed)" }
    );

    Ok(())
}

async fn search_cli(query: &str, pages: u32) -> Result<()> {
    let pipeline = build_pipeline()?;
    let width = pipeline.config.display_width;

    load_pages(&pipeline.feed, pages).await?;

    let query = sanitize_query(query);
    pipeline.feed.apply_query(&query);

    let snapshot = pipeline.feed.snapshot();
    println!("Search \"{}\"\n{}", query, "─".repeat(60));
    for photo in snapshot.visible_records.iter() {
        print_row(photo, width);
    }
    println!(
        "\n{} of {} photos match",
        snapshot.visible_records.len(),
        snapshot.total_records
    );

    Ok(())
}

async fn thumbs_cli(width: Option<u32>, limit: usize) -> Result<()> {
    let pipeline = build_pipeline()?;
    let width = width.unwrap_or(pipeline.config.display_width);

    load_pages(&pipeline.feed, 1).await?;

    let snapshot = pipeline.feed.snapshot();
    let handles: Vec<_> = snapshot
        .visible_records
        .iter()
        .take(limit)
        .cloned()
        .map(|photo| {
            let cache = pipeline.cache.clone();
            tokio::spawn(async move {
                let result = cache.get_for_record(&photo, width).await;
                (photo, result)
            })
        })
        .collect();

    for handle in handles {
        let (photo, result) = handle.await.context("Thumbnail task failed")?;
        match result {
            Ok(thumb) => println!(
                "{:>5}  {}  {}x{}  {} KiB",
                photo.id,
                fit(&photo.author, AUTHOR_COLUMN),
                thumb.width(),
                thumb.height(),
                thumb.cost / 1024
            ),
            Err(e) => println!(
                "{:>5}  {}  placeholder ({})",
                photo.id,
                fit(&photo.author, AUTHOR_COLUMN),
                e
            ),
        }
    }

    println!("\n{}", pipeline.cache.stats());
    Ok(())
}

fn show_config() -> Result<()> {
    let path = photofeed::paths::config_path()?;
    let config = Config::load()?;

    println!("Config file: {}\n", path.display());
    println!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to serialize config")?
    );
    if config.base_url().is_err() {
        println!(
            "# api_base_url is missing; set it above or via {}",
            photofeed::config::BASE_URL_ENV
        );
    }

    Ok(())
}
